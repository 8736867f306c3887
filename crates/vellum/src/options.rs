//! Application options.
//!
//! Options can be built in code or loaded from YAML/JSON:
//!
//! ```rust
//! use vellum::Options;
//!
//! let options = Options::from_yaml(r#"
//! default-engine: tmpl
//! layout: default.tmpl
//! layout-tag: content
//! layout-delims: ["{{", "}}"]
//! "#).unwrap();
//!
//! assert_eq!(options.default_engine.as_deref(), Some("tmpl"));
//! assert_eq!(options.layout_tag, "content");
//! ```

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Pipeline-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    /// Engine used when a view has no declared engine and no extension.
    pub default_engine: Option<String>,
    /// Layout applied to views outside layout collections that declare none.
    pub layout: Option<String>,
    /// Name inside the body marker, `body` in `{% body %}`.
    pub layout_tag: String,
    /// Opening and closing delimiters of the body marker.
    pub layout_delims: (String, String),
    /// Whether the built-in rethrow transform runs on engine render errors.
    pub rethrow: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_engine: None,
            layout: None,
            layout_tag: "body".into(),
            layout_delims: ("{%".into(), "%}".into()),
            rethrow: false,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parses options from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn default_engine(mut self, engine: impl Into<String>) -> Self {
        self.default_engine = Some(engine.into());
        self
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn layout_tag(mut self, tag: impl Into<String>) -> Self {
        self.layout_tag = tag.into();
        self
    }

    pub fn layout_delims(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.layout_delims = (open.into(), close.into());
        self
    }

    pub fn rethrow(mut self, rethrow: bool) -> Self {
        self.rethrow = rethrow;
        self
    }

    /// Regex matching the body marker, whitespace-tolerant inside the
    /// delimiters.
    pub fn body_marker(&self) -> Result<Regex> {
        let (open, close) = &self.layout_delims;
        let pattern = format!(
            r"{}\s*{}\s*{}",
            regex::escape(open),
            regex::escape(&self.layout_tag),
            regex::escape(close)
        );
        Regex::new(&pattern).map_err(|e| Error::Options(e.to_string()))
    }
}
