//! Error types for the view pipeline.
//!
//! [`Error`] is the single error type returned by lookup, compile and render
//! operations. Each variant belongs to one [`ErrorKind`], so callers can tell a
//! missing layout apart from an unconfigured layout feature without matching
//! on message text.
//!
//! Engine and middleware failures carry their own types ([`EngineError`],
//! [`HookError`]) because they are produced by code outside this crate.

use std::fmt;

use thiserror::Error;

use crate::middleware::Stage;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong argument shape at a public entry point.
    InvalidArgument,
    /// A view, collection, engine or layout does not exist.
    NotFound,
    /// A whole category of registration is absent.
    Configuration,
    /// A located resource is malformed for its intended use.
    Structural,
    /// The template engine failed during compile or render.
    Engine,
    /// A middleware handler failed.
    Middleware,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotFound => "not found",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Structural => "structural",
            ErrorKind::Engine => "engine",
            ErrorKind::Middleware => "middleware",
        };
        f.write_str(label)
    }
}

/// Error type for lookup, layout, compile and render operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A public entry point was called in a way it does not support.
    #[error("{method}: {message}")]
    InvalidArgument {
        method: &'static str,
        message: String,
    },

    /// No view with this name exists in the searched collections.
    #[error("cannot find view: {0}")]
    ViewNotFound(String),

    /// Neither the name nor its inflection is a registered collection.
    #[error("cannot find collection: {0}")]
    CollectionNotFound(String),

    /// No engine is registered for the resolved id.
    ///
    /// Holds the id, or the view's basename when no id could be derived.
    #[error("{method}: cannot find an engine for: {target}")]
    EngineNotFound {
        method: &'static str,
        target: String,
    },

    /// The declared layout is not in any layout collection.
    #[error("cannot find layout: {0}")]
    LayoutNotFound(String),

    /// A layout is declared but no layout collection was ever created.
    #[error("no layouts are registered.")]
    NoLayouts,

    /// The layout has no body marker to insert the view into.
    #[error("cannot find layout tag \"{tag}\" in \"{layout}\"")]
    MissingBodyTag { tag: String, layout: String },

    /// A layout chain refers back to a layout already applied.
    #[error("layout cycle detected: {}", .0.join(" -> "))]
    LayoutCycle(Vec<String>),

    /// A glob pattern handed to a match operation is invalid.
    #[error("invalid pattern \"{pattern}\": {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Options could not be parsed.
    #[error("invalid options: {0}")]
    Options(String),

    /// The template engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A middleware handler failed.
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl Error {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::ViewNotFound(_)
            | Error::CollectionNotFound(_)
            | Error::EngineNotFound { .. }
            | Error::LayoutNotFound(_) => ErrorKind::NotFound,
            Error::NoLayouts | Error::Options(_) => ErrorKind::Configuration,
            Error::MissingBodyTag { .. } | Error::LayoutCycle(_) => ErrorKind::Structural,
            Error::Pattern { .. } => ErrorKind::InvalidArgument,
            Error::Engine(_) => ErrorKind::Engine,
            Error::Hook(_) => ErrorKind::Middleware,
        }
    }

    pub(crate) fn invalid_argument(method: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            method,
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Options(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Options(err.to_string())
    }
}

/// Error produced by a template engine while compiling or rendering.
#[derive(Debug, Error)]
#[error("engine error in {engine}: {message}")]
pub struct EngineError {
    /// Id of the engine that failed
    pub engine: String,
    /// Human-readable error message
    pub message: String,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EngineError {
    /// Creates a new engine error.
    pub fn new(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }
}

/// Error returned by a middleware handler.
#[derive(Debug, Error)]
#[error("middleware error ({stage}): {message}")]
pub struct HookError {
    /// Human-readable error message
    pub message: String,
    /// The stage whose handler failed
    pub stage: Stage,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HookError {
    /// Creates a new hook error for the given stage.
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage,
            source: None,
        }
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_messages_match_documented_wording() {
        assert_eq!(
            Error::LayoutNotFound("default.tmpl".into()).to_string(),
            "cannot find layout: default.tmpl"
        );
        assert_eq!(Error::NoLayouts.to_string(), "no layouts are registered.");
        let err = Error::MissingBodyTag {
            tag: "body".into(),
            layout: "no_body_tag.tmpl".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot find layout tag \"body\" in \"no_body_tag.tmpl\""
        );
    }

    #[test]
    fn kinds_separate_missing_instance_from_missing_feature() {
        assert_eq!(
            Error::LayoutNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::NoLayouts.kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::LayoutCycle(vec!["a".into(), "b".into(), "a".into()]).kind(),
            ErrorKind::Structural
        );
    }

    #[test]
    fn engine_error_converts_and_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = EngineError::new("tmpl", "render failed")
            .with_source(io)
            .into();
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert!(err.to_string().contains("render failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn cycle_message_lists_chain() {
        let err = Error::LayoutCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "layout cycle detected: a -> b -> a");
    }
}
