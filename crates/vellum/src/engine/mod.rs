//! Template engine abstraction and registry.
//!
//! This module defines the [`Engine`] trait which adapts an external template
//! language to the pipeline. An engine does two things:
//!
//! - `compile(content, options)` turns template text into a [`RenderFn`]
//!   (`compile_with_helpers` additionally receives the app's helpers)
//! - `render(func, context)` runs a render function against a context,
//!   possibly asynchronously
//!
//! Engines are registered on an [`Engines`] registry under one or more ids
//! (usually file extensions). A view's engine id is derived by
//! [`resolve_engine`].
//!
//! Two adapters ship with the crate: [`BaseEngine`] (ERB-style `<%= name %>`
//! substitution) and [`MiniJinjaEngine`].

mod base;
mod jinja;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use crate::context::{overlay, Map};
use crate::error::EngineError;
use crate::helpers::BoundHelpers;
use crate::view::View;

pub use base::BaseEngine;
pub use jinja::MiniJinjaEngine;

/// A compiled template.
pub trait Template {
    /// Renders the template with the given context.
    fn render(&self, context: &Map) -> Result<String, EngineError>;
}

/// Shared handle to a compiled template.
///
/// Views cache these per engine id; the same `Rc` is handed out on every
/// cache hit.
pub type RenderFn = Rc<dyn Template>;

/// An adapter for an external template language.
///
/// Adapters are long-lived and shared by every view that resolves to them, so
/// `compile` and `render` must not depend on state left behind by earlier
/// calls.
pub trait Engine {
    /// Options the engine declares for itself.
    ///
    /// A `name` entry is moved to `engineName` at registration.
    fn options(&self) -> Map {
        Map::new()
    }

    /// Compiles template content into a render function.
    fn compile(&self, content: &str, options: &Map) -> Result<RenderFn, EngineError>;

    /// Compiles with helper functions callable from the template.
    ///
    /// The default implementation ignores `helpers` and calls
    /// [`compile`](Self::compile).
    fn compile_with_helpers(
        &self,
        content: &str,
        options: &Map,
        helpers: &BoundHelpers,
    ) -> Result<RenderFn, EngineError> {
        let _ = helpers;
        self.compile(content, options)
    }

    /// Renders a compiled template.
    ///
    /// The default implementation calls [`Template::render`] directly.
    fn render<'a>(
        &'a self,
        func: RenderFn,
        context: Map,
    ) -> LocalBoxFuture<'a, Result<String, EngineError>> {
        async move { func.render(&context) }.boxed_local()
    }
}

/// Strips surrounding whitespace and a leading dot: `".hbs"` and `"hbs"` are
/// the same engine id.
pub fn normalize_id(id: &str) -> String {
    id.trim().trim_start_matches('.').to_string()
}

/// Derives the engine id for a view.
///
/// Precedence: the view's declared engine, the collection's engine, the
/// extension of the view's path (or name), then `default_engine`.
pub fn resolve_engine(
    view: &View,
    collection_engine: Option<&str>,
    default_engine: Option<&str>,
) -> Option<String> {
    view.declared_engine()
        .or(collection_engine)
        .or_else(|| view.extension())
        .or(default_engine)
        .map(normalize_id)
        .filter(|id| !id.is_empty())
}

/// A registered engine with its normalized options.
#[derive(Clone)]
pub struct EngineEntry {
    engine: Rc<dyn Engine>,
    options: Map,
}

impl EngineEntry {
    pub fn engine(&self) -> Rc<dyn Engine> {
        Rc::clone(&self.engine)
    }

    pub fn options(&self) -> &Map {
        &self.options
    }
}

/// Registry mapping engine ids to adapters.
///
/// Registration happens during setup; afterwards the registry is only read.
#[derive(Default, Clone)]
pub struct Engines {
    entries: HashMap<String, EngineEntry>,
}

impl Engines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` under every id in `ids`.
    ///
    /// The stored options are the adapter's own options overlaid with
    /// `options`, with `name` relocated to `engineName`.
    pub fn register<E>(&mut self, ids: &[&str], engine: E, options: Map)
    where
        E: Engine + 'static,
    {
        let engine: Rc<dyn Engine> = Rc::new(engine);
        let mut merged = engine.options();
        overlay(&mut merged, &options);
        if let Some(name) = merged.remove("name") {
            merged.insert("engineName".into(), name);
        }
        for id in ids {
            let id = normalize_id(id);
            log::debug!("registering engine \"{}\"", id);
            self.entries.insert(
                id,
                EngineEntry {
                    engine: Rc::clone(&engine),
                    options: merged.clone(),
                },
            );
        }
    }

    pub fn get(&self, id: &str) -> Option<&EngineEntry> {
        self.entries.get(&normalize_id(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Formats a JSON value for template output.
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
