//! Views: named template documents and their compile/render state.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::context::Map;
use crate::engine::RenderFn;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`View`], stable for the view's lifetime.
///
/// Used by the middleware dispatcher to remember which one-shot stages have
/// already run for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Address of a view inside an [`App`](crate::App): its collection's plural
/// name plus the view name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub collection: String,
    pub name: String,
}

impl ViewKey {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)
    }
}

/// A single template document.
///
/// `content` is rewritten in place: first by layout application during
/// compile, then by the rendered output. `orig` keeps the content the view
/// was created with so [`reset`](Self::reset) can start over.
pub struct View {
    id: ViewId,
    /// Unique key within the owning collection.
    pub name: String,
    /// Source path, used for engine resolution when set.
    pub path: Option<String>,
    pub content: String,
    orig: String,
    /// Default data, lowest view-level precedence.
    pub locals: Map,
    /// Front-matter data, merged above `locals`.
    pub data: Map,
    /// Name of the layout to wrap this view with.
    pub layout: Option<String>,
    /// Explicit engine id, overriding the extension.
    pub engine: Option<String>,
    /// Compiled render functions keyed by engine id.
    pub engine_stack: HashMap<String, RenderFn>,
    /// Render function from the most recent compile.
    pub func: Option<RenderFn>,
    /// Context captured by the first compile, or set by render.
    pub cached_context: Option<Map>,
    /// Locals of each successful render, oldest first.
    pub locals_stack: Vec<Map>,
    /// Layouts applied to `content`, innermost first.
    pub layout_stack: Vec<String>,
    pub(crate) layout_applied: bool,
    /// Engine ids whose cached function binds async helpers.
    pub(crate) async_compiled: HashSet<String>,
}

impl View {
    /// Creates a view with the given name and content.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: ViewId::next(),
            name: name.into(),
            path: None,
            orig: content.clone(),
            content,
            locals: Map::new(),
            data: Map::new(),
            layout: None,
            engine: None,
            engine_stack: HashMap::new(),
            func: None,
            cached_context: None,
            locals_stack: Vec::new(),
            layout_stack: Vec::new(),
            layout_applied: false,
            async_compiled: HashSet::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_locals(mut self, locals: Map) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_data(mut self, data: Map) -> Self {
        self.data = data;
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Content as the view was created.
    pub fn orig(&self) -> &str {
        &self.orig
    }

    /// Whether layouts have already been applied to `content`.
    pub fn layout_applied(&self) -> bool {
        self.layout_applied
    }

    /// The path if set, otherwise the name.
    pub fn source_name(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }

    /// Final path component of [`source_name`](Self::source_name).
    pub fn basename(&self) -> &str {
        let source = self.source_name();
        Path::new(source)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(source)
    }

    /// Extension of [`source_name`](Self::source_name), without the dot.
    pub fn extension(&self) -> Option<&str> {
        Path::new(self.source_name())
            .extension()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
    }

    /// The declared layout: `layout`, then `data.layout`.
    ///
    /// See [`opts_out_of_layout`](Self::opts_out_of_layout) for the values
    /// that mean "no layout".
    pub fn declared_layout(&self) -> Option<&str> {
        if let Some(layout) = self.layout.as_deref() {
            return Some(layout).filter(|l| !l.is_empty());
        }
        match self.data.get("layout") {
            Some(Value::String(layout)) if !layout.is_empty() => Some(layout),
            _ => None,
        }
    }

    /// Whether the view explicitly refuses a layout, the default one included.
    ///
    /// True for an empty `layout`, or when `layout` is unset and
    /// `data.layout` is `false` or an empty string.
    pub fn opts_out_of_layout(&self) -> bool {
        if let Some(layout) = self.layout.as_deref() {
            return layout.is_empty();
        }
        match self.data.get("layout") {
            Some(Value::Bool(false)) => true,
            Some(Value::String(layout)) => layout.is_empty(),
            _ => false,
        }
    }

    /// The declared engine: `engine`, then `data.engine`.
    pub fn declared_engine(&self) -> Option<&str> {
        if let Some(engine) = self.engine.as_deref() {
            return Some(engine);
        }
        self.data.get("engine").and_then(Value::as_str)
    }

    /// Restores the original content and drops every compile/render cache.
    pub fn reset(&mut self) {
        self.content = self.orig.clone();
        self.engine_stack.clear();
        self.func = None;
        self.cached_context = None;
        self.layout_stack.clear();
        self.layout_applied = false;
        self.async_compiled.clear();
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("engine", &self.engine)
            .field("compiled", &self.engine_stack.keys().collect::<Vec<_>>())
            .field("renders", &self.locals_stack.len())
            .finish()
    }
}
