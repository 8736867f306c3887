//! Collections: insertion-ordered sets of views sharing a role.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::view::View;

/// Role a collection plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewType {
    /// Views can be looked up by name alone during rendering.
    Renderable,
    /// Views wrap other views at a body marker.
    Layout,
    /// Views are exposed to engines as `partials`.
    Partial,
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewType::Renderable => write!(f, "renderable"),
            ViewType::Layout => write!(f, "layout"),
            ViewType::Partial => write!(f, "partial"),
        }
    }
}

/// Set of [`ViewType`] tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewTypes {
    renderable: bool,
    layout: bool,
    partial: bool,
}

impl ViewTypes {
    /// An empty tag set.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn renderable() -> Self {
        Self::none().with(ViewType::Renderable)
    }

    pub fn layout() -> Self {
        Self::none().with(ViewType::Layout)
    }

    pub fn partial() -> Self {
        Self::none().with(ViewType::Partial)
    }

    /// Adds a tag.
    pub fn with(mut self, ty: ViewType) -> Self {
        match ty {
            ViewType::Renderable => self.renderable = true,
            ViewType::Layout => self.layout = true,
            ViewType::Partial => self.partial = true,
        }
        self
    }

    pub fn contains(&self, ty: ViewType) -> bool {
        match ty {
            ViewType::Renderable => self.renderable,
            ViewType::Layout => self.layout,
            ViewType::Partial => self.partial,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.renderable || self.layout || self.partial)
    }

    /// Tags in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ViewType> + '_ {
        [ViewType::Renderable, ViewType::Layout, ViewType::Partial]
            .into_iter()
            .filter(move |ty| self.contains(*ty))
    }
}

impl From<ViewType> for ViewTypes {
    fn from(ty: ViewType) -> Self {
        ViewTypes::none().with(ty)
    }
}

/// Options for creating a collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Role tags; an empty set means renderable.
    pub view_types: ViewTypes,
    /// Engine id for views that declare none.
    pub engine: Option<String>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_type(mut self, ty: ViewType) -> Self {
        self.view_types = self.view_types.with(ty);
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }
}

/// Returns `(plural, singular)` for a collection name.
///
/// `page` and `pages` both yield `("pages", "page")`.
pub fn inflect(name: &str) -> (String, String) {
    match name.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => (name.to_string(), singular.to_string()),
        _ => (format!("{}s", name), name.to_string()),
    }
}

/// A named, insertion-ordered mapping from view name to [`View`].
///
/// The collection owns its views exclusively. Names are unique and lookups
/// are exact and case-sensitive.
pub struct Collection {
    name: String,
    singular: String,
    view_types: ViewTypes,
    engine: Option<String>,
    views: HashMap<String, View>,
    order: Vec<String>,
}

impl Collection {
    /// Creates an empty collection. `name` may be singular or plural.
    pub fn new(name: &str, options: CollectionOptions) -> Self {
        let (plural, singular) = inflect(name);
        let view_types = if options.view_types.is_empty() {
            ViewTypes::renderable()
        } else {
            options.view_types
        };
        Self {
            name: plural,
            singular,
            view_types,
            engine: options.engine,
            views: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Plural name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn singular(&self) -> &str {
        &self.singular
    }

    pub fn view_types(&self) -> ViewTypes {
        self.view_types
    }

    pub fn is(&self, ty: ViewType) -> bool {
        self.view_types.contains(ty)
    }

    /// Collection-level engine id.
    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    /// Adds a view, replacing any view with the same name in place.
    pub fn add_view(&mut self, view: View) -> &mut View {
        match self.views.entry(view.name.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(view);
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(view)
            }
        }
    }

    pub fn get_view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    pub fn get_view_mut(&mut self, name: &str) -> Option<&mut View> {
        self.views.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    /// Removes and returns a view.
    pub fn remove_view(&mut self, name: &str) -> Option<View> {
        let view = self.views.remove(name)?;
        self.order.retain(|n| n != name);
        Some(view)
    }

    /// View names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Views in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &View> {
        self.order.iter().filter_map(|name| self.views.get(name))
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("view_types", &self.view_types)
            .field("views", &self.order)
            .finish()
    }
}
