//! View and collection lookup.
//!
//! Name-based lookups search collections in registration order. Pattern
//! lookups use [`glob::Pattern`] and return matches in insertion order.

use glob::{MatchOptions, Pattern};

use crate::app::{App, Target};
use crate::collection::{Collection, ViewType};
use crate::error::{Error, Result};
use crate::view::{View, ViewKey};

fn pattern(glob: &str) -> Result<Pattern> {
    Pattern::new(glob).map_err(|source| Error::Pattern {
        pattern: glob.to_string(),
        source,
    })
}

impl App {
    /// Returns the collection registered under `name` or its singular form.
    pub fn get_views(&self, name: &str) -> Result<&Collection> {
        self.collection_index(name)
            .map(|index| &self.collections[index])
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    pub(crate) fn get_views_mut(&mut self, name: &str) -> Result<&mut Collection> {
        match self.collection_index(name) {
            Some(index) => Ok(&mut self.collections[index]),
            None => Err(Error::CollectionNotFound(name.to_string())),
        }
    }

    fn collection_index(&self, name: &str) -> Option<usize> {
        self.collections
            .iter()
            .position(|c| c.name() == name)
            .or_else(|| self.collections.iter().position(|c| c.singular() == name))
    }

    /// Looks up a view by exact name.
    ///
    /// With a collection, only that collection is searched. Without one, every
    /// renderable collection is searched in registration order and the first
    /// hit wins.
    pub fn find(&self, name: &str, collection: Option<&str>) -> Result<Option<&View>> {
        if let Some(collection) = collection {
            return Ok(self.get_views(collection)?.get_view(name));
        }
        Ok(self
            .collections
            .iter()
            .filter(|c| c.is(ViewType::Renderable))
            .find_map(|c| c.get_view(name)))
    }

    /// Like [`find`](Self::find) without a collection, returning the key.
    pub fn find_key(&self, name: &str) -> Option<ViewKey> {
        self.collections
            .iter()
            .filter(|c| c.is(ViewType::Renderable))
            .find(|c| c.contains(name))
            .map(|c| ViewKey::new(c.name(), name))
    }

    /// Looks up a view in one collection.
    ///
    /// Tries `rename(key)` first when given, then `key` itself, then the app's
    /// rename function if one is set.
    pub fn get_view(
        &self,
        collection: &str,
        key: &str,
        rename: Option<&dyn Fn(&str) -> String>,
    ) -> Result<Option<&View>> {
        let views = self.get_views(collection)?;
        if let Some(rename) = rename {
            if let Some(view) = views.get_view(&rename(key)) {
                return Ok(Some(view));
            }
        }
        if let Some(view) = views.get_view(key) {
            return Ok(Some(view));
        }
        Ok(self
            .rename_key
            .as_ref()
            .and_then(|rename| views.get_view(&rename(key))))
    }

    /// Returns the first view in `collection` whose name matches `glob`.
    ///
    /// An exact name match is returned without pattern matching.
    pub fn match_view(
        &self,
        collection: &str,
        glob: &str,
        options: MatchOptions,
    ) -> Result<Option<&View>> {
        let views = self.get_views(collection)?;
        if let Some(view) = views.get_view(glob) {
            return Ok(Some(view));
        }
        let pattern = pattern(glob)?;
        Ok(views
            .iter()
            .find(|view| pattern.matches_with(&view.name, options)))
    }

    /// Returns every view in `collection` whose name matches `glob`.
    pub fn match_views(
        &self,
        collection: &str,
        glob: &str,
        options: MatchOptions,
    ) -> Result<Vec<&View>> {
        let views = self.get_views(collection)?;
        let pattern = pattern(glob)?;
        Ok(views
            .iter()
            .filter(|view| pattern.matches_with(&view.name, options))
            .collect())
    }

    /// Returns the view addressed by `key`.
    pub fn view(&self, key: &ViewKey) -> Result<&View> {
        self.get_views(&key.collection)?
            .get_view(&key.name)
            .ok_or_else(|| Error::ViewNotFound(key.name.clone()))
    }

    pub(crate) fn view_mut(&mut self, key: &ViewKey) -> Result<&mut View> {
        view_in(&mut self.collections, key)
    }

    /// Resolves a pipeline target to a key of an existing view.
    pub(crate) fn resolve_target(&self, target: Target<'_>) -> Result<ViewKey> {
        match target {
            Target::Name(name) => self
                .find_key(name)
                .ok_or_else(|| Error::ViewNotFound(name.to_string())),
            Target::Key(key) => {
                let views = self.get_views(&key.collection)?;
                if !views.contains(&key.name) {
                    return Err(Error::ViewNotFound(key.name.clone()));
                }
                Ok(ViewKey::new(views.name(), key.name.clone()))
            }
        }
    }
}

/// Mutable view lookup on the collection list alone, so callers can hold
/// other `App` fields at the same time.
pub(crate) fn view_in<'a>(
    collections: &'a mut [Collection],
    key: &ViewKey,
) -> Result<&'a mut View> {
    let index = collections
        .iter()
        .position(|c| c.name() == key.collection)
        .or_else(|| collections.iter().position(|c| c.singular() == key.collection))
        .ok_or_else(|| Error::CollectionNotFound(key.collection.clone()))?;
    collections[index]
        .get_view_mut(&key.name)
        .ok_or_else(|| Error::ViewNotFound(key.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionOptions;
    use crate::ErrorKind;

    fn app() -> App {
        let mut app = App::new();
        app.create("pages", CollectionOptions::new());
        app.create("posts", CollectionOptions::new());
        app.create(
            "layouts",
            CollectionOptions::new().view_type(ViewType::Layout),
        );
        app.add_view("pages", View::new("home.tmpl", "page home"))
            .unwrap();
        app.add_view("pages", View::new("about.tmpl", "about"))
            .unwrap();
        app.add_view("posts", View::new("home.tmpl", "post home"))
            .unwrap();
        app.add_view("posts", View::new("hello.md", "hello"))
            .unwrap();
        app.add_view("layouts", View::new("base.tmpl", "{% body %}"))
            .unwrap();
        app
    }

    #[test]
    fn find_returns_first_renderable_match() {
        let app = app();
        let view = app.find("home.tmpl", None).unwrap().unwrap();
        assert_eq!(view.content, "page home");
        assert!(app.find("nope", None).unwrap().is_none());
        // Layout collections are not searched without a collection name.
        assert!(app.find("base.tmpl", None).unwrap().is_none());
    }

    #[test]
    fn find_in_named_collection() {
        let app = app();
        let view = app.find("home.tmpl", Some("post")).unwrap().unwrap();
        assert_eq!(view.content, "post home");
        let err = app.find("home.tmpl", Some("widgets")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn get_views_accepts_singular() {
        let app = app();
        assert_eq!(app.get_views("page").unwrap().name(), "pages");
        assert_eq!(app.get_views("pages").unwrap().len(), 2);
        let err = app.get_views("widget").unwrap_err();
        assert_eq!(err.to_string(), "cannot find collection: widget");
    }

    #[test]
    fn get_view_tries_renames() {
        let mut app = app();
        let strip: &dyn Fn(&str) -> String = &|key: &str| format!("{}.tmpl", key);
        let view = app.get_view("pages", "about", Some(strip)).unwrap();
        assert_eq!(view.unwrap().content, "about");
        assert!(app.get_view("pages", "about", None).unwrap().is_none());

        app.rename_key(|key| format!("{}.tmpl", key));
        let view = app.get_view("pages", "about", None).unwrap();
        assert_eq!(view.unwrap().name, "about.tmpl");
    }

    #[test]
    fn match_view_prefers_exact_then_glob() {
        let app = app();
        let options = MatchOptions::new();
        let view = app.match_view("posts", "*.md", options).unwrap().unwrap();
        assert_eq!(view.name, "hello.md");
        let view = app.match_view("pages", "about.tmpl", options).unwrap();
        assert_eq!(view.unwrap().name, "about.tmpl");
        assert!(app.match_view("pages", "*.md", options).unwrap().is_none());
    }

    #[test]
    fn match_views_keeps_insertion_order() {
        let app = app();
        let names: Vec<&str> = app
            .match_views("pages", "*.tmpl", MatchOptions::new())
            .unwrap()
            .into_iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["home.tmpl", "about.tmpl"]);
    }

    #[test]
    fn bad_pattern_is_invalid_argument() {
        let app = app();
        let err = app
            .match_views("pages", "[", MatchOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn resolve_target_checks_existence() {
        let app = app();
        let key = app.resolve_target(Target::Name("about.tmpl")).unwrap();
        assert_eq!(key, ViewKey::new("pages", "about.tmpl"));
        let err = app.resolve_target(Target::Name("missing")).unwrap_err();
        assert_eq!(err.to_string(), "cannot find view: missing");

        let layout = ViewKey::new("layout", "base.tmpl");
        let key = app.resolve_target(Target::Key(&layout)).unwrap();
        assert_eq!(key.collection, "layouts");
    }
}
