//! Layout application.
//!
//! A layout is a view in a layout-tagged collection whose content holds a
//! body marker (`{% body %}` by default). Applying a layout replaces the first
//! marker with the view's content. Layouts may declare layouts of their own;
//! the chain is followed outward until a layout declares none.
//!
//! The whole chain is resolved and every substitution performed before the
//! view is touched, so a failing layout leaves the view unchanged.

use regex::Regex;

use crate::app::App;
use crate::collection::ViewType;
use crate::error::{Error, Result};
use crate::lookup::view_in;
use crate::middleware::Stage;
use crate::view::ViewKey;

/// One resolved layout in a chain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Frame {
    pub name: String,
    pub content: String,
}

/// Replaces the first body marker in `layout` with `body`.
///
/// The body is inserted verbatim; `$` sequences are not expanded.
pub(crate) fn wrap(body: &str, layout: &str, marker: &Regex) -> Option<String> {
    let found = marker.find(layout)?;
    let mut out = String::with_capacity(layout.len() + body.len());
    out.push_str(&layout[..found.start()]);
    out.push_str(body);
    out.push_str(&layout[found.end()..]);
    Some(out)
}

impl App {
    /// Name of the first layout to apply to the view at `key`, if any.
    fn layout_name(&self, key: &ViewKey) -> Result<Option<String>> {
        let view = self.view(key)?;
        if let Some(layout) = view.declared_layout() {
            return Ok(Some(layout.to_string()));
        }
        if view.opts_out_of_layout() || self.get_views(&key.collection)?.is(ViewType::Layout) {
            return Ok(None);
        }
        Ok(self.options.layout.clone().filter(|l| !l.is_empty()))
    }

    /// Resolves the layout chain starting at `first`, innermost first.
    pub(crate) fn layout_chain(&self, first: &str) -> Result<Vec<Frame>> {
        let layouts: Vec<&str> = self
            .collections
            .iter()
            .filter(|c| c.is(ViewType::Layout))
            .map(|c| c.name())
            .collect();
        if layouts.is_empty() {
            return Err(Error::NoLayouts);
        }

        let mut chain: Vec<Frame> = Vec::new();
        let mut next = Some(first.to_string());
        while let Some(name) = next.take() {
            if chain.iter().any(|frame| frame.name == name) {
                let mut names: Vec<String> = chain.into_iter().map(|f| f.name).collect();
                names.push(name);
                return Err(Error::LayoutCycle(names));
            }
            let mut found = None;
            for collection in &layouts {
                if let Some(view) = self.get_view(collection, &name, None)? {
                    found = Some(view);
                    break;
                }
            }
            let layout = found.ok_or_else(|| Error::LayoutNotFound(name.clone()))?;
            next = layout.declared_layout().map(str::to_string);
            // A layout wrapped or rendered on its own must not carry its
            // parents into this chain twice.
            chain.push(Frame {
                name,
                content: layout.orig().to_string(),
            });
        }
        Ok(chain)
    }

    /// Wraps the content at `key` in its layout chain.
    ///
    /// Returns the wrapped content and the chain's layout names, or `None`
    /// when nothing applies.
    fn wrap_layouts(&self, key: &ViewKey) -> Result<Option<(String, Vec<String>)>> {
        let view = self.view(key)?;
        if view.layout_applied() {
            return Ok(None);
        }
        let Some(first) = self.layout_name(key)? else {
            return Ok(None);
        };
        let chain = self.layout_chain(&first)?;
        let marker = self.options.body_marker()?;

        let mut content = view.content.clone();
        for frame in &chain {
            content = wrap(&content, &frame.content, &marker).ok_or_else(|| {
                Error::MissingBodyTag {
                    tag: self.options.layout_tag.clone(),
                    layout: frame.name.clone(),
                }
            })?;
        }
        let names = chain.into_iter().map(|frame| frame.name).collect();
        Ok(Some((content, names)))
    }

    fn store_layouts(
        &mut self,
        key: &ViewKey,
        wrapped: Option<(String, Vec<String>)>,
    ) -> Result<()> {
        let view = self.view_mut(key)?;
        if let Some((content, names)) = wrapped {
            log::debug!("applied layouts {:?} to {}", names, view.name);
            view.content = content;
            view.layout_stack.extend(names);
            view.layout_applied = true;
        }
        Ok(())
    }

    pub(crate) fn apply_layout_key(&mut self, key: &ViewKey) -> Result<()> {
        if self.view(key)?.layout_applied() {
            return Ok(());
        }
        let view = view_in(&mut self.collections, key)?;
        self.middleware.handle_once(Stage::PreLayout, view)?;

        let wrapped = self.wrap_layouts(key)?;
        self.store_layouts(key, wrapped)?;

        let view = view_in(&mut self.collections, key)?;
        self.middleware.handle_once(Stage::PostLayout, view)
    }

    pub(crate) async fn apply_layout_key_async(&mut self, key: &ViewKey) -> Result<()> {
        if self.view(key)?.layout_applied() {
            return Ok(());
        }
        let view = view_in(&mut self.collections, key)?;
        self.middleware
            .handle_once_async(Stage::PreLayout, view)
            .await?;

        let wrapped = self.wrap_layouts(key)?;
        self.store_layouts(key, wrapped)?;

        let view = view_in(&mut self.collections, key)?;
        self.middleware
            .handle_once_async(Stage::PostLayout, view)
            .await
    }

    /// Applies the view's layout chain, running the layout middleware.
    ///
    /// A view without a layout is left unchanged. Layouts are applied at most
    /// once per view until [`View::reset`](crate::View::reset).
    pub fn apply_layout(&mut self, key: &ViewKey) -> Result<&crate::View> {
        let key = self.resolve_target(key.into())?;
        self.apply_layout_key(&key)?;
        self.view(&key)
    }

    /// Async variant of [`apply_layout`](Self::apply_layout).
    pub async fn apply_layout_async(&mut self, key: &ViewKey) -> Result<&crate::View> {
        let key = self.resolve_target(key.into())?;
        self.apply_layout_key_async(&key).await?;
        self.view(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionOptions;
    use crate::{ErrorKind, Options, View};

    fn marker() -> Regex {
        Options::default().body_marker().unwrap()
    }

    fn app_with_layouts(layouts: &[(&str, &str, Option<&str>)]) -> App {
        let mut app = App::new();
        app.create("pages", CollectionOptions::new());
        app.create(
            "layouts",
            CollectionOptions::new().view_type(ViewType::Layout),
        );
        for (name, content, parent) in layouts {
            let mut view = View::new(*name, *content);
            view.layout = parent.map(str::to_string);
            app.add_view("layouts", view).unwrap();
        }
        app
    }

    #[test]
    fn wrap_replaces_first_marker_only() {
        let out = wrap("X", "a {% body %} b {%body%}", &marker()).unwrap();
        assert_eq!(out, "a X b {%body%}");
    }

    #[test]
    fn wrap_inserts_body_verbatim() {
        let out = wrap("$0 ${1}", "[{% body %}]", &marker()).unwrap();
        assert_eq!(out, "[$0 ${1}]");
    }

    #[test]
    fn wrap_without_marker() {
        assert!(wrap("X", "who? me?", &marker()).is_none());
    }

    #[test]
    fn chain_is_followed_outward() {
        let mut app = app_with_layouts(&[
            ("inner", "<i>{% body %}</i>", Some("outer")),
            ("outer", "<o>{% body %}</o>", None),
        ]);
        let key = app
            .add_view("pages", View::new("a", "A").with_layout("inner"))
            .unwrap();
        let view = app.apply_layout(&key).unwrap();
        assert_eq!(view.content, "<o><i>A</i></o>");
        assert_eq!(view.layout_stack, vec!["inner", "outer"]);
        assert!(view.layout_applied());
    }

    #[test]
    fn layouts_apply_once() {
        let mut app = app_with_layouts(&[("base", "[{% body %}]", None)]);
        let key = app
            .add_view("pages", View::new("a", "A").with_layout("base"))
            .unwrap();
        app.apply_layout(&key).unwrap();
        let view = app.apply_layout(&key).unwrap();
        assert_eq!(view.content, "[A]");
    }

    #[test]
    fn cycle_is_structural_error() {
        let mut app = app_with_layouts(&[
            ("a", "{% body %}", Some("b")),
            ("b", "{% body %}", Some("a")),
        ]);
        let key = app
            .add_view("pages", View::new("p", "P").with_layout("a"))
            .unwrap();
        let err = app.apply_layout(&key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.to_string(), "layout cycle detected: a -> b -> a");
        assert_eq!(app.view(&key).unwrap().content, "P");
    }

    #[test]
    fn missing_layout_and_missing_collection() {
        let mut app = app_with_layouts(&[]);
        let key = app
            .add_view("pages", View::new("p", "P").with_layout("nope"))
            .unwrap();
        let err = app.apply_layout(&key).unwrap_err();
        assert_eq!(err.to_string(), "cannot find layout: nope");

        let mut bare = App::new();
        bare.create("pages", CollectionOptions::new());
        let key = bare
            .add_view("pages", View::new("p", "P").with_layout("nope"))
            .unwrap();
        let err = bare.apply_layout(&key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "no layouts are registered.");
    }

    #[test]
    fn default_layout_skips_layout_collections() {
        let mut app = app_with_layouts(&[("base", "[{% body %}]", None)]);
        app.options_mut().layout = Some("base".into());
        let page = app.add_view("pages", View::new("a", "A")).unwrap();
        assert_eq!(app.apply_layout(&page).unwrap().content, "[A]");

        let base = ViewKey::new("layouts", "base");
        assert_eq!(app.apply_layout(&base).unwrap().content, "[{% body %}]");
    }

    #[test]
    fn explicit_opt_out_skips_default_layout() {
        let mut app = app_with_layouts(&[("base", "[{% body %}]", None)]);
        app.options_mut().layout = Some("base".into());
        let mut data = crate::Map::new();
        data.insert("layout".into(), false.into());
        let bare = app
            .add_view("pages", View::new("a", "A").with_data(data))
            .unwrap();
        let empty = app
            .add_view("pages", View::new("b", "B").with_layout(""))
            .unwrap();
        assert_eq!(app.apply_layout(&bare).unwrap().content, "A");
        assert_eq!(app.apply_layout(&empty).unwrap().content, "B");
        assert!(app.view(&empty).unwrap().layout_stack.is_empty());
    }

    #[test]
    fn chain_uses_original_layout_content() {
        let mut app = app_with_layouts(&[
            ("inner", "<i>{% body %}</i>", Some("outer")),
            ("outer", "<o>{% body %}</o>", None),
        ]);
        let inner = ViewKey::new("layouts", "inner");
        let wrapped = app.apply_layout(&inner).unwrap();
        assert_eq!(wrapped.content, "<o><i>{% body %}</i></o>");

        let key = app
            .add_view("pages", View::new("a", "A").with_layout("inner"))
            .unwrap();
        assert_eq!(app.apply_layout(&key).unwrap().content, "<o><i>A</i></o>");
    }

    #[test]
    fn layout_from_data_and_rename_fallback() {
        let mut app = app_with_layouts(&[("base.tmpl", "[{% body %}]", None)]);
        app.rename_key(|key| format!("{}.tmpl", key));
        let mut data = crate::Map::new();
        data.insert("layout".into(), "base".into());
        let key = app
            .add_view("pages", View::new("a", "A").with_data(data))
            .unwrap();
        assert_eq!(app.apply_layout(&key).unwrap().content, "[A]");
    }
}
