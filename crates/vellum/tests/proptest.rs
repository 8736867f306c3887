//! Property-based tests for layout application and lookup using proptest.

use proptest::prelude::*;
use vellum::{App, CollectionOptions, View, ViewKey, ViewType};

// ============================================================================
// Test helpers
// ============================================================================

fn app_with_layout(layout: &str) -> App {
    let mut app = App::new();
    app.create("pages", CollectionOptions::new());
    app.create(
        "layouts",
        CollectionOptions::new().view_type(ViewType::Layout),
    );
    app.add_view("layouts", View::new("l", layout)).unwrap();
    app
}

// Text that cannot form a body marker.
fn plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 <>/.!?\n]{0,40}"
}

// View content, including characters with meaning in regex replacements.
fn body_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ${}%\\\\\n]{0,40}"
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// A view without a layout is left exactly as it was.
    #[test]
    fn no_layout_is_identity(content in body_text()) {
        let mut app = app_with_layout("[{% body %}]");
        let key = app.add_view("pages", View::new("v", content.clone())).unwrap();

        let view = app.apply_layout(&key).unwrap();
        prop_assert_eq!(&view.content, &content);
        prop_assert!(view.layout_stack.is_empty());
    }

    /// Wrapping replaces the marker with the content verbatim and keeps the
    /// surrounding layout text byte-for-byte.
    #[test]
    fn marker_is_replaced_verbatim(
        before in plain_text(),
        after in plain_text(),
        content in body_text(),
        inner in "[ \t]{0,3}",
    ) {
        let layout = format!("{}{{%{}body{}%}}{}", before, inner, inner, after);
        let mut app = app_with_layout(&layout);
        let key = app
            .add_view("pages", View::new("v", content.clone()).with_layout("l"))
            .unwrap();

        let view = app.apply_layout(&key).unwrap();
        prop_assert_eq!(view.content.clone(), format!("{}{}{}", before, content, after));
        prop_assert!(view.layout_applied());
    }

    /// Lookup without a collection returns the view from the first renderable
    /// collection that has it.
    #[test]
    fn find_prefers_registration_order(
        present in prop::collection::vec(any::<bool>(), 1..6),
    ) {
        let mut app = App::new();
        for (i, has_view) in present.iter().enumerate() {
            let name = format!("c{}s", i);
            app.create(&name, CollectionOptions::new());
            if *has_view {
                app.add_view(&name, View::new("v", name.clone())).unwrap();
            }
        }

        let found = app.find("v", None).unwrap();
        match present.iter().position(|has_view| *has_view) {
            Some(i) => {
                let view = found.unwrap();
                prop_assert_eq!(view.content.clone(), format!("c{}s", i));
                prop_assert_eq!(app.find_key("v"), Some(ViewKey::new(format!("c{}s", i), "v")));
            }
            None => prop_assert!(found.is_none()),
        }
    }
}
