//! Context construction for compile and render.
//!
//! Every object handed to an engine is built by overlaying maps in a fixed
//! order. Overlays are shallow: a key present in a later layer replaces the
//! earlier value wholesale, nested objects included.
//!
//! # Render Context
//!
//! ```text
//! application data  <- view.locals <- view.data <- call-site locals
//! ```
//!
//! # Compile Options
//!
//! ```text
//! {settings: {}} <- locals <- engine options <- render context <- partials
//! ```
//!
//! where engine options are `locals.settings <- adapter options`.

use serde_json::Value;

use crate::view::View;

/// JSON object used for locals, data, options and contexts.
pub type Map = serde_json::Map<String, Value>;

/// Overlays `layer` onto `base`, replacing values key-for-key.
pub fn overlay(base: &mut Map, layer: &Map) {
    for (key, value) in layer {
        base.insert(key.clone(), value.clone());
    }
}

/// Merges `layers` left to right into a new map.
pub fn merge<'a, I>(layers: I) -> Map
where
    I: IntoIterator<Item = &'a Map>,
{
    let mut merged = Map::new();
    for layer in layers {
        overlay(&mut merged, layer);
    }
    merged
}

/// Builds the context passed to an engine for one render.
pub fn render_context(app_data: &Map, view: &View, locals: &Map) -> Map {
    merge([app_data, &view.locals, &view.data, locals])
}

/// Returns `locals` with an empty `settings` object underneath it.
pub(crate) fn with_settings(locals: &Map) -> Map {
    let mut base = Map::new();
    base.insert("settings".into(), Value::Object(Map::new()));
    overlay(&mut base, locals);
    base
}

/// Returns the `settings` object of `locals`, or an empty map.
pub(crate) fn settings_of(locals: &Map) -> Map {
    match locals.get("settings") {
        Some(Value::Object(settings)) => settings.clone(),
        _ => Map::new(),
    }
}

/// Builds the option object passed to `Engine::compile`.
pub(crate) fn compile_options(
    locals: &Map,
    engine_options: &Map,
    context: &Map,
    partials: &Map,
) -> Map {
    let base = with_settings(&Map::new());
    merge([&base, locals, engine_options, context, partials])
}
