//! # Vellum - View Collections and a Layout-Aware Render Pipeline
//!
//! `vellum` organizes template documents ("views") into named collections,
//! picks a template engine for each view, wraps views in layouts and runs a
//! compile/render pipeline with middleware at fixed stages.
//!
//! Template syntax is left to engines. Two ship with the crate:
//! [`BaseEngine`] (`<%= name %>` substitution) and [`MiniJinjaEngine`].
//!
//! ## Core Concepts
//!
//! - [`View`]: a named template document with locals, data and caches
//! - [`Collection`]: an ordered set of views tagged with [`ViewTypes`]
//! - [`Engine`]: adapter for an external template language
//! - [`Middleware`]: handlers run at each [`Stage`] of the pipeline
//! - [`Helpers`]: sync and async functions bound into every compile
//! - [`App`]: owns everything and runs [`compile`](App::compile) and
//!   [`render`](App::render)
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use vellum::{App, BaseEngine, CollectionOptions, CompileOptions, Template, View};
//!
//! let mut app = App::new();
//! app.engine(&["tmpl"], BaseEngine::new());
//! app.create("pages", CollectionOptions::new());
//! app.add_view("pages", View::new("home.tmpl", "<%= name %>")).unwrap();
//!
//! let view = app.compile("home.tmpl", CompileOptions::new()).unwrap();
//! let ctx = json!({"name": "Halle"}).as_object().cloned().unwrap();
//! let out = view.func.as_ref().unwrap().render(&ctx).unwrap();
//! assert_eq!(out, "Halle");
//! ```
//!
//! ## Layouts
//!
//! A view declaring `layout` is wrapped by the named view from a
//! layout-tagged collection. The layout's body marker (`{% body %}` by
//! default, see [`Options`]) is replaced with the view's content, and layouts
//! can chain:
//!
//! ```text
//! page:    "Hello"                 layout = "inner"
//! inner:   "<i>{% body %}</i>"     layout = "outer"
//! outer:   "<o>{% body %}</o>"
//! result:  "<o><i>Hello</i></o>"
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. [`Error::kind`] groups
//! failures into [`ErrorKind`]s, so "no layout collection exists" can be told
//! apart from "this layout does not exist".

mod app;
mod collection;
pub mod context;
pub mod engine;
mod error;
mod helpers;
mod layout;
mod lookup;
pub mod middleware;
mod options;
mod view;

pub use app::{App, CompileOptions, ErrorObserver, RenameFn, RethrowFn, Target};
pub use collection::{inflect, Collection, CollectionOptions, ViewType, ViewTypes};
pub use context::Map;
pub use engine::{
    resolve_engine, BaseEngine, Engine, EngineEntry, Engines, MiniJinjaEngine, RenderFn,
    Template,
};
pub use error::{EngineError, Error, ErrorKind, HookError, Result};
pub use helpers::{AsyncHelperFn, BoundHelpers, HelperFn, Helpers};
pub use middleware::{Middleware, Stage};
pub use options::Options;
pub use view::{View, ViewId, ViewKey};

// Options for `App::match_view` and `App::match_views`.
pub use glob::MatchOptions;
