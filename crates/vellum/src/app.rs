//! The application: collections, engines, middleware and the pipeline.
//!
//! [`App`] owns every collection and view. Pipeline operations take a
//! [`Target`] (a view name or a [`ViewKey`]) and return the same view after
//! mutating it in place.
//!
//! # Compile
//!
//! ```text
//! PRE-COMPILE → engine resolution → layout → context → engine.compile → POST-COMPILE
//! ```
//!
//! The compiled function is cached on the view per engine id, so compiling
//! again reuses it.
//!
//! # Render
//!
//! ```text
//! lookup → PRE-RENDER → engine resolution → compile_async → engine.render → POST-RENDER
//! ```
//!
//! Failures after lookup are reported to the observers registered with
//! [`App::on_error`] and returned.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use vellum::{App, BaseEngine, CollectionOptions, View, ViewType};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> vellum::Result<()> {
//! let mut app = App::new();
//! app.engine(&["tmpl"], BaseEngine::new());
//! app.create("pages", CollectionOptions::new());
//! app.create("layouts", CollectionOptions::new().view_type(ViewType::Layout));
//! app.add_view("layouts", View::new("base.tmpl", "<main>{% body %}</main>"))?;
//! app.add_view("pages", View::new("home.tmpl", "Hi <%= name %>").with_layout("base.tmpl"))?;
//!
//! let locals = json!({"name": "Halle"}).as_object().cloned().unwrap();
//! let view = app.render("home.tmpl", locals).await?;
//! assert_eq!(view.content, "<main>Hi Halle</main>");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use crate::collection::{Collection, CollectionOptions, ViewType};
use crate::context::{compile_options, overlay, render_context, settings_of, with_settings, Map};
use crate::engine::{resolve_engine, Engine, EngineEntry, Engines, RenderFn};
use crate::error::{EngineError, Error, HookError, Result};
use crate::helpers::Helpers;
use crate::lookup::view_in;
use crate::middleware::{Middleware, Stage};
use crate::options::Options;
use crate::view::{View, ViewKey};

/// Maps a lookup key to an alternative view name.
pub type RenameFn = Rc<dyn Fn(&str) -> String>;

/// Turns an engine render failure into the error reported to observers.
pub type RethrowFn = Rc<dyn Fn(&EngineError, &View, &Map) -> Option<Error>>;

/// Receives every error reported by the pipeline.
pub type ErrorObserver = Rc<dyn Fn(&Error)>;

/// Addresses the view a pipeline operation works on.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A view name, looked up across renderable collections.
    Name(&'a str),
    /// An exact collection and view name.
    Key(&'a ViewKey),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(name: &'a str) -> Self {
        Target::Name(name)
    }
}

impl<'a> From<&'a String> for Target<'a> {
    fn from(name: &'a String) -> Self {
        Target::Name(name)
    }
}

impl<'a> From<&'a ViewKey> for Target<'a> {
    fn from(key: &'a ViewKey) -> Self {
        Target::Key(key)
    }
}

/// Arguments to [`App::compile`] and [`App::compile_async`].
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Locals merged into the compile context.
    pub locals: Map,
    /// Exposed to the compile context as `async`.
    pub is_async: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locals(mut self, locals: Map) -> Self {
        self.locals = locals;
        self
    }

    pub fn is_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }
}

/// A view-management and rendering application.
pub struct App {
    pub(crate) options: Options,
    pub(crate) collections: Vec<Collection>,
    pub(crate) engines: Engines,
    pub(crate) middleware: Middleware,
    pub(crate) data: Map,
    pub(crate) rename_key: Option<RenameFn>,
    helpers: Helpers,
    rethrow: Option<RethrowFn>,
    observers: Vec<ErrorObserver>,
}

impl Default for App {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            collections: Vec::new(),
            engines: Engines::new(),
            middleware: Middleware::new(),
            data: Map::new(),
            rename_key: None,
            helpers: Helpers::new(),
            rethrow: None,
            observers: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    // =========================================================================
    // Collections and views
    // =========================================================================

    /// Creates a collection, replacing any collection of the same name.
    ///
    /// A replaced collection keeps its registration position. Its views are
    /// dropped along with their one-shot middleware markers.
    pub fn create(&mut self, name: &str, options: CollectionOptions) -> &mut Collection {
        let collection = Collection::new(name, options);
        log::debug!(
            "creating collection \"{}\" ({:?})",
            collection.name(),
            collection.view_types()
        );
        let index = match self
            .collections
            .iter()
            .position(|c| c.name() == collection.name())
        {
            Some(index) => {
                let replaced = std::mem::replace(&mut self.collections[index], collection);
                for view in replaced.iter() {
                    self.middleware.forget(view.id());
                }
                index
            }
            None => {
                self.collections.push(collection);
                self.collections.len() - 1
            }
        };
        &mut self.collections[index]
    }

    /// Collections in registration order.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }

    /// Adds `view` to `collection` and returns its key.
    pub fn add_view(&mut self, collection: &str, view: View) -> Result<ViewKey> {
        let views = self.get_views_mut(collection)?;
        let key = ViewKey::new(views.name(), view.name.clone());
        views.add_view(view);
        Ok(key)
    }

    /// Removes the view at `key`.
    pub fn remove_view(&mut self, key: &ViewKey) -> Result<Option<View>> {
        let removed = self.get_views_mut(&key.collection)?.remove_view(&key.name);
        if let Some(view) = &removed {
            self.middleware.forget(view.id());
        }
        Ok(removed)
    }

    /// Resets the view at `key` so the next compile starts from its original
    /// content, one-shot middleware included.
    pub fn reset(&mut self, key: &ViewKey) -> Result<&View> {
        let view = view_in(&mut self.collections, key)?;
        view.reset();
        self.middleware.forget(view.id());
        self.view(key)
    }

    // =========================================================================
    // Engines
    // =========================================================================

    /// Registers `engine` under every id in `ids`.
    pub fn engine<E>(&mut self, ids: &[&str], engine: E) -> &mut Self
    where
        E: Engine + 'static,
    {
        self.engines.register(ids, engine, Map::new());
        self
    }

    /// Registers `engine` with extra options.
    pub fn engine_with_options<E>(&mut self, ids: &[&str], engine: E, options: Map) -> &mut Self
    where
        E: Engine + 'static,
    {
        self.engines.register(ids, engine, options);
        self
    }

    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    pub fn get_engine(&self, id: &str) -> Option<&EngineEntry> {
        self.engines.get(id)
    }

    fn engine_for(&self, key: &ViewKey, method: &'static str) -> Result<(String, EngineEntry)> {
        let view = self.view(key)?;
        let collection = self.get_views(&key.collection)?;
        let id = resolve_engine(
            view,
            collection.engine(),
            self.options.default_engine.as_deref(),
        )
        .ok_or_else(|| Error::EngineNotFound {
            method,
            target: view.basename().to_string(),
        })?;
        let entry = self
            .engines
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::EngineNotFound {
                method,
                target: id.clone(),
            })?;
        Ok((id, entry))
    }

    // =========================================================================
    // Context
    // =========================================================================

    /// Overlays `data` onto the application data.
    pub fn data(&mut self, data: Map) -> &mut Self {
        overlay(&mut self.data, &data);
        self
    }

    /// Application data, the lowest layer of every render context.
    pub fn context(&self) -> &Map {
        &self.data
    }

    /// `{"partials": {name: content}}` over every partial collection.
    ///
    /// Later collections win on name clashes.
    pub fn merge_partials(&self) -> Map {
        let mut partials = Map::new();
        for collection in self.collections.iter().filter(|c| c.is(ViewType::Partial)) {
            for view in collection.iter() {
                partials.insert(view.name.clone(), Value::String(view.content.clone()));
            }
        }
        let mut merged = Map::new();
        merged.insert("partials".into(), Value::Object(partials));
        merged
    }

    fn cached_context(&mut self, key: &ViewKey, locals: &Map) -> Result<Map> {
        let view = self.view(key)?;
        if let Some(context) = &view.cached_context {
            return Ok(context.clone());
        }
        let context = render_context(&self.data, view, locals);
        self.view_mut(key)?.cached_context = Some(context.clone());
        Ok(context)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Registers a helper that templates can call.
    ///
    /// Helpers reach engines through [`Engine::compile_with_helpers`].
    pub fn helper<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, EngineError> + Send + Sync + 'static,
    {
        self.helpers.insert(name, f);
        self
    }

    /// Registers an async helper.
    ///
    /// Calls made during [`App::render`] are awaited once the engine has
    /// rendered, and their results replace the call sites. In a sync
    /// [`App::compile`] the helper is bound as a function that fails.
    pub fn async_helper<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> LocalBoxFuture<'static, std::result::Result<Value, EngineError>>
            + 'static,
    {
        self.helpers.insert_async(name, f);
        self
    }

    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Sets the fallback used by lookups when a key is not found as given.
    pub fn rename_key<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.rename_key = Some(Rc::new(f));
        self
    }

    /// Sets the transform applied to engine render failures before they are
    /// reported. Returning `None` reports the original error.
    pub fn rethrow_with<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&EngineError, &View, &Map) -> Option<Error> + 'static,
    {
        self.rethrow = Some(Rc::new(f));
        self
    }

    /// Adds an observer for pipeline errors.
    pub fn on_error<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Error) + 'static,
    {
        self.observers.push(Rc::new(f));
        self
    }

    pub(crate) fn emit(&self, err: &Error) {
        if self.observers.is_empty() {
            log::warn!("unobserved pipeline error: {}", err);
            return;
        }
        for observer in &self.observers {
            observer(err);
        }
    }

    fn rethrown(&self, err: &EngineError, view: &View, context: &Map) -> Option<Error> {
        if let Some(rethrow) = &self.rethrow {
            return rethrow(err, view, context);
        }
        if !self.options.rethrow {
            return None;
        }
        Some(Error::Engine(EngineError::new(
            err.engine.clone(),
            format!("{} (in {})", err.message, view.source_name()),
        )))
    }

    // =========================================================================
    // Middleware
    // =========================================================================

    pub fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut Middleware {
        &mut self.middleware
    }

    /// Adds a synchronous handler for `stage`.
    pub fn use_middleware<F>(&mut self, stage: Stage, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.middleware.on(stage, f);
        self
    }

    /// Adds an asynchronous handler for `stage`.
    ///
    /// Async handlers on compile or layout stages make [`App::compile`] fail;
    /// use [`App::compile_async`] or [`App::render`].
    pub fn use_async<F>(&mut self, stage: Stage, f: F) -> &mut Self
    where
        F: for<'v> Fn(&'v mut View) -> LocalBoxFuture<'v, std::result::Result<(), HookError>>
            + 'static,
    {
        self.middleware.on_async(stage, f);
        self
    }

    pub fn pre_compile<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.use_middleware(Stage::PreCompile, f)
    }

    pub fn post_compile<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.use_middleware(Stage::PostCompile, f)
    }

    pub fn pre_layout<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.use_middleware(Stage::PreLayout, f)
    }

    pub fn post_layout<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.use_middleware(Stage::PostLayout, f)
    }

    pub fn pre_render<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.use_middleware(Stage::PreRender, f)
    }

    pub fn post_render<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.use_middleware(Stage::PostRender, f)
    }

    // =========================================================================
    // Compile
    // =========================================================================

    /// Compiles a view synchronously.
    ///
    /// Fails with [`Error::InvalidArgument`] if an async handler is registered
    /// for a compile or layout stage.
    pub fn compile<'t>(
        &mut self,
        target: impl Into<Target<'t>>,
        options: CompileOptions,
    ) -> Result<&View> {
        let key = self.resolve_target(target.into())?;
        self.compile_key(&key, &options)?;
        self.view(&key)
    }

    /// Compiles a view, awaiting async middleware.
    pub async fn compile_async<'t>(
        &mut self,
        target: impl Into<Target<'t>>,
        options: CompileOptions,
    ) -> Result<&View> {
        let key = self.resolve_target(target.into())?;
        self.compile_key_async(&key, &options).await?;
        self.view(&key)
    }

    fn compile_key(&mut self, key: &ViewKey, options: &CompileOptions) -> Result<EngineEntry> {
        let locals = with_settings(&options.locals);
        let view = view_in(&mut self.collections, key)?;
        self.middleware.handle_once(Stage::PreCompile, view)?;

        let (id, entry) = self.engine_for(key, "compile")?;
        self.apply_layout_key(key)?;
        self.compile_view(key, &id, &entry, &locals, options.is_async)?;

        let view = view_in(&mut self.collections, key)?;
        self.middleware.handle_once(Stage::PostCompile, view)?;
        Ok(entry)
    }

    async fn compile_key_async(
        &mut self,
        key: &ViewKey,
        options: &CompileOptions,
    ) -> Result<EngineEntry> {
        let locals = with_settings(&options.locals);
        let view = view_in(&mut self.collections, key)?;
        self.middleware
            .handle_once_async(Stage::PreCompile, view)
            .await?;

        let (id, entry) = self.engine_for(key, "compile")?;
        self.apply_layout_key_async(key).await?;
        self.compile_view(key, &id, &entry, &locals, options.is_async)?;

        let view = view_in(&mut self.collections, key)?;
        self.middleware
            .handle_once_async(Stage::PostCompile, view)
            .await?;
        Ok(entry)
    }

    fn compile_view(
        &mut self,
        key: &ViewKey,
        id: &str,
        entry: &EngineEntry,
        locals: &Map,
        is_async: bool,
    ) -> Result<()> {
        let mut context = self.cached_context(key, locals)?;
        context.insert("async".into(), Value::Bool(is_async));
        let partials = self.merge_partials();
        let mut engine_options = settings_of(locals);
        overlay(&mut engine_options, entry.options());
        let helpers = self.helpers.bind(is_async);
        let mode_sensitive = self.helpers.has_async();

        let view = self.view_mut(key)?;
        let cached = view
            .engine_stack
            .get(id)
            .filter(|_| !mode_sensitive || view.async_compiled.contains(id) == is_async)
            .cloned();
        let func: RenderFn = match cached {
            Some(func) => {
                log::trace!("{}: reusing compiled template for \"{}\"", view.name, id);
                func
            }
            None => {
                log::debug!("compiling {} with engine \"{}\"", view.name, id);
                let options = compile_options(locals, &engine_options, &context, &partials);
                let func = entry
                    .engine()
                    .compile_with_helpers(&view.content, &options, &helpers)?;
                view.engine_stack.insert(id.to_string(), Rc::clone(&func));
                if is_async {
                    view.async_compiled.insert(id.to_string());
                } else {
                    view.async_compiled.remove(id);
                }
                func
            }
        };
        view.func = Some(func);
        Ok(())
    }

    // =========================================================================
    // Render
    // =========================================================================

    /// Renders a view, leaving the output in its `content`.
    ///
    /// Lookup failures are returned as-is. Every later failure is also
    /// reported to the error observers. For engine render failures the
    /// observers see the rethrown error, if any, while the caller gets the
    /// original.
    pub async fn render<'t>(
        &mut self,
        target: impl Into<Target<'t>>,
        locals: Map,
    ) -> Result<&View> {
        let key = self.resolve_target(target.into())?;
        self.render_key(&key, &locals).await?;
        self.view(&key)
    }

    async fn render_key(&mut self, key: &ViewKey, locals: &Map) -> Result<()> {
        let (engine, func, context) = match self.prepare_render(key, locals).await {
            Ok(prepared) => prepared,
            Err(err) => {
                self.emit(&err);
                return Err(err);
            }
        };
        self.helpers.discard_pending();
        let output = match engine.render(func, context.clone()).await {
            Ok(output) => output,
            Err(err) => {
                self.helpers.discard_pending();
                return Err(self.engine_failure(key, err, &context));
            }
        };
        let output = match self.helpers.resolve(output).await {
            Ok(output) => output,
            Err(err) => return Err(self.engine_failure(key, err, &context)),
        };
        if let Err(err) = self.finish_render(key, locals, output).await {
            self.emit(&err);
            return Err(err);
        }
        Ok(())
    }

    async fn prepare_render(
        &mut self,
        key: &ViewKey,
        locals: &Map,
    ) -> Result<(Rc<dyn Engine>, RenderFn, Map)> {
        let context = render_context(&self.data, self.view(key)?, locals);
        let view = view_in(&mut self.collections, key)?;
        self.middleware.handle(Stage::PreRender, view).await?;

        // Surfaces a missing engine before any compile work.
        self.engine_for(key, "render")?;
        self.view_mut(key)?.cached_context = Some(context.clone());

        let options = CompileOptions::new().locals(context.clone()).is_async(true);
        let entry = self.compile_key_async(key, &options).await?;

        let view = self.view(key)?;
        let func = view.func.clone().ok_or_else(|| {
            Error::invalid_argument("render", format!("{} was not compiled", view.name))
        })?;
        let context = render_context(&self.data, view, &context);
        Ok((entry.engine(), func, context))
    }

    fn engine_failure(&self, key: &ViewKey, err: EngineError, context: &Map) -> Error {
        let rethrown = self
            .view(key)
            .ok()
            .and_then(|view| self.rethrown(&err, view, context));
        let err = Error::Engine(err);
        self.emit(rethrown.as_ref().unwrap_or(&err));
        err
    }

    async fn finish_render(&mut self, key: &ViewKey, locals: &Map, output: String) -> Result<()> {
        let view = view_in(&mut self.collections, key)?;
        view.locals_stack.push(locals.clone());
        view.content = output;
        log::debug!("rendered {}", view.name);
        self.middleware.handle(Stage::PostRender, view).await
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("options", &self.options)
            .field("collections", &self.collections)
            .field("engines", &self.engines)
            .field("middleware", &self.middleware)
            .field("helpers", &self.helpers)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BaseEngine;
    use crate::ErrorKind;
    use serde_json::json;
    use std::cell::RefCell;

    fn map(value: Value) -> Map {
        value.as_object().cloned().unwrap()
    }

    fn app() -> App {
        let mut app = App::new();
        app.engine(&["tmpl"], BaseEngine::new());
        app.create("pages", CollectionOptions::new());
        app
    }

    #[test]
    fn create_replaces_in_place() {
        let mut app = app();
        app.create("posts", CollectionOptions::new());
        app.add_view("pages", View::new("a.tmpl", "")).unwrap();
        app.create("pages", CollectionOptions::new());
        let names: Vec<&str> = app.collections().map(|c| c.name()).collect();
        assert_eq!(names, vec!["pages", "posts"]);
        assert!(app.get_views("pages").unwrap().is_empty());
    }

    #[test]
    fn create_forgets_replaced_views() {
        let mut app = app();
        let key = app.add_view("pages", View::new("a.tmpl", "x")).unwrap();
        app.compile(&key, CompileOptions::new()).unwrap();
        let id = app.view(&key).unwrap().id();
        assert!(app.middleware().has_handled(Stage::PreCompile, id));

        app.create("pages", CollectionOptions::new());
        assert!(!app.middleware().has_handled(Stage::PreCompile, id));
        assert!(!app.middleware().has_handled(Stage::PostCompile, id));
    }

    #[test]
    fn add_view_to_unknown_collection() {
        let mut app = app();
        let err = app.add_view("widgets", View::new("a", "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn compile_sets_func_and_context() {
        let mut app = app();
        app.data(map(json!({"site": "x"})));
        app.add_view("pages", View::new("a.tmpl", "<%= site %>"))
            .unwrap();
        let view = app.compile("a.tmpl", CompileOptions::new()).unwrap();
        assert!(view.func.is_some());
        assert!(view.engine_stack.contains_key("tmpl"));
        assert_eq!(view.cached_context.as_ref().unwrap()["site"], json!("x"));
    }

    #[test]
    fn compile_without_engine_names_basename() {
        let mut app = app();
        app.add_view("pages", View::new("readme", "")).unwrap();
        let err = app.compile("readme", CompileOptions::new()).unwrap_err();
        assert_eq!(err.to_string(), "compile: cannot find an engine for: readme");

        app.add_view("pages", View::new("a.md", "")).unwrap();
        let err = app.compile("a.md", CompileOptions::new()).unwrap_err();
        assert_eq!(err.to_string(), "compile: cannot find an engine for: md");
    }

    #[test]
    fn compile_options_reach_the_engine() {
        struct Capture(Rc<RefCell<Map>>);

        impl Engine for Capture {
            fn options(&self) -> Map {
                map(json!({"name": "capture", "strict": true}))
            }

            fn compile(
                &self,
                content: &str,
                options: &Map,
            ) -> std::result::Result<RenderFn, EngineError> {
                *self.0.borrow_mut() = options.clone();
                BaseEngine::new().compile(content, options)
            }
        }

        let seen = Rc::new(RefCell::new(Map::new()));
        let mut app = app();
        app.engine(&["cap"], Capture(Rc::clone(&seen)));
        app.create("snippets", CollectionOptions::new().view_type(ViewType::Partial));
        app.add_view("snippets", View::new("nav", "<nav/>")).unwrap();
        app.add_view("pages", View::new("a.cap", "")).unwrap();

        let locals = map(json!({"settings": {"strict": false, "debug": true}, "x": 1}));
        app.compile("a.cap", CompileOptions::new().locals(locals).is_async(true))
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen["engineName"], json!("capture"));
        assert_eq!(seen["strict"], json!(true));
        assert_eq!(seen["debug"], json!(true));
        assert_eq!(seen["x"], json!(1));
        assert_eq!(seen["async"], json!(true));
        assert_eq!(seen["partials"], json!({"nav": "<nav/>"}));
    }

    #[test]
    fn sync_compile_rejects_async_middleware() {
        use futures_util::FutureExt;

        let mut app = app();
        app.use_async(Stage::PreCompile, |view: &mut View| {
            async move {
                view.content.push('!');
                Ok(())
            }
            .boxed_local()
        });
        app.add_view("pages", View::new("a.tmpl", "")).unwrap();
        let err = app.compile("a.tmpl", CompileOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn reset_clears_caches_and_one_shot_markers() {
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let mut app = app();
        app.pre_compile(move |_view: &mut View| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        let key = app
            .add_view("pages", View::new("a.tmpl", "x"))
            .unwrap();
        app.compile(&key, CompileOptions::new()).unwrap();
        let view = app.reset(&key).unwrap();
        assert!(view.func.is_none());
        app.compile(&key, CompileOptions::new()).unwrap();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn remove_view_forgets_it() {
        let mut app = app();
        let key = app.add_view("pages", View::new("a.tmpl", "x")).unwrap();
        assert!(app.remove_view(&key).unwrap().is_some());
        assert!(app.find("a.tmpl", None).unwrap().is_none());
        assert!(app.remove_view(&key).unwrap().is_none());
    }
}
