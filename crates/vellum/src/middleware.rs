//! Middleware for the compile/render pipeline.
//!
//! Middleware handlers run against a view at fixed stages:
//!
//! ```text
//! render(view, locals)
//!   → PRE-RENDER
//!   → compile
//!       → PRE-COMPILE        (once per view)
//!       → PRE-LAYOUT         (once per view)
//!       → layout applied
//!       → POST-LAYOUT        (once per view)
//!       → engine.compile
//!       → POST-COMPILE       (once per view)
//!   → engine.render
//!   → POST-RENDER
//! ```
//!
//! Handlers for a stage run in registration order. The first failing handler
//! stops the stage and its error is returned.
//!
//! # One-Shot Stages
//!
//! [`Middleware::handle_once`] and [`Middleware::handle_once_async`] remember
//! each `(stage, view)` pair they have dispatched and skip it afterwards. The
//! marker is recorded only once every handler has succeeded, so a stage that
//! failed or was refused runs again on the next dispatch.
//!
//! # Sync and Async Handlers
//!
//! Async handlers can only run from the async dispatch methods. Dispatching a
//! stage synchronously while an async handler is registered for it is an
//! [`Error::InvalidArgument`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use glob::Pattern;

use crate::error::{Error, HookError, Result};
use crate::view::{View, ViewId};

/// A point in the pipeline where middleware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PreCompile,
    PostCompile,
    PreLayout,
    PostLayout,
    PreRender,
    PostRender,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::PreCompile => write!(f, "preCompile"),
            Stage::PostCompile => write!(f, "postCompile"),
            Stage::PreLayout => write!(f, "preLayout"),
            Stage::PostLayout => write!(f, "postLayout"),
            Stage::PreRender => write!(f, "preRender"),
            Stage::PostRender => write!(f, "postRender"),
        }
    }
}

/// Type alias for synchronous handlers.
pub type HandlerFn = Rc<dyn Fn(&mut View) -> std::result::Result<(), HookError>>;

/// Type alias for asynchronous handlers.
pub type AsyncHandlerFn =
    Rc<dyn for<'v> Fn(&'v mut View) -> LocalBoxFuture<'v, std::result::Result<(), HookError>>>;

#[derive(Clone)]
enum Handler {
    Sync(HandlerFn),
    Async(AsyncHandlerFn),
}

#[derive(Clone)]
struct Route {
    filter: Option<Pattern>,
    handler: Handler,
}

impl Route {
    fn applies_to(&self, view: &View) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |pattern| pattern.matches(&view.name))
    }
}

fn compile_filter(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|source| Error::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Registered handlers per stage plus the one-shot marker set.
#[derive(Clone, Default)]
pub struct Middleware {
    routes: HashMap<Stage, Vec<Route>>,
    handled: HashSet<(Stage, ViewId)>,
}

impl Middleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a synchronous handler for every view.
    pub fn on<F>(&mut self, stage: Stage, f: F)
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        self.push(stage, None, Handler::Sync(Rc::new(f)));
    }

    /// Adds an asynchronous handler for every view.
    pub fn on_async<F>(&mut self, stage: Stage, f: F)
    where
        F: for<'v> Fn(&'v mut View) -> LocalBoxFuture<'v, std::result::Result<(), HookError>>
            + 'static,
    {
        self.push(stage, None, Handler::Async(Rc::new(f)));
    }

    /// Adds a synchronous handler for views whose name matches a glob.
    pub fn on_matching<F>(&mut self, stage: Stage, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut View) -> std::result::Result<(), HookError> + 'static,
    {
        let filter = compile_filter(pattern)?;
        self.push(stage, Some(filter), Handler::Sync(Rc::new(f)));
        Ok(())
    }

    /// Adds an asynchronous handler for views whose name matches a glob.
    pub fn on_matching_async<F>(&mut self, stage: Stage, pattern: &str, f: F) -> Result<()>
    where
        F: for<'v> Fn(&'v mut View) -> LocalBoxFuture<'v, std::result::Result<(), HookError>>
            + 'static,
    {
        let filter = compile_filter(pattern)?;
        self.push(stage, Some(filter), Handler::Async(Rc::new(f)));
        Ok(())
    }

    fn push(&mut self, stage: Stage, filter: Option<Pattern>, handler: Handler) {
        self.routes
            .entry(stage)
            .or_default()
            .push(Route { filter, handler });
    }

    /// Number of handlers registered for a stage.
    pub fn len(&self, stage: Stage) -> usize {
        self.routes.get(&stage).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.values().all(Vec::is_empty)
    }

    /// Whether a one-shot dispatch of `stage` already happened for `view`.
    pub fn has_handled(&self, stage: Stage, view: ViewId) -> bool {
        self.handled.contains(&(stage, view))
    }

    fn routes_for(&self, stage: Stage, view: &View) -> Vec<Route> {
        self.routes
            .get(&stage)
            .map(|routes| {
                routes
                    .iter()
                    .filter(|route| route.applies_to(view))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Runs every synchronous handler for `stage`.
    pub fn handle_sync(&self, stage: Stage, view: &mut View) -> Result<()> {
        let routes = self.routes_for(stage, view);
        if routes.is_empty() {
            return Ok(());
        }
        log::trace!("{} ({} handlers) for {}", stage, routes.len(), view.name);
        // Checked up front so no sync handler runs before the failure.
        if routes
            .iter()
            .any(|route| matches!(route.handler, Handler::Async(_)))
        {
            return Err(Error::invalid_argument(
                "compile",
                format!(
                    "{} has async middleware; use compile_async for view \"{}\"",
                    stage, view.name
                ),
            ));
        }
        for route in routes {
            if let Handler::Sync(f) = route.handler {
                f(view)?;
            }
        }
        Ok(())
    }

    /// Runs every handler for `stage`, awaiting async handlers in turn.
    pub async fn handle(&self, stage: Stage, view: &mut View) -> Result<()> {
        let routes = self.routes_for(stage, view);
        if routes.is_empty() {
            return Ok(());
        }
        log::trace!("{} ({} handlers) for {}", stage, routes.len(), view.name);
        for route in routes {
            match route.handler {
                Handler::Sync(f) => f(view)?,
                Handler::Async(f) => f(view).await?,
            }
        }
        Ok(())
    }

    /// Runs `stage` for `view` synchronously unless it already ran.
    pub fn handle_once(&mut self, stage: Stage, view: &mut View) -> Result<()> {
        if self.has_handled(stage, view.id()) {
            return Ok(());
        }
        self.handle_sync(stage, view)?;
        self.handled.insert((stage, view.id()));
        Ok(())
    }

    /// Runs `stage` for `view` unless it already ran.
    pub async fn handle_once_async(&mut self, stage: Stage, view: &mut View) -> Result<()> {
        if self.has_handled(stage, view.id()) {
            return Ok(());
        }
        self.handle(stage, view).await?;
        self.handled.insert((stage, view.id()));
        Ok(())
    }

    /// Forgets every one-shot dispatch recorded for `view`.
    pub fn forget(&mut self, view: ViewId) {
        self.handled.retain(|(_, id)| *id != view);
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(String, usize)> = self
            .routes
            .iter()
            .map(|(stage, routes)| (stage.to_string(), routes.len()))
            .collect();
        counts.sort();
        f.debug_struct("Middleware")
            .field("handlers", &counts)
            .field("handled", &self.handled.len())
            .finish()
    }
}
