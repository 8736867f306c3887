//! Template helpers.
//!
//! Helpers are functions registered on the [`App`](crate::App) and bound into
//! every compile. Engines only ever see synchronous [`HelperFn`]s, collected
//! in a [`BoundHelpers`] set:
//!
//! - sync helpers are passed through unchanged
//! - in async mode, an async helper call records its arguments and returns a
//!   placeholder string; the renderer awaits the recorded calls afterwards and
//!   substitutes their results into the output
//! - in sync mode, calling an async helper fails
//!
//! Sync helpers are `Send + Sync`, as MiniJinja requires of registered
//! functions.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use crate::engine::format_value;
use crate::error::EngineError;

/// Type alias for synchronous helpers.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Result<Value, EngineError> + Send + Sync>;

/// Type alias for asynchronous helpers.
pub type AsyncHelperFn =
    Rc<dyn Fn(Vec<Value>) -> LocalBoxFuture<'static, Result<Value, EngineError>>>;

fn placeholder(id: u64) -> String {
    format!("__vellum_async_{}__", id)
}

struct PendingCall {
    id: u64,
    name: String,
    args: Vec<Value>,
}

#[derive(Default)]
struct Pending {
    next: u64,
    calls: Vec<PendingCall>,
}

/// Registry of sync and async helpers.
///
/// A name is either sync or async; registering it again replaces the
/// previous helper of either kind.
#[derive(Clone, Default)]
pub struct Helpers {
    sync: BTreeMap<String, HelperFn>,
    deferred: BTreeMap<String, AsyncHelperFn>,
    pending: Arc<Mutex<Pending>>,
}

impl Helpers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous helper.
    pub fn insert<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        self.deferred.remove(name);
        self.sync.insert(name.to_string(), Arc::new(f));
    }

    /// Registers an asynchronous helper.
    pub fn insert_async<F>(&mut self, name: &str, f: F)
    where
        F: Fn(Vec<Value>) -> LocalBoxFuture<'static, Result<Value, EngineError>> + 'static,
    {
        self.sync.remove(name);
        self.deferred.insert(name.to_string(), Rc::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sync.contains_key(name) || self.deferred.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .sync
            .keys()
            .chain(self.deferred.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.deferred.is_empty()
    }

    /// Whether any async helper is registered.
    pub fn has_async(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Binds every helper for a compile in the given mode.
    pub fn bind(&self, is_async: bool) -> BoundHelpers {
        let mut entries: Vec<(String, HelperFn)> = self
            .sync
            .iter()
            .map(|(name, f)| (name.clone(), Arc::clone(f)))
            .collect();
        for name in self.deferred.keys() {
            let helper: HelperFn = if is_async {
                let pending = Arc::clone(&self.pending);
                let name = name.clone();
                Arc::new(move |args: &[Value]| -> Result<Value, EngineError> {
                    let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
                    let id = pending.next;
                    pending.next += 1;
                    pending.calls.push(PendingCall {
                        id,
                        name: name.clone(),
                        args: args.to_vec(),
                    });
                    Ok(Value::String(placeholder(id)))
                })
            } else {
                let name = name.clone();
                Arc::new(move |_args: &[Value]| -> Result<Value, EngineError> {
                    Err(EngineError::new(
                        "helpers",
                        format!("async helper \"{}\" called from a sync compile", name),
                    ))
                })
            };
            entries.push((name.clone(), helper));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        BoundHelpers { entries }
    }

    /// Drops calls recorded by async helpers and not yet resolved.
    pub(crate) fn discard_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .clear();
    }

    /// Awaits every recorded async call in order and substitutes the results
    /// for their placeholders in `output`.
    pub(crate) async fn resolve(&self, mut output: String) -> Result<String, EngineError> {
        let calls = std::mem::take(
            &mut self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .calls,
        );
        if calls.is_empty() {
            return Ok(output);
        }
        log::trace!("resolving {} async helper calls", calls.len());

        let mut resolved: Vec<(String, Value)> = Vec::with_capacity(calls.len());
        for call in calls {
            let helper = self.deferred.get(&call.name).cloned().ok_or_else(|| {
                EngineError::new(
                    "helpers",
                    format!("async helper \"{}\" is not registered", call.name),
                )
            })?;
            let args = call
                .args
                .into_iter()
                .map(|arg| substitute(arg, &resolved))
                .collect();
            let value = helper(args).await?;
            resolved.push((placeholder(call.id), value));
        }
        for (token, value) in &resolved {
            output = output.replace(token.as_str(), &format_value(value));
        }
        Ok(output)
    }
}

/// Replaces placeholders of earlier calls inside a string argument.
fn substitute(arg: Value, resolved: &[(String, Value)]) -> Value {
    let mut text = match arg {
        Value::String(text) => text,
        other => return other,
    };
    for (token, value) in resolved {
        if text == *token {
            return value.clone();
        }
        if text.contains(token.as_str()) {
            text = text.replace(token.as_str(), &format_value(value));
        }
    }
    Value::String(text)
}

impl fmt::Debug for Helpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helpers")
            .field("sync", &self.sync.keys().collect::<Vec<_>>())
            .field("async", &self.deferred.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Helpers bound for one compile, sorted by name.
#[derive(Clone, Default)]
pub struct BoundHelpers {
    entries: Vec<(String, HelperFn)>,
}

impl BoundHelpers {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HelperFn)> {
        self.entries.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn get(&self, name: &str) -> Option<&HelperFn> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for BoundHelpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}
