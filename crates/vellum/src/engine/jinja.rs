//! MiniJinja adapter.
//!
//! Each compiled view gets its own [`Environment`] holding the view template
//! and every partial passed in the compile options, so `{% include "name" %}`
//! resolves against the app's partial collections. Helpers are registered as
//! global functions.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use minijinja::value::Rest;
use minijinja::{Environment, ErrorKind, Value as JinjaValue};
use serde_json::Value;

use super::{Engine, RenderFn, Template};
use crate::context::Map;
use crate::error::EngineError;
use crate::helpers::BoundHelpers;

const VIEW_TEMPLATE: &str = "__view__";

type Configure = Rc<dyn Fn(&mut Environment<'static>)>;

/// MiniJinja-based template engine.
///
/// Provides Jinja2-compatible syntax: loops, conditionals, filters, macros
/// and includes.
///
/// # Example
///
/// ```rust
/// use vellum::{Engine, Map, MiniJinjaEngine, Template};
/// use serde_json::json;
///
/// let engine = MiniJinjaEngine::new();
/// let func = engine.compile("{% for i in items %}{{ i }},{% endfor %}", &Map::new()).unwrap();
/// let ctx = json!({"items": [1, 2]}).as_object().cloned().unwrap();
/// assert_eq!(func.render(&ctx).unwrap(), "1,2,");
/// ```
#[derive(Clone, Default)]
pub struct MiniJinjaEngine {
    configure: Option<Configure>,
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on every environment this engine creates.
    ///
    /// Use this to register custom filters, functions or tests.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Environment<'static>) + 'static,
    {
        self.configure = Some(Rc::new(f));
        self
    }

    fn environment(&self, options: &Map) -> Result<Environment<'static>, EngineError> {
        let mut env = Environment::new();
        register_filters(&mut env);
        if let Some(configure) = &self.configure {
            configure(&mut env);
        }
        if let Some(Value::Object(partials)) = options.get("partials") {
            for (name, content) in partials {
                if let Value::String(source) = content {
                    env.add_template_owned(name.clone(), source.clone())
                        .map_err(jinja_error)?;
                }
            }
        }
        Ok(env)
    }
}

impl fmt::Debug for MiniJinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaEngine")
            .field("configured", &self.configure.is_some())
            .finish()
    }
}

/// Registers the default filters on a MiniJinja environment.
pub fn register_filters(env: &mut Environment<'static>) {
    // Newline filter
    env.add_filter("nl", |value: JinjaValue| -> String { format!("{}\n", value) });
}

/// Registers each helper as a global function taking positional arguments.
fn register_helpers(env: &mut Environment<'static>, helpers: &BoundHelpers) {
    for (name, helper) in helpers.iter() {
        let helper = Arc::clone(helper);
        env.add_function(
            name.to_string(),
            move |args: Rest<JinjaValue>| -> Result<JinjaValue, minijinja::Error> {
                let args = args
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<Value>, _>>()
                    .map_err(|err| {
                        minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string())
                    })?;
                let value = helper(&args).map_err(|err| {
                    minijinja::Error::new(ErrorKind::InvalidOperation, err.message)
                })?;
                Ok(JinjaValue::from_serialize(&value))
            },
        );
    }
}

fn jinja_error(err: minijinja::Error) -> EngineError {
    EngineError::new("jinja", err.to_string()).with_source(err)
}

struct JinjaTemplate {
    env: Environment<'static>,
}

impl Template for JinjaTemplate {
    fn render(&self, context: &Map) -> Result<String, EngineError> {
        let tmpl = self.env.get_template(VIEW_TEMPLATE).map_err(jinja_error)?;
        tmpl.render(JinjaValue::from_serialize(context))
            .map_err(jinja_error)
    }
}

impl Engine for MiniJinjaEngine {
    fn options(&self) -> Map {
        let mut options = Map::new();
        options.insert("name".into(), Value::from("jinja"));
        options
    }

    fn compile(&self, content: &str, options: &Map) -> Result<RenderFn, EngineError> {
        self.compile_with_helpers(content, options, &BoundHelpers::default())
    }

    fn compile_with_helpers(
        &self,
        content: &str,
        options: &Map,
        helpers: &BoundHelpers,
    ) -> Result<RenderFn, EngineError> {
        let mut env = self.environment(options)?;
        register_helpers(&mut env, helpers);
        env.add_template_owned(VIEW_TEMPLATE, content.to_string())
            .map_err(jinja_error)?;
        Ok(Rc::new(JinjaTemplate { env }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_variables() {
        let func = MiniJinjaEngine::new()
            .compile("Hello, {{ name }}!", &Map::new())
            .ok()
            .unwrap();
        assert_eq!(func.render(&ctx(json!({"name": "World"}))).unwrap(), "Hello, World!");
    }

    #[test]
    fn syntax_error_fails_compile() {
        let err = MiniJinjaEngine::new()
            .compile("{{ unclosed", &Map::new())
            .err()
            .unwrap();
        assert_eq!(err.engine, "jinja");
        assert!(err.source.is_some());
    }

    #[test]
    fn includes_resolve_partials() {
        let options = ctx(json!({"partials": {"greeting.jinja": "Hi {{ name }}"}}));
        let func = MiniJinjaEngine::new()
            .compile("[{% include \"greeting.jinja\" %}]", &options)
            .ok()
            .unwrap();
        assert_eq!(func.render(&ctx(json!({"name": "Bo"}))).unwrap(), "[Hi Bo]");
    }

    #[test]
    fn configure_registers_filters() {
        let engine = MiniJinjaEngine::new().configure(|env| {
            env.add_filter("shout", |s: String| s.to_uppercase());
        });
        let func = engine.compile("{{ w | shout }}", &Map::new()).ok().unwrap();
        assert_eq!(func.render(&ctx(json!({"w": "hey"}))).unwrap(), "HEY");
    }

    #[test]
    fn helpers_are_global_functions() {
        let mut helpers = crate::Helpers::new();
        helpers.insert("sum", |args: &[Value]| {
            Ok(Value::from(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        });
        helpers.insert("fail", |_args: &[Value]| Err(EngineError::new("helpers", "nope")));
        let bound = helpers.bind(false);

        let func = MiniJinjaEngine::new()
            .compile_with_helpers("{{ sum(1, n, 3) }}", &Map::new(), &bound)
            .ok()
            .unwrap();
        assert_eq!(func.render(&ctx(json!({"n": 2}))).unwrap(), "6");

        let func = MiniJinjaEngine::new()
            .compile_with_helpers("{{ fail() }}", &Map::new(), &bound)
            .ok()
            .unwrap();
        let err = func.render(&Map::new()).unwrap_err();
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn nl_filter_appends_newline() {
        let func = MiniJinjaEngine::new()
            .compile("{{ w | nl }}", &Map::new())
            .ok()
            .unwrap();
        assert_eq!(func.render(&ctx(json!({"w": "x"}))).unwrap(), "x\n");
    }
}
