//! ERB-style substitution engine.
//!
//! [`BaseEngine`] understands two tags:
//!
//! - `<%= path %>` inserts the value at `path` as-is
//! - `<%- path %>` inserts the value HTML-escaped
//!
//! Paths use dot notation (`user.name`, `items.0`). Anything else is copied
//! through verbatim, which includes layout markers such as `{% body %}`.
//!
//! A path that does not resolve is a render error, not an empty string.

use std::rc::Rc;

use serde_json::Value;

use super::{format_value, Engine, RenderFn, Template};
use crate::context::Map;
use crate::error::EngineError;

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Raw(String),
    Escaped(String),
}

/// Compiled form of a [`BaseEngine`] template.
#[derive(Debug)]
struct Compiled {
    segments: Vec<Segment>,
}

/// A lightweight substitution engine using `<%= name %>` tags.
///
/// # Example
///
/// ```rust
/// use vellum::{BaseEngine, Engine, Map, Template};
/// use serde_json::json;
///
/// let engine = BaseEngine::new();
/// let func = engine.compile("Hello, <%= name %>!", &Map::new()).unwrap();
/// let ctx = json!({"name": "World"}).as_object().cloned().unwrap();
/// assert_eq!(func.render(&ctx).unwrap(), "Hello, World!");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BaseEngine;

impl BaseEngine {
    pub fn new() -> Self {
        Self
    }

    fn parse(content: &str) -> Result<Vec<Segment>, EngineError> {
        let mut segments = Vec::new();
        let mut rest = content;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| {
                let at = offset(content, rest) + start;
                EngineError::new("base", format!("unclosed tag at byte {}", at))
            })?;
            let tag = &after_open[..end];
            segments.push(Self::parse_tag(tag)?);
            rest = &after_open[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(segments)
    }

    fn parse_tag(tag: &str) -> Result<Segment, EngineError> {
        let (kind, path) = match tag.chars().next() {
            Some('=') => (Segment::Raw as fn(String) -> Segment, &tag[1..]),
            Some('-') => (Segment::Escaped as fn(String) -> Segment, &tag[1..]),
            _ => {
                return Err(EngineError::new(
                    "base",
                    format!("unsupported tag: <%{}%>", tag),
                ))
            }
        };
        let path = path.trim();
        if path.is_empty() {
            return Err(EngineError::new("base", "empty variable name in template"));
        }
        Ok(kind(path.to_string()))
    }
}

fn offset(whole: &str, part: &str) -> usize {
    part.as_ptr() as usize - whole.as_ptr() as usize
}

fn resolve_path<'a>(context: &'a Map, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = context.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl Template for Compiled {
    fn render(&self, context: &Map) -> Result<String, EngineError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Raw(path) | Segment::Escaped(path) => {
                    let value = resolve_path(context, path).ok_or_else(|| {
                        EngineError::new("base", format!("{} is not defined", path))
                    })?;
                    let text = format_value(value);
                    if matches!(segment, Segment::Escaped(_)) {
                        out.push_str(&html_escape::encode_safe(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Engine for BaseEngine {
    fn options(&self) -> Map {
        let mut options = Map::new();
        options.insert("name".into(), Value::from("base"));
        options
    }

    fn compile(&self, content: &str, _options: &Map) -> Result<RenderFn, EngineError> {
        let segments = Self::parse(content)?;
        Ok(Rc::new(Compiled { segments }))
    }
}
