//! Lookup keys and qualified navigation into found values.
//!
//! A key such as `ntp::servers.0` has a root key (`ntp::servers`) that is
//! searched for in the tiers, and trailing segments (`0`) that navigate into
//! the value found for the root key. The part of the root key before the
//! first `::` names the owning module.

use crate::error::{LookupError, LookupResult};
use serde_json::Value;
use std::fmt;

/// Reserved key holding per-key lookup metadata.
pub const LOOKUP_OPTIONS: &str = "lookup_options";

/// Namespace separator between a module name and the rest of a key.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// True for keys that can never be looked up directly.
pub fn is_reserved(key: &str) -> bool {
    key == LOOKUP_OPTIONS
        || key
            .strip_prefix(LOOKUP_OPTIONS)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Key into a mapping.
    Name(String),
    /// Position in a sequence; negative values count from the end.
    Index(i64),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => write!(f, "{}", name),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Split a dotted key into segments.
///
/// Dots inside single or double quotes do not split. A quoted segment is
/// always a name, even when it looks like a number. Whitespace around an
/// unquoted segment, or around the quotes of a quoted one, is trimmed.
pub fn split_key(key: &str) -> LookupResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = key.chars();

    loop {
        match chars.next() {
            Some(q @ ('\'' | '"')) if !quoted && current.trim().is_empty() => {
                current.clear();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == q {
                        closed = true;
                        break;
                    }
                    current.push(c);
                }
                if !closed {
                    return Err(LookupError::invalid_key(key, "unterminated quote"));
                }
                quoted = true;
            }
            Some('.') => {
                segments.push(finish_segment(key, &mut current, quoted)?);
                quoted = false;
            }
            Some(c) if quoted && c.is_whitespace() => {}
            Some(c) => {
                if quoted {
                    return Err(LookupError::invalid_key(
                        key,
                        "text after a closing quote",
                    ));
                }
                current.push(c);
            }
            None => {
                segments.push(finish_segment(key, &mut current, quoted)?);
                return Ok(segments);
            }
        }
    }
}

fn finish_segment(key: &str, current: &mut String, quoted: bool) -> LookupResult<Segment> {
    let taken = std::mem::take(current);
    let text = if quoted { taken } else { taken.trim().to_string() };
    if text.is_empty() {
        return Err(LookupError::invalid_key(key, "empty segment"));
    }
    if !quoted && let Ok(index) = text.parse::<i64>() {
        return Ok(Segment::Index(index));
    }
    Ok(Segment::Name(text))
}

/// A parsed lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    text: String,
    root: String,
    segments: Vec<Segment>,
    module_name: Option<String>,
}

impl LookupKey {
    pub fn parse(key: &str) -> LookupResult<Self> {
        let mut segments = split_key(key)?;
        let root = match segments.remove(0) {
            Segment::Name(name) => name,
            Segment::Index(_) => {
                return Err(LookupError::invalid_key(
                    key,
                    "the first segment cannot be a number",
                ));
            }
        };
        let module_name = module_name_of(&root).map(str::to_string);
        Ok(Self {
            text: key.to_string(),
            root,
            segments,
            module_name,
        })
    }

    /// The full key as given.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The key searched for in the tiers.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Segments applied to the found value.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Navigate into the value found for the root key.
    pub fn dig(&self, value: Value) -> LookupResult<Option<Value>> {
        dig(&self.text, value, &self.segments)
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// The module owning `root`, if it is namespace-qualified.
pub fn module_name_of(root: &str) -> Option<&str> {
    match root.split_once(NAMESPACE_SEPARATOR) {
        Some((module, _)) if !module.is_empty() => Some(module),
        _ => None,
    }
}

/// Follow `segments` into `value`.
///
/// Missing entries yield `Ok(None)`. Navigating into a value of the wrong
/// kind is a type mismatch.
pub fn dig(key: &str, value: Value, segments: &[Segment]) -> LookupResult<Option<Value>> {
    let mut current = value;
    for segment in segments {
        let next = match (segment, current) {
            (_, Value::Null) => None,
            (Segment::Index(index), Value::Array(mut items)) => {
                let len = items.len() as i64;
                let position = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&position) {
                    Some(items.swap_remove(position as usize))
                } else {
                    None
                }
            }
            (Segment::Index(index), Value::Object(mut map)) => map.remove(&index.to_string()),
            (Segment::Name(name), Value::Object(mut map)) => map.remove(name),
            (Segment::Name(_), other @ Value::Array(_)) => {
                return Err(LookupError::type_mismatch(key, "Hash", type_name(&other)));
            }
            (Segment::Index(_), other) => {
                return Err(LookupError::type_mismatch(key, "Array", type_name(&other)));
            }
            (Segment::Name(_), other) => {
                return Err(LookupError::type_mismatch(key, "Hash", type_name(&other)));
            }
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Short type name used in diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Undef",
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_f64() => "Float",
        Value::Number(_) => "Integer",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Hash",
    }
}
