//! Variable scopes supplied by the caller.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Read-only variable context used by `scope()` interpolation.
pub trait Scope {
    /// Value of the variable `name`, without any leading `::`.
    fn get(&self, name: &str) -> Option<Value>;
}

impl Scope for Map<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        Map::get(self, name).cloned()
    }
}

impl Scope for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }
}

/// A scope with no variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn get(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Strip the top-scope qualifier from a variable name.
pub fn variable_name(name: &str) -> &str {
    name.strip_prefix("::").unwrap_or(name)
}
