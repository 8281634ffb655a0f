//! Per-call lookup state.
//!
//! One [`Invocation`] is threaded through a top-level lookup and every nested
//! lookup its interpolations trigger. It carries the caller's scope, the
//! override and default maps, the recursion stack and the optional explain
//! trace.

use crate::adapter::LookupAdapter;
use crate::error::{ErrorCode, LookupError, LookupResult};
use crate::explain::Explainer;
use crate::scope::Scope;
use serde_json::{Map, Value};

pub struct Invocation<'a> {
    adapter: &'a LookupAdapter,
    scope: &'a dyn Scope,
    overrides: Map<String, Value>,
    defaults: Map<String, Value>,
    top_key: Option<String>,
    in_flight: Vec<String>,
    max_depth: usize,
    strict_variables: bool,
    explainer: Option<Explainer>,
}

impl<'a> Invocation<'a> {
    pub fn new(adapter: &'a LookupAdapter, scope: &'a dyn Scope) -> Self {
        Self {
            adapter,
            scope,
            overrides: Map::new(),
            defaults: Map::new(),
            top_key: None,
            in_flight: Vec::new(),
            max_depth: adapter.max_depth(),
            strict_variables: adapter.strict_variables(),
            explainer: None,
        }
    }

    /// Values that take precedence over every tier.
    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Values used when no tier has the key.
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_explainer(mut self) -> Self {
        self.explainer = Some(Explainer::new());
        self
    }

    pub fn adapter(&self) -> &'a LookupAdapter {
        self.adapter
    }

    pub fn scope(&self) -> &'a dyn Scope {
        self.scope
    }

    pub fn strict_variables(&self) -> bool {
        self.strict_variables
    }

    pub fn override_value(&self, key: &str) -> Option<&Value> {
        self.overrides.get(key)
    }

    pub fn default_value(&self, key: &str) -> Option<&Value> {
        self.defaults.get(key)
    }

    /// The key originally requested by the caller.
    pub fn top_key(&self) -> Option<&str> {
        self.top_key.as_deref()
    }

    /// Record the requested key unless an outer lookup already did.
    pub fn set_top_key(&mut self, key: &str) {
        if self.top_key.is_none() {
            self.top_key = Some(key.to_string());
        }
    }

    /// Run `f` with `entry` pushed on the recursion stack.
    ///
    /// Fails with `CircularReference` when `entry` is already being resolved
    /// or when the stack would grow beyond the configured depth.
    pub fn guard<T>(
        &mut self,
        entry: &str,
        f: impl FnOnce(&mut Self) -> LookupResult<T>,
    ) -> LookupResult<T> {
        if self.in_flight.iter().any(|e| e == entry) {
            return Err(LookupError::circular(&self.in_flight, entry));
        }
        if self.in_flight.len() >= self.max_depth {
            return Err(LookupError::new(
                ErrorCode::CircularReference,
                format!(
                    "Maximum lookup depth {} exceeded while resolving '{}'",
                    self.max_depth, entry
                ),
            )
            .with_key(entry));
        }
        self.in_flight.push(entry.to_string());
        let result = f(self);
        self.in_flight.pop();
        result
    }

    pub fn is_explaining(&self) -> bool {
        self.explainer.is_some()
    }

    /// Add a line to the explain trace. `line` is only evaluated when
    /// explaining.
    pub fn explain(&mut self, line: impl FnOnce() -> String) {
        if let Some(ref mut explainer) = self.explainer {
            explainer.text(line());
        }
    }

    /// Run `f` inside an indented explain section.
    pub fn branch<T>(&mut self, label: impl FnOnce() -> String, f: impl FnOnce(&mut Self) -> T) -> T {
        if let Some(ref mut explainer) = self.explainer {
            explainer.enter(label());
        }
        let result = f(self);
        if let Some(ref mut explainer) = self.explainer {
            explainer.leave();
        }
        result
    }

    /// Take the explain trace out of the invocation.
    pub fn take_explainer(&mut self) -> Option<Explainer> {
        self.explainer.take()
    }
}
