//! The lookup entry point.

use crate::adapter::LookupAdapter;
use crate::error::{LookupError, LookupResult};
use crate::explain::Explainer;
use crate::invocation::Invocation;
use crate::merge::MergeStrategy;
use crate::scope::Scope;
use serde_json::{Map, Value};

/// A configured lookup call.
///
/// # Example
/// ```no_run
/// use hiera_lookup::{Environment, Lookup, LookupAdapter, MergeStrategy};
/// use serde_json::{Map, json};
///
/// let adapter = LookupAdapter::new(Environment::new("production", "/etc/code/production"));
/// let mut facts = Map::new();
/// facts.insert("osfamily".into(), json!("Debian"));
///
/// let servers = Lookup::new(&adapter, &facts)
///     .merge(MergeStrategy::Unique)
///     .default_value(json!([]))
///     .run("ntp::servers")?;
/// # Ok::<(), hiera_lookup::LookupError>(())
/// ```
pub struct Lookup<'a> {
    adapter: &'a LookupAdapter,
    scope: &'a dyn Scope,
    merge: Option<MergeStrategy>,
    default: Option<Value>,
    overrides: Map<String, Value>,
    defaults: Map<String, Value>,
    explain: bool,
}

impl<'a> Lookup<'a> {
    pub fn new(adapter: &'a LookupAdapter, scope: &'a dyn Scope) -> Self {
        Self {
            adapter,
            scope,
            merge: None,
            default: None,
            overrides: Map::new(),
            defaults: Map::new(),
            explain: false,
        }
    }

    /// Use `merge` instead of the strategy from `lookup_options`.
    pub fn merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = Some(merge);
        self
    }

    /// Value returned when nothing is found.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Values that win over every tier, by root key.
    pub fn overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Values used when no tier has the root key.
    pub fn defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Look up `key`. Fails with `NoSuchKey` when nothing is found and no
    /// default was given.
    pub fn run(&self, key: &str) -> LookupResult<Value> {
        self.run_explained(key).0
    }

    /// Look up `key` and return the explain trace along with the result.
    pub fn run_explained(&self, key: &str) -> (LookupResult<Value>, Option<Explainer>) {
        let mut invocation = Invocation::new(self.adapter, self.scope)
            .with_overrides(self.overrides.clone())
            .with_defaults(self.defaults.clone());
        if self.explain {
            invocation = invocation.with_explainer();
        }
        invocation.set_top_key(key);

        let result = match self.adapter.lookup(key, &mut invocation, self.merge.as_ref()) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => match self.default {
                Some(ref default) => {
                    invocation.explain(|| format!("Using default value: {}", default));
                    Ok(default.clone())
                }
                None => Err(LookupError::not_found(key)),
            },
            Err(err) => Err(err.with_top_key(key)),
        };
        (result, invocation.take_explainer())
    }
}

/// Look up `key` with an optional merge strategy.
pub fn lookup(
    adapter: &LookupAdapter,
    key: &str,
    merge: Option<MergeStrategy>,
    scope: &dyn Scope,
) -> LookupResult<Value> {
    let mut call = Lookup::new(adapter, scope);
    if let Some(merge) = merge {
        call = call.merge(merge);
    }
    call.run(key)
}
