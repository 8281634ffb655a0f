//! The global tier.
//!
//! Global data comes from an external terminus supplied by the host. Its
//! failures are wrapped so they name the key originally requested.

use super::DataProvider;
use crate::error::{LookupError, LookupResult};
use crate::invocation::Invocation;
use crate::merge::MergeStrategy;
use crate::scope::Scope;
use serde_json::{Map, Value};

/// What a terminus is told about the lookup.
pub struct GlobalRequest<'r> {
    pub environment: &'r str,
    pub scope: &'r dyn Scope,
    pub merge: &'r MergeStrategy,
}

/// External source of global data.
pub trait GlobalTerminus {
    fn find(&self, key: &str, request: &GlobalRequest<'_>) -> anyhow::Result<Option<Value>>;
}

impl<F> GlobalTerminus for F
where
    F: Fn(&str, &GlobalRequest<'_>) -> anyhow::Result<Option<Value>>,
{
    fn find(&self, key: &str, request: &GlobalRequest<'_>) -> anyhow::Result<Option<Value>> {
        self(key, request)
    }
}

/// A terminus without data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGlobalData;

impl GlobalTerminus for NoGlobalData {
    fn find(&self, _key: &str, _request: &GlobalRequest<'_>) -> anyhow::Result<Option<Value>> {
        Ok(None)
    }
}

/// A terminus serving a fixed mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticTerminus {
    data: Map<String, Value>,
}

impl StaticTerminus {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

impl GlobalTerminus for StaticTerminus {
    fn find(&self, key: &str, _request: &GlobalRequest<'_>) -> anyhow::Result<Option<Value>> {
        Ok(self.data.get(key).cloned())
    }
}

pub struct GlobalDataProvider {
    terminus: Box<dyn GlobalTerminus>,
}

impl Default for GlobalDataProvider {
    fn default() -> Self {
        Self::new(NoGlobalData)
    }
}

impl GlobalDataProvider {
    pub fn new(terminus: impl GlobalTerminus + 'static) -> Self {
        Self {
            terminus: Box::new(terminus),
        }
    }
}

impl DataProvider for GlobalDataProvider {
    fn name(&self) -> &str {
        "Global Data Provider"
    }

    fn lookup(
        &self,
        key: &str,
        invocation: &mut Invocation<'_>,
        merge: &MergeStrategy,
    ) -> LookupResult<Option<Value>> {
        let request = GlobalRequest {
            environment: invocation.adapter().environment().name(),
            scope: invocation.scope(),
            merge,
        };
        let found = self.terminus.find(key, &request).map_err(|cause| {
            LookupError::global(invocation.top_key().unwrap_or(key), format!("{:#}", cause))
        })?;
        let Some(raw) = found else {
            invocation.explain(|| format!("No such key: \"{}\"", key));
            return Ok(None);
        };
        let interpolator = invocation.adapter().interpolator();
        let value = interpolator.interpolate(&raw, invocation, true)?;
        invocation.explain(|| format!("Found key: \"{}\" value: {}", key, value));
        Ok(Some(value))
    }
}
