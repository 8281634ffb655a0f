//! Tiered search over global, environment and module data.
//!
//! A [`LookupAdapter`] lives for one compilation. It builds the environment
//! provider and each module provider on first use and keeps them, together
//! with their file caches and `lookup_options`, until it is dropped.

use crate::backend::BackendRegistry;
use crate::config::Diagnostic;
use crate::environment::Environment;
use crate::error::{LookupError, LookupResult};
use crate::interpolate::Interpolator;
use crate::invocation::Invocation;
use crate::key::{LOOKUP_OPTIONS, LookupKey, is_reserved};
use crate::lookup_options::{self, LookupOptions};
use crate::merge::MergeStrategy;
use crate::provider::{ConfiguredDataProvider, DataProvider, GlobalDataProvider, GlobalTerminus};
use crate::settings::Settings;
use serde_json::{Map, Value};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Default bound on nested lookups.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// The three search scopes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Global,
    Environment,
    Module,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Global, Tier::Environment, Tier::Module];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Global => "global",
            Tier::Environment => "environment",
            Tier::Module => "module",
        };
        write!(f, "{}", s)
    }
}

pub struct LookupAdapter {
    environment: Environment,
    backends: BackendRegistry,
    interpolator: Interpolator,
    global: GlobalDataProvider,
    strict_variables: bool,
    max_depth: usize,
    env_provider: OnceCell<Rc<ConfiguredDataProvider>>,
    /// `None` records a module the environment does not have.
    module_providers: RefCell<HashMap<String, Option<Rc<ConfiguredDataProvider>>>>,
    env_lookup_options: OnceCell<Rc<Map<String, Value>>>,
    /// Compiled options by module name; `None` holds the environment's own.
    lookup_options: RefCell<HashMap<Option<String>, Rc<LookupOptions>>>,
}

impl LookupAdapter {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            backends: BackendRegistry::with_defaults(),
            interpolator: Interpolator::new(),
            global: GlobalDataProvider::default(),
            strict_variables: false,
            max_depth: DEFAULT_MAX_DEPTH,
            env_provider: OnceCell::new(),
            module_providers: RefCell::new(HashMap::new()),
            env_lookup_options: OnceCell::new(),
            lookup_options: RefCell::new(HashMap::new()),
        }
    }

    /// Adapter for the environment described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let environment = Environment::new(&settings.environment_name, &settings.environment)
            .with_module_path(&settings.module_path);
        Self::new(environment)
            .with_strict_variables(settings.strict_variables)
            .with_max_depth(settings.max_depth)
    }

    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_global(mut self, terminus: impl GlobalTerminus + 'static) -> Self {
        self.global = GlobalDataProvider::new(terminus);
        self
    }

    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    pub fn strict_variables(&self) -> bool {
        self.strict_variables
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Look up `key` through every tier.
    ///
    /// Returns `Ok(None)` when nothing has the key; reserved keys are never
    /// found. Without an explicit `merge` the strategy comes from
    /// `lookup_options`, defaulting to `first`.
    pub fn lookup(
        &self,
        key: &str,
        invocation: &mut Invocation<'_>,
        merge: Option<&MergeStrategy>,
    ) -> LookupResult<Option<Value>> {
        let lookup_key = LookupKey::parse(key)?;
        if is_reserved(lookup_key.root()) {
            invocation.explain(|| format!("\"{}\" is a reserved key", LOOKUP_OPTIONS));
            return Ok(None);
        }
        let root = lookup_key.root().to_string();

        invocation.guard(&root, |inv| {
            inv.branch(
                || format!("Searching for \"{}\"", key),
                |inv| match self.lookup_root(&lookup_key, inv, merge)? {
                    Some(value) => lookup_key.dig(value),
                    None => Ok(None),
                },
            )
        })
    }

    fn lookup_root(
        &self,
        key: &LookupKey,
        invocation: &mut Invocation<'_>,
        merge: Option<&MergeStrategy>,
    ) -> LookupResult<Option<Value>> {
        let root = key.root();
        if let Some(value) = invocation.override_value(root).cloned() {
            invocation.explain(|| format!("Found key: \"{}\" in overrides value: {}", root, value));
            return Ok(Some(value));
        }

        let merge = match merge {
            Some(merge) => merge.clone(),
            None => self
                .configured_merge(key, invocation)?
                .unwrap_or_default(),
        };
        debug!(key = root, merge = merge.name(), "looking up key");

        let found = merge.merge_lookup(Tier::ALL, |tier| {
            self.lookup_in_tier(tier, key, invocation, &merge)
        })?;
        if let Some(value) = found {
            return Ok(Some(merge.finish(value)));
        }

        if let Some(value) = invocation.default_value(root).cloned() {
            invocation.explain(|| format!("Found key: \"{}\" in defaults value: {}", root, value));
            return Ok(Some(value));
        }
        invocation.explain(|| format!("No value found for \"{}\"", root));
        Ok(None)
    }

    fn lookup_in_tier(
        &self,
        tier: Tier,
        key: &LookupKey,
        invocation: &mut Invocation<'_>,
        merge: &MergeStrategy,
    ) -> LookupResult<Option<Value>> {
        let root = key.root();
        match tier {
            Tier::Global => invocation.branch(
                || self.global.name().to_string(),
                |inv| self.global.lookup(root, inv, merge),
            ),
            Tier::Environment => {
                let provider = self.environment_provider();
                invocation.branch(
                    || provider.name().to_string(),
                    |inv| provider.lookup(root, inv, merge),
                )
            }
            Tier::Module => {
                let Some(module) = key.module_name() else {
                    return Ok(None);
                };
                match self.module_provider(module) {
                    Some(provider) => invocation.branch(
                        || provider.name().to_string(),
                        |inv| provider.lookup(root, inv, merge),
                    ),
                    None => {
                        invocation.explain(|| format!("Module \"{}\" not found", module));
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Merge strategy configured in `lookup_options` for `key`.
    fn configured_merge(
        &self,
        key: &LookupKey,
        invocation: &mut Invocation<'_>,
    ) -> LookupResult<Option<MergeStrategy>> {
        let options = self.lookup_options_for(key.module_name(), invocation)?;
        let merge = options.merge_strategy(key.root())?;
        if let Some(ref merge) = merge {
            invocation.explain(|| format!("Using merge options from \"{}\": {}", LOOKUP_OPTIONS, merge));
        }
        Ok(merge)
    }

    /// Compiled options for keys of `module`, built once per module.
    fn lookup_options_for(
        &self,
        module: Option<&str>,
        invocation: &mut Invocation<'_>,
    ) -> LookupResult<Rc<LookupOptions>> {
        let module_provider = module.and_then(|m| self.module_provider(m));
        let cache_key = module_provider
            .as_ref()
            .and_then(|p| p.module_name())
            .map(str::to_string);
        if let Some(options) = self.lookup_options.borrow().get(&cache_key) {
            return Ok(Rc::clone(options));
        }

        let environment_options = self.environment_lookup_options(invocation)?;
        let combined = match module_provider {
            Some(provider) => {
                let module_options = provider.lookup_options(invocation)?;
                lookup_options::combine(&environment_options, module_options)
            }
            None => environment_options.as_ref().clone(),
        };
        let compiled = Rc::new(LookupOptions::compile(combined)?);
        let options = Rc::clone(
            self.lookup_options
                .borrow_mut()
                .entry(cache_key)
                .or_insert(compiled),
        );
        Ok(options)
    }

    fn environment_lookup_options(
        &self,
        invocation: &mut Invocation<'_>,
    ) -> LookupResult<Rc<Map<String, Value>>> {
        if let Some(options) = self.env_lookup_options.get() {
            return Ok(Rc::clone(options));
        }
        let options = Rc::new(self.environment_provider().lookup_options(invocation)?);
        Ok(Rc::clone(self.env_lookup_options.get_or_init(|| options)))
    }

    /// The environment tier provider, created on first use.
    pub fn environment_provider(&self) -> Rc<ConfiguredDataProvider> {
        Rc::clone(self.env_provider.get_or_init(|| {
            Rc::new(ConfiguredDataProvider::environment(
                self.environment.root(),
                &self.backends,
            ))
        }))
    }

    /// Provider of module `name`, created on first use. `None` when the
    /// environment has no such module.
    pub fn module_provider(&self, name: &str) -> Option<Rc<ConfiguredDataProvider>> {
        if let Some(known) = self.module_providers.borrow().get(name) {
            return known.clone();
        }
        let provider = self.environment.module_root(name).map(|root| {
            Rc::new(ConfiguredDataProvider::module(name, &root, &self.backends))
        });
        if provider.is_none() {
            debug!(module = name, "module not found in environment");
        }
        self.module_providers
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(provider)
            .clone()
    }

    /// Diagnostics of the environment's `hiera.yaml`.
    pub fn environment_diagnostics(&self) -> Vec<Diagnostic> {
        self.environment_provider().diagnostics().to_vec()
    }

    /// Diagnostics of a module's `hiera.yaml`.
    pub fn module_diagnostics(&self, name: &str) -> LookupResult<Vec<Diagnostic>> {
        self.module_provider(name)
            .map(|provider| provider.diagnostics().to_vec())
            .ok_or_else(|| LookupError::module_not_found(name))
    }
}

impl fmt::Debug for LookupAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupAdapter")
            .field("environment", &self.environment)
            .field("backends", &self.backends)
            .field("strict_variables", &self.strict_variables)
            .field("max_depth", &self.max_depth)
            .field("modules_loaded", &self.module_providers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn lookup(adapter: &LookupAdapter, key: &str) -> LookupResult<Option<Value>> {
        let scope = Map::new();
        let mut invocation = Invocation::new(adapter, &scope);
        adapter.lookup(key, &mut invocation, None)
    }

    #[test]
    fn test_reserved_key_is_never_found() {
        let dir = TempDir::new().unwrap();
        write(&dir, "data/common.yaml", "lookup_options:\n  a:\n    merge: hash\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        assert_eq!(lookup(&adapter, "lookup_options").unwrap(), None);
        assert_eq!(lookup(&adapter, "lookup_options.a").unwrap(), None);
    }

    #[test]
    fn test_module_tier_needs_qualified_key_and_module() {
        let dir = TempDir::new().unwrap();
        write(&dir, "modules/ntp/data/common.yaml", "ntp::servers: [a]\nplain: x\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));

        assert_eq!(lookup(&adapter, "ntp::servers").unwrap(), Some(json!(["a"])));
        assert_eq!(lookup(&adapter, "plain").unwrap(), None);
        assert_eq!(lookup(&adapter, "mysql::port").unwrap(), None);
    }

    #[test]
    fn test_providers_are_memoized() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("modules/ntp")).unwrap();
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));

        let first = adapter.module_provider("ntp").unwrap();
        let second = adapter.module_provider("ntp").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(
            &adapter.environment_provider(),
            &adapter.environment_provider()
        ));
        assert!(adapter.module_provider("mysql").is_none());
    }

    #[test]
    fn test_module_lookup_options_win_over_environment() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "data/common.yaml",
            "lookup_options:\n  ntp::servers:\n    merge: first\nntp::servers: [env]\n",
        );
        write(
            &dir,
            "modules/ntp/data/common.yaml",
            "lookup_options:\n  ntp::servers:\n    merge: unique\nntp::servers: [module]\n",
        );
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        assert_eq!(
            lookup(&adapter, "ntp::servers").unwrap(),
            Some(json!(["env", "module"]))
        );
    }

    #[test]
    fn test_module_lookup_options_must_be_owned() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "modules/ntp/data/common.yaml",
            "lookup_options:\n  apache::port:\n    merge: first\nntp::x: 1\n",
        );
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        let err = lookup(&adapter, "ntp::x").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLookupOptions);
    }

    #[test]
    fn test_dotted_key_navigates_found_value() {
        let dir = TempDir::new().unwrap();
        write(&dir, "data/common.yaml", "server:\n  ports: [80, 443]\n  name: web\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        assert_eq!(lookup(&adapter, "server.ports.1").unwrap(), Some(json!(443)));
        assert_eq!(lookup(&adapter, "server.missing").unwrap(), None);
        assert_eq!(
            lookup(&adapter, "server.name.x").unwrap_err().code,
            ErrorCode::TypeMismatch
        );
    }

    #[test]
    fn test_module_diagnostics() {
        let dir = TempDir::new().unwrap();
        write(&dir, "modules/ntp/hiera.yaml", "hierarchy: [common]\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));

        let diagnostics = adapter.module_diagnostics("ntp").unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            adapter.module_diagnostics("mysql").unwrap_err().code,
            ErrorCode::ModuleNotFound
        );
        assert!(adapter.environment_diagnostics().is_empty());
    }
}
