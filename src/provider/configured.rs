//! Provider for an environment or module root.

use super::{DataProvider, PathBasedDataProvider};
use crate::backend::BackendRegistry;
use crate::config::{Config, Diagnostic, LoadedConfig};
use crate::error::{LookupError, LookupResult};
use crate::invocation::Invocation;
use crate::key::LOOKUP_OPTIONS;
use crate::lookup_options;
use crate::merge::MergeStrategy;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Serves the data of one root directory through its `hiera.yaml`.
#[derive(Debug)]
pub struct ConfiguredDataProvider {
    name: String,
    module: Option<String>,
    root: PathBuf,
    loaded: LoadedConfig,
    levels: Vec<PathBasedDataProvider>,
    missing_backends: Vec<String>,
}

impl ConfiguredDataProvider {
    /// Provider for an environment root.
    pub fn environment(root: &Path, registry: &BackendRegistry) -> Self {
        Self::load("Environment Data Provider".to_string(), None, root, registry)
    }

    /// Provider for the root of module `name`.
    pub fn module(name: &str, root: &Path, registry: &BackendRegistry) -> Self {
        Self::load(
            format!("Module \"{}\" Data Provider", name),
            Some(name.to_string()),
            root,
            registry,
        )
    }

    fn load(
        name: String,
        module: Option<String>,
        root: &Path,
        registry: &BackendRegistry,
    ) -> Self {
        let loaded = Config::load(root);

        let mut backends = Vec::with_capacity(loaded.config.backends.len());
        let mut missing_backends = Vec::new();
        for backend_name in &loaded.config.backends {
            match registry.get(backend_name) {
                Some(backend) => backends.push(backend),
                None => {
                    warn!(
                        provider = %name,
                        backend = %backend_name,
                        "no backend registered under this name"
                    );
                    missing_backends.push(backend_name.clone());
                }
            }
        }

        let levels = loaded
            .config
            .hierarchy
            .iter()
            .map(|level| {
                let datadir = root.join(loaded.config.datadir_of(level));
                PathBasedDataProvider::new(level.clone(), datadir, backends.clone())
            })
            .collect();

        debug!(provider = %name, root = %root.display(), "created data provider");
        Self {
            name,
            module,
            root: root.to_path_buf(),
            loaded,
            levels,
            missing_backends,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Owning module, for module providers.
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.loaded.config
    }

    /// The descriptor file, when the root has one.
    pub fn config_path(&self) -> Option<&Path> {
        self.loaded.path.as_deref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.loaded.diagnostics
    }

    pub fn levels(&self) -> &[PathBasedDataProvider] {
        &self.levels
    }

    /// The validated `lookup_options` of this root, hash merged over its
    /// levels.
    pub fn lookup_options(&self, invocation: &mut Invocation<'_>) -> LookupResult<Map<String, Value>> {
        let found = invocation.guard(LOOKUP_OPTIONS, |inv| {
            inv.branch(
                || format!("Searching for \"{}\"", LOOKUP_OPTIONS),
                |inv| self.lookup(LOOKUP_OPTIONS, inv, &MergeStrategy::Hash),
            )
        })?;
        lookup_options::validate(found.unwrap_or(Value::Null), self.module.as_deref())
            .map_err(|e| match self.config_path() {
                Some(path) if e.path.is_none() => e.with_path(path),
                _ => e,
            })
    }
}

impl DataProvider for ConfiguredDataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(
        &self,
        key: &str,
        invocation: &mut Invocation<'_>,
        merge: &MergeStrategy,
    ) -> LookupResult<Option<Value>> {
        if let Some(backend) = self.missing_backends.first() {
            return Err(LookupError::backend_not_implemented(backend).with_key(key));
        }
        invocation.explain(|| format!("Using merge strategy: {}", merge));
        merge.merge_lookup(&self.levels, |level| {
            invocation.branch(
                || level.name().to_string(),
                |inv| level.lookup(key, inv, merge),
            )
        })
    }
}
