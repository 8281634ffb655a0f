//! One hierarchy level backed by data files.

use super::DataProvider;
use crate::backend::Backend;
use crate::config::HierarchyLevel;
use crate::error::LookupResult;
use crate::interpolate::to_text;
use crate::invocation::Invocation;
use crate::merge::MergeStrategy;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// A resolved data file of a level.
#[derive(Clone)]
pub struct DataLocation {
    /// Path template as written in the descriptor.
    pub original: String,
    pub path: PathBuf,
    pub backend: Rc<dyn Backend>,
}

impl fmt::Debug for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLocation")
            .field("original", &self.original)
            .field("path", &self.path)
            .field("backend", &self.backend.name())
            .finish()
    }
}

type DataCache = HashMap<PathBuf, Option<Rc<Map<String, Value>>>>;

/// Serves one hierarchy level.
///
/// Files are loaded on first use and kept, keyed by path, for the life of
/// the provider. A missing file is remembered as missing.
pub struct PathBasedDataProvider {
    name: String,
    level: HierarchyLevel,
    datadir: PathBuf,
    backends: Vec<Rc<dyn Backend>>,
    cache: RefCell<DataCache>,
}

impl PathBasedDataProvider {
    pub fn new(level: HierarchyLevel, datadir: PathBuf, backends: Vec<Rc<dyn Backend>>) -> Self {
        Self {
            name: format!("Hierarchy entry \"{}\"", level.category),
            level,
            datadir,
            backends,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn level(&self) -> &HierarchyLevel {
        &self.level
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Whether the level applies to the invocation's scope. The common level
    /// always does; others when their value interpolates to non-empty text.
    pub fn is_active(&self, invocation: &mut Invocation<'_>) -> LookupResult<bool> {
        let Some(ref template) = self.level.value else {
            return Ok(true);
        };
        let value = self.interpolate_template(template, invocation)?;
        Ok(!value.is_empty())
    }

    /// Data files of the level, in path order then backend order.
    pub fn resolve_locations(
        &self,
        invocation: &mut Invocation<'_>,
    ) -> LookupResult<Vec<DataLocation>> {
        let mut locations = Vec::with_capacity(self.level.paths.len() * self.backends.len());
        for original in &self.level.paths {
            let resolved = self.interpolate_template(original, invocation)?;
            if resolved.is_empty() {
                continue;
            }
            for backend in &self.backends {
                let path = self
                    .datadir
                    .join(format!("{}.{}", resolved, backend.path_extension()));
                locations.push(DataLocation {
                    original: original.clone(),
                    path,
                    backend: Rc::clone(backend),
                });
            }
        }
        Ok(locations)
    }

    fn interpolate_template(
        &self,
        template: &str,
        invocation: &mut Invocation<'_>,
    ) -> LookupResult<String> {
        let interpolator = invocation.adapter().interpolator();
        let value = interpolator.interpolate_str(template, invocation, false)?;
        Ok(to_text(&value))
    }

    /// Parsed content of `location`, from the cache when possible.
    pub fn load(&self, location: &DataLocation) -> LookupResult<Option<Rc<Map<String, Value>>>> {
        if let Some(cached) = self.cache.borrow().get(&location.path) {
            debug!(path = %location.path.display(), "data cache hit");
            return Ok(cached.clone());
        }

        debug!(
            path = %location.path.display(),
            backend = location.backend.name(),
            "loading data file"
        );
        let loaded = location
            .backend
            .load(&location.path)
            .map_err(|e| e.into_lookup_error(location.backend.name(), &location.path))?
            .map(Rc::new);
        self.cache
            .borrow_mut()
            .insert(location.path.clone(), loaded.clone());
        Ok(loaded)
    }

    fn lookup_in(
        &self,
        location: &DataLocation,
        key: &str,
        invocation: &mut Invocation<'_>,
    ) -> LookupResult<Option<Value>> {
        let Some(data) = self.load(location)? else {
            invocation.explain(|| "Path not found".to_string());
            return Ok(None);
        };
        let Some(raw) = data.get(key) else {
            invocation.explain(|| format!("No such key: \"{}\"", key));
            return Ok(None);
        };
        let interpolator = invocation.adapter().interpolator();
        let value = interpolator.interpolate(raw, invocation, true)?;
        invocation.explain(|| format!("Found key: \"{}\" value: {}", key, value));
        Ok(Some(value))
    }
}

impl DataProvider for PathBasedDataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(
        &self,
        key: &str,
        invocation: &mut Invocation<'_>,
        merge: &MergeStrategy,
    ) -> LookupResult<Option<Value>> {
        if !self.is_active(invocation)? {
            invocation.explain(|| "Level is not active for this scope".to_string());
            return Ok(None);
        }
        let locations = self.resolve_locations(invocation)?;
        merge.merge_lookup(locations, |location| {
            invocation.branch(
                || format!("Path \"{}\"", location.path.display()),
                |inv| {
                    inv.explain(|| format!("Original path: \"{}\"", location.original));
                    self.lookup_in(&location, key, inv)
                },
            )
        })
    }
}

impl fmt::Debug for PathBasedDataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathBasedDataProvider")
            .field("level", &self.level)
            .field("datadir", &self.datadir)
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}
