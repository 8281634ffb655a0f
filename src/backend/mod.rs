//! Data file backends.
//!
//! A backend turns the file at a resolved hierarchy path into a mapping.
//! Backends are found by name in a [`BackendRegistry`]; the built-in ones are
//! `yaml`, `json` and `hocon`.

mod hocon;
mod json;
mod yaml;

pub use self::hocon::HoconBackend;
pub use self::json::JsonBackend;
pub use self::yaml::YamlBackend;

use crate::error::LookupError;
use crate::key::type_name;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Failure of a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Parse(String),
}

impl BackendError {
    /// Convert into a lookup error naming the backend and the file.
    pub fn into_lookup_error(self, backend: &str, path: &Path) -> LookupError {
        match self {
            BackendError::Io(err) => LookupError::backend_failed(backend, path, err),
            BackendError::Parse(reason) => LookupError::malformed(path, reason),
        }
    }
}

/// A format-specific loader.
pub trait Backend {
    fn name(&self) -> &str;

    /// File extension, without the dot, of files this backend reads.
    fn path_extension(&self) -> &str;

    /// Parse the text of one data file.
    fn parse(&self, text: &str) -> Result<Value, BackendError>;

    /// Load the mapping stored at `path`.
    ///
    /// A missing file is `Ok(None)`. An empty file, or one whose top level is
    /// null, is an empty mapping. Any other non-mapping top level is a parse
    /// error.
    fn load(&self, path: &Path) -> Result<Option<Map<String, Value>>, BackendError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Some(Map::new()));
        }
        match self.parse(&text)? {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(Some(Map::new())),
            other => Err(BackendError::Parse(format!(
                "the top level must be a Hash, got {}",
                type_name(&other)
            ))),
        }
    }
}

/// Backends by name.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Rc<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// A registry without any backend.
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// A registry holding the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Rc::new(YamlBackend));
        registry.register(Rc::new(JsonBackend));
        registry.register(Rc::new(HoconBackend));
        registry
    }

    /// Add or replace a backend under its own name.
    pub fn register(&mut self, backend: Rc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Backend>> {
        self.backends.get(name).cloned()
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
