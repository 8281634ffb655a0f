//! Per-key lookup metadata stored under the reserved `lookup_options` key.
//!
//! ```yaml
//! lookup_options:
//!   ntp::servers:
//!     merge: unique
//!   "^profile::.*::users$":
//!     merge:
//!       strategy: deep
//!       knockout_prefix: "--"
//! ```
//!
//! Keys starting with `^` are regular expressions matched against the root
//! key when no exact entry exists.

use crate::error::{LookupError, LookupResult};
use crate::key::{LOOKUP_OPTIONS, NAMESPACE_SEPARATOR, type_name};
use crate::merge::MergeStrategy;
use regex_lite::Regex;
use serde_json::{Map, Value};

const PATTERN_START: char = '^';
const MERGE: &str = "merge";

/// Compiled `lookup_options` table.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    exact: Map<String, Value>,
    patterns: Vec<(Regex, Value)>,
}

impl LookupOptions {
    /// Compile a validated options mapping.
    pub fn compile(options: Map<String, Value>) -> LookupResult<Self> {
        let mut compiled = Self::default();
        for (key, value) in options {
            if key.starts_with(PATTERN_START) {
                let regex = Regex::new(&key).map_err(|e| {
                    LookupError::invalid_lookup_options(format!(
                        "Invalid pattern '{}' in {}: {}",
                        key, LOOKUP_OPTIONS, e
                    ))
                })?;
                compiled.patterns.push((regex, value));
            } else {
                compiled.exact.insert(key, value);
            }
        }
        Ok(compiled)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }

    /// Options for `root`: the exact entry, else the first matching pattern.
    pub fn for_key(&self, root: &str) -> Option<&Value> {
        self.exact.get(root).or_else(|| {
            self.patterns
                .iter()
                .find(|(regex, _)| regex.is_match(root))
                .map(|(_, value)| value)
        })
    }

    /// Merge strategy configured for `root`, if any.
    pub fn merge_strategy(&self, root: &str) -> LookupResult<Option<MergeStrategy>> {
        match self.for_key(root).and_then(|options| options.get(MERGE)) {
            None | Some(Value::Null) => Ok(None),
            Some(merge) => MergeStrategy::from_value(merge)
                .map(Some)
                .map_err(|e| e.with_key(root)),
        }
    }
}

/// Check a `lookup_options` value found in data.
///
/// The value must be a mapping from key to a mapping of options. In a module
/// every key must belong to the module: `<module>::...`, or `^<module>::...`
/// for patterns.
pub fn validate(value: Value, module: Option<&str>) -> LookupResult<Map<String, Value>> {
    let options = match value {
        Value::Object(options) => options,
        Value::Null => return Ok(Map::new()),
        other => {
            return Err(LookupError::invalid_lookup_options(format!(
                "value of {} must be a Hash, got {}",
                LOOKUP_OPTIONS,
                type_name(&other)
            )));
        }
    };

    for (key, entry) in &options {
        if let Some(module) = module {
            let prefix = format!("{}{}", module, NAMESPACE_SEPARATOR);
            let owned = key
                .strip_prefix(PATTERN_START)
                .unwrap_or(key)
                .starts_with(&prefix);
            if !owned {
                return Err(LookupError::invalid_lookup_options(format!(
                    "all {} patterns must match a key starting with module name '{}', got '{}'",
                    LOOKUP_OPTIONS, module, key
                ))
                .with_key(key.as_str()));
            }
        }
        if !entry.is_object() {
            return Err(LookupError::invalid_lookup_options(format!(
                "{} for '{}' must be a Hash, got {}",
                LOOKUP_OPTIONS,
                key,
                type_name(entry)
            ))
            .with_key(key.as_str()));
        }
    }
    Ok(options)
}

/// Combine environment and module options; module entries replace
/// environment entries for the same key.
pub fn combine(environment: &Map<String, Value>, module: Map<String, Value>) -> Map<String, Value> {
    let mut combined = environment.clone();
    for (key, value) in module {
        combined.insert(key, value);
    }
    combined
}
