//! Merge strategies applied to the values found for one key.
//!
//! Values are always combined in precedence order: the first producer (global
//! before environment before module, earlier hierarchy levels before later
//! ones) has the highest precedence.
//!
//! - `first`: the first value found wins; later producers are not consulted
//! - `unique`: sequences are concatenated, duplicates removed, first seen order kept
//! - `hash`: mappings are merged shallowly, higher precedence keys win
//! - `deep`: mappings are merged recursively and sequences unioned

mod deep;

pub use deep::{DeepMergeOptions, deep_merge, strip_knockouts};

use crate::error::{ErrorCode, LookupError, LookupResult};
use crate::key::type_name;
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// A merge strategy with its options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    #[default]
    First,
    Unique,
    Hash,
    Deep(DeepMergeOptions),
}

impl MergeStrategy {
    /// All strategy names accepted by [`MergeStrategy::from_name`].
    pub const NAMES: [&'static str; 4] = ["first", "unique", "hash", "deep"];

    /// Strategy for a bare name. `native` and `array` are legacy aliases.
    pub fn from_name(name: &str) -> LookupResult<Self> {
        match name {
            "first" | "native" => Ok(MergeStrategy::First),
            "unique" | "array" => Ok(MergeStrategy::Unique),
            "hash" => Ok(MergeStrategy::Hash),
            "deep" => Ok(MergeStrategy::Deep(DeepMergeOptions::default())),
            other => Err(LookupError::invalid_merge(format!(
                "Unknown merge strategy: '{}'",
                other
            ))),
        }
    }

    /// Strategy from a `merge` value: either a name or a mapping with a
    /// `strategy` entry and strategy options.
    pub fn from_value(value: &Value) -> LookupResult<Self> {
        match value {
            Value::String(name) => Self::from_name(name),
            Value::Object(options) => Self::from_options(options),
            other => Err(LookupError::invalid_merge(format!(
                "A merge must be a strategy name or a hash, got {}",
                type_name(other)
            ))),
        }
    }

    fn from_options(options: &Map<String, Value>) -> LookupResult<Self> {
        let name = options
            .get("strategy")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                LookupError::invalid_merge(
                    "The hash given as 'merge' must contain the name of a strategy in string form for the key 'strategy'",
                )
            })?;
        let mut strategy = Self::from_name(name)?;

        for (option, value) in options {
            match (&mut strategy, option.as_str()) {
                (_, "strategy") => {}
                (MergeStrategy::Deep(deep), "knockout_prefix") => {
                    let prefix = value.as_str().filter(|p| !p.is_empty()).ok_or_else(|| {
                        LookupError::invalid_merge("knockout_prefix must be a non-empty string")
                    })?;
                    deep.knockout_prefix = Some(prefix.to_string());
                }
                (MergeStrategy::Deep(deep), "merge_hash_arrays") => {
                    deep.merge_hash_arrays = expect_bool(option, value)?;
                }
                (MergeStrategy::Deep(deep), "sort_merged_arrays") => {
                    deep.sort_merged_arrays = expect_bool(option, value)?;
                }
                // Accepted for compatibility; debugging output goes through explain.
                (MergeStrategy::Deep(_), "merge_debug") => {
                    expect_bool(option, value)?;
                }
                (_, other) => {
                    return Err(LookupError::invalid_merge(format!(
                        "Unknown option '{}' for merge strategy '{}'",
                        other, name
                    )));
                }
            }
        }
        Ok(strategy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MergeStrategy::First => "first",
            MergeStrategy::Unique => "unique",
            MergeStrategy::Hash => "hash",
            MergeStrategy::Deep(_) => "deep",
        }
    }

    /// The strategy in the form it is written in `lookup_options`.
    pub fn configuration(&self) -> Value {
        match self {
            MergeStrategy::Deep(options) if *options != DeepMergeOptions::default() => {
                let mut config = Map::new();
                config.insert("strategy".into(), json!("deep"));
                if let Some(ref prefix) = options.knockout_prefix {
                    config.insert("knockout_prefix".into(), json!(prefix));
                }
                if options.merge_hash_arrays {
                    config.insert("merge_hash_arrays".into(), json!(true));
                }
                if options.sort_merged_arrays {
                    config.insert("sort_merged_arrays".into(), json!(true));
                }
                Value::Object(config)
            }
            other => json!(other.name()),
        }
    }

    /// Combine the results of `variants`, in order, using this strategy.
    ///
    /// `produce` returns `Ok(None)` when a variant has nothing for the key.
    /// Errors are not absorbed: the first error ends the whole lookup. With
    /// `first`, variants after the first hit are never produced.
    pub fn merge_lookup<T, F>(
        &self,
        variants: impl IntoIterator<Item = T>,
        mut produce: F,
    ) -> LookupResult<Option<Value>>
    where
        F: FnMut(T) -> LookupResult<Option<Value>>,
    {
        let mut merged: Option<Value> = None;
        for variant in variants {
            let Some(value) = produce(variant)? else {
                continue;
            };
            if *self == MergeStrategy::First {
                return Ok(Some(value));
            }
            merged = Some(match merged {
                None => self.convert_value(value)?,
                Some(acc) => self.merge(acc, value)?,
            });
        }
        Ok(merged)
    }

    /// Merge two already produced values; `higher` has precedence.
    pub fn merge(&self, higher: Value, lower: Value) -> LookupResult<Value> {
        match self {
            MergeStrategy::First => Ok(higher),
            MergeStrategy::Unique => {
                let mut items = self.unique_items(higher)?;
                for item in self.unique_items(lower)? {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                Ok(Value::Array(items))
            }
            MergeStrategy::Hash => {
                let mut merged = self.expect_hash(higher)?;
                for (key, value) in self.expect_hash(lower)? {
                    merged.entry(key).or_insert(value);
                }
                Ok(Value::Object(merged))
            }
            MergeStrategy::Deep(options) => {
                let higher = self.expect_container(higher)?;
                let lower = self.expect_container(lower)?;
                Ok(deep_merge(higher, lower, options))
            }
        }
    }

    /// Normalize a single value as if it had been merged with nothing.
    fn convert_value(&self, value: Value) -> LookupResult<Value> {
        match self {
            MergeStrategy::First => Ok(value),
            MergeStrategy::Unique => Ok(Value::Array(self.unique_items(value)?)),
            MergeStrategy::Hash => Ok(Value::Object(self.expect_hash(value)?)),
            MergeStrategy::Deep(_) => self.expect_container(value),
        }
    }

    /// Final form of a merged result. Knockout markers stay in place while
    /// values are still being merged and are removed here.
    pub fn finish(&self, value: Value) -> Value {
        match self {
            MergeStrategy::Deep(options) => strip_knockouts(value, options),
            _ => value,
        }
    }

    fn unique_items(&self, value: Value) -> LookupResult<Vec<Value>> {
        let Value::Array(items) = value else {
            return Err(self.type_error("Array", &value));
        };
        let mut flat = Vec::with_capacity(items.len());
        flatten_into(items, &mut flat);
        let mut unique: Vec<Value> = Vec::with_capacity(flat.len());
        for item in flat {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Ok(unique)
    }

    fn expect_hash(&self, value: Value) -> LookupResult<Map<String, Value>> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(self.type_error("Hash", &other)),
        }
    }

    fn expect_container(&self, value: Value) -> LookupResult<Value> {
        match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            other => Err(self.type_error("Hash or Array", &other)),
        }
    }

    fn type_error(&self, expected: &str, found: &Value) -> LookupError {
        LookupError::new(
            ErrorCode::TypeMismatch,
            format!(
                "The '{}' merge strategy requires {} values, got {}",
                self.name(),
                expected,
                type_name(found)
            ),
        )
    }
}

fn flatten_into(items: Vec<Value>, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(nested) => flatten_into(nested, out),
            other => out.push(other),
        }
    }
}

fn expect_bool(option: &str, value: &Value) -> LookupResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| LookupError::invalid_merge(format!("{} must be a boolean", option)))
}

impl FromStr for MergeStrategy {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.configuration())
    }
}
