//! Deep merge of nested values.
//!
//! Mappings are merged recursively and sequences are unioned. On conflicting
//! leaves the higher-precedence value wins. A `null` on the higher side means
//! "not specified" and keeps the lower value.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Options for the `deep` strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepMergeOptions {
    /// Prefix marking an entry of the higher value as a deletion of the
    /// matching entry in the lower value.
    pub knockout_prefix: Option<String>,
    /// Merge mappings found at the same position of two sequences instead of
    /// appending them.
    pub merge_hash_arrays: bool,
    /// Sort sequences after they have been merged.
    pub sort_merged_arrays: bool,
}

impl DeepMergeOptions {
    fn knockout(&self) -> Option<&str> {
        self.knockout_prefix.as_deref().filter(|p| !p.is_empty())
    }
}

/// Deep merge `higher` into `lower`.
///
/// Knockout markers remain in the result; see [`strip_knockouts`].
///
/// # Example
/// ```
/// use serde_json::json;
/// use hiera_lookup::merge::{DeepMergeOptions, deep_merge};
///
/// let higher = json!({"server": {"port": 9000}, "features": ["c"]});
/// let lower = json!({"server": {"port": 8080, "host": "localhost"}, "features": ["a"]});
/// let result = deep_merge(higher, lower, &DeepMergeOptions::default());
/// assert_eq!(
///     result,
///     json!({"server": {"port": 9000, "host": "localhost"}, "features": ["c", "a"]})
/// );
/// ```
pub fn deep_merge(higher: Value, lower: Value, options: &DeepMergeOptions) -> Value {
    match (higher, lower) {
        (Value::Object(higher_map), Value::Object(lower_map)) => {
            Value::Object(merge_maps(higher_map, lower_map, options))
        }
        (Value::Array(higher_items), Value::Array(lower_items)) => {
            Value::Array(merge_arrays(higher_items, lower_items, options))
        }
        (Value::Null, lower) => lower,
        (higher, _) => higher,
    }
}

fn merge_maps(
    higher: Map<String, Value>,
    mut lower: Map<String, Value>,
    options: &DeepMergeOptions,
) -> Map<String, Value> {
    let knockout = options.knockout();
    let mut result = Map::new();

    // Markers stay in the result until `strip_knockouts`.
    for (key, higher_value) in higher {
        if let Some(prefix) = knockout {
            if let Some(target) = key.strip_prefix(prefix) {
                lower.remove(target);
                result.insert(key, higher_value);
                continue;
            }
            if higher_value.as_str() == Some(prefix) {
                lower.remove(&key);
                result.insert(key, higher_value);
                continue;
            }
        }
        let merged = match lower.remove(&key) {
            Some(lower_value) => deep_merge(higher_value, lower_value, options),
            None => higher_value,
        };
        result.insert(key, merged);
    }

    for (key, lower_value) in lower {
        if !result.contains_key(&key) {
            result.insert(key, lower_value);
        }
    }
    result
}

fn merge_arrays(higher: Vec<Value>, lower: Vec<Value>, options: &DeepMergeOptions) -> Vec<Value> {
    if options.merge_hash_arrays
        && !higher.is_empty()
        && !lower.is_empty()
        && higher.iter().chain(lower.iter()).all(Value::is_object)
    {
        let mut merged = Vec::with_capacity(higher.len().max(lower.len()));
        let mut lower_iter = lower.into_iter();
        for higher_value in higher {
            match lower_iter.next() {
                Some(lower_value) => merged.push(deep_merge(higher_value, lower_value, options)),
                None => merged.push(higher_value),
            }
        }
        merged.extend(lower_iter);
        return merged;
    }

    let mut lower = lower;
    let mut merged: Vec<Value> = Vec::with_capacity(higher.len() + lower.len());
    for item in higher {
        if let Some(prefix) = options.knockout()
            && let Some(text) = item.as_str()
        {
            if text == prefix {
                lower.clear();
            } else if let Some(target) = text.strip_prefix(prefix) {
                lower.retain(|v| v.as_str() != Some(target));
            }
        }
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    for item in lower {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }

    if options.sort_merged_arrays {
        merged.sort_by(compare_values);
    }
    merged
}

/// Remove knockout markers once nothing is left to merge.
pub fn strip_knockouts(value: Value, options: &DeepMergeOptions) -> Value {
    let Some(prefix) = options.knockout() else {
        return value;
    };
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, v)| !k.starts_with(prefix) && v.as_str() != Some(prefix))
                .map(|(k, v)| (k, strip_knockouts(v, options)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.as_str().is_some_and(|s| s.starts_with(prefix)))
                .map(|v| strip_knockouts(v, options))
                .collect(),
        ),
        other => other,
    }
}

/// Total order used by `sort_merged_arrays`: numbers numerically, strings
/// lexically, numbers before strings, everything else by its JSON text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), Value::String(_)) => Ordering::Less,
        (Value::String(_), Value::Number(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}
