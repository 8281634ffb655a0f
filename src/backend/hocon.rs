//! HOCON data files (`.hocon`).

use super::{Backend, BackendError};
use ::hocon::{Hocon, HoconLoader};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct HoconBackend;

impl Backend for HoconBackend {
    fn name(&self) -> &str {
        "hocon"
    }

    fn path_extension(&self) -> &str {
        "hocon"
    }

    fn parse(&self, text: &str) -> Result<Value, BackendError> {
        let document = HoconLoader::new()
            .load_str(text)
            .and_then(|loader| loader.hocon())
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        to_value(document)
    }
}

/// Convert a resolved HOCON document. Object keys come out sorted since the
/// parser does not keep their order.
fn to_value(document: Hocon) -> Result<Value, BackendError> {
    Ok(match document {
        Hocon::Null => Value::Null,
        Hocon::Boolean(b) => Value::Bool(b),
        Hocon::Integer(i) => Value::Number(i.into()),
        Hocon::Real(f) => Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| BackendError::Parse(format!("{} is not a finite number", f)))?,
        Hocon::String(s) => Value::String(s),
        Hocon::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Hocon::Hash(entries) => {
            let sorted: BTreeMap<String, Hocon> = entries.into_iter().collect();
            let mut map = Map::with_capacity(sorted.len());
            for (key, value) in sorted {
                map.insert(key, to_value(value)?);
            }
            Value::Object(map)
        }
        Hocon::BadValue(err) => return Err(BackendError::Parse(err.to_string())),
    })
}
