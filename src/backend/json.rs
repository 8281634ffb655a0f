use super::{Backend, BackendError};
use serde_json::Value;

/// JSON data files (`.json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBackend;

impl Backend for JsonBackend {
    fn name(&self) -> &str {
        "json"
    }

    fn path_extension(&self) -> &str {
        "json"
    }

    fn parse(&self, text: &str) -> Result<Value, BackendError> {
        serde_json::from_str(text).map_err(|e| BackendError::Parse(e.to_string()))
    }
}
