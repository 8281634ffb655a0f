use super::{Backend, BackendError};
use serde_json::Value;

/// YAML data files (`.yaml`).
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlBackend;

impl Backend for YamlBackend {
    fn name(&self) -> &str {
        "yaml"
    }

    fn path_extension(&self) -> &str {
        "yaml"
    }

    fn parse(&self, text: &str) -> Result<Value, BackendError> {
        serde_yaml::from_str(text).map_err(|e| BackendError::Parse(e.to_string()))
    }
}
