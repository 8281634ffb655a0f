//! Loading a descriptor from a root directory.

use super::checker::{Diagnostic, Severity, Validation, validate};
use super::types::{CONFIG_FILE_NAME, Config};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// A config together with what was found while loading it.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: Config,
    pub diagnostics: Vec<Diagnostic>,
    /// The descriptor file, when one exists.
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Fatal)
    }
}

impl Config {
    /// Load the descriptor at `root/hiera.yaml`.
    ///
    /// A missing descriptor silently yields the all-default config. An
    /// unreadable or invalid one yields the default config plus a fatal
    /// diagnostic. Diagnostics are logged and kept in the result.
    pub fn load(root: &Path) -> LoadedConfig {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            debug!(root = %root.display(), "no {} found, using defaults", CONFIG_FILE_NAME);
            return LoadedConfig::default();
        }

        let validation = match read_document(&path) {
            Ok(document) => validate(&document),
            Err(message) => {
                let diagnostic = Diagnostic::new(Severity::Fatal, message);
                Validation {
                    config: None,
                    diagnostics: vec![diagnostic],
                }
            }
        };

        let config = validation.config_or_default();
        let diagnostics: Vec<Diagnostic> = validation
            .diagnostics
            .into_iter()
            .map(|d| d.in_file(&path))
            .collect();

        for diagnostic in &diagnostics {
            match diagnostic.severity {
                Severity::Warning => warn!("{}", diagnostic),
                Severity::Error | Severity::Fatal => error!("{}", diagnostic),
            }
        }
        debug!(
            path = %path.display(),
            version = %config.version,
            levels = config.hierarchy.len(),
            "loaded hierarchy config"
        );

        LoadedConfig {
            config,
            diagnostics,
            path: Some(path),
        }
    }
}

fn read_document(path: &Path) -> Result<Value, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Unable to read configuration: {}", e))?;
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str::<Value>(&content)
        .map_err(|e| format!("Unable to parse configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigVersion;
    use tempfile::TempDir;

    #[test]
    fn test_missing_descriptor_is_silent_default() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load(dir.path());
        assert_eq!(loaded.config, Config::default());
        assert!(loaded.diagnostics.is_empty());
        assert!(loaded.path.is_none());
    }

    #[test]
    fn test_loads_descriptor() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "version: 2\nbackends: [json]\nhierarchy:\n  - [node, '%{certname}', 'nodes/%{certname}']\n  - [common, 'true', common]\n",
        )
        .unwrap();

        let loaded = Config::load(dir.path());
        assert!(loaded.diagnostics.is_empty(), "{:?}", loaded.diagnostics);
        assert_eq!(loaded.config.version, ConfigVersion::V2);
        assert_eq!(loaded.config.backends, vec!["json"]);
        assert_eq!(loaded.config.hierarchy[0].paths, vec!["nodes/%{certname}"]);
    }

    #[test]
    fn test_unparsable_descriptor_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "version: [3\n").unwrap();

        let loaded = Config::load(dir.path());
        assert!(loaded.is_fatal());
        assert_eq!(loaded.config, Config::default());
        assert_eq!(
            loaded.diagnostics[0].file.as_deref(),
            Some(dir.path().join(CONFIG_FILE_NAME).as_path())
        );
    }

    #[test]
    fn test_empty_descriptor_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        assert!(Config::load(dir.path()).is_fatal());
    }
}
