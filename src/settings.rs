//! Settings of the lookup tool.
//!
//! Settings come from up to three YAML files merged field by field, lowest
//! precedence first:
//! 1. **User** - `<config dir>/hiera-lookup/config.yaml`
//! 2. **Project** - `./hiera-lookup.yaml`, or an explicit file given on the
//!    command line
//! 3. **Environment variables**
//!
//! ## Environment Variables
//! - `HIERA_LOOKUP_ENVIRONMENT` - Environment root directory (default: `.`)
//! - `HIERA_LOOKUP_ENVIRONMENT_NAME` - Environment name (default: `production`)
//! - `HIERA_LOOKUP_MODULE_PATH` - Module directory relative to the root (default: `modules`)
//! - `HIERA_LOOKUP_STRICT_VARIABLES` - Fail on undefined variables (default: `false`)
//! - `HIERA_LOOKUP_MAX_DEPTH` - Bound on nested lookups (default: `64`)

use crate::adapter::DEFAULT_MAX_DEPTH;
use crate::environment::DEFAULT_MODULE_PATH;
use crate::merge::{DeepMergeOptions, deep_merge};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Project settings file name.
pub const SETTINGS_FILE_NAME: &str = "hiera-lookup.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory of the environment.
    #[serde(default = "default_environment")]
    pub environment: PathBuf,

    #[serde(default = "default_environment_name")]
    pub environment_name: String,

    /// Module directory, relative to the environment root.
    #[serde(default = "default_module_path")]
    pub module_path: PathBuf,

    /// Treat undefined interpolation variables as errors.
    #[serde(default)]
    pub strict_variables: bool,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            environment_name: default_environment_name(),
            module_path: default_module_path(),
            strict_variables: false,
            max_depth: default_max_depth(),
        }
    }
}

fn default_environment() -> PathBuf {
    PathBuf::from(".")
}

fn default_environment_name() -> String {
    "production".to_string()
}

fn default_module_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODULE_PATH)
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Settings files to read.
#[derive(Debug, Clone, Default)]
pub struct SettingsPaths {
    pub user: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl SettingsPaths {
    /// The standard locations. `explicit` replaces the project file.
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            user: dirs::config_dir().map(|dir| dir.join("hiera-lookup").join("config.yaml")),
            project: Some(
                explicit
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME)),
            ),
        }
    }
}

impl Settings {
    /// Load settings from the standard locations and the process environment.
    ///
    /// An explicit settings file must exist; the standard files are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit
            && !path.is_file()
        {
            bail!("Settings file not found: {}", path.display());
        }
        let mut settings = Self::load_from(&SettingsPaths::discover(explicit))?;
        settings.apply_env(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Merge the files in `paths` over the defaults.
    pub fn load_from(paths: &SettingsPaths) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        for path in [&paths.user, &paths.project].into_iter().flatten() {
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let layer: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            if layer.is_null() {
                continue;
            }
            debug!(path = %path.display(), "applying settings file");
            merged = deep_merge(layer, merged, &DeepMergeOptions::default());
        }
        serde_json::from_value(merged).context("Invalid settings")
    }

    /// Apply `HIERA_LOOKUP_*` overrides read through `var`. Unparsable
    /// values are ignored with a warning.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(environment) = var("HIERA_LOOKUP_ENVIRONMENT") {
            self.environment = PathBuf::from(environment);
        }
        if let Some(name) = var("HIERA_LOOKUP_ENVIRONMENT_NAME") {
            self.environment_name = name;
        }
        if let Some(module_path) = var("HIERA_LOOKUP_MODULE_PATH") {
            self.module_path = PathBuf::from(module_path);
        }
        if let Some(strict) = var("HIERA_LOOKUP_STRICT_VARIABLES") {
            match strict.trim().parse() {
                Ok(strict) => self.strict_variables = strict,
                Err(_) => warn!(value = %strict, "ignoring invalid HIERA_LOOKUP_STRICT_VARIABLES"),
            }
        }
        if let Some(depth) = var("HIERA_LOOKUP_MAX_DEPTH") {
            match depth.trim().parse() {
                Ok(depth) => self.max_depth = depth,
                Err(_) => warn!(value = %depth, "ignoring invalid HIERA_LOOKUP_MAX_DEPTH"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(&SettingsPaths::default()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.environment_name, "production");
        assert_eq!(settings.max_depth, 64);
    }

    #[test]
    fn test_project_overrides_user_field_by_field() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.yaml");
        let project = dir.path().join("project.yaml");
        fs::write(&user, "environment_name: staging\nmax_depth: 10\n").unwrap();
        fs::write(&project, "max_depth: 20\nstrict_variables: true\n").unwrap();

        let settings = Settings::load_from(&SettingsPaths {
            user: Some(user),
            project: Some(project),
        })
        .unwrap();
        assert_eq!(settings.environment_name, "staging");
        assert_eq!(settings.max_depth, 20);
        assert!(settings.strict_variables);
        assert_eq!(settings.module_path, PathBuf::from("modules"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project.yaml");
        fs::write(&project, "max_depth: lots\n").unwrap();
        let result = Settings::load_from(&SettingsPaths {
            user: None,
            project: Some(project),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(Settings::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HIERA_LOOKUP_ENVIRONMENT", "/srv/env"),
            ("HIERA_LOOKUP_STRICT_VARIABLES", "true"),
            ("HIERA_LOOKUP_MAX_DEPTH", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(settings.environment, PathBuf::from("/srv/env"));
        assert!(settings.strict_variables);
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
    }
}
