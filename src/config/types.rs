//! Hierarchy descriptor types.

use serde::Serialize;
use std::fmt;

/// Name of the descriptor file at an environment or module root.
pub const CONFIG_FILE_NAME: &str = "hiera.yaml";

/// Data directory used when neither the config nor a level names one.
pub const DEFAULT_DATADIR: &str = "data";

/// The category that is always active.
pub const COMMON_CATEGORY: &str = "common";

/// Backends used when the config does not name any.
pub const DEFAULT_BACKENDS: [&str; 2] = ["yaml", "json"];

/// Supported descriptor schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum ConfigVersion {
    /// Levels are `[category, value, path]` tuples.
    V2,
    /// Levels are mappings, or a bare list of paths.
    V3,
}

impl ConfigVersion {
    pub fn number(self) -> u8 {
        match self {
            ConfigVersion::V2 => 2,
            ConfigVersion::V3 => 3,
        }
    }

    /// The supported version closest to `version`.
    pub fn nearest(version: i64) -> Self {
        if version <= 2 {
            ConfigVersion::V2
        } else {
            ConfigVersion::V3
        }
    }
}

impl From<ConfigVersion> for u8 {
    fn from(version: ConfigVersion) -> u8 {
        version.number()
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// One level of a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyLevel {
    pub category: String,
    /// Template deciding whether the level is active. Always `None` for the
    /// common category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Path templates, relative to the data directory, without extension.
    pub paths: Vec<String>,
    /// Overrides the config's data directory for this level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datadir: Option<String>,
}

impl HierarchyLevel {
    /// The always-active `common` level.
    pub fn common(paths: Vec<String>) -> Self {
        Self {
            category: COMMON_CATEGORY.to_string(),
            value: None,
            paths,
            datadir: None,
        }
    }

    /// A conditional level. `paths` defaults to the value template.
    pub fn new(category: impl Into<String>, value: impl Into<String>, paths: Vec<String>) -> Self {
        let value = value.into();
        let paths = if paths.is_empty() {
            vec![value.clone()]
        } else {
            paths
        };
        Self {
            category: category.into(),
            value: Some(value),
            paths,
            datadir: None,
        }
    }

    pub fn with_datadir(mut self, datadir: impl Into<String>) -> Self {
        self.datadir = Some(datadir.into());
        self
    }

    pub fn is_common(&self) -> bool {
        self.category == COMMON_CATEGORY
    }
}

/// A validated hierarchy descriptor. The hierarchy is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub version: ConfigVersion,
    pub datadir: String,
    pub hierarchy: Vec<HierarchyLevel>,
    pub backends: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_for(ConfigVersion::V3)
    }
}

impl Config {
    /// The all-default config of a schema version.
    pub fn default_for(version: ConfigVersion) -> Self {
        Self {
            version,
            datadir: DEFAULT_DATADIR.to_string(),
            hierarchy: Self::default_hierarchy(version),
            backends: Self::default_backends(),
        }
    }

    /// Hierarchy substituted when a descriptor has none.
    pub fn default_hierarchy(version: ConfigVersion) -> Vec<HierarchyLevel> {
        match version {
            ConfigVersion::V2 => vec![
                HierarchyLevel::new("osfamily", "%{osfamily}", vec!["%{osfamily}".to_string()]),
                HierarchyLevel::common(vec![COMMON_CATEGORY.to_string()]),
            ],
            ConfigVersion::V3 => vec![HierarchyLevel::common(vec![COMMON_CATEGORY.to_string()])],
        }
    }

    pub fn default_backends() -> Vec<String> {
        DEFAULT_BACKENDS.iter().map(|b| b.to_string()).collect()
    }

    /// Data directory of `level`, relative to the config root.
    pub fn datadir_of<'a>(&'a self, level: &'a HierarchyLevel) -> &'a str {
        level.datadir.as_deref().unwrap_or(&self.datadir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_version_3() {
        let config = Config::default();
        assert_eq!(config.version, ConfigVersion::V3);
        assert_eq!(config.datadir, "data");
        assert_eq!(config.backends, vec!["yaml", "json"]);
        assert_eq!(config.hierarchy.len(), 1);
        assert!(config.hierarchy[0].is_common());
        assert_eq!(config.hierarchy[0].paths, vec!["common"]);
    }

    #[test]
    fn test_default_v2_hierarchy() {
        let config = Config::default_for(ConfigVersion::V2);
        let categories: Vec<&str> = config.hierarchy.iter().map(|l| l.category.as_str()).collect();
        assert_eq!(categories, vec!["osfamily", "common"]);
        assert_eq!(config.hierarchy[0].value.as_deref(), Some("%{osfamily}"));
        assert_eq!(config.hierarchy[0].paths, vec!["%{osfamily}"]);
    }

    #[test]
    fn test_level_paths_default_to_value() {
        let level = HierarchyLevel::new("node", "%{certname}", Vec::new()).with_datadir("nodes");
        assert_eq!(level.paths, vec!["%{certname}"]);

        let config = Config::default();
        assert_eq!(config.datadir_of(&level), "nodes");
        assert_eq!(config.datadir_of(&config.hierarchy[0]), "data");
    }

    #[test]
    fn test_version_serializes_as_number() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["version"], 3);
    }
}
