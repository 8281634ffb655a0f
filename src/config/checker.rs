//! Validation of hierarchy descriptors.
//!
//! [`validate`] never fails. It returns the config it could build together
//! with every diagnostic found; the caller decides what to escalate. A fatal
//! diagnostic means no config was built from the document.

use super::types::{COMMON_CATEGORY, Config, ConfigVersion, HierarchyLevel};
use crate::key::type_name;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        write!(f, "{}", s)
    }
}

/// One finding about a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Where in the document, e.g. `hierarchy[1].paths`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
            file: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        match (&self.file, &self.location) {
            (Some(file), Some(location)) => write!(f, " ({}, {})", file.display(), location),
            (Some(file), None) => write!(f, " ({})", file.display()),
            (None, Some(location)) => write!(f, " ({})", location),
            (None, None) => Ok(()),
        }
    }
}

/// Result of validating one document.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    /// `None` when a fatal diagnostic was found.
    pub config: Option<Config>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Validation {
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Fatal)
    }

    /// The built config, or the all-default one after a fatal diagnostic.
    pub fn config_or_default(&self) -> Config {
        self.config.clone().unwrap_or_default()
    }

    fn fatal(message: impl Into<String>, location: Option<&str>) -> Self {
        let mut diagnostic = Diagnostic::new(Severity::Fatal, message);
        if let Some(location) = location {
            diagnostic = diagnostic.at(location);
        }
        Self {
            config: None,
            diagnostics: vec![diagnostic],
        }
    }
}

/// Validate a parsed descriptor document.
pub fn validate(document: &Value) -> Validation {
    let Value::Object(doc) = document else {
        return Validation::fatal(
            format!(
                "The configuration must be a Hash, got {}",
                type_name(document)
            ),
            None,
        );
    };

    let version = match doc.get("version") {
        None => return Validation::fatal("The configuration is missing a version", None),
        Some(version) => version,
    };

    let mut diagnostics = Vec::new();
    let checker = match version.as_i64() {
        Some(2) => ConfigChecker::V2,
        Some(3) => ConfigChecker::V3,
        number => {
            // Non-integer versions are validated against the newest schema.
            let nearest = number.map_or(ConfigVersion::V3, ConfigVersion::nearest);
            diagnostics.push(
                Diagnostic::new(
                    Severity::Warning,
                    format!(
                        "Incompatible version {}, validating as version {}",
                        version, nearest
                    ),
                )
                .at("version"),
            );
            ConfigChecker::for_version(nearest)
        }
    };

    let config = checker.check(doc, &mut diagnostics);
    Validation {
        config: Some(config),
        diagnostics,
    }
}

/// Field-level checks for one schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChecker {
    V2,
    V3,
}

const TOP_LEVEL_KEYS: [&str; 4] = ["version", "datadir", "hierarchy", "backends"];
const LEVEL_KEYS: [&str; 5] = ["category", "value", "path", "paths", "datadir"];

impl ConfigChecker {
    pub fn for_version(version: ConfigVersion) -> Self {
        match version {
            ConfigVersion::V2 => ConfigChecker::V2,
            ConfigVersion::V3 => ConfigChecker::V3,
        }
    }

    pub fn version(self) -> ConfigVersion {
        match self {
            ConfigChecker::V2 => ConfigVersion::V2,
            ConfigChecker::V3 => ConfigVersion::V3,
        }
    }

    /// Build a config from `doc`, adding a diagnostic for every problem.
    fn check(self, doc: &Map<String, Value>, diagnostics: &mut Vec<Diagnostic>) -> Config {
        let mut config = Config::default_for(self.version());

        for key in doc.keys() {
            if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
                diagnostics.push(
                    Diagnostic::new(Severity::Warning, format!("Unknown key '{}'", key)).at(key.as_str()),
                );
            }
        }

        if let Some(datadir) = doc.get("datadir") {
            match non_empty_string(datadir) {
                Some(datadir) => config.datadir = datadir.to_string(),
                None => diagnostics.push(
                    Diagnostic::new(Severity::Error, "datadir must be a non-empty String")
                        .at("datadir"),
                ),
            }
        }

        if let Some(backends) = doc.get("backends") {
            match string_list(backends) {
                Some(list) => config.backends = list,
                None => diagnostics.push(
                    Diagnostic::new(
                        Severity::Error,
                        "backends must be a non-empty Array of non-empty Strings",
                    )
                    .at("backends"),
                ),
            }
        }

        if let Some(hierarchy) = doc.get("hierarchy") {
            let levels = match hierarchy {
                Value::Array(items) if !items.is_empty() => match self {
                    ConfigChecker::V2 => check_v2_levels(items, diagnostics),
                    ConfigChecker::V3 => check_v3_levels(items, diagnostics),
                },
                _ => {
                    diagnostics.push(
                        Diagnostic::new(Severity::Error, "hierarchy must be a non-empty Array")
                            .at("hierarchy"),
                    );
                    Vec::new()
                }
            };
            if levels.is_empty() {
                diagnostics.push(
                    Diagnostic::new(
                        Severity::Warning,
                        "No usable hierarchy levels, using the default hierarchy",
                    )
                    .at("hierarchy"),
                );
            } else {
                config.hierarchy = levels;
            }
        }

        config
    }
}

fn check_v2_levels(items: &[Value], diagnostics: &mut Vec<Diagnostic>) -> Vec<HierarchyLevel> {
    let mut levels: Vec<HierarchyLevel> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let location = format!("hierarchy[{}]", index);
        let tuple: Option<Vec<&str>> = match item {
            Value::Array(parts) if parts.len() == 3 => {
                parts.iter().map(non_empty_string).collect()
            }
            _ => None,
        };
        let Some(tuple) = tuple else {
            diagnostics.push(
                Diagnostic::new(
                    Severity::Error,
                    "A hierarchy level must be an Array of three non-empty Strings: [category, value, path]",
                )
                .at(location),
            );
            continue;
        };
        let (category, value, path) = (tuple[0], tuple[1], tuple[2]);
        let level = if category == COMMON_CATEGORY {
            HierarchyLevel::common(vec![path.to_string()])
        } else {
            HierarchyLevel::new(category, value, vec![path.to_string()])
        };
        push_unique(&mut levels, level, location, diagnostics);
    }
    levels
}

fn check_v3_levels(items: &[Value], diagnostics: &mut Vec<Diagnostic>) -> Vec<HierarchyLevel> {
    // A bare list of paths is one common level.
    if items.iter().all(Value::is_string) {
        let mut paths = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match non_empty_string(item) {
                Some(path) => paths.push(path.to_string()),
                None => diagnostics.push(
                    Diagnostic::new(Severity::Error, "A hierarchy path must be a non-empty String")
                        .at(format!("hierarchy[{}]", index)),
                ),
            }
        }
        if paths.is_empty() {
            return Vec::new();
        }
        return vec![HierarchyLevel::common(paths)];
    }

    let mut levels: Vec<HierarchyLevel> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let location = format!("hierarchy[{}]", index);
        let Value::Object(entry) = item else {
            diagnostics.push(
                Diagnostic::new(
                    Severity::Error,
                    format!("A hierarchy level must be a Hash, got {}", type_name(item)),
                )
                .at(location),
            );
            continue;
        };
        if let Some(level) = check_v3_level(entry, &location, diagnostics) {
            push_unique(&mut levels, level, location, diagnostics);
        }
    }
    levels
}

fn check_v3_level(
    entry: &Map<String, Value>,
    location: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<HierarchyLevel> {
    let error = |message: String, field: &str| {
        Diagnostic::new(Severity::Error, message).at(format!("{}.{}", location, field))
    };

    for key in entry.keys() {
        if !LEVEL_KEYS.contains(&key.as_str()) {
            diagnostics.push(
                Diagnostic::new(Severity::Warning, format!("Unknown level attribute '{}'", key))
                    .at(format!("{}.{}", location, key)),
            );
        }
    }

    let mut valid = true;
    let mut string_field = |field: &str, diagnostics: &mut Vec<Diagnostic>| -> Option<String> {
        let value = entry.get(field)?;
        match non_empty_string(value) {
            Some(s) => Some(s.to_string()),
            None => {
                diagnostics.push(error(format!("{} must be a non-empty String", field), field));
                valid = false;
                None
            }
        }
    };

    let category = string_field("category", diagnostics);
    let value = string_field("value", diagnostics);
    let path = string_field("path", diagnostics);
    let datadir = string_field("datadir", diagnostics);

    let paths = match entry.get("paths") {
        None => None,
        Some(list) => match string_list(list) {
            Some(paths) => Some(paths),
            None => {
                diagnostics.push(error(
                    "paths must be a non-empty Array of non-empty Strings".to_string(),
                    "paths",
                ));
                valid = false;
                None
            }
        },
    };

    let Some(category) = category else {
        if !entry.contains_key("category") {
            diagnostics.push(
                Diagnostic::new(Severity::Error, "A hierarchy level must have a category")
                    .at(location),
            );
        }
        return None;
    };
    if entry.contains_key("path") && entry.contains_key("paths") {
        diagnostics.push(
            Diagnostic::new(Severity::Error, "Only one of 'path' and 'paths' can be used")
                .at(location),
        );
        valid = false;
    }
    let is_common = category == COMMON_CATEGORY;
    if is_common && entry.contains_key("value") {
        diagnostics.push(error(
            "A value cannot be given for the 'common' category".to_string(),
            "value",
        ));
        valid = false;
    }
    if !valid {
        return None;
    }

    let paths = paths.or_else(|| path.map(|p| vec![p])).unwrap_or_default();
    let level = if is_common {
        HierarchyLevel::common(if paths.is_empty() {
            vec![COMMON_CATEGORY.to_string()]
        } else {
            paths
        })
    } else {
        let value = value.unwrap_or_else(|| format!("%{{{}}}", category));
        HierarchyLevel::new(category, value, paths)
    };
    Some(match datadir {
        Some(datadir) => level.with_datadir(datadir),
        None => level,
    })
}

fn push_unique(
    levels: &mut Vec<HierarchyLevel>,
    level: HierarchyLevel,
    location: String,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if levels.iter().any(|l| l.category == level.category) {
        diagnostics.push(
            Diagnostic::new(
                Severity::Error,
                format!("Category '{}' is defined more than once", level.category),
            )
            .at(location),
        );
        return;
    }
    levels.push(level);
}

fn non_empty_string(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array().filter(|items| !items.is_empty())?;
    items
        .iter()
        .map(|item| non_empty_string(item).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn severities(validation: &Validation) -> Vec<Severity> {
        validation.diagnostics.iter().map(|d| d.severity).collect()
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let validation = validate(&json!({"hierarchy": ["common"]}));
        assert!(validation.is_fatal());
        assert!(validation.config.is_none());
        assert_eq!(validation.config_or_default(), Config::default());
    }

    #[test]
    fn test_non_mapping_document_is_fatal() {
        let validation = validate(&json!(["common"]));
        assert_eq!(severities(&validation), vec![Severity::Fatal]);
    }

    #[test]
    fn test_incompatible_version_warns_and_continues() {
        let validation = validate(&json!({"version": 4, "hierarchy": ["nodes/%{certname}", "common"]}));
        assert!(!validation.is_fatal());
        assert_eq!(severities(&validation), vec![Severity::Warning]);
        let config = validation.config.unwrap();
        assert_eq!(config.version, ConfigVersion::V3);
        assert_eq!(config.hierarchy[0].paths, vec!["nodes/%{certname}", "common"]);
    }

    #[test]
    fn test_non_integer_version_warns() {
        let validation = validate(&json!({"version": "3", "hierarchy": ["common"]}));
        assert!(!validation.is_fatal());
        assert_eq!(severities(&validation), vec![Severity::Warning]);
        assert_eq!(validation.diagnostics[0].message, "Incompatible version \"3\", validating as version 3");
        assert_eq!(validation.config.unwrap().version, ConfigVersion::V3);
    }

    #[test]
    fn test_v2_tuples() {
        let validation = validate(&json!({
            "version": 2,
            "backends": ["yaml"],
            "hierarchy": [
                ["node", "%{certname}", "nodes/%{certname}"],
                ["broken", "x"],
                ["common", "true", "common"]
            ]
        }));
        assert_eq!(severities(&validation), vec![Severity::Error]);
        assert_eq!(
            validation.diagnostics[0].location.as_deref(),
            Some("hierarchy[1]")
        );
        let config = validation.config.unwrap();
        assert_eq!(config.backends, vec!["yaml"]);
        assert_eq!(config.hierarchy.len(), 2);
        assert_eq!(config.hierarchy[0].value.as_deref(), Some("%{certname}"));
        assert!(config.hierarchy[1].is_common());
    }

    #[test]
    fn test_v3_structured_levels() {
        let validation = validate(&json!({
            "version": 3,
            "datadir": "hieradata",
            "hierarchy": [
                {"category": "node", "path": "nodes/%{certname}", "datadir": "private"},
                {"category": "osfamily", "paths": ["os/%{osfamily}", "os/default"]},
                {"category": "common"}
            ]
        }));
        assert!(validation.diagnostics.is_empty());
        let config = validation.config.unwrap();
        assert_eq!(config.datadir, "hieradata");
        assert_eq!(config.hierarchy[0].value.as_deref(), Some("%{node}"));
        assert_eq!(config.hierarchy[0].datadir.as_deref(), Some("private"));
        assert_eq!(config.hierarchy[1].paths, vec!["os/%{osfamily}", "os/default"]);
        assert_eq!(config.hierarchy[2].paths, vec!["common"]);
    }

    #[test]
    fn test_v3_level_errors_accumulate() {
        let validation = validate(&json!({
            "version": 3,
            "hierarchy": [
                {"category": "a", "path": "x", "paths": ["y"]},
                {"category": "common", "value": "true"},
                {"category": "b", "paths": []},
                {"category": "c", "path": ""},
                {"path": "no-category"},
                {"category": "d", "colour": "blue"},
                {"category": "d"}
            ]
        }));
        assert!(!validation.is_fatal());
        let errors = validation
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        assert_eq!(errors, 6);
        let warnings: Vec<&str> = validation
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(warnings, vec!["Unknown level attribute 'colour'"]);

        let config = validation.config.unwrap();
        let categories: Vec<&str> = config.hierarchy.iter().map(|l| l.category.as_str()).collect();
        assert_eq!(categories, vec!["d"]);
    }

    #[test]
    fn test_all_levels_invalid_uses_default_hierarchy() {
        let validation = validate(&json!({"version": 3, "hierarchy": [""]}));
        assert_eq!(severities(&validation), vec![Severity::Error, Severity::Warning]);
        assert_eq!(
            validation.config.unwrap().hierarchy,
            Config::default_hierarchy(ConfigVersion::V3)
        );
    }

    #[test]
    fn test_unknown_top_level_key_and_bad_fields() {
        let validation = validate(&json!({"version": 3, "datadir": "", "backends": [], "colour": 1}));
        let mut found = severities(&validation);
        found.sort();
        assert_eq!(found, vec![Severity::Warning, Severity::Error, Severity::Error]);
        let config = validation.config.unwrap();
        assert_eq!(config.datadir, "data");
        assert_eq!(config.backends, vec!["yaml", "json"]);
    }
}
