//! Integration tests for descriptors, backends and provider caching.

use hiera_lookup::backend::YamlBackend;
use hiera_lookup::{
    Backend, BackendError, BackendRegistry, Environment, ErrorCode, LookupAdapter, Severity, lookup,
};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Registered as `yaml`; records every file it is asked to load.
struct CountingBackend {
    loads: Rc<RefCell<Vec<PathBuf>>>,
}

impl Backend for CountingBackend {
    fn name(&self) -> &str {
        "yaml"
    }

    fn path_extension(&self) -> &str {
        "yaml"
    }

    fn parse(&self, text: &str) -> Result<Value, BackendError> {
        YamlBackend.parse(text)
    }

    fn load(&self, path: &Path) -> Result<Option<Map<String, Value>>, BackendError> {
        self.loads.borrow_mut().push(path.to_path_buf());
        YamlBackend.load(path)
    }
}

fn counting_adapter(root: &Path) -> (LookupAdapter, Rc<RefCell<Vec<PathBuf>>>) {
    let loads = Rc::new(RefCell::new(Vec::new()));
    let mut registry = BackendRegistry::with_defaults();
    registry.register(Rc::new(CountingBackend {
        loads: Rc::clone(&loads),
    }));
    let adapter =
        LookupAdapter::new(Environment::new("production", root)).with_backends(registry);
    (adapter, loads)
}

mod caching_tests {
    use super::*;

    #[test]
    fn each_file_is_loaded_once_per_adapter() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "data/common.yaml", "a: 1\nb: 2\n");
        let (adapter, loads) = counting_adapter(dir.path());
        let scope = Map::new();

        assert_eq!(lookup(&adapter, "a", None, &scope).unwrap(), json!(1));
        assert_eq!(lookup(&adapter, "b", None, &scope).unwrap(), json!(2));
        assert_eq!(lookup(&adapter, "a", None, &scope).unwrap(), json!(1));

        let common = dir.path().join("data/common.yaml");
        let count = loads.borrow().iter().filter(|p| **p == common).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn missing_files_are_remembered() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "hiera.yaml",
            "version: 3\nbackends: [yaml]\nhierarchy:\n  - category: node\n    value: \"%{fqdn}\"\n  - category: common\n",
        );
        write(dir.path(), "data/common.yaml", "a: 1\n");
        let (adapter, loads) = counting_adapter(dir.path());
        let scope = json!({"fqdn": "web01"}).as_object().cloned().unwrap();

        lookup(&adapter, "a", None, &scope).unwrap();
        lookup(&adapter, "a", None, &scope).unwrap();

        let node = dir.path().join("data/web01.yaml");
        let count = loads.borrow().iter().filter(|p| **p == node).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn a_new_adapter_starts_cold() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "data/common.yaml", "a: 1\n");
        let scope = Map::new();

        let (first, first_loads) = counting_adapter(dir.path());
        lookup(&first, "a", None, &scope).unwrap();
        write(dir.path(), "data/common.yaml", "a: 2\n");
        assert_eq!(lookup(&first, "a", None, &scope).unwrap(), json!(1));

        let (second, second_loads) = counting_adapter(dir.path());
        assert_eq!(lookup(&second, "a", None, &scope).unwrap(), json!(2));
        assert!(!first_loads.borrow().is_empty());
        assert!(!second_loads.borrow().is_empty());
    }
}

mod descriptor_tests {
    use super::*;

    #[test]
    fn missing_descriptor_uses_defaults() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "data/common.json", r#"{"from_json": [1, 2]}"#);
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        assert_eq!(
            lookup(&adapter, "from_json", None, &Map::new()).unwrap(),
            json!([1, 2])
        );
        assert!(adapter.environment_diagnostics().is_empty());
    }

    #[test]
    fn version_2_descriptor() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "hiera.yaml",
            r#"
version: 2
datadir: hieradata
hierarchy:
  - [osfamily, "%{osfamily}", "family/%{osfamily}"]
  - [common, "true", common]
"#,
        );
        write(dir.path(), "hieradata/family/RedHat.yaml", "pkg: yum\n");
        write(dir.path(), "hieradata/common.yaml", "pkg: none\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));

        let redhat = json!({"osfamily": "RedHat"}).as_object().cloned().unwrap();
        assert_eq!(lookup(&adapter, "pkg", None, &redhat).unwrap(), json!("yum"));
        assert_eq!(lookup(&adapter, "pkg", None, &Map::new()).unwrap(), json!("none"));
    }

    #[test]
    fn version_3_path_list_shorthand() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "hiera.yaml",
            "version: 3\nhierarchy: [\"first\", \"second\"]\n",
        );
        write(dir.path(), "data/first.yaml", "a: one\n");
        write(dir.path(), "data/second.yaml", "a: two\nb: two\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        assert_eq!(lookup(&adapter, "a", None, &Map::new()).unwrap(), json!("one"));
        assert_eq!(lookup(&adapter, "b", None, &Map::new()).unwrap(), json!("two"));
    }

    #[test]
    fn per_level_datadir_and_hocon_backend() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "hiera.yaml",
            r#"
version: 3
backends: [hocon, yaml]
hierarchy:
  - category: site
    value: "%{site}"
    datadir: sites
  - category: common
"#,
        );
        write(
            dir.path(),
            "sites/ams.hocon",
            "dns { servers = [\"10.0.0.1\", \"10.0.0.2\"] }\n",
        );
        write(dir.path(), "data/common.yaml", "dns:\n  servers: [8.8.8.8]\n  search: example.com\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));

        let ams = json!({"site": "ams"}).as_object().cloned().unwrap();
        assert_eq!(
            lookup(&adapter, "dns.servers", None, &ams).unwrap(),
            json!(["10.0.0.1", "10.0.0.2"])
        );
        let deep = hiera_lookup::MergeStrategy::from_name("deep").unwrap();
        assert_eq!(
            lookup(&adapter, "dns", Some(deep), &ams).unwrap(),
            json!({"servers": ["10.0.0.1", "10.0.0.2", "8.8.8.8"], "search": "example.com"})
        );
    }

    #[test]
    fn unknown_backend_fails_lookups() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "hiera.yaml",
            "version: 3\nbackends: [yaml, eyaml]\nhierarchy:\n  - category: common\n",
        );
        write(dir.path(), "data/common.yaml", "a: 1\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        let err = lookup(&adapter, "a", None, &Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::BackendNotImplemented);
    }

    #[test]
    fn malformed_data_names_the_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "data/common.yaml", "- just\n- a list\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        let err = lookup(&adapter, "a", None, &Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedData);
        assert!(err.path.unwrap().ends_with("common.yaml"));
    }

    #[test]
    fn invalid_descriptor_reports_fatal_diagnostic() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hiera.yaml", "hierarchy: [common]\n");
        write(dir.path(), "data/common.yaml", "a: 1\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));

        let diagnostics = adapter.environment_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Fatal);
        // The default config still serves data.
        assert_eq!(lookup(&adapter, "a", None, &Map::new()).unwrap(), json!(1));
    }

    #[test]
    fn module_descriptor_is_independent() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "modules/ntp/hiera.yaml",
            "version: 3\ndatadir: defaults\nhierarchy:\n  - category: common\n",
        );
        write(dir.path(), "modules/ntp/defaults/common.yaml", "ntp::port: 123\n");
        let adapter = LookupAdapter::new(Environment::new("production", dir.path()));
        assert_eq!(
            lookup(&adapter, "ntp::port", None, &Map::new()).unwrap(),
            json!(123)
        );
        assert!(adapter.module_diagnostics("ntp").unwrap().is_empty());
    }
}
