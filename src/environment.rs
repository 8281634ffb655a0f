//! The environment a lookup runs in and the modules it contains.

use std::fmt;
use std::path::{Path, PathBuf};

/// Directory holding an environment's modules, relative to its root.
pub const DEFAULT_MODULE_PATH: &str = "modules";

/// Finds module roots by name.
pub trait ModuleRegistry {
    /// Root directory of module `name`, if the environment has it.
    fn module_root(&self, name: &str) -> Option<PathBuf>;

    /// Names of all modules, sorted.
    fn module_names(&self) -> Vec<String>;
}

/// Modules laid out as `<dir>/<name>/` directories.
#[derive(Debug, Clone)]
pub struct DirectoryModules {
    dir: PathBuf,
}

impl DirectoryModules {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Module names are lowercase identifiers.
pub fn is_valid_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl ModuleRegistry for DirectoryModules {
    fn module_root(&self, name: &str) -> Option<PathBuf> {
        if !is_valid_module_name(name) {
            return None;
        }
        let root = self.dir.join(name);
        root.is_dir().then_some(root)
    }

    fn module_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_valid_module_name(name))
            .collect();
        names.sort();
        names
    }
}

/// A named environment rooted at a directory.
pub struct Environment {
    name: String,
    root: PathBuf,
    modules: Option<Box<dyn ModuleRegistry>>,
}

impl Environment {
    /// An environment whose modules live in `<root>/modules`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let modules = DirectoryModules::new(root.join(DEFAULT_MODULE_PATH));
        Self {
            name: name.into(),
            root,
            modules: Some(Box::new(modules)),
        }
    }

    /// Look for modules in `dir`, relative to the environment root.
    pub fn with_module_path(self, dir: impl AsRef<Path>) -> Self {
        let modules = DirectoryModules::new(self.root.join(dir));
        self.with_modules(modules)
    }

    pub fn with_modules(mut self, modules: impl ModuleRegistry + 'static) -> Self {
        self.modules = Some(Box::new(modules));
        self
    }

    /// Drop the module registry; module-qualified keys then only search the
    /// global and environment tiers.
    pub fn without_modules(mut self) -> Self {
        self.modules = None;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_root(&self, name: &str) -> Option<PathBuf> {
        self.modules.as_ref()?.module_root(name)
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .as_ref()
            .map(|m| m.module_names())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("modules", &self.modules.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_module_names() {
        assert!(is_valid_module_name("ntp"));
        assert!(is_valid_module_name("apache_2"));
        assert!(!is_valid_module_name("Apache"));
        assert!(!is_valid_module_name("2ntp"));
        assert!(!is_valid_module_name("../etc"));
        assert!(!is_valid_module_name(""));
    }

    #[test]
    fn test_directory_modules() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("modules/ntp")).unwrap();
        fs::create_dir_all(dir.path().join("modules/apache")).unwrap();
        fs::write(dir.path().join("modules/README"), "not a module").unwrap();

        let env = Environment::new("production", dir.path());
        assert_eq!(env.module_root("ntp"), Some(dir.path().join("modules/ntp")));
        assert_eq!(env.module_root("mysql"), None);
        assert_eq!(env.module_names(), vec!["apache", "ntp"]);

        let isolated = Environment::new("production", dir.path()).without_modules();
        assert_eq!(isolated.module_root("ntp"), None);
    }

    #[test]
    fn test_custom_module_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("site/profile")).unwrap();
        let env = Environment::new("production", dir.path()).with_module_path("site");
        assert!(env.module_root("profile").is_some());
    }
}
