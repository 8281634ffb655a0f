//! Hierarchy descriptors (`hiera.yaml`).
//!
//! A descriptor sits at an environment or module root and describes where
//! that root's data lives:
//!
//! ```yaml
//! version: 3
//! datadir: data
//! hierarchy:
//!   - category: node
//!     path: "nodes/%{certname}"
//!   - category: osfamily
//!     paths: ["os/%{osfamily}", "os/default"]
//!   - category: common
//! ```
//!
//! Version 2 descriptors use `[category, value, path]` tuples instead, and
//! version 3 also accepts a bare list of paths as a single `common` level.

mod checker;
mod loader;
mod types;

pub use checker::{ConfigChecker, Diagnostic, Severity, Validation, validate};
pub use loader::LoadedConfig;
pub use types::*;
