//! Hierarchical data lookup.
//!
//! Values are searched in three tiers (global, environment, module), each
//! environment and module configured by a `hiera.yaml` hierarchy, combined
//! with a merge strategy and interpolated against a caller-supplied scope.

pub mod adapter;
pub mod backend;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod explain;
pub mod format;
pub mod interpolate;
pub mod invocation;
pub mod key;
pub mod lookup;
pub mod lookup_options;
pub mod merge;
pub mod provider;
pub mod scope;
pub mod settings;

pub use adapter::{LookupAdapter, Tier};
pub use backend::{Backend, BackendError, BackendRegistry};
pub use config::{Config, ConfigVersion, Diagnostic, HierarchyLevel, Severity};
pub use environment::{DirectoryModules, Environment, ModuleRegistry};
pub use error::{ErrorCode, LookupError, LookupResult};
pub use explain::Explainer;
pub use interpolate::Interpolator;
pub use invocation::Invocation;
pub use lookup::{Lookup, lookup};
pub use merge::{DeepMergeOptions, MergeStrategy};
pub use provider::{DataProvider, GlobalRequest, GlobalTerminus, StaticTerminus};
pub use scope::{EmptyScope, Scope};
pub use settings::Settings;
