//! Data providers: the producers a lookup asks for a key.
//!
//! - [`GlobalDataProvider`] delegates to an external terminus
//! - [`ConfiguredDataProvider`] serves an environment or module root through
//!   its hierarchy descriptor
//! - [`PathBasedDataProvider`] serves one hierarchy level of such a root

mod configured;
mod global;
mod path_based;

pub use configured::ConfiguredDataProvider;
pub use global::{GlobalDataProvider, GlobalRequest, GlobalTerminus, NoGlobalData, StaticTerminus};
pub use path_based::{DataLocation, PathBasedDataProvider};

use crate::error::LookupResult;
use crate::invocation::Invocation;
use crate::merge::MergeStrategy;
use serde_json::Value;

/// Something that can be asked for the value of a root key.
pub trait DataProvider {
    /// Name shown in explain output.
    fn name(&self) -> &str;

    /// Value of `key`, merged over everything this provider has for it.
    /// `Ok(None)` when the provider has nothing for the key.
    fn lookup(
        &self,
        key: &str,
        invocation: &mut Invocation<'_>,
        merge: &MergeStrategy,
    ) -> LookupResult<Option<Value>>;
}
