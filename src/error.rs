//! Structured error types for lookups.
//!
//! Absence of a value is not an error inside the engine; producers return
//! `Ok(None)` for "no such key". A `NoSuchKey` error is only produced at the
//! outermost lookup boundary.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Not found
    NoSuchKey,
    ModuleNotFound,
    InvalidKey,

    // Interpolation
    InterpolationFailed,
    UnknownInterpolationMethod,
    CircularReference,

    // Data shape
    TypeMismatch,
    MalformedData,

    // Backends
    BackendNotImplemented,
    BackendFailed,

    // Options and configuration
    InvalidMergeStrategy,
    InvalidLookupOptions,
    InvalidConfig,

    // Outer collaborators
    GlobalLookupFailed,
    InternalError,
}

/// Structured lookup error.
#[derive(Debug, Clone, Serialize)]
pub struct LookupError {
    pub code: ErrorCode,
    pub message: String,
    /// The key whose resolution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// The key originally requested by the caller, when it differs from `key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_key: Option<String>,
    /// The data or descriptor file involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl LookupError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            key: None,
            top_key: None,
            path: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Record the originally requested key. Keeps an already recorded one
    /// and ignores a top key equal to the failing key.
    pub fn with_top_key(mut self, top_key: &str) -> Self {
        if self.top_key.is_none() && self.key.as_deref() != Some(top_key) {
            self.top_key = Some(top_key.to_string());
        }
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().display().to_string());
        self
    }

    /// True for the final "nothing found" condition.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NoSuchKey
    }

    // Convenience constructors

    pub fn not_found(key: &str) -> Self {
        Self::new(
            ErrorCode::NoSuchKey,
            format!("lookup() did not find a value for the name '{}'", key),
        )
        .with_key(key)
    }

    pub fn module_not_found(module: &str) -> Self {
        Self::new(
            ErrorCode::ModuleNotFound,
            format!("Module '{}' not found in the current environment", module),
        )
    }

    pub fn invalid_key(key: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidKey,
            format!("Syntax error in key '{}': {}", key, reason),
        )
        .with_key(key)
    }

    pub fn interpolation(subject: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InterpolationFailed,
            format!("Interpolation of '{}' failed: {}", subject, reason),
        )
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ErrorCode::UnknownInterpolationMethod,
            format!("Unknown interpolation method '{}'", method),
        )
    }

    pub fn circular(chain: &[String], repeated: &str) -> Self {
        let mut path = chain.to_vec();
        path.push(repeated.to_string());
        Self::new(
            ErrorCode::CircularReference,
            format!("Recursive lookup detected in [{}]", path.join(", ")),
        )
        .with_key(repeated)
    }

    pub fn type_mismatch(key: &str, expected: &str, found: &str) -> Self {
        Self::new(
            ErrorCode::TypeMismatch,
            format!(
                "Data Provider type mismatch: Got {} when {} was expected to access value using '{}'",
                found, expected, key
            ),
        )
        .with_key(key)
    }

    pub fn malformed(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MalformedData,
            format!("Unable to parse '{}': {}", path.display(), reason),
        )
        .with_path(path)
    }

    pub fn backend_not_implemented(name: &str) -> Self {
        Self::new(
            ErrorCode::BackendNotImplemented,
            format!("No data provider is registered for backend '{}'", name),
        )
    }

    pub fn backend_failed(name: &str, path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::BackendFailed,
            format!(
                "Backend '{}' failed to read '{}': {}",
                name,
                path.display(),
                reason
            ),
        )
        .with_path(path)
    }

    pub fn invalid_merge(reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidMergeStrategy, reason.to_string())
    }

    pub fn invalid_lookup_options(reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidLookupOptions, reason.to_string())
    }

    pub fn invalid_config(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidConfig,
            format!("{}: {}", path.display(), reason),
        )
        .with_path(path)
    }

    pub fn global(top_key: &str, cause: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::GlobalLookupFailed,
            format!("Lookup of key '{}' failed: {}", top_key, cause),
        )
        .with_key(top_key)
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref top_key) = self.top_key {
            write!(f, " (while looking up '{}')", top_key)?;
        }
        Ok(())
    }
}

impl std::error::Error for LookupError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for LookupError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<LookupError>() {
            Ok(lookup_err) => lookup_err,
            Err(err) => LookupError::internal(err),
        }
    }
}

/// Result type for lookup operations.
pub type LookupResult<T> = std::result::Result<T, LookupError>;
