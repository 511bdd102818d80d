//! Error types for classweave
//!
//! All modules use `WeaveResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for classweave operations
pub type WeaveResult<T> = Result<T, WeaveError>;

/// All errors that can occur in classweave
#[derive(Error, Debug)]
pub enum WeaveError {
    // Contract violations
    #[error("Attempted to register {what} outside the initialization window")]
    RegistrationClosed { what: &'static str },

    #[error("Registry is still open; freeze it before building a pipeline")]
    RegistryOpen,

    // Codec errors
    #[error("Not a class unit: bad magic {found:02x?}")]
    BadMagic { found: Vec<u8> },

    #[error("Malformed class unit: {0}")]
    Malformed(String),

    #[error("Class unit codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("Malformed descriptor {0:?}")]
    BadDescriptor(String),

    // Transformation errors
    #[error("Pass {pass} failed on {unit}: {reason}")]
    PassFailed {
        pass: String,
        unit: String,
        reason: String,
    },

    #[error("Delegate failed on {unit}: {reason}")]
    Delegate { unit: String, reason: String },

    #[error("Failed to define {unit} in the privileged domain: {reason}")]
    PrivilegedDefine { unit: String, reason: String },

    // Cache errors
    #[error("Failed to load class cache {cache}: {reason}")]
    CacheLoad { cache: String, reason: String },

    #[error("Cache IO error: {context}")]
    CacheIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid identifier {0:?}, expected namespace:path")]
    InvalidIdentifier(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl WeaveError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache IO error with context
    pub fn cache_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::CacheIo {
            context: context.into(),
            source,
        }
    }

    /// Create a pass failure for `unit`
    pub fn pass_failed(
        pass: impl Into<String>,
        unit: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PassFailed {
            pass: pass.into(),
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Create a delegate failure for `unit`
    pub fn delegate(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delegate {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error signals a broken initialization sequence
    /// rather than bad input
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::RegistrationClosed { .. } | Self::RegistryOpen)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RegistrationClosed { .. } => {
                Some("Register passes and caches from an initializer, before freeze()")
            }
            Self::BadMagic { .. } => Some("Input must be a class unit written by the wire codec"),
            Self::ConfigInvalid { .. } => Some("Run: classweave config init --force"),
            Self::CacheLoad { .. } => Some("Run: classweave cache clear"),
            _ => None,
        }
    }
}
