//! Namespaced identifiers for passes and cache back-ends

use crate::error::{WeaveError, WeaveResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `namespace:path` pair, e.g. `classweave:finalize`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    /// Owning namespace (usually the registering mod or library)
    pub namespace: String,
    /// Name within the namespace
    pub path: String,
}

impl Identifier {
    /// Create a new identifier
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = WeaveError;

    fn from_str(s: &str) -> WeaveResult<Self> {
        match s.split_once(':') {
            Some((ns, path)) if !ns.is_empty() && !path.is_empty() && !path.contains(':') => {
                Ok(Self::new(ns, path))
            }
            _ => Err(WeaveError::InvalidIdentifier(s.to_string())),
        }
    }
}
