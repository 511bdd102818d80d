//! Content-addressed class cache
//!
//! Transformed units are cached by the bytes they were loaded from, not by
//! name: two differently named units with identical bytes share one entry.
//!
//! # Entry Kinds
//!
//! | Entry | Meaning |
//! |-------|---------|
//! | `Unchanged` | The pipeline left the bytes as they were |
//! | `Bytes` | The pipeline produced different bytes |
//!
//! Back-ends persist entries however they like; [`CacheAdapter`] is the
//! only caller and owns the lookup-or-compute policy.

pub mod adapter;
pub mod disk;
pub mod memory;

pub use adapter::CacheAdapter;
pub use disk::DiskCache;
pub use memory::MemoryCache;

use crate::error::WeaveResult;
use sha2::{Digest, Sha256};

/// Value stored for one original byte sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// Output equals input
    Unchanged,
    /// Output bytes
    Bytes(Vec<u8>),
}

impl CacheEntry {
    /// Entry for `output` computed from `original`
    pub fn for_output(original: &[u8], output: Vec<u8>) -> Self {
        if output == original {
            Self::Unchanged
        } else {
            Self::Bytes(output)
        }
    }

    /// Resolve to output bytes
    pub fn into_bytes(self, original: &[u8]) -> Vec<u8> {
        match self {
            Self::Unchanged => original.to_vec(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// A cache back-end
pub trait ClassCache: Send + Sync {
    /// Name used for the persisted preference, e.g. `classweave:disk`
    fn name(&self) -> &str;

    /// Dotted namespace of the back-end's own supporting units
    fn origin(&self) -> Option<&str> {
        None
    }

    /// Prepare for use. Called once at startup; failure disables caching for the run.
    fn load(&self) -> WeaveResult<()>;

    fn get_entry(&self, original: &[u8]) -> WeaveResult<Option<CacheEntry>>;

    fn put_entry(&self, original: &[u8], entry: CacheEntry) -> WeaveResult<()>;
}

/// SHA-256 digest of a unit's original bytes
pub fn content_key(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hex form of [`content_key`], used for file names
pub fn content_hex(bytes: &[u8]) -> String {
    hex::encode(content_key(bytes))
}
