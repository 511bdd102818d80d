//! In-process cache back-end

use crate::cache::{content_key, CacheEntry, ClassCache};
use crate::error::WeaveResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Cache held in memory for the lifetime of the process
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<[u8; 32], CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::named("classweave:memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassCache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> WeaveResult<()> {
        Ok(())
    }

    fn get_entry(&self, original: &[u8]) -> WeaveResult<Option<CacheEntry>> {
        Ok(self.entries.read().get(&content_key(original)).cloned())
    }

    fn put_entry(&self, original: &[u8], entry: CacheEntry) -> WeaveResult<()> {
        self.entries.write().insert(content_key(original), entry);
        Ok(())
    }
}
