//! Directory-backed cache back-end
//!
//! Entries live at `<dir>/<aa>/<sha256>` where `aa` is the first byte of the
//! digest in hex. The first byte of each file tags the entry kind.

use crate::cache::{content_hex, CacheEntry, ClassCache};
use crate::error::{WeaveError, WeaveResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

const TAG_UNCHANGED: u8 = 0;
const TAG_BYTES: u8 = 1;

/// Cache persisted across runs in a directory
pub struct DiskCache {
    name: String,
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "classweave:disk".to_string(),
            dir: dir.into(),
            tmp_seq: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, original: &[u8]) -> PathBuf {
        let hex = content_hex(original);
        self.dir.join(&hex[..2]).join(hex)
    }

    fn entry_files(&self) -> WeaveResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let buckets = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => {
                return Err(WeaveError::cache_io(
                    format!("reading cache directory {}", self.dir.display()),
                    e,
                ))
            }
        };

        for bucket in buckets {
            let bucket = bucket.map_err(|e| WeaveError::cache_io("reading cache bucket", e))?;
            if !bucket.path().is_dir() {
                continue;
            }
            let entries = fs::read_dir(bucket.path())
                .map_err(|e| WeaveError::cache_io("reading cache bucket", e))?;
            for entry in entries {
                let entry = entry.map_err(|e| WeaveError::cache_io("reading cache entry", e))?;
                let path = entry.path();
                // Skip leftovers from interrupted writes
                if path.extension().is_none() {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }

    /// Number of stored entries
    pub fn entry_count(&self) -> WeaveResult<usize> {
        Ok(self.entry_files()?.len())
    }

    /// Remove every entry, returning how many were removed
    pub fn clear(&self) -> WeaveResult<usize> {
        let files = self.entry_files()?;
        for path in &files {
            fs::remove_file(path).map_err(|e| {
                WeaveError::cache_io(format!("removing cache entry {}", path.display()), e)
            })?;
        }
        info!("Cleared {} cache entries from {}", files.len(), self.dir.display());
        Ok(files.len())
    }
}

impl ClassCache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> WeaveResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| WeaveError::CacheLoad {
            cache: self.name.clone(),
            reason: format!("creating {}: {}", self.dir.display(), e),
        })?;
        let count = self.entry_count().map_err(|e| WeaveError::CacheLoad {
            cache: self.name.clone(),
            reason: e.to_string(),
        })?;
        debug!("Disk cache at {} holds {} entries", self.dir.display(), count);
        Ok(())
    }

    fn get_entry(&self, original: &[u8]) -> WeaveResult<Option<CacheEntry>> {
        let path = self.entry_path(original);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(WeaveError::cache_io(
                    format!("reading cache entry {}", path.display()),
                    e,
                ))
            }
        };

        match data.split_first() {
            Some((&TAG_UNCHANGED, [])) => Ok(Some(CacheEntry::Unchanged)),
            Some((&TAG_BYTES, rest)) => Ok(Some(CacheEntry::Bytes(rest.to_vec()))),
            _ => Err(WeaveError::Malformed(format!(
                "corrupt cache entry {}",
                path.display()
            ))),
        }
    }

    fn put_entry(&self, original: &[u8], entry: CacheEntry) -> WeaveResult<()> {
        let path = self.entry_path(original);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                WeaveError::cache_io(format!("creating cache bucket {}", parent.display()), e)
            })?;
        }

        let data = match entry {
            CacheEntry::Unchanged => vec![TAG_UNCHANGED],
            CacheEntry::Bytes(bytes) => {
                let mut data = Vec::with_capacity(bytes.len() + 1);
                data.push(TAG_BYTES);
                data.extend(bytes);
                data
            }
        };

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), seq));
        fs::write(&tmp, data)
            .map_err(|e| WeaveError::cache_io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .map_err(|e| WeaveError::cache_io(format!("renaming {}", tmp.display()), e))?;
        Ok(())
    }
}
