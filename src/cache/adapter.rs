//! Lookup-or-compute wrapper around a cache back-end
//!
//! Computation is serialized per content key: concurrent callers holding
//! byte-identical units wait for the first one and then read its entry, so
//! the pipeline runs at most once per distinct input.

use crate::cache::{content_key, CacheEntry, ClassCache};
use crate::error::WeaveResult;
use crate::pipeline::Outcome;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

type KeyLock = Arc<Mutex<()>>;

pub struct CacheAdapter {
    backend: Option<Arc<dyn ClassCache>>,
    in_flight: Mutex<HashMap<[u8; 32], KeyLock>>,
}

impl CacheAdapter {
    /// An adapter that always computes
    pub fn disabled() -> Self {
        Self {
            backend: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn new(backend: Arc<dyn ClassCache>) -> Self {
        Self {
            backend: Some(backend),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.name())
    }

    /// Return the cached output for `original`, or run `compute` and store its result.
    ///
    /// Absent input bypasses the cache. Only [`Outcome::Bytes`] results are stored;
    /// errors propagate without touching the back-end.
    pub fn get_or_compute<F>(&self, original: Option<&[u8]>, compute: F) -> WeaveResult<Outcome>
    where
        F: FnOnce() -> WeaveResult<Outcome>,
    {
        let (Some(original), Some(backend)) = (original, self.backend.as_deref()) else {
            return compute();
        };

        if let Some(hit) = Self::lookup(backend, original) {
            return Ok(Outcome::Bytes(hit));
        }

        let key = content_key(original);
        let slot = self.in_flight.lock().entry(key).or_default().clone();

        let result = {
            let _guard = slot.lock();
            match Self::lookup(backend, original) {
                Some(hit) => {
                    debug!("Cache entry filled by a concurrent caller");
                    Ok(Outcome::Bytes(hit))
                }
                None => {
                    let outcome = compute();
                    if let Ok(Outcome::Bytes(bytes)) = &outcome {
                        let entry = CacheEntry::for_output(original, bytes.clone());
                        if let Err(e) = backend.put_entry(original, entry) {
                            warn!("Failed to store cache entry in {}: {}", backend.name(), e);
                        }
                    }
                    outcome
                }
            }
        };

        let mut in_flight = self.in_flight.lock();
        drop(slot);
        // Only the table still holds the lock: nobody else is waiting
        if in_flight
            .get(&key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            in_flight.remove(&key);
        }

        result
    }

    fn lookup(backend: &dyn ClassCache, original: &[u8]) -> Option<Vec<u8>> {
        match backend.get_entry(original) {
            Ok(entry) => entry.map(|e| e.into_bytes(original)),
            Err(e) => {
                warn!("Cache lookup in {} failed, recomputing: {}", backend.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::WeaveError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn adapter() -> (CacheAdapter, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        (CacheAdapter::new(cache.clone()), cache)
    }

    #[test]
    fn hit_skips_compute() {
        let (adapter, _cache) = adapter();
        let calls = AtomicUsize::new(0);
        let run = || {
            adapter.get_or_compute(Some(b"in"), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Bytes(b"out".to_vec()))
            })
        };

        assert_eq!(run().unwrap(), Outcome::Bytes(b"out".to_vec()));
        assert_eq!(run().unwrap(), Outcome::Bytes(b"out".to_vec()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unchanged_output_stored_as_marker() {
        let (adapter, cache) = adapter();
        adapter
            .get_or_compute(Some(b"same"), || Ok(Outcome::Bytes(b"same".to_vec())))
            .unwrap();
        assert_eq!(cache.get_entry(b"same").unwrap(), Some(CacheEntry::Unchanged));
    }

    #[test]
    fn absent_input_bypasses_cache() {
        let (adapter, cache) = adapter();
        let out = adapter.get_or_compute(None, || Ok(Outcome::Empty)).unwrap();
        assert_eq!(out, Outcome::Empty);
        assert!(cache.is_empty());
    }

    #[test]
    fn consumed_and_failed_results_not_stored() {
        let (adapter, cache) = adapter();
        adapter
            .get_or_compute(Some(b"x"), || Ok(Outcome::Consumed))
            .unwrap();
        let err = adapter.get_or_compute(Some(b"y"), || {
            Err(WeaveError::pass_failed("t:p", "pkg.Y", "boom"))
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_always_computes() {
        let adapter = CacheAdapter::disabled();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            adapter
                .get_or_compute(Some(b"in"), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Outcome::Bytes(b"out".to_vec()))
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(adapter.backend_name(), None);
    }

    #[test]
    fn concurrent_identical_content_computes_once() {
        let (adapter, _cache) = adapter();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let out = adapter
                        .get_or_compute(Some(b"shared"), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(Outcome::Bytes(b"woven".to_vec()))
                        })
                        .unwrap();
                    assert_eq!(out, Outcome::Bytes(b"woven".to_vec()));
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(adapter.in_flight.lock().is_empty());
    }

    #[test]
    fn in_flight_table_drains_after_contention() {
        for round in 0..50u8 {
            let (adapter, _cache) = adapter();
            let barrier = Barrier::new(6);
            let key = [round];

            thread::scope(|s| {
                for _ in 0..6 {
                    s.spawn(|| {
                        barrier.wait();
                        adapter
                            .get_or_compute(Some(&key[..]), || Ok(Outcome::Consumed))
                            .unwrap();
                    });
                }
            });

            assert!(adapter.in_flight.lock().is_empty(), "round {round}");
        }
    }
}
