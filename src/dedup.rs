//! Dedup guard: one transformation per unit name
//!
//! The first caller to present a name is admitted to the pipeline; every
//! later caller for the same name, concurrent or not, is told it has been
//! seen. Names are never forgotten.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Verdict for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting: run the pipeline
    First,
    /// Already seen: defer to the delegate
    Seen,
}

#[derive(Debug, Default)]
pub struct SeenSet {
    names: RwLock<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` seen, reporting whether this call was the first
    pub fn admit(&self, name: &str) -> Admission {
        if self.names.read().contains(name) {
            return Admission::Seen;
        }

        // Another caller may have won between the two locks
        let mut names = self.names.write();
        if names.contains(name) {
            Admission::Seen
        } else {
            names.insert(name.to_string());
            Admission::First
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn first_then_seen() {
        let seen = SeenSet::new();
        assert_eq!(seen.admit("pkg.A"), Admission::First);
        assert_eq!(seen.admit("pkg.A"), Admission::Seen);
        assert_eq!(seen.admit("pkg.B"), Admission::First);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn racing_callers_admit_exactly_one() {
        let seen = SeenSet::new();
        let firsts = AtomicUsize::new(0);
        let barrier = Barrier::new(16);

        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    barrier.wait();
                    if seen.admit("pkg.Race") == Admission::First {
                        firsts.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(firsts.load(Ordering::SeqCst), 1);
        assert!(seen.contains("pkg.Race"));
    }
}
