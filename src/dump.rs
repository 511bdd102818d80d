//! Debug dump of transformed units
//!
//! Submissions are queued to a single background worker that writes
//! `<dir>/<pkg>/<sub>/<Name>.class`. Dumping is best effort: write failures
//! are logged at debug level and otherwise ignored.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Receives final bytes for units the pipeline decided to dump
pub trait DumpSink: Send + Sync {
    /// Queue `bytes` for `name`; never blocks on IO and never fails
    fn submit(&self, name: &str, bytes: Vec<u8>);
}

/// Dump file path for a dotted unit name
pub fn dump_path(dir: &Path, name: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    path.extend(name.split('.').filter(|part| !part.is_empty()));
    path.set_extension("class");
    path
}

/// Remove the contents of `dir`, ignoring errors
pub fn clean_dir(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            debug!("Not cleaning dump directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = result {
            debug!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

struct Job {
    name: String,
    bytes: Vec<u8>,
}

/// Single-worker dump queue
pub struct DumpService {
    dir: PathBuf,
    sender: parking_lot::Mutex<Option<Sender<Job>>>,
    worker: parking_lot::Mutex<Option<JoinHandle<usize>>>,
}

impl DumpService {
    /// Start the worker thread writing under `dir`
    pub fn start(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let root = dir.clone();

        let worker = std::thread::Builder::new()
            .name("classweave-dump".to_string())
            .spawn(move || {
                let mut written = 0;
                for job in receiver {
                    if write_job(&root, &job) {
                        written += 1;
                    }
                }
                written
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Dump worker failed to start, dumping disabled: {}", e);
                None
            }
        };
        let sender = worker.as_ref().map(|_| sender);

        Self {
            dir,
            sender: parking_lot::Mutex::new(sender),
            worker: parking_lot::Mutex::new(worker),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Close the queue and wait for pending writes, returning how many succeeded.
    ///
    /// Later calls return 0.
    pub fn shutdown(&self) -> usize {
        drop(self.sender.lock().take());
        let Some(worker) = self.worker.lock().take() else {
            return 0;
        };
        match worker.join() {
            Ok(written) => {
                debug!("Dump worker drained, {} units written", written);
                written
            }
            Err(_) => {
                warn!("Dump worker panicked");
                0
            }
        }
    }
}

fn write_job(root: &Path, job: &Job) -> bool {
    let path = dump_path(root, &job.name);
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&path, &job.bytes));
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to dump {}: {}", job.name, e);
            false
        }
    }
}

impl DumpSink for DumpService {
    fn submit(&self, name: &str, bytes: Vec<u8>) {
        if let Some(sender) = self.sender.lock().as_ref() {
            // A closed channel means shutdown already ran
            let _ = sender.send(Job {
                name: name.to_string(),
                bytes,
            });
        }
    }
}

impl Drop for DumpService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_follows_package_layout() {
        let path = dump_path(Path::new("/dump"), "pkg.sub.Name");
        assert_eq!(path, PathBuf::from("/dump/pkg/sub/Name.class"));
        assert_eq!(
            dump_path(Path::new("/dump"), "Outer$Inner"),
            PathBuf::from("/dump/Outer$Inner.class")
        );
    }

    #[test]
    fn shutdown_drains_queue() {
        let temp = TempDir::new().unwrap();
        let service = DumpService::start(temp.path());
        for i in 0..20 {
            service.submit(&format!("pkg.Unit{i}"), vec![i as u8]);
        }

        assert_eq!(service.shutdown(), 20);
        assert_eq!(fs::read(temp.path().join("pkg/Unit7.class")).unwrap(), [7]);
        assert_eq!(service.shutdown(), 0);
    }

    #[test]
    fn submit_after_shutdown_is_ignored() {
        let temp = TempDir::new().unwrap();
        let service = DumpService::start(temp.path());
        service.shutdown();
        service.submit("pkg.Late", vec![1]);
        assert!(!temp.path().join("pkg/Late.class").exists());
    }

    #[test]
    fn write_failures_are_swallowed() {
        let temp = TempDir::new().unwrap();
        // A file where the package directory should go
        fs::write(temp.path().join("pkg"), b"").unwrap();
        let service = DumpService::start(temp.path());
        service.submit("pkg.A", vec![1]);
        service.submit("other.B", vec![2]);
        assert_eq!(service.shutdown(), 1);
    }

    #[test]
    fn clean_dir_empties_but_keeps_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("pkg/sub")).unwrap();
        fs::write(temp.path().join("pkg/sub/A.class"), b"x").unwrap();
        fs::write(temp.path().join("B.class"), b"y").unwrap();

        clean_dir(temp.path());
        assert!(temp.path().exists());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);

        clean_dir(&temp.path().join("missing"));
    }
}
