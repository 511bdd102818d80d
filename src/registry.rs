//! Pass and cache registry
//!
//! The registry is open while initializers run and frozen for the rest of
//! the process. Registration after freezing is a contract violation.
//!
//! # Phases
//!
//! | Phase | Register | Read |
//! |-------|----------|------|
//! | Open | yes | no pipeline may be built |
//! | Frozen | `RegistrationClosed` | yes, lock-free |

use crate::cache::ClassCache;
use crate::config::schema::CacheConfig;
use crate::error::{WeaveError, WeaveResult};
use crate::pass::Pass;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Frozen,
}

pub struct Registry {
    phase: Phase,
    early: Vec<Arc<dyn Pass>>,
    normal: Vec<Arc<dyn Pass>>,
    caches: Vec<Arc<dyn ClassCache>>,
    protected: Vec<String>,
    selected: OnceLock<Option<Arc<dyn ClassCache>>>,
}

impl Registry {
    /// A new registry, open for registration
    pub fn new() -> Self {
        Self {
            phase: Phase::Open,
            early: Vec::new(),
            normal: Vec::new(),
            caches: Vec::new(),
            protected: Vec::new(),
            selected: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn ensure_open(&self, what: &'static str) -> WeaveResult<()> {
        match self.phase {
            Phase::Open => Ok(()),
            Phase::Frozen => Err(WeaveError::RegistrationClosed { what }),
        }
    }

    fn protect(&mut self, origin: &str) {
        // An empty prefix would match every unit
        if !origin.is_empty() && !self.protected.iter().any(|p| p == origin) {
            self.protected.push(origin.to_string());
        }
    }

    /// Register a pass that runs before the delegate.
    ///
    /// Only use this when a pass must see units before the delegate does.
    pub fn register_early(&mut self, pass: Arc<dyn Pass>) -> WeaveResult<()> {
        self.ensure_open("an early pass")?;
        debug!("Registered early pass {}", pass.name());
        self.protect(pass.origin());
        self.early.push(pass);
        Ok(())
    }

    /// Register a pass that runs after the delegate
    pub fn register_normal(&mut self, pass: Arc<dyn Pass>) -> WeaveResult<()> {
        self.ensure_open("a pass")?;
        debug!("Registered pass {}", pass.name());
        self.protect(pass.origin());
        self.normal.push(pass);
        Ok(())
    }

    pub fn register_cache(&mut self, cache: Arc<dyn ClassCache>) -> WeaveResult<()> {
        self.ensure_open("a class cache")?;
        debug!("Registered class cache {}", cache.name());
        if let Some(origin) = cache.origin() {
            self.protect(origin);
        }
        self.caches.push(cache);
        Ok(())
    }

    /// Close the registration window. Calling it again is a no-op.
    pub fn freeze(&mut self) {
        if self.phase == Phase::Open {
            self.phase = Phase::Frozen;
            info!(
                "Registry frozen: {} early, {} normal passes, {} caches",
                self.early.len(),
                self.normal.len(),
                self.caches.len()
            );
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.phase == Phase::Frozen
    }

    pub fn early_passes(&self) -> &[Arc<dyn Pass>] {
        &self.early
    }

    pub fn normal_passes(&self) -> &[Arc<dyn Pass>] {
        &self.normal
    }

    pub fn cache_names(&self) -> Vec<&str> {
        self.caches.iter().map(|c| c.name()).collect()
    }

    /// Namespaces of registered passes and caches
    pub fn protected_prefixes(&self) -> &[String] {
        &self.protected
    }

    /// Resolve the active cache back-end.
    ///
    /// The first call decides and the answer holds for the process lifetime.
    /// When the preferred name in `settings` matches nothing, the first
    /// registered cache wins and becomes the new preference; the caller
    /// persists `settings`.
    pub fn select_cache(
        &self,
        settings: &mut CacheConfig,
    ) -> WeaveResult<Option<Arc<dyn ClassCache>>> {
        if !self.is_frozen() {
            return Err(WeaveError::RegistryOpen);
        }

        let selected = self.selected.get_or_init(|| {
            if self.caches.is_empty() || !settings.enabled {
                debug!("No class cache selected");
                return None;
            }

            if let Some(preferred) = settings.preferred.as_deref() {
                if let Some(cache) = self.caches.iter().find(|c| c.name() == preferred) {
                    info!("Using preferred class cache {}", preferred);
                    return Some(Arc::clone(cache));
                }
            }

            let first = Arc::clone(self.caches.first()?);
            info!("Selected class cache {}", first.name());
            settings.preferred = Some(first.name().to_string());
            Some(first)
        });

        Ok(selected.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
