//! Process-wide startup
//!
//! Loads configuration, runs every initializer inside the registration
//! window, freezes the registry, settles the cache back-end and builds the
//! pipeline. Initialization happens once per process.

use crate::bridge::{PrivilegedBridge, PrivilegedDefiner};
use crate::cache::{CacheAdapter, DiskCache};
use crate::config::{Config, ConfigManager};
use crate::delegate::{Delegate, IdentityDelegate};
use crate::dump::{self, DumpService};
use crate::error::WeaveResult;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::registry::Registry;
use crate::unit::{UnitCodec, WireCodec};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hook invoked once while the registry is open
pub trait Initializer: Send + Sync {
    fn on_initialize(&self, registry: &mut Registry) -> WeaveResult<()>;
}

impl<F> Initializer for F
where
    F: Fn(&mut Registry) -> WeaveResult<()> + Send + Sync,
{
    fn on_initialize(&self, registry: &mut Registry) -> WeaveResult<()> {
        self(registry)
    }
}

pub struct Launcher {
    config: ConfigManager,
    initializers: Vec<Box<dyn Initializer>>,
    delegate: Arc<dyn Delegate>,
    codec: Arc<dyn UnitCodec>,
    definer: Arc<dyn PrivilegedDefiner>,
    disk_cache: bool,
}

impl Launcher {
    pub fn new(definer: Arc<dyn PrivilegedDefiner>) -> Self {
        Self {
            config: ConfigManager::new(),
            initializers: Vec::new(),
            delegate: Arc::new(IdentityDelegate),
            codec: Arc::new(WireCodec),
            definer,
            disk_cache: false,
        }
    }

    pub fn with_config(mut self, config: ConfigManager) -> Self {
        self.config = config;
        self
    }

    /// Add an initializer; they run in the order added
    pub fn with_initializer(mut self, initializer: impl Initializer + 'static) -> Self {
        self.initializers.push(Box::new(initializer));
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn UnitCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Register the bundled disk cache ahead of any initializer
    pub fn with_disk_cache(mut self) -> Self {
        self.disk_cache = true;
        self
    }

    pub async fn launch(self) -> WeaveResult<Launched> {
        let (mut config, loaded) = match self.config.load().await {
            Ok(config) => (config, true),
            Err(e) => {
                warn!("Failed to load configuration, using defaults: {}", e);
                (Config::default(), false)
            }
        };

        let mut registry = Registry::new();
        if self.disk_cache {
            let dir = ConfigManager::cache_dir(&config);
            registry.register_cache(Arc::new(DiskCache::new(dir)))?;
        }
        for initializer in &self.initializers {
            initializer.on_initialize(&mut registry)?;
        }
        debug!("Ran {} initializers", self.initializers.len());
        registry.freeze();

        let previous = config.cache.preferred.clone();
        let selected = registry.select_cache(&mut config.cache)?;
        // Never overwrite a file that failed to parse
        if loaded && config.cache.preferred != previous {
            if let Err(e) = self.config.save(&config).await {
                warn!("Failed to persist cache preference: {}", e);
            }
        }

        let cache = match selected {
            Some(backend) => match backend.load() {
                Ok(()) => CacheAdapter::new(backend),
                Err(e) => {
                    warn!("Class cache {} disabled for this run: {}", backend.name(), e);
                    CacheAdapter::disabled()
                }
            },
            None => CacheAdapter::disabled(),
        };

        let dump = if config.pipeline.dump.is_enabled() {
            let dir = ConfigManager::dump_dir(&config);
            dump::clean_dir(&dir);
            Some(Arc::new(DumpService::start(dir)))
        } else {
            None
        };

        let mut pipeline = Pipeline::new(Arc::new(registry), PrivilegedBridge::new(self.definer))?
            .with_delegate(self.delegate)
            .with_codec(self.codec)
            .with_cache(cache)
            .with_options(PipelineOptions::from_config(&config));
        if let Some(dump) = &dump {
            pipeline = pipeline.with_dump(dump.clone());
        }

        info!(
            "Pipeline ready (cache: {})",
            pipeline.cache().backend_name().unwrap_or("none")
        );
        Ok(Launched {
            pipeline,
            dump,
            config,
        })
    }
}

/// A running pipeline and the services it owns
pub struct Launched {
    pub pipeline: Pipeline,
    pub dump: Option<Arc<DumpService>>,
    /// Effective configuration after cache selection
    pub config: Config,
}

impl Launched {
    /// Drain pending dumps, returning how many were written
    pub fn shutdown(&self) -> usize {
        self.dump.as_ref().map_or(0, |dump| dump.shutdown())
    }
}
