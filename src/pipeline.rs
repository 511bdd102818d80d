//! Transformation pipeline
//!
//! Every unit entering [`Pipeline::transform`] takes exactly one of three
//! paths:
//!
//! | Path | Taken when | Runs |
//! |------|------------|------|
//! | short-circuit | the name was seen before | delegate only |
//! | protected | the name is under a protected prefix | delegate, finalize if privileged |
//! | normal | everything else | early passes, delegate, normal passes |
//!
//! Protected and normal results go through the [`CacheAdapter`]. Units
//! carrying the privileged marker are then handed to the
//! [`PrivilegedBridge`] and reported as [`Outcome::Consumed`].

use crate::bridge::PrivilegedBridge;
use crate::cache::CacheAdapter;
use crate::config::{Config, DumpMode};
use crate::dedup::{Admission, SeenSet};
use crate::delegate::{Delegate, IdentityDelegate};
use crate::dump::DumpSink;
use crate::error::{WeaveError, WeaveResult};
use crate::flags::{TransformerFlags, WriterFlags};
use crate::pass::{FinalizePass, Pass};
use crate::registry::Registry;
use crate::unit::{markers, Annotated, UnitCodec, UnitName, WireCodec};
use std::sync::Arc;
use tracing::debug;

/// Namespace of the pipeline's own supporting units
pub const SELF_PREFIX: &str = "classweave.";

/// Result of transforming one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Bytes to hand back to the loader
    Bytes(Vec<u8>),
    /// The delegate produced nothing
    Empty,
    /// Defined in the privileged domain; the loader must not define it again
    Consumed,
}

impl Outcome {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Empty | Self::Consumed => None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed)
    }
}

impl From<Option<Vec<u8>>> for Outcome {
    fn from(bytes: Option<Vec<u8>>) -> Self {
        bytes.map_or(Self::Empty, Self::Bytes)
    }
}

/// Per-process pipeline settings
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub dump_mode: DumpMode,
    /// Prefixes protected in addition to the pipeline's own and the registry's
    pub protected_prefixes: Vec<String>,
    pub rewrite_inline: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dump_mode: config.pipeline.dump,
            protected_prefixes: config.pipeline.protected_prefixes.clone(),
            rewrite_inline: config.finalize.rewrite_inline,
        }
    }
}

pub struct Pipeline {
    registry: Arc<Registry>,
    delegate: Arc<dyn Delegate>,
    codec: Arc<dyn UnitCodec>,
    bridge: PrivilegedBridge,
    cache: CacheAdapter,
    dump: Option<Arc<dyn DumpSink>>,
    dump_mode: DumpMode,
    protected: Vec<String>,
    finalize: FinalizePass,
    seen: SeenSet,
}

impl Pipeline {
    /// Build a pipeline over a frozen registry.
    ///
    /// Defaults to the identity delegate, the wire codec, no cache and no dump.
    pub fn new(registry: Arc<Registry>, bridge: PrivilegedBridge) -> WeaveResult<Self> {
        if !registry.is_frozen() {
            return Err(WeaveError::RegistryOpen);
        }

        let mut pipeline = Self {
            registry,
            delegate: Arc::new(IdentityDelegate),
            codec: Arc::new(WireCodec),
            bridge,
            cache: CacheAdapter::disabled(),
            dump: None,
            dump_mode: DumpMode::Off,
            protected: Vec::new(),
            finalize: FinalizePass::default(),
            seen: SeenSet::new(),
        };
        pipeline.set_protected(&[]);
        Ok(pipeline)
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn UnitCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_cache(mut self, cache: CacheAdapter) -> Self {
        self.cache = cache;
        self
    }

    /// Attach the dump collaborator; nothing is dumped while the mode is off
    pub fn with_dump(mut self, dump: Arc<dyn DumpSink>) -> Self {
        self.dump = Some(dump);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.dump_mode = options.dump_mode;
        self.finalize = FinalizePass::new(options.rewrite_inline);
        self.set_protected(&options.protected_prefixes);
        self
    }

    fn set_protected(&mut self, extra: &[String]) {
        let mut protected = vec![SELF_PREFIX.to_string()];
        let rest = self.registry.protected_prefixes().iter().chain(extra);
        for prefix in rest {
            if !prefix.is_empty() && !protected.contains(prefix) {
                protected.push(prefix.clone());
            }
        }
        self.protected = protected;
    }

    pub fn protected_prefixes(&self) -> &[String] {
        &self.protected
    }

    pub fn cache(&self) -> &CacheAdapter {
        &self.cache
    }

    /// Transform one unit
    pub fn transform(&self, unit: &UnitName, bytes: Option<&[u8]>) -> WeaveResult<Outcome> {
        if self.seen.admit(&unit.name) == Admission::Seen {
            debug!("{} already seen, deferring to delegate", unit);
            return Ok(self.call_delegate(unit, bytes.map(<[u8]>::to_vec))?.into());
        }

        let privileged = match bytes {
            Some(bytes) => self.requests_privileged(bytes)?,
            None => false,
        };

        let outcome = if self.is_protected(unit) {
            debug!("{} is protected", unit);
            self.cache
                .get_or_compute(bytes, || self.run_protected(unit, bytes, privileged))?
        } else {
            self.cache
                .get_or_compute(bytes, || self.run_normal(unit, bytes, privileged))?
        };

        Ok(self.route(unit, outcome, privileged))
    }

    fn is_protected(&self, unit: &UnitName) -> bool {
        self.protected.iter().any(|prefix| unit.in_namespace(prefix))
    }

    fn requests_privileged(&self, bytes: &[u8]) -> WeaveResult<bool> {
        let header = self.codec.read_header(bytes)?;
        Ok(header.has_annotation(markers::FORCE_PRIVILEGED))
    }

    fn strip_privileged_marker(&self, bytes: &[u8]) -> WeaveResult<Vec<u8>> {
        let mut node = self.codec.read(bytes)?;
        node.header.remove_annotations(markers::FORCE_PRIVILEGED);
        self.codec.write(&node, WriterFlags::empty())
    }

    fn run_protected(
        &self,
        unit: &UnitName,
        bytes: Option<&[u8]>,
        privileged: bool,
    ) -> WeaveResult<Outcome> {
        let working = match bytes {
            Some(bytes) if privileged => Some(self.strip_privileged_marker(bytes)?),
            other => other.map(<[u8]>::to_vec),
        };

        let Some(mut working) = self.call_delegate(unit, working)? else {
            return Ok(Outcome::Empty);
        };

        if privileged {
            let mut modified = false;
            let finalize: &dyn Pass = &self.finalize;
            working = self.run_phase(unit, working, &[finalize], &mut modified)?;
        }

        if self.dump_mode == DumpMode::Force {
            self.dump(unit, &working);
        }
        Ok(Outcome::Bytes(working))
    }

    fn run_normal(
        &self,
        unit: &UnitName,
        bytes: Option<&[u8]>,
        privileged: bool,
    ) -> WeaveResult<Outcome> {
        let Some(original) = bytes else {
            return Ok(self.call_delegate(unit, None)?.into());
        };

        let mut modified = self.dump_mode == DumpMode::Force;
        let mut working = if privileged {
            modified = true;
            self.strip_privileged_marker(original)?
        } else {
            original.to_vec()
        };

        let early: Vec<&dyn Pass> = self
            .registry
            .early_passes()
            .iter()
            .map(|pass| pass.as_ref())
            .collect();
        working = self.run_phase(unit, working, &early, &mut modified)?;

        let before_delegate = working.clone();
        let Some(mut working) = self.call_delegate(unit, Some(working))? else {
            return Ok(Outcome::Empty);
        };
        modified |= working != before_delegate;

        let mut normal: Vec<&dyn Pass> = self
            .registry
            .normal_passes()
            .iter()
            .map(|pass| pass.as_ref())
            .collect();
        if privileged {
            normal.push(&self.finalize);
        }
        working = self.run_phase(unit, working, &normal, &mut modified)?;

        if modified && self.dump_mode.is_enabled() {
            self.dump(unit, &working);
        }
        Ok(Outcome::Bytes(working))
    }

    /// Hand `bytes` to the delegate, attributing any failure to `unit`
    fn call_delegate(
        &self,
        unit: &UnitName,
        bytes: Option<Vec<u8>>,
    ) -> WeaveResult<Option<Vec<u8>>> {
        self.delegate.transform(unit, bytes).map_err(|e| match e {
            WeaveError::Delegate { .. } => e,
            other => WeaveError::delegate(unit.to_string(), other.to_string()),
        })
    }

    /// Run the passes that apply to `unit` over one shared parse of `bytes`.
    ///
    /// Re-serializes only when a pass reported a change.
    fn run_phase(
        &self,
        unit: &UnitName,
        bytes: Vec<u8>,
        passes: &[&dyn Pass],
        modified: &mut bool,
    ) -> WeaveResult<Vec<u8>> {
        let applicable: Vec<&dyn Pass> = passes
            .iter()
            .copied()
            .filter(|pass| pass.applies(&unit.name, &unit.transformed_name))
            .collect();
        if applicable.is_empty() {
            return Ok(bytes);
        }

        let mut node = self.codec.read(&bytes)?;
        let mut flags = TransformerFlags::new();
        let mut changed = false;
        for pass in applicable {
            let pass_changed = pass.apply(&mut node, &mut flags)?;
            debug!("Pass {} on {}: changed={}", pass.name(), unit, pass_changed);
            changed |= pass_changed;
        }

        if !changed {
            return Ok(bytes);
        }
        *modified = true;
        self.codec.write(&node, flags.writer_flags())
    }

    fn dump(&self, unit: &UnitName, bytes: &[u8]) {
        if let Some(dump) = &self.dump {
            dump.submit(&unit.name, bytes.to_vec());
        }
    }

    fn route(&self, unit: &UnitName, outcome: Outcome, privileged: bool) -> Outcome {
        match outcome {
            Outcome::Bytes(bytes) if privileged => {
                self.bridge.define_privileged(unit, &bytes);
                Outcome::Consumed
            }
            other => other,
        }
    }
}
