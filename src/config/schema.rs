//! Configuration schema for classweave
//!
//! Configuration is stored at `~/.config/classweave/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Pipeline settings
    pub pipeline: PipelineConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Finalize pass settings
    pub finalize: FinalizeConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// When transformed units are written to the dump directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpMode {
    /// Never dump
    #[default]
    Off,
    /// Dump units whose bytes changed
    On,
    /// Dump every unit that went through the pipeline
    Force,
}

impl DumpMode {
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Debug dump of transformed units
    pub dump: DumpMode,

    /// Dump directory (defaults to `<state>/dump`)
    pub dump_dir: Option<PathBuf>,

    /// Extra namespaces that user passes must never touch
    pub protected_prefixes: Vec<String>,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the class cache
    pub enabled: bool,

    /// Name of the last selected back-end, rewritten on selection
    pub preferred: Option<String>,

    /// Directory for the disk back-end (defaults to `<state>/cache`)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preferred: None,
            dir: None,
        }
    }
}

/// Finalize pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    /// Rewrite the pipeline inline marker to the runtime one
    pub rewrite_inline: bool,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            rewrite_inline: true,
        }
    }
}
