//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// classweave - class unit transformation pipeline
///
/// Runs class units through the registered pass pipeline and manages the
/// content-addressed class cache.
#[derive(Parser, Debug)]
#[command(name = "classweave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CLASSWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one class unit through the pipeline
    Transform(TransformArgs),

    /// Show the structure of a class unit
    Inspect(InspectArgs),

    /// Manage the class cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the transform command
#[derive(Parser, Debug)]
pub struct TransformArgs {
    /// Class unit file
    pub input: PathBuf,

    /// Fully-qualified dotted name of the unit (e.g. pkg.sub.Name)
    #[arg(short, long)]
    pub name: String,

    /// Name the unit is known as after transformation (defaults to --name)
    #[arg(long)]
    pub transformed_name: Option<String>,

    /// Write the transformed unit here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Where privileged units are defined (defaults to <state>/privileged)
    #[arg(long)]
    pub privileged_dir: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Class unit file
    pub input: PathBuf,

    /// Print method instructions
    #[arg(long)]
    pub code: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache location and entry count
    Info,

    /// Remove every cache entry
    Clear,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
