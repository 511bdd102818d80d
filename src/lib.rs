//! classweave - class unit transformation pipeline
//!
//! Intercepts class units on their way into a runtime and rewrites them
//! through an ordered set of passes, with a content-addressed cache,
//! per-name deduplication and diversion of privileged units.

pub mod bridge;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod delegate;
pub mod dump;
pub mod error;
pub mod flags;
pub mod identifier;
pub mod launch;
pub mod pass;
pub mod pipeline;
pub mod registry;
pub mod ui;
pub mod unit;

pub use error::{WeaveError, WeaveResult};
pub use pipeline::{Outcome, Pipeline};
pub use registry::Registry;
