//! CLI command implementations

pub mod cache;
pub mod config;
pub mod inspect;
pub mod transform;

pub use cache::execute as cache;
pub use config::execute as config;
pub use inspect::execute as inspect;
pub use transform::execute as transform;
