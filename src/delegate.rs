//! Upstream delegate authority
//!
//! The delegate runs exactly once for every unit that is not short-circuited,
//! between the early and normal pass phases. Its output replaces the working
//! bytes unconditionally.

use crate::error::WeaveResult;
use crate::unit::UnitName;

pub trait Delegate: Send + Sync {
    /// Transform `bytes` for `unit`, returning them unchanged when there is nothing to do
    fn transform(&self, unit: &UnitName, bytes: Option<Vec<u8>>) -> WeaveResult<Option<Vec<u8>>>;
}

/// Delegate that hands bytes back untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDelegate;

impl Delegate for IdentityDelegate {
    fn transform(&self, _unit: &UnitName, bytes: Option<Vec<u8>>) -> WeaveResult<Option<Vec<u8>>> {
        Ok(bytes)
    }
}
