//! Privileged loader bridge
//!
//! Defines fully transformed units into the privileged loading domain. A
//! failed definition may leave the domain half populated, so the bridge
//! terminates the process instead of returning an error.

use crate::error::WeaveResult;
use crate::unit::UnitName;
use std::sync::Arc;
use tracing::{debug, error};

/// Exit code used when a privileged definition fails
pub const PRIVILEGED_FAILURE_EXIT: i32 = 70;

/// Host capability that defines a unit in the privileged domain
pub trait PrivilegedDefiner: Send + Sync {
    fn define(&self, unit: &UnitName, bytes: &[u8]) -> WeaveResult<()>;
}

/// Called with the failure before the bridge gives up
pub type FatalHandler = Arc<dyn Fn(&UnitName, &crate::error::WeaveError) + Send + Sync>;

pub struct PrivilegedBridge {
    definer: Arc<dyn PrivilegedDefiner>,
    on_fatal: FatalHandler,
}

impl PrivilegedBridge {
    /// A bridge that exits the process on failure
    pub fn new(definer: Arc<dyn PrivilegedDefiner>) -> Self {
        Self {
            definer,
            on_fatal: Arc::new(|_, _| std::process::exit(PRIVILEGED_FAILURE_EXIT)),
        }
    }

    /// Replace the termination step, for hosts that tear down differently
    pub fn with_fatal_handler(mut self, on_fatal: FatalHandler) -> Self {
        self.on_fatal = on_fatal;
        self
    }

    /// Define `bytes` as `unit` in the privileged domain.
    ///
    /// Does not return on failure unless a fatal handler that returns was installed.
    pub fn define_privileged(&self, unit: &UnitName, bytes: &[u8]) {
        match self.definer.define(unit, bytes) {
            Ok(()) => debug!("Defined {} in the privileged domain", unit),
            Err(e) => {
                error!("Cannot continue: defining {} failed: {}", unit, e);
                (self.on_fatal)(unit, &e);
            }
        }
    }
}
