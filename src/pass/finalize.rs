//! Synthetic finalize pass
//!
//! Appended to the normal pass list for units that request privileged
//! loading. It removes the privileged marker and turns the pipeline's inline
//! marker into the annotation the runtime recognizes.

use crate::error::WeaveResult;
use crate::flags::TransformerFlags;
use crate::identifier::Identifier;
use crate::pass::Pass;
use crate::pipeline::SELF_PREFIX;
use crate::unit::{markers, Annotated, ClassNode};
use tracing::debug;

pub struct FinalizePass {
    name: Identifier,
    rewrite_inline: bool,
}

impl FinalizePass {
    /// Create the pass; `rewrite_inline` is off when the runtime has no inline hint
    pub fn new(rewrite_inline: bool) -> Self {
        Self {
            name: Identifier::new("classweave", "finalize"),
            rewrite_inline,
        }
    }
}

impl Default for FinalizePass {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Pass for FinalizePass {
    fn name(&self) -> &Identifier {
        &self.name
    }

    fn origin(&self) -> &str {
        SELF_PREFIX
    }

    // Only ever scheduled for units that asked for it
    fn applies(&self, _name: &str, _transformed_name: &str) -> bool {
        true
    }

    fn apply(&self, node: &mut ClassNode, _flags: &mut TransformerFlags) -> WeaveResult<bool> {
        let mut changed = node.header.remove_annotations(markers::FORCE_PRIVILEGED);

        if self.rewrite_inline {
            for method in node.body.methods.iter_mut() {
                let n = method.retype_annotations(markers::FORCE_INLINE, markers::RUNTIME_FORCE_INLINE);
                if n > 0 {
                    debug!("Inline hint on {}.{}", node.header.name, method.name);
                    changed = true;
                }
            }
        }

        Ok(changed)
    }
}
