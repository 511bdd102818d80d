//! Transformation passes
//!
//! A pass is a cheap filter plus a mutation over a parsed [`ClassNode`].
//! Passes hold no per-unit state; everything they learn about one unit goes
//! into the tree or the [`TransformerFlags`] they are handed.

pub mod finalize;

pub use finalize::FinalizePass;

use crate::error::WeaveResult;
use crate::flags::TransformerFlags;
use crate::identifier::Identifier;
use crate::unit::ClassNode;

/// A registered transformation
pub trait Pass: Send + Sync {
    /// Stable name for logging
    fn name(&self) -> &Identifier;

    /// Dotted namespace holding this pass's own supporting units.
    ///
    /// Units under it are never handed to ordinary passes.
    fn origin(&self) -> &str;

    /// Whether the pass wants the unit at all. Called before any parsing.
    fn applies(&self, name: &str, transformed_name: &str) -> bool;

    /// Mutate `node`, returning `true` if anything changed
    ///
    /// # Errors
    ///
    /// Any error aborts the transformation of this unit.
    fn apply(&self, node: &mut ClassNode, flags: &mut TransformerFlags) -> WeaveResult<bool>;
}
