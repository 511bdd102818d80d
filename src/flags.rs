//! Per-invocation post-processing requests from passes

use bitflags::bitflags;

bitflags! {
    /// Serializer configuration chosen when a phase re-serializes a unit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WriterFlags: u8 {
        /// Recompute operand stack and local variable maximums
        const COMPUTE_MAXS = 0b01;
        /// Recompute verification frames
        const COMPUTE_FRAMES = 0b10;
    }
}

/// Accumulates what passes asked the serializer to recompute.
///
/// Both signals are monotonic: once requested they stay set. A tracker is
/// created for a single phase of a single unit and consumed by
/// [`TransformerFlags::writer_flags`].
#[derive(Debug, Default)]
pub struct TransformerFlags {
    requested: WriterFlags,
}

impl TransformerFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for stack and local maximums to be recomputed
    pub fn request_maxs(&mut self) {
        self.requested |= WriterFlags::COMPUTE_MAXS;
    }

    /// Ask for verification frames to be recomputed
    pub fn request_frames(&mut self) {
        self.requested |= WriterFlags::COMPUTE_FRAMES;
    }

    /// Consume the tracker, yielding the serializer configuration
    pub fn writer_flags(self) -> WriterFlags {
        self.requested
    }
}
