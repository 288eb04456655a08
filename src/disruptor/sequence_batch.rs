//! Descriptor for a block of sequences claimed together.

use std::fmt;

use crate::disruptor::Sequence;

/// Batch of contiguous sequences claimed in one call.
///
/// Immutable once built: `start == end - size + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceBatch {
    start: Sequence,
    end: Sequence,
    size: usize,
}

impl SequenceBatch {
    /// Build the batch of `size` sequences ending at `end`
    #[inline(always)]
    pub(crate) fn new(size: usize, end: Sequence) -> Self {
        debug_assert!(size > 0, "empty sequence batch");
        Self {
            start: end - (size as i64) + 1,
            end,
            size,
        }
    }

    /// First sequence of the batch
    #[inline(always)]
    pub fn start(&self) -> Sequence {
        self.start
    }

    /// Last sequence of the batch
    #[inline(always)]
    pub fn end(&self) -> Sequence {
        self.end
    }

    /// Number of sequences in the batch
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Iterate the batch's sequences in order
    pub fn sequences(&self) -> impl Iterator<Item = Sequence> {
        self.start..=self.end
    }
}

impl fmt::Display for SequenceBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceBatch[{}..={}, {}]", self.start, self.end, self.size)
    }
}
