//! The stage contract shared by barriers, the producer and the registry.

use std::sync::Arc;

use crate::disruptor::common::{ PaddedFlag, PaddedSequence };
use crate::disruptor::Sequence;
use crate::error::Result;

/// A consumer stage running against the ring buffer.
///
/// Producers and downstream stages only ever look at `sequence()`; the
/// remaining methods drive the stage's lifecycle.
pub trait Consumer: Send + Sync {
    /// Highest sequence this stage has finished with
    fn sequence(&self) -> Sequence;

    /// True once `run` has started and until the stage stops
    fn is_running(&self) -> bool;

    /// Run the processing loop on the calling thread until halted
    fn run(&self) -> Result<()>;

    /// Ask the loop to stop; returns without waiting for it
    fn halt(&self);

    /// Publish progress only every `period` entries.
    /// Only valid for a stage nothing else depends on.
    fn delay_sequence_write(&self, period: usize);
}

/// Minimum sequence across `consumers`, or `Sequence::MAX` when empty
#[inline]
pub fn minimum_sequence(consumers: &[Arc<dyn Consumer>]) -> Sequence {
    consumers
        .iter()
        .map(|c| c.sequence())
        .min()
        .unwrap_or(Sequence::MAX)
}

/// Same stages, same order, compared by identity
pub(crate) fn same_consumers(a: &[Arc<dyn Consumer>], b: &[Arc<dyn Consumer>]) -> bool {
    a.len() == b.len() &&
        a
            .iter()
            .zip(b)
            .all(|(x, y)| std::ptr::addr_eq(Arc::as_ptr(x), Arc::as_ptr(y)))
}

/// Stage that does nothing and simply reports the ring cursor as its sequence.
///
/// Useful for pre-filling a ring from a producer, or in tests where a
/// producer barrier needs something to track.
pub struct NoOpConsumer {
    cursor: Arc<PaddedSequence>,
    running: PaddedFlag,
}

impl NoOpConsumer {
    pub(crate) fn new(cursor: Arc<PaddedSequence>) -> Self {
        Self {
            cursor,
            running: PaddedFlag::new(false),
        }
    }
}

impl Consumer for NoOpConsumer {
    fn sequence(&self) -> Sequence {
        self.cursor.get()
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn run(&self) -> Result<()> {
        self.running.set(true);
        Ok(())
    }

    fn halt(&self) {
        self.running.set(false);
    }

    fn delay_sequence_write(&self, _period: usize) {}
}
