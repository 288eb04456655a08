//! Producer barrier: claim, write in place, commit.
//!
//! Claiming never hands out a sequence whose slot the slowest tracked stage
//! has not finished with, and commits become visible strictly in sequence
//! order even when several producers claim concurrently.

use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::disruptor::common::PaddedSequence;
use crate::disruptor::consumer::{ minimum_sequence, Consumer };
use crate::disruptor::ring_buffer_core::RingBufferCore;
use crate::disruptor::sequence_batch::SequenceBatch;
use crate::disruptor::Sequence;
use crate::error::{ Result, RingError };
use crate::insights::record_backpressure;

pub struct ProducerBarrier<T> {
    core: Arc<RingBufferCore<T>>,
    consumers: Vec<Arc<dyn Consumer>>,
    /// Cached minimum of `consumers`; only ever behind the real minimum
    last_consumer_minimum: PaddedSequence,
    multi_producer: bool,
}

impl<T> std::fmt::Debug for ProducerBarrier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerBarrier")
            .field("consumers", &self.consumers.len())
            .field("multi_producer", &self.multi_producer)
            .finish_non_exhaustive()
    }
}

impl<T> ProducerBarrier<T> {
    pub(crate) fn new(core: Arc<RingBufferCore<T>>, consumers: Vec<Arc<dyn Consumer>>) -> Result<Self> {
        if consumers.is_empty() {
            return Err(
                RingError::config(
                    "There must be at least one consumer to track for preventing ring wrap"
                )
            );
        }

        let multi_producer = core.claim_type().is_multi_producer();
        tracing::debug!(consumers = consumers.len(), multi_producer, "producer barrier created");

        Ok(Self {
            core,
            consumers,
            last_consumer_minimum: PaddedSequence::default(),
            multi_producer,
        })
    }

    /// Claim the next sequence, waiting for slow consumers if the ring is full
    #[inline]
    pub fn claim(&self) -> Sequence {
        let sequence = self.core.claim_strategy().increment_and_get();
        self.ensure_consumers_are_in_range(sequence);
        self.core.mark_claimed(sequence);
        sequence
    }

    /// Claim `size` contiguous sequences
    pub fn claim_batch(&self, size: usize) -> Result<SequenceBatch> {
        if size == 0 || size > self.core.capacity() {
            return Err(
                RingError::config(
                    format!("Batch size {} must be within 1..={}", size, self.core.capacity())
                )
            );
        }

        let end = self.core.claim_strategy().increment_and_get_by(size as i64);
        let batch = SequenceBatch::new(size, end);
        self.ensure_consumers_are_in_range(end);
        for sequence in batch.sequences() {
            self.core.mark_claimed(sequence);
        }
        Ok(batch)
    }

    /// Publish a claimed sequence to consumers
    #[inline]
    pub fn commit(&self, sequence: Sequence) {
        self.commit_range(sequence, 1);
    }

    /// Publish every sequence of a claimed batch
    #[inline]
    pub fn commit_batch(&self, batch: &SequenceBatch) {
        self.commit_range(batch.end(), batch.size() as i64);
    }

    /// Mutable payload for a claimed sequence.
    ///
    /// # Safety
    /// `sequence` must come from [`Self::claim`] or [`Self::claim_batch`] on this
    /// barrier and must not be committed yet. Only one reference per claimed
    /// slot may exist at a time.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub unsafe fn get_entry_mut(&self, sequence: Sequence) -> &mut T {
        self.core.data_mut(sequence)
    }

    /// Claim one slot, fill it through `writer` and commit it
    pub fn publish_event<F>(&self, writer: F) -> Sequence where F: FnOnce(Sequence, &mut T) {
        let sequence = self.claim();
        // SAFETY: freshly claimed, not committed, no other reference handed out.
        writer(sequence, unsafe { self.core.data_mut(sequence) });
        self.commit(sequence);
        sequence
    }

    /// Claim `size` slots, fill each through `writer` and commit them together
    pub fn publish_batch<F>(&self, size: usize, mut writer: F) -> Result<SequenceBatch>
        where F: FnMut(Sequence, &mut T)
    {
        let batch = self.claim_batch(size)?;
        for sequence in batch.sequences() {
            // SAFETY: every sequence of the batch is claimed and uncommitted.
            writer(sequence, unsafe { self.core.data_mut(sequence) });
        }
        self.commit_batch(&batch);
        Ok(batch)
    }

    /// The ring buffer's published cursor
    #[inline]
    pub fn cursor(&self) -> Sequence {
        self.core.cursor().get()
    }

    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Stages bounding the backpressure check
    pub fn consumers(&self) -> &[Arc<dyn Consumer>] {
        &self.consumers
    }

    /// Wait until `sequence` no longer overwrites an entry a tracked stage still needs
    #[inline]
    fn ensure_consumers_are_in_range(&self, sequence: Sequence) {
        let wrap_point = sequence - (self.core.capacity() as i64);
        if wrap_point <= self.last_consumer_minimum.get_relaxed() {
            return;
        }

        let mut minimum = minimum_sequence(&self.consumers);
        if wrap_point > minimum {
            record_backpressure(sequence, minimum);
            let backoff = Backoff::new();
            while wrap_point > minimum {
                backoff.snooze();
                minimum = minimum_sequence(&self.consumers);
            }
        }
        self.last_consumer_minimum.set_relaxed(minimum);
    }

    #[inline]
    fn commit_range(&self, sequence: Sequence, batch_size: i64) {
        if self.multi_producer {
            // Earlier claims may still be writing; publish after them.
            let expected = sequence - batch_size;
            let backoff = Backoff::new();
            while self.core.cursor().get() != expected {
                backoff.snooze();
            }
        }

        self.core.cursor().set(sequence);
        self.core.wait_strategy().signal_all_when_blocking();
    }
}
