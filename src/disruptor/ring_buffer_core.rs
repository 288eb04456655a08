//! Shared core of the ring buffer
//!
//! The slot array, the published cursor and the selected strategies. The
//! ring buffer, both barrier kinds and the stages all hold it through an
//! `Arc`, so stage threads keep it alive independently of the `RingBuffer`
//! handle.

use std::cell::UnsafeCell;
use std::sync::atomic::{ AtomicI64, Ordering };
use std::sync::Arc;

use crate::constants::INITIAL_CURSOR_VALUE;
use crate::disruptor::claim_strategy::{ ClaimStrategy, ClaimStrategyType };
use crate::disruptor::common::PaddedSequence;
use crate::disruptor::wait_strategy::WaitStrategy;
use crate::disruptor::Sequence;

/// One pre-allocated slot: the payload plus the sequence last claimed into it
pub struct Entry<T> {
    sequence: AtomicI64,
    data: UnsafeCell<T>,
}

impl<T> Entry<T> {
    fn new(data: T) -> Self {
        Self {
            sequence: AtomicI64::new(INITIAL_CURSOR_VALUE),
            data: UnsafeCell::new(data),
        }
    }

    /// Sequence most recently claimed into this slot, -1 if never claimed
    #[inline(always)]
    pub fn sequence(&self) -> Sequence {
        self.sequence.load(Ordering::Relaxed)
    }
}

// SAFETY: the payload is written only by the producer holding an uncommitted
// claim on the slot and read by consumers only after the cursor (release/acquire)
// has passed it. The claim/commit/wait protocol provides the exclusion.
unsafe impl<T: Send + Sync> Sync for Entry<T> {}

pub(crate) struct RingBufferCore<T> {
    entries: Box<[Entry<T>]>,
    mask: usize,
    cursor: Arc<PaddedSequence>,
    claim_type: ClaimStrategyType,
    claim_strategy: Box<dyn ClaimStrategy>,
    wait_strategy: Box<dyn WaitStrategy>,
}

impl<T> RingBufferCore<T> {
    /// Fill `capacity` slots from `factory`; `capacity` must be a power of 2
    pub(crate) fn new<F>(
        mut factory: F,
        capacity: usize,
        claim_type: ClaimStrategyType,
        wait_strategy: Box<dyn WaitStrategy>
    ) -> Self
        where F: FnMut() -> T
    {
        debug_assert!(capacity.is_power_of_two());

        let entries = (0..capacity)
            .map(|_| Entry::new(factory()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            entries,
            mask: capacity - 1,
            cursor: Arc::new(PaddedSequence::new(INITIAL_CURSOR_VALUE)),
            claim_type,
            claim_strategy: claim_type.create(),
            wait_strategy,
        }
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub(crate) fn index_of(&self, sequence: Sequence) -> usize {
        (sequence as usize) & self.mask
    }

    #[inline(always)]
    pub(crate) fn entry(&self, sequence: Sequence) -> &Entry<T> {
        &self.entries[self.index_of(sequence)]
    }

    /// Shared reference to the payload at `sequence`.
    ///
    /// # Safety
    /// The sequence must be committed and must not have been claimed again by
    /// a producer (the reader's progress still gates it).
    #[inline(always)]
    pub(crate) unsafe fn data(&self, sequence: Sequence) -> &T {
        &*self.entry(sequence).data.get()
    }

    /// Mutable reference to the payload at `sequence`.
    ///
    /// # Safety
    /// The caller must hold an uncommitted claim on `sequence`, and must not
    /// create a second reference to the same slot.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub(crate) unsafe fn data_mut(&self, sequence: Sequence) -> &mut T {
        &mut *self.entry(sequence).data.get()
    }

    /// Record the claim in the slot's header
    #[inline(always)]
    pub(crate) fn mark_claimed(&self, sequence: Sequence) {
        self.entry(sequence).sequence.store(sequence, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn cursor(&self) -> &PaddedSequence {
        &self.cursor
    }

    pub(crate) fn shared_cursor(&self) -> Arc<PaddedSequence> {
        self.cursor.clone()
    }

    pub(crate) fn claim_type(&self) -> ClaimStrategyType {
        self.claim_type
    }

    #[inline(always)]
    pub(crate) fn claim_strategy(&self) -> &dyn ClaimStrategy {
        self.claim_strategy.as_ref()
    }

    #[inline(always)]
    pub(crate) fn wait_strategy(&self) -> &dyn WaitStrategy {
        self.wait_strategy.as_ref()
    }
}
