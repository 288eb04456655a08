//! Cache-line padded hot fields.
//!
//! The cursor, each stage's sequence and each stage's running flag are written
//! by different threads. Every one of them gets a cache line of its own so a
//! write to one never invalidates the line holding another.

use std::sync::atomic::{ AtomicBool, AtomicI64, Ordering };

use static_assertions::const_assert_eq;

use crate::constants::{ CACHE_LINE_SIZE, INITIAL_CURSOR_VALUE };
use crate::disruptor::Sequence;

/// Cache-line padded sequence counter.
///
/// `get` is an acquire load and `set` a release store: a reader that observes
/// a value also observes every write the writer made before storing it.
#[repr(align(128))]
pub struct PaddedSequence {
    value: AtomicI64,
    _padding: [u8; CACHE_LINE_SIZE - 8],
}

const_assert_eq!(std::mem::size_of::<PaddedSequence>(), CACHE_LINE_SIZE);
const_assert_eq!(std::mem::align_of::<PaddedSequence>(), CACHE_LINE_SIZE);

impl PaddedSequence {
    pub fn new(initial: Sequence) -> Self {
        Self {
            value: AtomicI64::new(initial),
            _padding: [0; CACHE_LINE_SIZE - 8],
        }
    }

    #[inline(always)]
    pub fn get(&self) -> Sequence {
        self.value.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn set(&self, value: Sequence) {
        self.value.store(value, Ordering::Release);
    }

    /// Read with no ordering; only for values owned by the calling thread.
    #[inline(always)]
    pub fn get_relaxed(&self) -> Sequence {
        self.value.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn set_relaxed(&self, value: Sequence) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Atomically add `delta` and return the new value
    #[inline(always)]
    pub fn add_and_get(&self, delta: i64) -> Sequence {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }
}

impl Default for PaddedSequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for PaddedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PaddedSequence").field(&self.get()).finish()
    }
}

/// Cache-line padded flag (running / alerted).
#[repr(align(128))]
pub struct PaddedFlag {
    value: AtomicBool,
    _padding: [u8; CACHE_LINE_SIZE - 1],
}

const_assert_eq!(std::mem::size_of::<PaddedFlag>(), CACHE_LINE_SIZE);

impl PaddedFlag {
    pub fn new(initial: bool) -> Self {
        Self {
            value: AtomicBool::new(initial),
            _padding: [0; CACHE_LINE_SIZE - 1],
        }
    }

    #[inline(always)]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    /// Store `value` and return the previous one
    #[inline(always)]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for PaddedFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PaddedFlag").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_sequence_defaults_to_initial_cursor() {
        let seq = PaddedSequence::default();
        assert_eq!(seq.get(), INITIAL_CURSOR_VALUE);
    }

    #[test]
    fn test_padded_sequence_add_and_get() {
        let seq = PaddedSequence::new(-1);
        assert_eq!(seq.add_and_get(1), 0);
        assert_eq!(seq.add_and_get(4), 4);
        seq.set(10);
        assert_eq!(seq.get_relaxed(), 10);
    }

    #[test]
    fn test_adjacent_counters_do_not_share_a_line() {
        let pair = [PaddedSequence::new(0), PaddedSequence::new(0)];
        let a = &pair[0] as *const _ as usize;
        let b = &pair[1] as *const _ as usize;
        assert_eq!(a % CACHE_LINE_SIZE, 0);
        assert_eq!(b - a, CACHE_LINE_SIZE);
    }

    #[test]
    fn test_padded_flag_swap() {
        let flag = PaddedFlag::new(false);
        assert!(!flag.swap(true));
        assert!(flag.get());
        flag.set(false);
        assert!(!flag.get());
    }
}
