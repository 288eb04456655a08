//! Ripple Constants
//!
//! Core constants used by the ring buffer and its barriers.

use crate::disruptor::Sequence;

/// Default ring buffer size (must be power of 2)
pub const DEFAULT_RING_BUFFER_SIZE: usize = 64 * 1024; // 64K slots

/// Maximum ring buffer size
pub const MAX_RING_BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4M slots

/// Cache line size used for padding hot counters.
/// 128 covers adjacent-line prefetching on x86 and the 128B lines on Apple silicon.
pub const CACHE_LINE_SIZE: usize = 128;

/// Value of every cursor and stage sequence before anything is published
pub const INITIAL_CURSOR_VALUE: Sequence = -1;
