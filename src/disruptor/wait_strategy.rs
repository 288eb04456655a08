//! Wait strategies for ring buffer consumers
//!
//! This module provides different wait strategies that control how consumers
//! wait for new data in the ring buffer. Each strategy offers different
//! trade-offs between latency and CPU usage.
//!
//! Every strategy waits on the ring cursor when the barrier has no upstream
//! stages, and on the minimum sequence of those stages otherwise, so a
//! dependent stage never passes the stages it depends on.

use std::fmt;
use std::sync::Arc;
use std::thread;

use serde::{ Deserialize, Serialize };

use crate::constants::INITIAL_CURSOR_VALUE;
use crate::disruptor::common::{ PaddedFlag, PaddedSequence };
use crate::disruptor::consumer::{ minimum_sequence, Consumer };
use crate::disruptor::Sequence;

/// Outcome of waiting on a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitResult {
    /// Highest sequence that is safe to read
    pub available_sequence: Sequence,
    /// True if the barrier was alerted while waiting
    pub is_alerted: bool,
}

impl WaitResult {
    pub fn available(available_sequence: Sequence) -> Self {
        Self {
            available_sequence,
            is_alerted: false,
        }
    }

    /// The result returned to a waiter that was told to stop
    pub fn alerted() -> Self {
        Self {
            available_sequence: INITIAL_CURSOR_VALUE,
            is_alerted: true,
        }
    }
}

impl fmt::Display for WaitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WaitResult[available_sequence: {}, is_alerted: {}]",
            self.available_sequence,
            self.is_alerted
        )
    }
}

/// Trait for wait strategies that determine how consumers wait for data
pub trait WaitStrategy: Send + Sync {
    /// Wait for the given sequence to be available
    ///
    /// # Arguments
    ///
    /// * `dependents` - Upstream stages to respect; empty means the ring cursor
    /// * `cursor` - The ring buffer's published cursor
    /// * `alerted` - The waiting barrier's alert flag
    /// * `sequence` - The sequence number to wait for
    ///
    /// # Returns
    ///
    /// The highest available sequence (at least `sequence`), or
    /// [`WaitResult::alerted`] as soon as the alert flag is observed.
    fn wait_for(
        &self,
        dependents: &[Arc<dyn Consumer>],
        cursor: &PaddedSequence,
        alerted: &PaddedFlag,
        sequence: Sequence
    ) -> WaitResult;

    /// Wake every thread blocked in `wait_for`
    fn signal_all_when_blocking(&self);
}

/// Available wait strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitStrategyType {
    /// Mutex + condition variable; lowest CPU usage
    #[default]
    Blocking,
    /// Spin and yield the processor on every check
    Yielding,
    /// Busy spin for lowest latency; meant for pinned threads
    BusySpin,
}

impl WaitStrategyType {
    /// Build the strategy this option names
    pub fn create(self) -> Box<dyn WaitStrategy> {
        match self {
            Self::Blocking => Box::new(BlockingWaitStrategy::new()),
            Self::Yielding => Box::new(YieldingWaitStrategy::new()),
            Self::BusySpin => Box::new(BusySpinWaitStrategy::new()),
        }
    }
}

/// Spin on the upstream stages until they reach `sequence`.
/// `pause` runs between checks.
#[inline]
fn wait_for_dependents(
    dependents: &[Arc<dyn Consumer>],
    alerted: &PaddedFlag,
    sequence: Sequence,
    pause: impl Fn()
) -> WaitResult {
    loop {
        let available = minimum_sequence(dependents);
        if available >= sequence {
            return WaitResult::available(available);
        }
        if alerted.get() {
            return WaitResult::alerted();
        }
        pause();
    }
}

/// Spin on the cursor until it reaches `sequence`.
#[inline]
fn wait_for_cursor(
    cursor: &PaddedSequence,
    alerted: &PaddedFlag,
    sequence: Sequence,
    pause: impl Fn()
) -> WaitResult {
    loop {
        let available = cursor.get();
        if available >= sequence {
            return WaitResult::available(available);
        }
        if alerted.get() {
            return WaitResult::alerted();
        }
        pause();
    }
}

/// Busy spin wait strategy - lowest latency, highest CPU usage.
/// This strategy continuously checks for new data in a tight loop, making it
/// ideal for scenarios where latency is critical and each stage thread owns
/// a core. It will consume 100% of that core while waiting.
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl Default for BusySpinWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        dependents: &[Arc<dyn Consumer>],
        cursor: &PaddedSequence,
        alerted: &PaddedFlag,
        sequence: Sequence
    ) -> WaitResult {
        if dependents.is_empty() {
            wait_for_cursor(cursor, alerted, sequence, std::hint::spin_loop)
        } else {
            wait_for_dependents(dependents, alerted, sequence, std::hint::spin_loop)
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for busy spin - no blocking threads to signal
    }
}

/// Yielding wait strategy - moderate CPU usage and latency.
/// Re-checks the condition and yields the processor between checks, so an
/// idle stage gives its core to other runnable threads.
pub struct YieldingWaitStrategy;

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        dependents: &[Arc<dyn Consumer>],
        cursor: &PaddedSequence,
        alerted: &PaddedFlag,
        sequence: Sequence
    ) -> WaitResult {
        if dependents.is_empty() {
            wait_for_cursor(cursor, alerted, sequence, thread::yield_now)
        } else {
            wait_for_dependents(dependents, alerted, sequence, thread::yield_now)
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for yielding - threads re-check on their own
    }
}

/// Blocking wait strategy - balanced latency and CPU usage.
/// Checks the cursor without the lock first; when the sequence is not yet
/// published it parks on a condition variable and re-checks on every wake.
/// Committers and alerts wake all parked waiters through
/// `signal_all_when_blocking`.
pub struct BlockingWaitStrategy {
    mutex: parking_lot::Mutex<()>,
    condition: parking_lot::Condvar,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self {
            mutex: parking_lot::Mutex::new(()),
            condition: parking_lot::Condvar::new(),
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        dependents: &[Arc<dyn Consumer>],
        cursor: &PaddedSequence,
        alerted: &PaddedFlag,
        sequence: Sequence
    ) -> WaitResult {
        // Acquire load: a hit here sees the committed slot contents.
        let mut available = cursor.get();
        if available < sequence {
            let mut guard = self.mutex.lock();
            loop {
                available = cursor.get();
                if available >= sequence {
                    break;
                }
                if alerted.get() {
                    return WaitResult::alerted();
                }
                self.condition.wait(&mut guard);
            }
        }

        if dependents.is_empty() {
            return WaitResult::available(available);
        }

        // Upstream stages do not signal, they are polled.
        wait_for_dependents(dependents, alerted, sequence, thread::yield_now)
    }

    fn signal_all_when_blocking(&self) {
        // Taking the lock orders the wake after any waiter's cursor check.
        let _guard = self.mutex.lock();
        self.condition.notify_all();
    }
}
