//! Insights - Observability for ripple.
//!
//! Stages and barriers emit `tracing` events; install any subscriber to see them.
//! The hot-path `record_*` helpers compile to nothing unless the `trace-events`
//! feature is enabled.
//!
//! ```rust,ignore
//! ripple::insights::init_tracing();
//! ```

use crate::disruptor::Sequence;

/// Install a fmt subscriber for the process. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_thread_names(true)
        .try_init();
}

/// Record a producer stalled on slow consumers (creates a span)
#[cfg(feature = "trace-events")]
#[inline]
pub fn record_backpressure(sequence: Sequence, consumer_minimum: Sequence) {
    let _span = tracing::trace_span!("backpressure", sequence, consumer_minimum).entered();
}

#[cfg(not(feature = "trace-events"))]
#[inline(always)]
pub fn record_backpressure(_sequence: Sequence, _consumer_minimum: Sequence) {}

/// Record a batch drained by a stage
#[cfg(feature = "trace-events")]
#[inline]
pub fn record_batch(stage: usize, first: Sequence, last: Sequence) {
    tracing::trace!(stage, first, last, size = last - first + 1, "batch processed");
}

#[cfg(not(feature = "trace-events"))]
#[inline(always)]
pub fn record_batch(_stage: usize, _first: Sequence, _last: Sequence) {}
