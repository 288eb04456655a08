//! ripple - staged event exchange over a pre-allocated ring buffer.
//!
//! Producers claim sequences, write entries in place and commit them in order.
//! Consumer stages drain committed entries in batches and can be chained so a
//! stage only sees an entry after the stages it depends on are done with it.
//!
//! ```rust,no_run
//! use ripple::disruptor::{ FnHandler, RingBuffer, RingBufferConfig, WaitStrategyType };
//!
//! # fn main() -> ripple::Result<()> {
//! let config = RingBufferConfig::new(1024)?.with_wait_strategy(WaitStrategyType::Yielding);
//! let ring = RingBuffer::new(|| 0u64, config)?;
//!
//! let journal = FnHandler::new(|seq, value: &u64| {
//!     println!("journal {} = {}", seq, value);
//!     Ok(())
//! });
//! let apply = FnHandler::new(|_seq, _value: &u64| Ok(()));
//! ring.consume_with(vec![Box::new(journal)])?.then(vec![Box::new(apply)])?;
//!
//! let producer = ring.create_producer_barrier()?;
//! ring.start_consumers()?;
//! producer.publish_event(|seq, slot| *slot = seq as u64 * 2);
//! ring.halt()?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod cpu;
pub mod disruptor;
pub mod error;
pub mod insights;

pub use disruptor::{
    BatchHandler,
    ClaimStrategyType,
    Consumer,
    ConsumerId,
    FnHandler,
    LifecycleAware,
    RingBuffer,
    RingBufferConfig,
    Sequence,
    WaitStrategyType,
};
pub use error::{ Result, RingError };
