//! Staged ring buffer based on the LMAX Disruptor pattern.
//!
//! ## Pieces
//!
//! | Piece | Type | Role |
//! |-------|------|------|
//! | Ring | `RingBuffer<T>` | Pre-allocated entries, stage registry, thread lifecycle |
//! | Producer side | `ProducerBarrier<T>` | Claim, write in place, commit in order |
//! | Consumer side | `ConsumerBarrier<T>` | Wait until a sequence is safe to read |
//! | Stage | `BatchConsumer<T>` | Drains batches into a `BatchHandler` |
//! | Claiming | `ClaimStrategyType` | Single or multi producer sequence allocation |
//! | Waiting | `WaitStrategyType` | Blocking, yielding or busy-spin |
//!
//! ## Sequences
//!
//! Sequences are signed and start at `-1` (nothing published). Entry `n` lives
//! in slot `n & (capacity - 1)`; capacity is always a power of 2.
//!
//! ## Safety
//!
//! Entries are written in place through `unsafe` accessors. Callers must only
//! write claimed, uncommitted sequences and only read sequences a consumer
//! barrier reported available.

pub mod batch_consumer;
pub mod claim_strategy;
pub mod common;
pub mod consumer;
pub mod consumer_barrier;
pub mod consumer_group;
pub mod consumer_repository;
pub mod producer_barrier;
pub mod ring_buffer;
pub mod ring_buffer_core;
pub mod sequence_batch;
pub mod wait_strategy;

pub use batch_consumer::{ BatchConsumer, BatchHandler, FnHandler, LifecycleAware };
pub use claim_strategy::{
    ClaimStrategy,
    ClaimStrategyType,
    MultiProducerClaimStrategy,
    SingleProducerClaimStrategy,
};
pub use common::{ PaddedFlag, PaddedSequence };
pub use consumer::{ minimum_sequence, Consumer, NoOpConsumer };
pub use consumer_barrier::ConsumerBarrier;
pub use consumer_group::ConsumerGroup;
pub use consumer_repository::ConsumerId;
pub use producer_barrier::ProducerBarrier;
pub use ring_buffer::RingBuffer;
pub use ring_buffer_core::Entry;
pub use sequence_batch::SequenceBatch;
pub use wait_strategy::{
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    WaitResult,
    WaitStrategy,
    WaitStrategyType,
    YieldingWaitStrategy,
};

use serde::{ Deserialize, Serialize };

use crate::constants::{ DEFAULT_RING_BUFFER_SIZE, MAX_RING_BUFFER_SIZE };
use crate::cpu::validate_cpu_ids;
use crate::error::{ Result, RingError };

/// Sequence number of a ring buffer position; `-1` means nothing yet
pub type Sequence = i64;

/// Configuration for ring buffer behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    /// Requested number of slots, rounded up to a power of 2
    pub size: usize,
    /// How producers allocate sequences
    pub claim_strategy: ClaimStrategyType,
    /// How stages wait for entries
    pub wait_strategy: WaitStrategyType,
    /// Leaf stages publish progress every `capacity / 2` entries instead of
    /// after every batch. Cuts cache traffic; producers see progress later.
    pub throttle_leaf_consumers: bool,
    /// CPUs to pin stage threads to; stage `i` gets `cpu_affinity[i % len]`
    pub cpu_affinity: Vec<usize>,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_RING_BUFFER_SIZE,
            claim_strategy: ClaimStrategyType::default(),
            wait_strategy: WaitStrategyType::default(),
            throttle_leaf_consumers: false,
            cpu_affinity: Vec::new(),
        }
    }
}

impl RingBufferConfig {
    /// Create a new configuration with the specified size
    pub fn new(size: usize) -> Result<Self> {
        let config = Self {
            size,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Number of slots the ring will actually have
    pub fn capacity(&self) -> usize {
        self.size.next_power_of_two()
    }

    /// Check a configuration built field by field or deserialized
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(RingError::config("Ring buffer size must be greater than 0"));
        }
        if self.size > MAX_RING_BUFFER_SIZE {
            return Err(
                RingError::config(
                    format!("Ring buffer size {} exceeds maximum {}", self.size, MAX_RING_BUFFER_SIZE)
                )
            );
        }
        validate_cpu_ids(&self.cpu_affinity)
    }

    /// Set the claim strategy
    pub fn with_claim_strategy(mut self, strategy: ClaimStrategyType) -> Self {
        self.claim_strategy = strategy;
        self
    }

    /// Set the wait strategy
    pub fn with_wait_strategy(mut self, strategy: WaitStrategyType) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Enable or disable throttled progress publishing for leaf stages
    pub fn with_leaf_throttling(mut self, enable: bool) -> Self {
        self.throttle_leaf_consumers = enable;
        self
    }

    /// Pin stage threads to these CPUs
    pub fn with_cpu_affinity(mut self, cpu_ids: Vec<usize>) -> Result<Self> {
        validate_cpu_ids(&cpu_ids)?;
        self.cpu_affinity = cpu_ids;
        Ok(self)
    }
}
