//! RingBuffer - staged exchange of pre-allocated entries
//!
//! Owns the slot array and the registered stages. Typical wiring:
//!
//! ```rust,ignore
//! let ring = RingBuffer::new(Message::default, RingBufferConfig::new(1024)?)?;
//! ring.consume_with(vec![Box::new(journal)])?.then(vec![Box::new(business_logic)])?;
//! let producer = ring.create_producer_barrier()?;
//! ring.start_consumers()?;
//!
//! producer.publish_event(|_seq, msg| msg.fill_from(&bytes));
//!
//! ring.halt()?;
//! ```

use std::sync::Arc;
use std::thread::{ self, JoinHandle };

use crossbeam::utils::Backoff;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::cpu::pin_to_cpu;
use crate::disruptor::batch_consumer::{ BatchConsumer, BatchHandler };
use crate::disruptor::consumer::{ same_consumers, Consumer, NoOpConsumer };
use crate::disruptor::consumer_barrier::ConsumerBarrier;
use crate::disruptor::consumer_group::ConsumerGroup;
use crate::disruptor::consumer_repository::{ ConsumerId, ConsumerRepository };
use crate::disruptor::producer_barrier::ProducerBarrier;
use crate::disruptor::ring_buffer_core::{ Entry, RingBufferCore };
use crate::disruptor::{ ClaimStrategyType, RingBufferConfig, Sequence, WaitStrategyType };
use crate::error::{ Result, RingError };

struct StageThread {
    id: ConsumerId,
    handle: JoinHandle<Result<()>>,
}

/// Ring of pre-allocated entries shared by producers and staged consumers
pub struct RingBuffer<T: Send + Sync + 'static> {
    core: Arc<RingBufferCore<T>>,
    config: RingBufferConfig,
    repository: Mutex<ConsumerRepository>,
    threads: Mutex<Vec<StageThread>>,
    /// Serializes start and halt
    lifecycle: Mutex<()>,
    producer_barrier: OnceCell<Arc<ProducerBarrier<T>>>,
}

impl<T: Send + Sync + 'static> RingBuffer<T> {
    /// Create a ring of `config.capacity()` entries, each built by `factory`
    pub fn new<F>(factory: F, config: RingBufferConfig) -> Result<Self> where F: FnMut() -> T {
        config.validate()?;
        let capacity = config.capacity();

        let core = RingBufferCore::new(
            factory,
            capacity,
            config.claim_strategy,
            config.wait_strategy.create()
        );
        tracing::debug!(
            capacity,
            claim_strategy = ?config.claim_strategy,
            wait_strategy = ?config.wait_strategy,
            "ring buffer created"
        );

        Ok(Self {
            core: Arc::new(core),
            config,
            repository: Mutex::new(ConsumerRepository::new()),
            threads: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(()),
            producer_barrier: OnceCell::new(),
        })
    }

    /// Shorthand for the common options; `size` is rounded up to a power of 2
    pub fn with_options<F>(
        factory: F,
        size: usize,
        claim_strategy: ClaimStrategyType,
        wait_strategy: WaitStrategyType
    ) -> Result<Self>
        where F: FnMut() -> T
    {
        let config = RingBufferConfig::new(size)?
            .with_claim_strategy(claim_strategy)
            .with_wait_strategy(wait_strategy);
        Self::new(factory, config)
    }

    /// Number of slots (always a power of 2)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Highest committed sequence
    #[inline]
    pub fn cursor(&self) -> Sequence {
        self.core.cursor().get()
    }

    pub fn config(&self) -> &RingBufferConfig {
        &self.config
    }

    /// Slot header for `sequence`
    #[inline]
    pub fn entry(&self, sequence: Sequence) -> &Entry<T> {
        self.core.entry(sequence)
    }

    /// Payload stored at `sequence`'s slot.
    ///
    /// # Safety
    /// `sequence` must be committed, and no producer may hold a claim on the
    /// same slot while the reference lives.
    #[inline]
    pub unsafe fn get(&self, sequence: Sequence) -> &T {
        self.core.data(sequence)
    }

    /// Register root stages that consume straight from the ring cursor
    pub fn consume_with(&self, handlers: Vec<Box<dyn BatchHandler<T>>>) -> Result<ConsumerGroup<'_, T>> {
        self.create_consumers(&[], handlers)
    }

    /// Start a chain after already registered stages
    pub fn after(&self, ids: &[ConsumerId]) -> Result<ConsumerGroup<'_, T>> {
        let repository = self.repository.lock();
        for id in ids {
            if repository.consumer_for(*id).is_none() {
                return Err(
                    RingError::config(
                        format!("{} must be consuming from the ring buffer before it can be used in a barrier", id)
                    )
                );
            }
        }
        Ok(ConsumerGroup::new(self, ids.to_vec()))
    }

    pub(crate) fn create_consumers(
        &self,
        barrier_ids: &[ConsumerId],
        handlers: Vec<Box<dyn BatchHandler<T>>>
    ) -> Result<ConsumerGroup<'_, T>> {
        let mut repository = self.repository.lock();
        if self.producer_barrier.get().is_some() {
            return Err(
                RingError::config("Producer barrier must be initialised after all consumer barriers")
            );
        }
        if handlers.is_empty() {
            return Err(RingError::config("At least one handler is required"));
        }

        let dependents = barrier_ids
            .iter()
            .map(|id| {
                repository
                    .consumer_for(*id)
                    .ok_or_else(|| RingError::config(format!("{} is not registered", id)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ids = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let id = repository.next_id();
            let barrier = ConsumerBarrier::new(self.core.clone(), dependents.clone());
            let consumer = Arc::new(BatchConsumer::new(id.index(), barrier, handler));
            ids.push(repository.add(consumer));
        }
        repository.unmark_end_of_chain(barrier_ids);

        tracing::debug!(
            created = ?ids,
            after = ?barrier_ids,
            total = repository.len(),
            "consumer stages registered"
        );
        Ok(ConsumerGroup::new(self, ids))
    }

    /// Barrier over arbitrary stages, for processing loops managed outside the ring
    pub fn create_consumer_barrier(&self, consumers_to_track: &[Arc<dyn Consumer>]) -> ConsumerBarrier<T> {
        ConsumerBarrier::new(self.core.clone(), consumers_to_track.to_vec())
    }

    /// The producer barrier, tracking the stages that are leaves right now.
    ///
    /// Created on first call; later calls return the same instance. No stage
    /// can be registered once it exists. Fails if a barrier was already
    /// created over a different set of stages.
    pub fn create_producer_barrier(&self) -> Result<Arc<ProducerBarrier<T>>> {
        let repository = self.repository.lock();
        let leaves = repository.last_consumers_in_chain();

        if let Some(existing) = self.producer_barrier.get() {
            if !same_consumers(existing.consumers(), &leaves) {
                return Err(
                    RingError::config(
                        "Producer barrier already exists over a different consumer set"
                    )
                );
            }
            return Ok(existing.clone());
        }

        if leaves.is_empty() {
            return Err(
                RingError::config("Producer barrier requires at least one registered consumer")
            );
        }

        if self.config.throttle_leaf_consumers {
            let period = self.capacity() / 2;
            for leaf in &leaves {
                leaf.delay_sequence_write(period);
            }
        }

        // The repository lock is held, so nothing else can initialise the cell.
        let barrier = Arc::new(ProducerBarrier::new(self.core.clone(), leaves)?);
        Ok(self.producer_barrier.get_or_init(|| barrier).clone())
    }

    /// Producer barrier over an explicit set of stages
    pub fn create_producer_barrier_tracking(
        &self,
        consumers_to_track: &[Arc<dyn Consumer>]
    ) -> Result<Arc<ProducerBarrier<T>>> {
        let _repository = self.repository.lock();
        let barrier = self.producer_barrier.get_or_try_init(|| {
            ProducerBarrier::new(self.core.clone(), consumers_to_track.to_vec()).map(Arc::new)
        })?;

        if !same_consumers(barrier.consumers(), consumers_to_track) {
            return Err(
                RingError::config("Producer barrier already exists over a different consumer set")
            );
        }
        Ok(barrier.clone())
    }

    /// Stage that reports the ring cursor as its progress
    pub fn no_op_consumer(&self) -> Arc<dyn Consumer> {
        Arc::new(NoOpConsumer::new(self.core.shared_cursor()))
    }

    /// Runtime handle of a registered stage
    pub fn consumer(&self, id: ConsumerId) -> Option<Arc<dyn Consumer>> {
        self.repository.lock().consumer_for(id)
    }

    /// Registered stages that nothing depends on
    pub fn leaf_consumers(&self) -> Vec<Arc<dyn Consumer>> {
        self.repository.lock().last_consumers_in_chain()
    }

    /// Spawn a thread per registered stage that is not running yet.
    ///
    /// Returns once every spawned stage reports itself running, so no
    /// producer can race ahead of a stage that has not started. If a stage
    /// thread exits first, the ring is halted and the stage's error returned.
    pub fn start_consumers(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let stages: Vec<(ConsumerId, Arc<dyn Consumer>)> = {
            let repository = self.repository.lock();
            if repository.is_empty() {
                tracing::warn!("start requested with no registered stages");
                return Ok(());
            }
            repository
                .consumers()
                .enumerate()
                .map(|(index, info)| (ConsumerId(index), info.consumer().clone()))
                .collect()
        };

        let mut threads = self.threads.lock();
        let mut started = Vec::new();
        for (id, consumer) in stages {
            if threads.iter().any(|t| t.id == id) {
                continue;
            }

            let cpu = match self.config.cpu_affinity.as_slice() {
                [] => None,
                cpus => Some(cpus[id.index() % cpus.len()]),
            };
            let stage = consumer.clone();
            let handle = thread::Builder::new()
                .name(format!("ripple-{}", id))
                .spawn(move || {
                    if let Some(cpu) = cpu {
                        pin_to_cpu(cpu)?;
                    }
                    stage.run()
                })?;

            tracing::info!(stage = %id, ?cpu, "stage thread spawned");
            threads.push(StageThread { id, handle });
            started.push((id, consumer));
        }

        // A stage that has not entered run() yet would clear a halt sent now,
        // so every spawned stage must be running or gone before any halt.
        let mut exited = None;
        for (id, consumer) in &started {
            let backoff = Backoff::new();
            while !consumer.is_running() {
                let finished = threads
                    .iter()
                    .find(|t| t.id == *id)
                    .map_or(true, |t| t.handle.is_finished());
                if finished {
                    exited.get_or_insert(*id);
                    break;
                }
                backoff.snooze();
            }
        }
        drop(threads);

        match exited {
            None => Ok(()),
            Some(id) => {
                tracing::warn!(stage = %id, "stage exited during start, halting");
                let failure = self.halt_stages();
                Err(
                    failure.err().unwrap_or_else(|| {
                        RingError::unexpected(format!("{} exited before it started", id))
                    })
                )
            }
        }
    }

    /// Halt every stage and join its thread.
    ///
    /// Returns the first error a stage stopped with. Halted stages can be
    /// started again and resume after their last processed sequence.
    pub fn halt(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        self.halt_stages()
    }

    fn halt_stages(&self) -> Result<()> {
        for info in self.repository.lock().consumers() {
            info.consumer().halt();
        }

        let threads: Vec<StageThread> = self.threads.lock().drain(..).collect();
        let mut first_error = None;
        for StageThread { id, handle } in threads {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(RingError::unexpected(format!("{} panicked", id))));
            if let Err(e) = outcome {
                tracing::error!(stage = %id, error = %e, "stage stopped with error");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(cursor = self.cursor(), "ring buffer halted");
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: Send + Sync + 'static> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        if !self.threads.get_mut().is_empty() {
            let _ = self.halt();
        }
    }
}
