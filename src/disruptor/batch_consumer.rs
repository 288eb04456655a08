//! Batch consumer - the per-stage processing loop.
//!
//! ```text
//! stopped -> run() -> running -> halt() -> (alert wakes the wait) -> stopped
//! ```
//!
//! Each wait on the barrier yields a contiguous run of sequences. Every entry of
//! the run goes to `on_available`, then `on_end_of_batch` fires once. Batch size
//! depends only on how far producers got ahead; it has no fixed bound.

use std::marker::PhantomData;
use std::sync::atomic::{ AtomicUsize, Ordering };

use parking_lot::Mutex;

use crate::disruptor::common::{ PaddedFlag, PaddedSequence };
use crate::disruptor::consumer::Consumer;
use crate::disruptor::consumer_barrier::ConsumerBarrier;
use crate::disruptor::Sequence;
use crate::error::{ Result, RingError };
use crate::insights::record_batch;

/// Callbacks invoked by a stage for the entries it consumes
pub trait BatchHandler<T>: Send {
    /// Called once per consumed entry, in sequence order
    fn on_available(&mut self, sequence: Sequence, entry: &T) -> anyhow::Result<()>;

    /// Called once after each drained batch
    fn on_end_of_batch(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Start/stop notifications, if this handler wants them
    fn lifecycle(&mut self) -> Option<&mut dyn LifecycleAware> {
        None
    }
}

/// Optional start/stop notifications for a handler
pub trait LifecycleAware {
    /// Called on the stage thread before the first wait
    fn on_start(&mut self) -> anyhow::Result<()>;

    /// Called on the stage thread after the loop exits
    fn on_stop(&mut self) -> anyhow::Result<()>;
}

fn no_end_of_batch() -> anyhow::Result<()> {
    Ok(())
}

/// Handler built from closures
pub struct FnHandler<T, A, E = fn() -> anyhow::Result<()>> {
    on_available: A,
    on_end_of_batch: E,
    _entry: PhantomData<fn(&T)>,
}

impl<T, A> FnHandler<T, A> where A: FnMut(Sequence, &T) -> anyhow::Result<()> + Send {
    pub fn new(on_available: A) -> Self {
        Self {
            on_available,
            on_end_of_batch: no_end_of_batch,
            _entry: PhantomData,
        }
    }
}

impl<T, A, E> FnHandler<T, A, E> {
    /// Replace the end-of-batch callback
    pub fn with_end_of_batch<E2>(self, on_end_of_batch: E2) -> FnHandler<T, A, E2>
        where E2: FnMut() -> anyhow::Result<()> + Send
    {
        FnHandler {
            on_available: self.on_available,
            on_end_of_batch,
            _entry: PhantomData,
        }
    }
}

impl<T, A, E> BatchHandler<T>
    for FnHandler<T, A, E>
    where
        A: FnMut(Sequence, &T) -> anyhow::Result<()> + Send,
        E: FnMut() -> anyhow::Result<()> + Send
{
    fn on_available(&mut self, sequence: Sequence, entry: &T) -> anyhow::Result<()> {
        (self.on_available)(sequence, entry)
    }

    fn on_end_of_batch(&mut self) -> anyhow::Result<()> {
        (self.on_end_of_batch)()
    }
}

/// Runtime of one consumer stage
pub struct BatchConsumer<T> {
    id: usize,
    barrier: ConsumerBarrier<T>,
    handler: Mutex<Box<dyn BatchHandler<T>>>,
    running: PaddedFlag,
    sequence: PaddedSequence,
    /// 0 publishes after every batch
    sequence_update_period: AtomicUsize,
}

impl<T> BatchConsumer<T> {
    pub(crate) fn new(id: usize, barrier: ConsumerBarrier<T>, handler: Box<dyn BatchHandler<T>>) -> Self {
        Self {
            id,
            barrier,
            handler: Mutex::new(handler),
            running: PaddedFlag::new(false),
            sequence: PaddedSequence::default(),
            sequence_update_period: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn barrier(&self) -> &ConsumerBarrier<T> {
        &self.barrier
    }

    fn process(&self, handler: &mut dyn BatchHandler<T>, next_sequence: &mut Sequence) -> Result<()> {
        let period = self.sequence_update_period.load(Ordering::Relaxed) as i64;
        let mut next_publish = *next_sequence + period;

        while self.running.get() {
            let result = self.barrier.wait_for(*next_sequence);
            if result.is_alerted {
                break;
            }

            let first = *next_sequence;
            while *next_sequence <= result.available_sequence {
                // SAFETY: the barrier reported the sequence available and this
                // stage has not published past it.
                let entry = unsafe { self.barrier.get_entry(*next_sequence) };
                handler
                    .on_available(*next_sequence, entry)
                    .map_err(|e| RingError::handler(*next_sequence, e))?;
                *next_sequence += 1;
            }
            handler.on_end_of_batch().map_err(|e| RingError::handler(*next_sequence - 1, e))?;
            record_batch(self.id, first, *next_sequence - 1);

            if period == 0 {
                self.sequence.set(*next_sequence - 1);
            } else if *next_sequence > next_publish {
                self.sequence.set(*next_sequence - 1);
                next_publish += period;
            }
        }
        Ok(())
    }
}

impl<T: Send + Sync> Consumer for BatchConsumer<T> {
    fn sequence(&self) -> Sequence {
        self.sequence.get()
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn run(&self) -> Result<()> {
        let mut handler = self.handler
            .try_lock()
            .ok_or_else(|| RingError::unexpected(format!("stage {} is already running", self.id)))?;

        self.barrier.clear_alert();
        self.running.set(true);
        tracing::info!(stage = self.id, resume_from = self.sequence.get() + 1, "stage started");

        let mut next_sequence = self.sequence.get() + 1;
        let mut outcome = match handler.lifecycle() {
            Some(lifecycle) => lifecycle.on_start().map_err(|e| RingError::handler(next_sequence - 1, e)),
            None => Ok(()),
        };
        if outcome.is_ok() {
            outcome = self.process(&mut **handler, &mut next_sequence);
        }

        // Throttled stages may hold back progress; flush it so a restart resumes here.
        self.sequence.set(next_sequence - 1);
        self.running.set(false);

        if let Some(lifecycle) = handler.lifecycle() {
            if let Err(e) = lifecycle.on_stop() {
                tracing::warn!(stage = self.id, error = %e, "stop hook failed");
                if outcome.is_ok() {
                    outcome = Err(RingError::handler(next_sequence - 1, e));
                }
            }
        }

        match &outcome {
            Ok(()) => tracing::info!(stage = self.id, sequence = next_sequence - 1, "stage stopped"),
            Err(e) => tracing::error!(stage = self.id, error = %e, "stage aborted"),
        }
        outcome
    }

    fn halt(&self) {
        self.running.set(false);
        self.barrier.alert();
    }

    fn delay_sequence_write(&self, period: usize) {
        self.sequence_update_period.store(period, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::claim_strategy::ClaimStrategyType;
    use crate::disruptor::ring_buffer_core::RingBufferCore;
    use crate::disruptor::wait_strategy::WaitStrategyType;
    use std::sync::Arc;
    use std::thread;
    use std::time::{ Duration, Instant };

    fn core() -> Arc<RingBufferCore<u64>> {
        Arc::new(
            RingBufferCore::new(
                || 0,
                8,
                ClaimStrategyType::SingleProducer,
                WaitStrategyType::Yielding.create()
            )
        )
    }

    fn publish(core: &RingBufferCore<u64>, sequence: Sequence, value: u64) {
        unsafe {
            *core.data_mut(sequence) = value;
        }
        core.cursor().set(sequence);
    }

    fn wait_until(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::yield_now();
        }
    }

    struct Recording {
        seen: Arc<Mutex<Vec<(Sequence, u64)>>>,
        batches: Arc<AtomicUsize>,
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl BatchHandler<u64> for Recording {
        fn on_available(&mut self, sequence: Sequence, entry: &u64) -> anyhow::Result<()> {
            self.seen.lock().push((sequence, *entry));
            Ok(())
        }

        fn on_end_of_batch(&mut self) -> anyhow::Result<()> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn lifecycle(&mut self) -> Option<&mut dyn LifecycleAware> {
            Some(self)
        }
    }

    impl LifecycleAware for Recording {
        fn on_start(&mut self) -> anyhow::Result<()> {
            self.events.lock().push("start");
            Ok(())
        }

        fn on_stop(&mut self) -> anyhow::Result<()> {
            self.events.lock().push("stop");
            Ok(())
        }
    }

    #[test]
    fn test_processes_batches_and_lifecycle() {
        let core = core();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(Mutex::new(Vec::new()));
        let handler = Recording {
            seen: seen.clone(),
            batches: batches.clone(),
            events: events.clone(),
        };
        let stage = Arc::new(
            BatchConsumer::new(0, ConsumerBarrier::new(core.clone(), Vec::new()), Box::new(handler))
        );

        let s = stage.clone();
        let worker = thread::spawn(move || s.run());
        wait_until("stage running", || stage.is_running());

        for seq in 0..4 {
            publish(&core, seq, (seq as u64) + 100);
        }
        wait_until("stage caught up", || stage.sequence() == 3);
        assert!(batches.load(Ordering::SeqCst) >= 1);

        stage.halt();
        worker.join().unwrap().unwrap();

        assert!(!stage.is_running());
        assert_eq!(*seen.lock(), vec![(0, 100), (1, 101), (2, 102), (3, 103)]);
        assert_eq!(*events.lock(), vec!["start", "stop"]);
    }

    #[test]
    fn test_halted_stage_resumes_after_last_processed() {
        let core = core();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FnHandler::new(move |seq, _entry: &u64| {
            sink.lock().push(seq);
            Ok(())
        });
        let stage = Arc::new(
            BatchConsumer::new(0, ConsumerBarrier::new(core.clone(), Vec::new()), Box::new(handler))
        );

        let s = stage.clone();
        let worker = thread::spawn(move || s.run());
        wait_until("stage running", || stage.is_running());
        publish(&core, 0, 1);
        publish(&core, 1, 1);
        wait_until("first run caught up", || stage.sequence() == 1);
        stage.halt();
        worker.join().unwrap().unwrap();

        publish(&core, 2, 1);
        let s = stage.clone();
        let worker = thread::spawn(move || s.run());
        wait_until("second run caught up", || stage.sequence() == 2);
        stage.halt();
        worker.join().unwrap().unwrap();

        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_handler_error_aborts_stage() {
        let core = core();
        let handler = FnHandler::new(|seq, _entry: &u64| {
            if seq == 1 { Err(anyhow::anyhow!("poison entry")) } else { Ok(()) }
        });
        let stage = Arc::new(
            BatchConsumer::new(3, ConsumerBarrier::new(core.clone(), Vec::new()), Box::new(handler))
        );

        publish(&core, 0, 0);
        publish(&core, 1, 0);
        let err = stage.run().unwrap_err();

        match err {
            RingError::Handler { sequence, .. } => assert_eq!(sequence, 1),
            other => panic!("unexpected error {other}"),
        }
        assert!(!stage.is_running());
        assert_eq!(stage.sequence(), 0);
    }

    #[test]
    fn test_throttled_stage_publishes_periodically() {
        let core = core();
        let stage = Arc::new(
            BatchConsumer::new(
                0,
                ConsumerBarrier::new(core.clone(), Vec::new()),
                Box::new(FnHandler::new(|_, _: &u64| Ok(())))
            )
        );
        stage.delay_sequence_write(4);

        let s = stage.clone();
        let worker = thread::spawn(move || s.run());
        wait_until("stage running", || stage.is_running());

        publish(&core, 0, 0);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(stage.sequence(), -1, "throttled stage published early");

        for seq in 1..6 {
            publish(&core, seq, 0);
        }
        wait_until("periodic publish", || stage.sequence() >= 4);

        stage.halt();
        worker.join().unwrap().unwrap();
        assert_eq!(stage.sequence(), 5);
    }

    #[test]
    fn test_concurrent_run_is_rejected() {
        let core = core();
        let stage = Arc::new(
            BatchConsumer::new(
                0,
                ConsumerBarrier::new(core, Vec::new()),
                Box::new(FnHandler::new(|_, _: &u64| Ok(())))
            )
        );

        let s = stage.clone();
        let worker = thread::spawn(move || s.run());
        wait_until("stage running", || stage.is_running());

        assert!(stage.run().is_err());
        stage.halt();
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_end_of_batch_closure() {
        let core = core();
        let ends = Arc::new(AtomicUsize::new(0));
        let counter = ends.clone();
        let handler = FnHandler::new(|_, _: &u64| Ok(())).with_end_of_batch(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let stage = Arc::new(
            BatchConsumer::new(0, ConsumerBarrier::new(core.clone(), Vec::new()), Box::new(handler))
        );

        let s = stage.clone();
        let worker = thread::spawn(move || s.run());
        wait_until("stage running", || stage.is_running());
        publish(&core, 0, 0);
        wait_until("end of batch", || ends.load(Ordering::SeqCst) >= 1);

        stage.halt();
        worker.join().unwrap().unwrap();
    }
}
