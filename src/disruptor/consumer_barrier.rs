//! Consumer barrier: the gate a processing loop waits on.
//!
//! A root barrier tracks no stages and waits on the ring cursor; a chained
//! barrier waits on the minimum progress of the stages it depends on.

use std::sync::Arc;

use crate::disruptor::common::PaddedFlag;
use crate::disruptor::consumer::Consumer;
use crate::disruptor::ring_buffer_core::RingBufferCore;
use crate::disruptor::wait_strategy::WaitResult;
use crate::disruptor::Sequence;

pub struct ConsumerBarrier<T> {
    core: Arc<RingBufferCore<T>>,
    dependents: Vec<Arc<dyn Consumer>>,
    alerted: PaddedFlag,
}

impl<T> ConsumerBarrier<T> {
    pub(crate) fn new(core: Arc<RingBufferCore<T>>, dependents: Vec<Arc<dyn Consumer>>) -> Self {
        tracing::debug!(dependents = dependents.len(), "consumer barrier created");
        Self {
            core,
            dependents,
            alerted: PaddedFlag::new(false),
        }
    }

    /// Payload at `sequence`.
    ///
    /// # Safety
    /// `sequence` must have been returned as available by [`Self::wait_for`]
    /// and the caller's stage must not have published progress past it.
    #[inline(always)]
    pub unsafe fn get_entry(&self, sequence: Sequence) -> &T {
        self.core.data(sequence)
    }

    /// Block until `sequence` is available or the barrier is alerted
    #[inline]
    pub fn wait_for(&self, sequence: Sequence) -> WaitResult {
        self.core
            .wait_strategy()
            .wait_for(&self.dependents, self.core.cursor(), &self.alerted, sequence)
    }

    /// The ring buffer's published cursor
    #[inline]
    pub fn cursor(&self) -> Sequence {
        self.core.cursor().get()
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted.get()
    }

    /// Wake any waiter and make it return an alerted result
    pub fn alert(&self) {
        self.alerted.set(true);
        self.core.wait_strategy().signal_all_when_blocking();
    }

    pub fn clear_alert(&self) {
        self.alerted.set(false);
    }

    /// Stages this barrier waits on; empty for a root barrier
    pub fn dependents(&self) -> &[Arc<dyn Consumer>] {
        &self.dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::claim_strategy::ClaimStrategyType;
    use crate::disruptor::consumer::tests::FixedConsumer;
    use crate::disruptor::wait_strategy::WaitStrategyType;
    use std::thread;
    use std::time::Duration;

    fn core(wait: WaitStrategyType) -> Arc<RingBufferCore<u32>> {
        Arc::new(RingBufferCore::new(|| 0, 8, ClaimStrategyType::SingleProducer, wait.create()))
    }

    #[test]
    fn test_root_barrier_waits_on_cursor() {
        let core = core(WaitStrategyType::Yielding);
        let barrier = ConsumerBarrier::new(core.clone(), Vec::new());

        unsafe {
            *core.data_mut(0) = 7;
        }
        core.cursor().set(0);

        let result = barrier.wait_for(0);
        assert_eq!(result, WaitResult::available(0));
        assert_eq!(barrier.cursor(), 0);
        assert_eq!(unsafe { *barrier.get_entry(0) }, 7);
    }

    #[test]
    fn test_chained_barrier_waits_on_slowest_dependent() {
        let core = core(WaitStrategyType::BusySpin);
        core.cursor().set(5);

        let upstream = Arc::new(FixedConsumer::new(1));
        let barrier = ConsumerBarrier::new(core.clone(), vec![upstream.clone() as Arc<dyn Consumer>]);

        let u = upstream.clone();
        let advancer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            u.set(5);
        });

        assert_eq!(barrier.wait_for(3), WaitResult::available(5));
        advancer.join().unwrap();
        assert_eq!(barrier.dependents().len(), 1);
    }

    #[test]
    fn test_alert_interrupts_blocked_wait() {
        let core = core(WaitStrategyType::Blocking);
        let barrier = Arc::new(ConsumerBarrier::new(core, Vec::new()));

        let b = barrier.clone();
        let waiter = thread::spawn(move || b.wait_for(0));

        thread::sleep(Duration::from_millis(10));
        barrier.alert();
        let result = waiter.join().unwrap();

        assert!(result.is_alerted);
        assert!(barrier.is_alerted());
        barrier.clear_alert();
        assert!(!barrier.is_alerted());
    }
}
