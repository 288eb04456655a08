//! Claim strategies hand out sequence numbers to producers.
//!
//! Selected once per ring buffer through [`ClaimStrategyType`].

use serde::{ Deserialize, Serialize };

use crate::disruptor::common::PaddedSequence;
use crate::disruptor::Sequence;

/// Produces monotonically increasing sequences for producers
pub trait ClaimStrategy: Send + Sync {
    /// Claim the next sequence
    fn increment_and_get(&self) -> Sequence {
        self.increment_and_get_by(1)
    }

    /// Claim `delta` sequences at once, returning the highest one
    fn increment_and_get_by(&self, delta: i64) -> Sequence;

    /// Highest sequence handed out so far
    fn sequence(&self) -> Sequence;
}

/// Available claim strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClaimStrategyType {
    /// Any number of producer threads may claim concurrently
    #[default]
    MultiProducer,
    /// Exactly one producer thread; avoids the atomic read-modify-write
    SingleProducer,
}

impl ClaimStrategyType {
    /// Build the strategy this option names
    pub fn create(self) -> Box<dyn ClaimStrategy> {
        match self {
            Self::MultiProducer => Box::new(MultiProducerClaimStrategy::new()),
            Self::SingleProducer => Box::new(SingleProducerClaimStrategy::new()),
        }
    }

    pub fn is_multi_producer(self) -> bool {
        matches!(self, Self::MultiProducer)
    }
}

/// Atomic fetch-add claim, safe for concurrent producers
#[derive(Debug, Default)]
pub struct MultiProducerClaimStrategy {
    sequence: PaddedSequence,
}

impl MultiProducerClaimStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStrategy for MultiProducerClaimStrategy {
    #[inline(always)]
    fn increment_and_get_by(&self, delta: i64) -> Sequence {
        self.sequence.add_and_get(delta)
    }

    fn sequence(&self) -> Sequence {
        self.sequence.get()
    }
}

/// Plain load/store increment. Only valid with a single producer thread:
/// two concurrent callers can be handed the same sequence.
#[derive(Debug, Default)]
pub struct SingleProducerClaimStrategy {
    sequence: PaddedSequence,
}

impl SingleProducerClaimStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStrategy for SingleProducerClaimStrategy {
    #[inline(always)]
    fn increment_and_get_by(&self, delta: i64) -> Sequence {
        let next = self.sequence.get_relaxed() + delta;
        self.sequence.set_relaxed(next);
        next
    }

    fn sequence(&self) -> Sequence {
        self.sequence.get_relaxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_producer_sequences() {
        let strategy = ClaimStrategyType::SingleProducer.create();
        assert_eq!(strategy.sequence(), -1);
        assert_eq!(strategy.increment_and_get(), 0);
        assert_eq!(strategy.increment_and_get(), 1);
        assert_eq!(strategy.increment_and_get_by(5), 6);
        assert_eq!(strategy.sequence(), 6);
    }

    #[test]
    fn test_multi_producer_sequences() {
        let strategy = ClaimStrategyType::MultiProducer.create();
        assert_eq!(strategy.increment_and_get(), 0);
        assert_eq!(strategy.increment_and_get_by(3), 3);
    }

    #[test]
    fn test_multi_producer_claims_are_unique() {
        let strategy: Arc<dyn ClaimStrategy> = Arc::new(MultiProducerClaimStrategy::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = strategy.clone();
                thread::spawn(move || (0..1000).map(|_| s.increment_and_get()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for seq in handle.join().unwrap() {
                assert!(seen.insert(seq), "sequence {} claimed twice", seq);
            }
        }
        assert_eq!(seen.len(), 4000);
        assert_eq!(strategy.sequence(), 3999);
    }

    #[test]
    fn test_option_default_is_multi_producer() {
        assert!(ClaimStrategyType::default().is_multi_producer());
        assert!(!ClaimStrategyType::SingleProducer.is_multi_producer());
    }
}
