//! Registry of the stages consuming from a ring buffer.
//!
//! Tracks which stages are still at the end of a chain ("leaves"). A stage
//! stops being a leaf as soon as another stage is built to depend on it. The
//! producer barrier bounds its backpressure check by the leaves at the time it
//! is created.

use std::fmt;
use std::sync::Arc;

use crate::disruptor::consumer::Consumer;

/// Handle naming a registered stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(crate) usize);

impl ConsumerId {
    /// Registration index of the stage
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage-{}", self.0)
    }
}

pub(crate) struct ConsumerInfo {
    consumer: Arc<dyn Consumer>,
    end_of_chain: bool,
}

impl ConsumerInfo {
    pub(crate) fn consumer(&self) -> &Arc<dyn Consumer> {
        &self.consumer
    }

    pub(crate) fn is_end_of_chain(&self) -> bool {
        self.end_of_chain
    }
}

#[derive(Default)]
pub(crate) struct ConsumerRepository {
    consumers: Vec<ConsumerInfo>,
}

impl ConsumerRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Id the next registered stage will get
    pub(crate) fn next_id(&self) -> ConsumerId {
        ConsumerId(self.consumers.len())
    }

    /// Register a stage as a new leaf
    pub(crate) fn add(&mut self, consumer: Arc<dyn Consumer>) -> ConsumerId {
        let id = self.next_id();
        self.consumers.push(ConsumerInfo {
            consumer,
            end_of_chain: true,
        });
        id
    }

    /// Stages nothing depends on yet, in registration order
    pub(crate) fn last_consumers_in_chain(&self) -> Vec<Arc<dyn Consumer>> {
        self.consumers
            .iter()
            .filter(|info| info.is_end_of_chain())
            .map(|info| info.consumer.clone())
            .collect()
    }

    /// The given stages now have dependents
    pub(crate) fn unmark_end_of_chain(&mut self, ids: &[ConsumerId]) {
        for id in ids {
            if let Some(info) = self.consumers.get_mut(id.0) {
                info.end_of_chain = false;
            }
        }
    }

    pub(crate) fn consumer_for(&self, id: ConsumerId) -> Option<Arc<dyn Consumer>> {
        self.consumers.get(id.0).map(|info| info.consumer.clone())
    }

    pub(crate) fn consumers(&self) -> impl Iterator<Item = &ConsumerInfo> {
        self.consumers.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.consumers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}
