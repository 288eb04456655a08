//! Fluent wiring of dependent stages.
//!
//! ```rust,ignore
//! // B and C only see an entry once A has processed it.
//! ring.consume_with(vec![a])?.then(vec![b, c])?;
//! ```

use std::sync::Arc;

use crate::disruptor::batch_consumer::BatchHandler;
use crate::disruptor::consumer::Consumer;
use crate::disruptor::consumer_repository::ConsumerId;
use crate::disruptor::ring_buffer::RingBuffer;
use crate::error::Result;

/// A set of stages created together, used as the dependency of the next set
pub struct ConsumerGroup<'a, T: Send + Sync + 'static> {
    ring_buffer: &'a RingBuffer<T>,
    ids: Vec<ConsumerId>,
}

impl<'a, T: Send + Sync + 'static> ConsumerGroup<'a, T> {
    pub(crate) fn new(ring_buffer: &'a RingBuffer<T>, ids: Vec<ConsumerId>) -> Self {
        Self { ring_buffer, ids }
    }

    /// Stages that only process an entry after every stage of this group has
    pub fn then(&self, handlers: Vec<Box<dyn BatchHandler<T>>>) -> Result<ConsumerGroup<'a, T>> {
        self.consume_with(handlers)
    }

    /// Same as [`Self::then`]; reads better after [`RingBuffer::after`]
    pub fn consume_with(
        &self,
        handlers: Vec<Box<dyn BatchHandler<T>>>
    ) -> Result<ConsumerGroup<'a, T>> {
        self.ring_buffer.create_consumers(&self.ids, handlers)
    }

    /// Ids of the stages in this group
    pub fn ids(&self) -> &[ConsumerId] {
        &self.ids
    }

    /// Runtime handles of the stages in this group
    pub fn consumers(&self) -> Vec<Arc<dyn Consumer>> {
        self.ids
            .iter()
            .filter_map(|id| self.ring_buffer.consumer(*id))
            .collect()
    }
}
