use std::{marker::PhantomData, sync::Arc};

use tokio::sync::broadcast::{self, error::RecvError};

use super::{Event, Topic};

/// Every event published on a bus, in publish order. A subscriber that
/// falls more than the bus capacity behind loses the oldest events.
pub struct EventStream {
    events: broadcast::Receiver<Arc<Event>>,
}

impl EventStream {
    pub(super) const fn new(events: broadcast::Receiver<Arc<Event>>) -> Self {
        Self { events }
    }

    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream lagged, dropped {skipped} oldest events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Payloads of a single topic.
pub struct TopicStream<T: Topic> {
    inner: EventStream,
    _topic: PhantomData<fn() -> T>,
}

impl<T: Topic> TopicStream<T> {
    pub(super) const fn new(inner: EventStream) -> Self {
        Self {
            inner,
            _topic: PhantomData,
        }
    }

    pub async fn recv(&mut self) -> Option<T::Payload> {
        while let Some(event) = self.inner.recv().await {
            if let Some(payload) = T::extract(&event) {
                return Some(payload.clone());
            }
        }
        None
    }
}
