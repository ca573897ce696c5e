use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use utoipa::IntoParams;

use crate::event::{EntityEvent, EventKind};

pub const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast bus shared by every service; cloning shares the channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EntityEvent>,
}

impl EventBus {
    /// `capacity` is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to current subscribers and return how many received it.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: EntityEvent) -> usize {
        let entity = event.entity.clone();
        let (kind, id) = (event.kind, event.id);
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(%entity, %kind, id, receivers, "Entity event published");
                receivers
            }
            Err(_) => {
                tracing::trace!(%entity, %kind, id, "Entity event dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events matching `filter`, from now on. Lagged gaps are skipped.
    pub fn stream(&self, filter: EventFilter) -> impl Stream<Item = EntityEvent> + Send + 'static + use<> {
        BroadcastStream::new(self.subscribe()).filter_map(move |received| {
            let event = match received {
                Ok(event) if filter.matches(&event) => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event subscriber lagged, skipping missed events");
                    None
                }
            };
            futures::future::ready(event)
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Subscription filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventFilter {
    /// Only events of this entity type, e.g. `enrich_pipeline`
    pub entity: Option<String>,
    /// Only events of this kind
    pub kind: Option<EventKind>,
}

impl EventFilter {
    pub fn matches(&self, event: &EntityEvent) -> bool {
        self.entity.as_deref().is_none_or(|entity| entity == event.entity)
            && self.kind.is_none_or(|kind| kind == event.kind)
    }
}
