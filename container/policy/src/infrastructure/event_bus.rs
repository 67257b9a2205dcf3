// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Policy Decisions
//
// In-memory event streaming over tokio broadcast channels. Lets audit
// sinks and monitoring tasks observe PDP decisions without sitting on the
// request path. Events are lost when no subscriber is listening.

use crate::domain::events::PolicyEvent;
use crate::domain::invocation::InvocationId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to policy events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<PolicyEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a policy event to all subscribers
    pub fn publish(&self, event: PolicyEvent) {
        debug!("Publishing policy event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to policy event");
        }
    }

    /// Subscribe to all policy events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to drop events only
    pub fn subscribe_drops(&self) -> DropEventReceiver {
        DropEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all policy events
pub struct EventReceiver {
    receiver: broadcast::Receiver<PolicyEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<PolicyEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<PolicyEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver that skips everything except `RequestDropped`
pub struct DropEventReceiver {
    receiver: broadcast::Receiver<PolicyEvent>,
}

impl DropEventReceiver {
    /// Receive the next drop event, returning the invocation it belongs to
    pub async fn recv(&mut self) -> Result<(InvocationId, PolicyEvent), EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let PolicyEvent::RequestDropped { invocation_id, .. } = &event {
                return Ok((*invocation_id, event));
            }
        }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::DropCode;
    use crate::domain::role::Role;
    use chrono::Utc;

    fn authorized(id: InvocationId) -> PolicyEvent {
        PolicyEvent::RequestAuthorized {
            invocation_id: id,
            service: "ds".to_string(),
            operation: "get_data".to_string(),
            user_id: None,
            role: Role::Anonymous,
            via_ownership: false,
            resources_verified: 0,
            authorized_at: Utc::now(),
        }
    }

    fn dropped(id: InvocationId) -> PolicyEvent {
        PolicyEvent::RequestDropped {
            invocation_id: id,
            service: None,
            operation: None,
            user_id: None,
            code: DropCode::BadRequest,
            note: "Error: no op defined in message header!".to_string(),
            dropped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let id = InvocationId::new();

        event_bus.publish(authorized(id));

        match receiver.recv().await.unwrap() {
            PolicyEvent::RequestAuthorized { invocation_id, .. } => assert_eq!(invocation_id, id),
            other => panic!("Wrong event type received: {:?}", other),
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_drop_receiver_filters_authorized_events() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_drops();
        let drop_id = InvocationId::new();

        event_bus.publish(authorized(InvocationId::new()));
        event_bus.publish(dropped(drop_id));

        let (id, event) = receiver.recv().await.unwrap();
        assert_eq!(id, drop_id);
        assert!(matches!(event, PolicyEvent::RequestDropped { code: DropCode::BadRequest, .. }));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let event_bus = EventBus::default();
        assert_eq!(event_bus.subscriber_count(), 0);
        event_bus.publish(dropped(InvocationId::new()));
    }
}
