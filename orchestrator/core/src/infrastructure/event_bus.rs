// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels. Observers (CLI
// progress output, tests) subscribe; publishers never block and events are
// dropped when nobody listens.

use crate::domain::events::{AgentLifecycleEvent, SwarmEvent, TaskEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    AgentLifecycle(AgentLifecycleEvent),
    Task(TaskEvent),
    Swarm(SwarmEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus; `capacity` events are buffered per
    /// receiver before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_agent_event(&self, event: AgentLifecycleEvent) {
        self.publish(DomainEvent::AgentLifecycle(event));
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(DomainEvent::Task(event));
    }

    pub fn publish_swarm_event(&self, event: SwarmEvent) {
        self.publish(DomainEvent::Swarm(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when there are no receivers
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single swarm
    pub fn subscribe_swarm(&self, swarm_id: Uuid) -> SwarmEventReceiver {
        SwarmEventReceiver {
            receiver: self.sender.subscribe(),
            swarm_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
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

/// Receiver filtered to one swarm
pub struct SwarmEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    swarm_id: Uuid,
}

impl SwarmEventReceiver {
    pub async fn recv(&mut self) -> Result<SwarmEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Swarm(swarm_event) = event {
                if swarm_event_id(&swarm_event) == self.swarm_id {
                    return Ok(swarm_event);
                }
            }
        }
    }
}

fn swarm_event_id(event: &SwarmEvent) -> Uuid {
    match event {
        SwarmEvent::SwarmCreated { swarm_id, .. }
        | SwarmEvent::SwarmStarted { swarm_id, .. }
        | SwarmEvent::BestSolutionImproved { swarm_id, .. }
        | SwarmEvent::SwarmFinished { swarm_id, .. }
        | SwarmEvent::MembershipChanged { swarm_id, .. } => *swarm_id,
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
    use crate::domain::agent::{AgentId, AgentState};
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let agent_id = AgentId::new();
        event_bus.publish_agent_event(AgentLifecycleEvent::AgentStateChanged {
            agent_id,
            from: AgentState::Created,
            to: AgentState::Running,
            changed_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::AgentLifecycle(AgentLifecycleEvent::AgentStateChanged { agent_id: id, to, .. }) => {
                assert_eq!(id, agent_id);
                assert_eq!(to, AgentState::Running);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_swarm_event_filtering() {
        let event_bus = EventBus::new(10);
        let swarm_id = Uuid::new_v4();
        let mut receiver = event_bus.subscribe_swarm(swarm_id);

        event_bus.publish_swarm_event(SwarmEvent::SwarmStarted {
            swarm_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        });
        event_bus.publish_swarm_event(SwarmEvent::BestSolutionImproved {
            swarm_id,
            iteration: 3,
            fitness: 0.5,
            improved_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            SwarmEvent::BestSolutionImproved { swarm_id: id, iteration, .. } => {
                assert_eq!(id, swarm_id);
                assert_eq!(iteration, 3);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(4);
        assert_eq!(event_bus.subscriber_count(), 0);
        event_bus.publish_agent_event(AgentLifecycleEvent::AgentDeleted {
            agent_id: AgentId::new(),
            deleted_at: Utc::now(),
        });
    }
}
