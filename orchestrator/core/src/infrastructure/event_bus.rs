// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Orchestration Events
//
// In-memory event streaming over tokio broadcast channels. Feeds external
// dashboards, the swarm manager's observers, and tests.
//
// In-memory only: events are lost on restart.

use crate::domain::events::{AgentEvent, LearningEvent, RoutingEvent, TaskEvent};
use crate::domain::task::TaskId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type for the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    Task(TaskEvent),
    Agent(AgentEvent),
    Routing(RoutingEvent),
    Learning(LearningEvent),
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<OrchestratorEvent>>,
}

impl EventBus {
    /// Capacity bounds how many events buffer before old ones drop.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(OrchestratorEvent::Task(event));
    }

    pub fn publish_agent_event(&self, event: AgentEvent) {
        self.publish(OrchestratorEvent::Agent(event));
    }

    pub fn publish_routing_event(&self, event: RoutingEvent) {
        self.publish(OrchestratorEvent::Routing(event));
    }

    pub fn publish_learning_event(&self, event: LearningEvent) {
        self.publish(OrchestratorEvent::Learning(event));
    }

    fn publish(&self, event: OrchestratorEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all orchestration events.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events for a single task, filtering everything else.
    pub fn subscribe_task(&self, task_id: TaskId) -> TaskEventReceiver {
        TaskEventReceiver {
            receiver: self.sender.subscribe(),
            task_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<OrchestratorEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<OrchestratorEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<OrchestratorEvent, EventBusError> {
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

/// Receiver filtered to one task's lifecycle events.
pub struct TaskEventReceiver {
    receiver: broadcast::Receiver<OrchestratorEvent>,
    task_id: TaskId,
}

impl TaskEventReceiver {
    pub async fn recv(&mut self) -> Result<TaskEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;

            if let OrchestratorEvent::Task(task_event) = event {
                if task_event.task_id() == self.task_id {
                    return Ok(task_event);
                }
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let task_id = TaskId::new();
        bus.publish_task_event(TaskEvent::TaskSubmitted {
            task_id,
            submitted_at: Utc::now(),
        });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                OrchestratorEvent::Task(TaskEvent::TaskSubmitted { task_id: id, .. }) => {
                    assert_eq!(id, task_id);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn task_receiver_filters_other_tasks() {
        let bus = EventBus::new(10);
        let ours = TaskId::new();
        let theirs = TaskId::new();
        let mut rx = bus.subscribe_task(ours);

        bus.publish_task_event(TaskEvent::TaskStarted {
            task_id: theirs,
            started_at: Utc::now(),
        });
        bus.publish_task_event(TaskEvent::TaskStarted {
            task_id: ours,
            started_at: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            TaskEvent::TaskStarted { task_id, .. } => assert_eq!(task_id, ours),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn try_recv_reports_empty() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(EventBusError::Empty)));
    }
}
