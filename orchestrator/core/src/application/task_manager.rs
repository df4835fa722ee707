// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Task Manager - Task Lifecycle Ownership
//
// Sole mutator of task state. Transitions on the same task are serialized
// by a per-task mutex; transitions on different tasks proceed
// independently. Assignment is a compare-and-swap on Queued under that
// lock, so no task can be handed to two agents.

use crate::domain::agent::AgentId;
use crate::domain::events::TaskEvent;
use crate::domain::task::{Task, TaskDraft, TaskError, TaskId, TaskStatus, TaskTransition};
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Snapshot filter for [`TaskManager::list`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub tag: Option<String>,
    pub assigned_agent_id: Option<AgentId>,
}

impl TaskFilter {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !task.tags.contains(tag) {
                return false;
            }
        }
        if let Some(agent_id) = self.assigned_agent_id {
            if task.assigned_agent_id != Some(agent_id) {
                return false;
            }
        }
        true
    }
}

pub struct TaskManager {
    tasks: DashMap<TaskId, Arc<Mutex<Task>>>,
    events: EventBus,
}

impl TaskManager {
    pub fn new(events: EventBus) -> Self {
        Self {
            tasks: DashMap::new(),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Validate a draft, assign an id and queue the task.
    pub fn submit(&self, draft: TaskDraft) -> Result<Task, TaskError> {
        draft.validate(Utc::now())?;
        let task = Task::from_draft(draft);
        let snapshot = task.clone();
        self.tasks.insert(task.id, Arc::new(Mutex::new(task)));

        debug!("Task {} queued", snapshot.id);
        self.events.publish_task_event(TaskEvent::TaskSubmitted {
            task_id: snapshot.id,
            submitted_at: snapshot.created_at,
        });
        Ok(snapshot)
    }

    /// Apply one transition under the task's lock and publish the matching
    /// event. Returns the post-transition snapshot.
    pub async fn transition(
        &self,
        task_id: TaskId,
        transition: TaskTransition,
    ) -> Result<Task, TaskError> {
        // Clone the slot out of the shard so the map guard is not held
        // across the lock await.
        let slot = self
            .tasks
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .ok_or(TaskError::NotFound(task_id))?;

        let mut task = slot.lock().await;
        task.apply(transition.clone())?;
        let snapshot = task.clone();
        drop(task);

        self.publish_transition(&snapshot, &transition);
        Ok(snapshot)
    }

    /// Advisory cancellation: the task fails with reason "cancelled"; an
    /// in-flight provider call may still complete and its result is
    /// discarded.
    pub async fn cancel(&self, task_id: TaskId) -> Result<Task, TaskError> {
        self.transition(
            task_id,
            TaskTransition::Fail {
                reason: "cancelled".to_string(),
            },
        )
        .await
    }

    pub async fn get(&self, task_id: TaskId) -> Result<Task, TaskError> {
        let slot = self
            .tasks
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .ok_or(TaskError::NotFound(task_id))?;
        let task = slot.lock().await;
        Ok(task.clone())
    }

    /// Point-in-time snapshot of matching tasks, not a live view.
    pub async fn list(&self, filter: TaskFilter) -> Vec<Task> {
        let slots: Vec<Arc<Mutex<Task>>> = self
            .tasks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut snapshot = Vec::new();
        for slot in slots {
            let task = slot.lock().await;
            if filter.matches(&task) {
                snapshot.push(task.clone());
            }
        }
        snapshot.sort_by_key(|t| t.created_at);
        snapshot
    }

    /// Drop a terminal task from the registry. Non-terminal tasks must be
    /// cancelled first.
    pub async fn archive(&self, task_id: TaskId) -> Result<Task, TaskError> {
        let current = self.get(task_id).await?;
        if !current.status.is_terminal() {
            return Err(TaskError::Validation(format!(
                "task {} is {:?}, not terminal",
                task_id, current.status
            )));
        }
        self.tasks.remove(&task_id);
        Ok(current)
    }

    fn publish_transition(&self, task: &Task, transition: &TaskTransition) {
        let at = Utc::now();
        let event = match transition {
            TaskTransition::Assign { agent_id } => TaskEvent::TaskAssigned {
                task_id: task.id,
                agent_id: *agent_id,
                assigned_at: at,
            },
            TaskTransition::Start => TaskEvent::TaskStarted {
                task_id: task.id,
                started_at: at,
            },
            TaskTransition::Block => TaskEvent::TaskBlocked {
                task_id: task.id,
                blocked_at: at,
            },
            TaskTransition::Resume => TaskEvent::TaskResumed {
                task_id: task.id,
                resumed_at: at,
            },
            TaskTransition::Complete { .. } => TaskEvent::TaskCompleted {
                task_id: task.id,
                completed_at: at,
            },
            TaskTransition::Fail { reason } => TaskEvent::TaskFailed {
                task_id: task.id,
                reason: reason.clone(),
                failed_at: at,
            },
        };
        self.events.publish_task_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn manager() -> TaskManager {
        TaskManager::new(EventBus::with_default_capacity())
    }

    fn draft(tags: &[&str]) -> TaskDraft {
        TaskDraft {
            title: "summarize logs".to_string(),
            description: "compress the morning error logs".to_string(),
            priority: Default::default(),
            due_date: Utc::now() + Duration::hours(2),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            assigned_agent_hint: None,
        }
    }

    #[tokio::test]
    async fn submit_assigns_id_and_queues() {
        let manager = manager();
        let task = manager.submit(draft(&["coder"])).unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.assigned_agent_id.is_none());

        let fetched = manager.get(task.id).await.unwrap();
        assert_eq!(fetched.id, task.id);
    }

    #[tokio::test]
    async fn transition_unknown_task_is_not_found() {
        let manager = manager();
        let err = manager
            .transition(TaskId::new(), TaskTransition::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_assignment_has_single_winner() {
        let manager = Arc::new(manager());
        let task = manager.submit(draft(&[])).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            let task_id = task.id;
            handles.push(tokio::spawn(async move {
                manager
                    .transition(
                        task_id,
                        TaskTransition::Assign {
                            agent_id: AgentId::new(),
                        },
                    )
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let task = manager.get(task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert!(task.assigned_agent_id.is_some());
    }

    #[tokio::test]
    async fn list_filters_by_status_tag_and_agent() {
        let manager = manager();
        let queued = manager.submit(draft(&["coder"])).unwrap();
        let assigned = manager.submit(draft(&["researcher"])).unwrap();
        let agent = AgentId::new();
        manager
            .transition(assigned.id, TaskTransition::Assign { agent_id: agent })
            .await
            .unwrap();

        let queued_tasks = manager.list(TaskFilter::with_status(TaskStatus::Queued)).await;
        assert_eq!(queued_tasks.len(), 1);
        assert_eq!(queued_tasks[0].id, queued.id);

        let by_tag = manager
            .list(TaskFilter {
                tag: Some("researcher".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, assigned.id);

        let by_agent = manager
            .list(TaskFilter {
                assigned_agent_id: Some(agent),
                ..Default::default()
            })
            .await;
        assert_eq!(by_agent.len(), 1);

        // Snapshot, not a live view.
        let mut stale = by_agent;
        manager
            .transition(assigned.id, TaskTransition::Start)
            .await
            .unwrap();
        assert_eq!(stale.pop().unwrap().status, TaskStatus::Assigned);
    }

    #[tokio::test]
    async fn archive_requires_terminal_status() {
        let manager = manager();
        let task = manager.submit(draft(&[])).unwrap();

        assert!(matches!(
            manager.archive(task.id).await,
            Err(TaskError::Validation(_))
        ));

        manager.cancel(task.id).await.unwrap();
        let archived = manager.archive(task.id).await.unwrap();
        assert_eq!(archived.status, TaskStatus::Failed);
        assert!(matches!(
            manager.get(task.id).await,
            Err(TaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn transitions_publish_events() {
        let manager = manager();
        let mut receiver = manager.events().subscribe();
        let task = manager.submit(draft(&[])).unwrap();
        let mut task_events = Vec::new();

        manager
            .transition(
                task.id,
                TaskTransition::Assign {
                    agent_id: AgentId::new(),
                },
            )
            .await
            .unwrap();
        manager.transition(task.id, TaskTransition::Start).await.unwrap();
        manager
            .transition(
                task.id,
                TaskTransition::Complete {
                    payload: serde_json::json!({"answer": 42}),
                },
            )
            .await
            .unwrap();

        for _ in 0..4 {
            match receiver.recv().await.unwrap() {
                crate::infrastructure::event_bus::OrchestratorEvent::Task(event) => {
                    task_events.push(event)
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(matches!(task_events[0], TaskEvent::TaskSubmitted { .. }));
        assert!(matches!(task_events[1], TaskEvent::TaskAssigned { .. }));
        assert!(matches!(task_events[2], TaskEvent::TaskStarted { .. }));
        assert!(matches!(task_events[3], TaskEvent::TaskCompleted { .. }));
    }
}
