// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Aggregate (BC-1)
//!
//! Defines the task lifecycle owned by the Task Manager:
//!
//! - [`Task`] — aggregate root for a unit of work.
//! - [`TaskId`] — unique identifier (UUID newtype).
//! - [`TaskTransition`] — the legal edges of the status graph, with the
//!   payload/reason that travels along each edge.
//!
//! # Invariants
//!
//! - `completed_at` is set if and only if the task is `Completed` or `Failed`.
//! - A `Queued` task never carries an `assigned_agent_id`.

use crate::domain::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Assigned,
    Running,
    Blocked,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Submission payload for a new task. Validated by the Task Manager before
/// an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashSet<String>,
    /// Optional preference for a specific agent. Advisory: the Swarm Manager
    /// honors it only when that agent is idle and capable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_agent_hint: Option<AgentId>,
}

impl TaskDraft {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TaskError> {
        if self.title.trim().is_empty() {
            return Err(TaskError::Validation("title must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(TaskError::Validation("description must not be empty".into()));
        }
        if self.due_date <= now {
            return Err(TaskError::Validation(format!(
                "due_date {} is not in the future",
                self.due_date
            )));
        }
        Ok(())
    }
}

/// A legal edge of the task status graph, carrying the data that travels
/// along it. Illegal edges are unrepresentable at the call site; the
/// remaining illegal combinations (wrong source state) are rejected by
/// [`Task::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskTransition {
    Assign { agent_id: AgentId },
    Start,
    Block,
    Resume,
    Complete { payload: serde_json::Value },
    Fail { reason: String },
}

impl TaskTransition {
    pub fn target_status(&self) -> TaskStatus {
        match self {
            TaskTransition::Assign { .. } => TaskStatus::Assigned,
            TaskTransition::Start => TaskStatus::Running,
            TaskTransition::Block => TaskStatus::Blocked,
            TaskTransition::Resume => TaskStatus::Running,
            TaskTransition::Complete { .. } => TaskStatus::Completed,
            TaskTransition::Fail { .. } => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: HashSet<String>,
    pub assigned_agent_hint: Option<AgentId>,
    pub result_payload: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
}

impl Task {
    /// Build a queued task from a validated draft.
    pub fn from_draft(draft: TaskDraft) -> Self {
        Self {
            id: TaskId::new(),
            title: draft.title,
            description: draft.description,
            status: TaskStatus::Queued,
            priority: draft.priority,
            assigned_agent_id: None,
            created_at: Utc::now(),
            due_date: draft.due_date,
            completed_at: None,
            tags: draft.tags,
            assigned_agent_hint: draft.assigned_agent_hint,
            result_payload: None,
            failure_reason: None,
        }
    }

    /// Apply a transition, enforcing the legal graph:
    /// queued → assigned → running → {completed, failed}, running ↔ blocked,
    /// and any non-terminal state → failed (abort path).
    pub fn apply(&mut self, transition: TaskTransition) -> Result<(), TaskError> {
        let target = transition.target_status();
        let legal = match (&transition, self.status) {
            (TaskTransition::Assign { .. }, TaskStatus::Queued) => true,
            (TaskTransition::Start, TaskStatus::Assigned) => true,
            (TaskTransition::Block, TaskStatus::Running) => true,
            (TaskTransition::Resume, TaskStatus::Blocked) => true,
            (TaskTransition::Complete { .. }, TaskStatus::Running) => true,
            (TaskTransition::Fail { .. }, from) if !from.is_terminal() => true,
            _ => false,
        };
        if !legal {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        match transition {
            TaskTransition::Assign { agent_id } => {
                self.assigned_agent_id = Some(agent_id);
            }
            TaskTransition::Complete { payload } => {
                self.result_payload = Some(payload);
                self.completed_at = Some(Utc::now());
            }
            TaskTransition::Fail { reason } => {
                self.failure_reason = Some(reason);
                self.completed_at = Some(Utc::now());
            }
            TaskTransition::Start | TaskTransition::Block | TaskTransition::Resume => {}
        }
        self.status = target;
        Ok(())
    }

    /// The `completed_at` invariant, checked by property tests.
    pub fn invariants_hold(&self) -> bool {
        let completed_ok = self.completed_at.is_some() == self.status.is_terminal();
        let queued_ok = self.status != TaskStatus::Queued || self.assigned_agent_id.is_none();
        completed_ok && queued_ok
    }
}
