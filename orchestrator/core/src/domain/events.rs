// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::agent::AgentId;
use crate::domain::llm::ModelId;
use crate::domain::routing::Fingerprint;
use crate::domain::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle events published by the Task Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskSubmitted {
        task_id: TaskId,
        submitted_at: DateTime<Utc>,
    },
    TaskAssigned {
        task_id: TaskId,
        agent_id: AgentId,
        assigned_at: DateTime<Utc>,
    },
    TaskStarted {
        task_id: TaskId,
        started_at: DateTime<Utc>,
    },
    TaskBlocked {
        task_id: TaskId,
        blocked_at: DateTime<Utc>,
    },
    TaskResumed {
        task_id: TaskId,
        resumed_at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: TaskId,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        task_id: TaskId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::TaskSubmitted { task_id, .. }
            | TaskEvent::TaskAssigned { task_id, .. }
            | TaskEvent::TaskStarted { task_id, .. }
            | TaskEvent::TaskBlocked { task_id, .. }
            | TaskEvent::TaskResumed { task_id, .. }
            | TaskEvent::TaskCompleted { task_id, .. }
            | TaskEvent::TaskFailed { task_id, .. } => *task_id,
        }
    }

}

/// Agent lifecycle events published by the Swarm Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentRegistered {
        agent_id: AgentId,
        registered_at: DateTime<Utc>,
    },
    AgentIdle {
        agent_id: AgentId,
        idle_at: DateTime<Utc>,
    },
    AgentFaulted {
        agent_id: AgentId,
        task_id: Option<TaskId>,
        faulted_at: DateTime<Utc>,
    },
    AgentReset {
        agent_id: AgentId,
        reset_at: DateTime<Utc>,
    },
    AgentDeregistered {
        agent_id: AgentId,
        deregistered_at: DateTime<Utc>,
    },
}

/// Routing events published by the Model Router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingEvent {
    CacheHit {
        fingerprint: Fingerprint,
        model_id: ModelId,
    },
    ProviderFailedOver {
        from: ModelId,
        to: ModelId,
    },
    ChainExhausted {
        preferred: ModelId,
        attempts: usize,
    },
}

/// Learning loop events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LearningEvent {
    OutcomeRecorded {
        task_id: TaskId,
        model_id: ModelId,
        success: bool,
    },
    TrainingStarted {
        job_id: Uuid,
        started_at: DateTime<Utc>,
    },
    TrainingCompleted {
        job_id: Uuid,
        records: usize,
        completed_at: DateTime<Utc>,
    },
    TrainingFailed {
        job_id: Uuid,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}
