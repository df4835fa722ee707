// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Types (BC-2)
//!
//! Value objects for multi-agent coordination:
//!
//! - [`AgentMessage`] — one inter-agent message, FIFO per ordered pair.
//! - [`AssignmentOutcome`] — result of matching a queued task to an agent.
//! - [`TaskOutcome`] — what an agent reports back on completion.
//! - [`SwarmError`] — the coordination error taxonomy.

use chrono::{DateTime, Utc};
use hivemind_core::domain::agent::AgentId;
use hivemind_core::domain::task::TaskError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Inter-agent message. Delivery is FIFO between one ordered sender/receiver
/// pair; no ordering is promised across different pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub from: AgentId,
    pub to: AgentId,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(from: AgentId, to: AgentId, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            payload,
            sent_at: Utc::now(),
        }
    }
}

/// Result of one assignment attempt. `NoAgentAvailable` is recoverable: the
/// task stays queued and is retried on the next agent-becomes-idle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Assigned(AgentId),
    NoAgentAvailable,
}

/// Outcome an agent reports when its task finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success { payload: serde_json::Value },
    Failure { reason: String },
}

/// Errors that can occur during swarm coordination.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Agent {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Agent {0} is not idle")]
    AgentNotIdle(AgentId),

    #[error("Agent {0} is not in error state")]
    NotInErrorState(AgentId),

    #[error("Mailbox for agent {0} was already taken")]
    MailboxTaken(AgentId),

    #[error("Mailbox for agent {0} is closed")]
    MailboxClosed(AgentId),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Reason recorded on a task abandoned by a crashed agent.
pub const AGENT_FAULT_REASON: &str = "agent-fault";
