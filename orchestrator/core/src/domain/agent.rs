// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Aggregate (BC-2)
//!
//! An agent is a worker registered with the Swarm Manager. Its category is
//! resolved once at registration into a tagged variant so assignment never
//! dispatches on raw strings.

use crate::domain::llm::ModelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Agent specialization, resolved from the registration descriptor's tag.
/// Unrecognized tags land in `Custom` rather than failing registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentCategory {
    Coder,
    Researcher,
    Analyst,
    Generalist,
    Custom(String),
}

impl AgentCategory {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "coder" => AgentCategory::Coder,
            "researcher" => AgentCategory::Researcher,
            "analyst" => AgentCategory::Analyst,
            "generalist" => AgentCategory::Generalist,
            other => AgentCategory::Custom(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Training,
    Error,
}

/// Registration payload for a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Caller-supplied id; a fresh one is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<AgentId>,
    pub name: String,
    pub category: String,
    pub capabilities: HashSet<String>,
    pub model_id: ModelId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub category: AgentCategory,
    pub status: AgentStatus,
    pub model_id: ModelId,
    pub capabilities: HashSet<String>,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn from_descriptor(descriptor: AgentDescriptor) -> Self {
        Self {
            id: descriptor.id.unwrap_or_default(),
            name: descriptor.name,
            category: AgentCategory::from_tag(&descriptor.category),
            status: AgentStatus::Idle,
            model_id: descriptor.model_id,
            capabilities: descriptor.capabilities,
            registered_at: Utc::now(),
        }
    }

    /// Capability match: the agent's set must be a superset of the task's
    /// required tags.
    pub fn can_handle(&self, required_tags: &HashSet<String>) -> bool {
        required_tags.is_subset(&self.capabilities)
    }
}
