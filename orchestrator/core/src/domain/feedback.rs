// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Feedback and outcome records for the learning loop.
//!
//! Both record kinds are append-only: never mutated after creation, only
//! selected into training batches.

use crate::domain::llm::ModelId;
use crate::domain::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackId(pub Uuid);

impl FeedbackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FeedbackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit user or agent feedback on one (prompt, response) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    /// Absent for ad-hoc feedback not tied to a task.
    pub task_id: Option<TaskId>,
    pub prompt: String,
    pub response: String,
    /// 1–5 when present; validated at construction.
    pub rating: Option<u8>,
    pub comment: Option<String>,
    pub model_id: ModelId,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum FeedbackError {
    #[error("Rating {0} is out of range (1-5)")]
    RatingOutOfRange(u8),
}

impl FeedbackRecord {
    pub fn new(
        task_id: Option<TaskId>,
        prompt: impl Into<String>,
        response: impl Into<String>,
        model_id: ModelId,
        rating: Option<u8>,
        comment: Option<String>,
    ) -> Result<Self, FeedbackError> {
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(FeedbackError::RatingOutOfRange(r));
            }
        }
        Ok(Self {
            id: FeedbackId::new(),
            task_id,
            prompt: prompt.into(),
            response: response.into(),
            rating,
            comment,
            model_id,
            recorded_at: Utc::now(),
        })
    }
}

/// Implicit execution outcome recorded after every routed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub task_id: TaskId,
    pub model_id: ModelId,
    pub success: bool,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(task_id: TaskId, model_id: ModelId, success: bool, latency_ms: u64) -> Self {
        Self {
            task_id,
            model_id,
            success,
            latency_ms,
            recorded_at: Utc::now(),
        }
    }
}
