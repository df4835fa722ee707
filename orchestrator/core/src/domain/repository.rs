// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Persistence Contracts
//!
//! Logical read/write contract for the feedback store, following the
//! one-repository-per-aggregate pattern: the interface lives in the domain
//! layer, implementations in `crate::infrastructure::repositories`.
//!
//! Only the append/select contract is specified here; the storage engine
//! behind it is an external concern.

use crate::domain::feedback::{FeedbackRecord, OutcomeRecord};
use crate::domain::llm::ModelId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a feedback store. An unavailable store affects the
/// ingestion path only; it never propagates into task execution.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Feedback store unavailable: {0}")]
    Unavailable(String),
}

/// Selector for assembling a training batch from accumulated records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSelector {
    /// Restrict to records produced by one model.
    pub model_id: Option<ModelId>,
    /// Keep only feedback rated at or above this value.
    pub min_rating: Option<u8>,
    /// Keep only records at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Cap the batch size (newest records win).
    pub limit: Option<usize>,
}

/// Append-only feedback store. Writes never block on training logic.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append_outcome(&self, record: OutcomeRecord) -> Result<(), StoreError>;

    async fn append_feedback(&self, record: FeedbackRecord) -> Result<(), StoreError>;

    /// Snapshot of feedback records matching the selector.
    async fn select_feedback(&self, selector: &BatchSelector)
        -> Result<Vec<FeedbackRecord>, StoreError>;

    /// Snapshot of outcome records matching the selector.
    async fn select_outcomes(&self, selector: &BatchSelector)
        -> Result<Vec<OutcomeRecord>, StoreError>;
}
