// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Repositories
//
// Development/testing implementation of the feedback store contract.
// Production deployments substitute a persistent backend behind the same
// trait.

use crate::domain::feedback::{FeedbackRecord, OutcomeRecord};
use crate::domain::repository::{BatchSelector, FeedbackStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    outcomes: RwLock<Vec<OutcomeRecord>>,
    feedback: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes.read().len()
    }

    pub fn feedback_count(&self) -> usize {
        self.feedback.read().len()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn append_outcome(&self, record: OutcomeRecord) -> Result<(), StoreError> {
        self.outcomes.write().push(record);
        Ok(())
    }

    async fn append_feedback(&self, record: FeedbackRecord) -> Result<(), StoreError> {
        self.feedback.write().push(record);
        Ok(())
    }

    async fn select_feedback(
        &self,
        selector: &BatchSelector,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        let records = self.feedback.read();
        let mut selected: Vec<FeedbackRecord> = records
            .iter()
            .filter(|r| {
                selector
                    .model_id
                    .as_ref()
                    .map(|m| &r.model_id == m)
                    .unwrap_or(true)
            })
            .filter(|r| {
                selector
                    .min_rating
                    .map(|min| r.rating.map(|rating| rating >= min).unwrap_or(false))
                    .unwrap_or(true)
            })
            .filter(|r| selector.since.map(|s| r.recorded_at >= s).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = selector.limit {
            // Newest records win when the batch is capped.
            selected.sort_by_key(|r| std::cmp::Reverse(r.recorded_at));
            selected.truncate(limit);
        }
        Ok(selected)
    }

    async fn select_outcomes(
        &self,
        selector: &BatchSelector,
    ) -> Result<Vec<OutcomeRecord>, StoreError> {
        let records = self.outcomes.read();
        let mut selected: Vec<OutcomeRecord> = records
            .iter()
            .filter(|r| {
                selector
                    .model_id
                    .as_ref()
                    .map(|m| &r.model_id == m)
                    .unwrap_or(true)
            })
            .filter(|r| selector.since.map(|s| r.recorded_at >= s).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = selector.limit {
            selected.sort_by_key(|r| std::cmp::Reverse(r.recorded_at));
            selected.truncate(limit);
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ModelId;
    use crate::domain::task::TaskId;

    fn feedback(model: &str, rating: Option<u8>) -> FeedbackRecord {
        FeedbackRecord::new(None, "p", "r", ModelId::from(model), rating, None).unwrap()
    }

    #[tokio::test]
    async fn select_feedback_applies_filters() {
        let store = InMemoryFeedbackStore::new();
        store.append_feedback(feedback("llama3.2", Some(5))).await.unwrap();
        store.append_feedback(feedback("llama3.2", Some(2))).await.unwrap();
        store.append_feedback(feedback("gpt-4o", Some(4))).await.unwrap();
        store.append_feedback(feedback("llama3.2", None)).await.unwrap();

        let selector = BatchSelector {
            model_id: Some(ModelId::from("llama3.2")),
            min_rating: Some(3),
            ..Default::default()
        };
        let batch = store.select_feedback(&selector).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].rating, Some(5));
    }

    #[tokio::test]
    async fn select_outcomes_honors_limit() {
        let store = InMemoryFeedbackStore::new();
        for i in 0..5 {
            store
                .append_outcome(OutcomeRecord::new(
                    TaskId::new(),
                    ModelId::from("llama3.2"),
                    i % 2 == 0,
                    10 + i,
                ))
                .await
                .unwrap();
        }

        let selector = BatchSelector {
            limit: Some(3),
            ..Default::default()
        };
        let batch = store.select_outcomes(&selector).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(store.outcome_count(), 5);
    }
}
