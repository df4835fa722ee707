// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Bootstrap - Composition Root
//
// Wires the orchestration services together from one configuration:
// provider registry, result cache, model router, task manager, optional
// reasoning/generation pipeline, and the learning loop. Lifecycle is tied
// to this handle rather than import-time globals; dropping into shutdown
// cancels the health poller and the training worker.

use crate::application::learning::LearningLoop;
use crate::application::pipeline::ReasoningPipeline;
use crate::application::task_manager::TaskManager;
use crate::domain::config::OrchestratorConfig;
use crate::domain::repository::FeedbackStore;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::cache::ResultCache;
use crate::infrastructure::llm::registry::ProviderRegistry;
use crate::infrastructure::llm::router::ModelRouter;
use crate::infrastructure::repositories::InMemoryFeedbackStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// All core services, composed from one [`OrchestratorConfig`]. The swarm
/// manager layers on top of [`Engine::tasks`] and [`Engine::events`].
pub struct Engine {
    pub events: EventBus,
    pub tasks: Arc<TaskManager>,
    pub registry: Arc<ProviderRegistry>,
    pub router: Arc<ModelRouter>,
    pub pipeline: Option<ReasoningPipeline>,
    pub learning: Arc<LearningLoop>,
    shutdown: CancellationToken,
}

impl Engine {
    /// Build the engine with the in-memory feedback store. Must run inside
    /// a tokio runtime: the health poller and training worker are spawned
    /// here.
    pub fn from_config(config: OrchestratorConfig) -> anyhow::Result<Self> {
        Self::with_feedback_store(config, Arc::new(InMemoryFeedbackStore::new()))
    }

    /// Build the engine against a caller-supplied feedback store backend.
    pub fn with_feedback_store(
        config: OrchestratorConfig,
        store: Arc<dyn FeedbackStore>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let events = EventBus::with_default_capacity();
        let shutdown = CancellationToken::new();

        let registry = Arc::new(ProviderRegistry::from_config(&config)?);
        // Detached: the poller runs until the shutdown token fires.
        let _ = ProviderRegistry::spawn_health_task(
            registry.clone(),
            Duration::from_secs(config.routing.health_check_interval_secs),
            shutdown.clone(),
        );

        let cache = Arc::new(ResultCache::new(config.routing.cache.clone()));
        let router = Arc::new(ModelRouter::new(
            registry.clone(),
            cache,
            config.routing.clone(),
            events.clone(),
        ));
        let pipeline = config
            .pipeline
            .as_ref()
            .map(|p| ReasoningPipeline::new(router.clone(), p));

        let tasks = Arc::new(TaskManager::new(events.clone()));
        let learning = Arc::new(LearningLoop::new(
            store,
            events.clone(),
            config.training.min_batch_size,
        ));

        info!(
            "Engine started with {} model(s) registered",
            registry.list_descriptors().len()
        );

        Ok(Self {
            events,
            tasks,
            registry,
            router,
            pipeline,
            learning,
            shutdown,
        })
    }

    /// Stop the background workers. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.learning.shutdown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{ModelEntry, PipelineConfig, ProviderConfig};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            providers: vec![ProviderConfig {
                name: "local".to_string(),
                provider_type: "local-runtime".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
                enabled: true,
                models: vec![ModelEntry {
                    id: "llama3.2".to_string(),
                    kind: "text".to_string(),
                    cost_class: "free".to_string(),
                    max_tokens: 8192,
                }],
            }],
            pipeline: Some(PipelineConfig {
                reasoning_model: "deepseek-r1".to_string(),
                generation_model: "llama3.2".to_string(),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn engine_composes_all_services() {
        let engine = Engine::from_config(config()).unwrap();
        assert!(engine.pipeline.is_some());
        assert_eq!(engine.registry.list_descriptors().len(), 1);
        assert_eq!(engine.events.subscriber_count(), 0);

        // Services are live: a submitted task is visible immediately.
        let draft = crate::domain::task::TaskDraft {
            title: "t".to_string(),
            description: "d".to_string(),
            priority: Default::default(),
            due_date: chrono::Utc::now() + chrono::Duration::hours(1),
            tags: Default::default(),
            assigned_agent_hint: None,
        };
        let task = engine.tasks.submit(draft).unwrap();
        assert!(engine.tasks.get(task.id).await.is_ok());

        engine.shutdown();
    }

    #[tokio::test]
    async fn engine_without_pipeline_config() {
        let mut cfg = config();
        cfg.pipeline = None;
        let engine = Engine::from_config(cfg).unwrap();
        assert!(engine.pipeline.is_none());
        engine.shutdown();
    }
}
