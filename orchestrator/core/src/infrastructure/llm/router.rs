// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Model Router - Cache Consult, Fallback Chains, Retry Classification
//
// Selects a provider+model for each routing request. The result cache is
// consulted before any adapter call; on a miss the preferred model is tried
// first, then the fallback chain in order. Transient failures get exactly
// one retry with backoff before the chain advances; permanent failures
// advance immediately. No task- or agent-level lock is held here: the
// provider call is the suspension point.

use crate::domain::config::RoutingConfig;
use crate::domain::events::RoutingEvent;
use crate::domain::llm::{ModelId, ProviderError};
use crate::domain::routing::{RoutedResult, RoutingRequest};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::cache::ResultCache;
use crate::infrastructure::llm::registry::ProviderRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("All providers exhausted after {} attempt(s)", attempts.len())]
    AllProvidersExhausted {
        attempts: Vec<(ModelId, ProviderError)>,
    },
}

pub struct ModelRouter {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ResultCache>,
    config: RoutingConfig,
    events: EventBus,
}

impl ModelRouter {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ResultCache>,
        config: RoutingConfig,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
            events,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Configured per-request deadline for callers that do not set their
    /// own.
    pub fn default_deadline(&self) -> Duration {
        Duration::from_secs(self.config.deadline_secs)
    }

    /// Route one request: cache, then preferred model, then the fallback
    /// chain in order.
    pub async fn route(&self, request: &RoutingRequest) -> Result<RoutedResult, RouterError> {
        let fingerprint = request.fingerprint();

        if let Some(mut hit) = self.cache.get(&fingerprint) {
            debug!("Cache hit for fingerprint {}", fingerprint);
            self.events.publish_routing_event(RoutingEvent::CacheHit {
                fingerprint: fingerprint.clone(),
                model_id: hit.model_id.clone(),
            });
            hit.cached = true;
            return Ok(hit);
        }

        let mut attempts: Vec<(ModelId, ProviderError)> = Vec::new();
        let mut previous: Option<ModelId> = None;

        for model in self.chain(request) {
            if let Some(from) = previous.take() {
                self.events
                    .publish_routing_event(RoutingEvent::ProviderFailedOver {
                        from,
                        to: model.clone(),
                    });
            }
            previous = Some(model.clone());

            if !self.registry.is_available(&model) {
                debug!("Skipping unavailable model '{}'", model);
                attempts.push((
                    model,
                    ProviderError::Unavailable("marked unavailable by health poll".into()),
                ));
                continue;
            }

            match self.attempt(request, &model).await {
                Ok(result) => {
                    let ttl = self.cache.ttl_for(&request.options);
                    self.cache.insert(fingerprint, result.clone(), ttl);
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Model '{}' failed: {}", model, e);
                    attempts.push((model, e));
                }
            }
        }

        self.events
            .publish_routing_event(RoutingEvent::ChainExhausted {
                preferred: request.preferred_model.clone(),
                attempts: attempts.len(),
            });
        Err(RouterError::AllProvidersExhausted { attempts })
    }

    /// Preferred model first, then the fallback chain, deduplicated in
    /// order.
    fn chain(&self, request: &RoutingRequest) -> Vec<ModelId> {
        let mut chain = Vec::with_capacity(1 + request.fallback_chain.len());
        chain.push(request.preferred_model.clone());
        for model in &request.fallback_chain {
            if !chain.contains(model) {
                chain.push(model.clone());
            }
        }
        chain
    }

    /// One model's attempt: a deadline-bounded call, with a single
    /// backoff-then-retry for transient failures.
    async fn attempt(
        &self,
        request: &RoutingRequest,
        model: &ModelId,
    ) -> Result<RoutedResult, ProviderError> {
        let adapter = self
            .registry
            .adapter_for(model)
            .ok_or_else(|| ProviderError::ModelNotFound(model.clone()))?;

        let first = self.call_once(&*adapter, request, model).await;
        match first {
            Ok(result) => Ok(result),
            Err(e) if e.is_transient() => {
                debug!(
                    "Transient failure on '{}' ({}), retrying after {}ms",
                    model, e, self.config.retry_backoff_ms
                );
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                self.call_once(&*adapter, request, model).await
            }
            Err(e) => Err(e),
        }
    }

    async fn call_once(
        &self,
        adapter: &dyn crate::domain::llm::ModelProviderAdapter,
        request: &RoutingRequest,
        model: &ModelId,
    ) -> Result<RoutedResult, ProviderError> {
        let started = Instant::now();
        let response = tokio::time::timeout(
            request.deadline,
            adapter.generate(&request.prompt, model, &request.options),
        )
        .await
        // Deadline overrun is a transient failure and triggers fallback.
        .map_err(|_| ProviderError::Timeout)??;

        let latency = started.elapsed();
        info!(
            "Routed {:?} request to '{}' in {}ms",
            request.stage,
            model,
            latency.as_millis()
        );
        Ok(RoutedResult {
            model_id: response.model,
            content: response.text,
            latency,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::CacheConfig;
    use crate::domain::llm::{
        CostClass, GenerationOptions, GenerationResponse, ModelDescriptor, ModelKind,
        ModelProvider, ModelProviderAdapter, TokenUsage,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter scripted to fail a fixed number of times before succeeding,
    /// counting every generate call.
    struct ScriptedAdapter {
        name: String,
        calls: AtomicUsize,
        failures_before_success: usize,
        error: ProviderError,
    }

    impl ScriptedAdapter {
        fn healthy(name: &str) -> Self {
            Self {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                failures_before_success: 0,
                error: ProviderError::Unavailable("unused".into()),
            }
        }

        fn failing(name: &str, error: ProviderError) -> Self {
            Self {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                failures_before_success: usize::MAX,
                error,
            }
        }

        fn flaky(name: &str, failures: usize, error: ProviderError) -> Self {
            Self {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                failures_before_success: failures,
                error,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelProviderAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn provider(&self) -> ModelProvider {
            ModelProvider::LocalRuntime
        }

        async fn generate(
            &self,
            prompt: &str,
            model: &ModelId,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(self.error.clone());
            }
            Ok(GenerationResponse {
                text: format!("{}::{}", self.name, prompt),
                usage: TokenUsage::default(),
                model: model.clone(),
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
            Ok(vec![])
        }

        async fn embed(&self, _text: &str, _model: &ModelId) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![0.0])
        }

        async fn health_check(&self) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn descriptor(id: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: ModelId::from(id),
            provider: ModelProvider::LocalRuntime,
            kind: ModelKind::Text,
            cost_class: CostClass::Free,
            max_tokens: 8192,
            is_available: true,
        }
    }

    fn router_with(
        adapters: Vec<(&str, Arc<ScriptedAdapter>)>,
    ) -> (ModelRouter, Arc<ProviderRegistry>) {
        let mut registry = ProviderRegistry::new();
        for (model, adapter) in adapters {
            registry.register_adapter(
                format!("provider-{model}"),
                adapter,
                vec![descriptor(model)],
            );
        }
        let registry = Arc::new(registry);
        let mut config = RoutingConfig::default();
        config.retry_backoff_ms = 1;
        let router = ModelRouter::new(
            registry.clone(),
            Arc::new(ResultCache::new(CacheConfig::default())),
            config,
            EventBus::with_default_capacity(),
        );
        (router, registry)
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_adapters() {
        let adapter = Arc::new(ScriptedAdapter::healthy("a"));
        let (router, _) = router_with(vec![("model-a", adapter.clone())]);

        let mut options = GenerationOptions::default();
        options.temperature = Some(0.0);
        let request =
            RoutingRequest::new("prompt", ModelId::from("model-a")).with_options(options);

        let first = router.route(&request).await.unwrap();
        assert!(!first.cached);
        assert_eq!(adapter.calls(), 1);

        let second = router.route(&request).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.content, first.content);
        // No further adapter invocation.
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_walks_chain_in_order() {
        let a = Arc::new(ScriptedAdapter::failing(
            "a",
            ProviderError::Unavailable("down".into()),
        ));
        let b = Arc::new(ScriptedAdapter::failing(
            "b",
            ProviderError::Unavailable("down".into()),
        ));
        let c = Arc::new(ScriptedAdapter::healthy("c"));
        let (router, _) = router_with(vec![
            ("model-a", a.clone()),
            ("model-b", b.clone()),
            ("model-c", c.clone()),
        ]);

        let request = RoutingRequest::new("prompt", ModelId::from("model-a"))
            .with_fallback_chain(vec![ModelId::from("model-b"), ModelId::from("model-c")]);

        let result = router.route(&request).await.unwrap();
        assert_eq!(result.model_id, ModelId::from("model-c"));
        // Transient failures: one retry each before advancing.
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 2);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_surfaces_attempt_trail() {
        let a = Arc::new(ScriptedAdapter::failing(
            "a",
            ProviderError::Unavailable("down".into()),
        ));
        let b = Arc::new(ScriptedAdapter::failing(
            "b",
            ProviderError::Authentication("bad key".into()),
        ));
        let (router, _) = router_with(vec![("model-a", a.clone()), ("model-b", b.clone())]);

        let request = RoutingRequest::new("prompt", ModelId::from("model-a"))
            .with_fallback_chain(vec![ModelId::from("model-b")]);

        match router.route(&request).await {
            Err(RouterError::AllProvidersExhausted { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].0, ModelId::from("model-a"));
                assert_eq!(attempts[1].0, ModelId::from("model-b"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let a = Arc::new(ScriptedAdapter::failing(
            "a",
            ProviderError::InvalidRequest("bad".into()),
        ));
        let b = Arc::new(ScriptedAdapter::healthy("b"));
        let (router, _) = router_with(vec![("model-a", a.clone()), ("model-b", b.clone())]);

        let request = RoutingRequest::new("prompt", ModelId::from("model-a"))
            .with_fallback_chain(vec![ModelId::from("model-b")]);

        let result = router.route(&request).await.unwrap();
        assert_eq!(result.model_id, ModelId::from("model-b"));
        // Permanent failure advances immediately: exactly one call.
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn transient_error_retried_once_then_succeeds() {
        let a = Arc::new(ScriptedAdapter::flaky("a", 1, ProviderError::Timeout));
        let (router, _) = router_with(vec![("model-a", a.clone())]);

        let request = RoutingRequest::new("prompt", ModelId::from("model-a"));
        let result = router.route(&request).await.unwrap();
        assert_eq!(result.model_id, ModelId::from("model-a"));
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn unavailable_models_are_skipped_without_calls() {
        let a = Arc::new(ScriptedAdapter::healthy("a"));
        let b = Arc::new(ScriptedAdapter::healthy("b"));
        let (router, registry) =
            router_with(vec![("model-a", a.clone()), ("model-b", b.clone())]);
        registry.set_available(&ModelId::from("model-a"), false);

        let request = RoutingRequest::new("prompt", ModelId::from("model-a"))
            .with_fallback_chain(vec![ModelId::from("model-b")]);

        let result = router.route(&request).await.unwrap();
        assert_eq!(result.model_id, ModelId::from("model-b"));
        assert_eq!(a.calls(), 0);
        assert_eq!(b.calls(), 1);
    }
}
