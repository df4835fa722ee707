// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Reasoning/Generation Hybrid Pipeline
//
// Two-stage generation strategy on top of the Model Router: stage 1 asks a
// reasoning model for its chain of thought, stage 2 conditions a generation
// model on the extracted reasoning. The request walks an explicit state
// machine so cancellation and partial failure are visible transitions, not
// unwinding.
//
//   Start -> ReasoningRequested -> ReasoningExtracted
//         -> GenerationRequested -> Done
//
// with Failed absorbing from any non-terminal state.

use crate::domain::config::PipelineConfig;
use crate::domain::llm::ModelId;
use crate::domain::routing::{RoutingRequest, RoutingStage};
use crate::infrastructure::llm::router::{ModelRouter, RouterError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    ReasoningRequested,
    ReasoningExtracted,
    GenerationRequested,
    Done,
    Failed,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage 1 exhausted its chain. The pipeline fails fast rather than
    /// generating without reasoning.
    #[error("Reasoning model unavailable")]
    ReasoningUnavailable(#[source] RouterError),

    /// Stage 2 exhausted its chain. The extracted reasoning is preserved so
    /// the caller can decide whether to show partial output.
    #[error("Generation model unavailable")]
    GenerationUnavailable {
        reasoning: String,
        #[source]
        source: RouterError,
    },
}

/// Final artifact plus the rationale that produced it, so callers can log
/// or display the two separately.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub content: String,
    pub reasoning: String,
    pub reasoning_model: ModelId,
    pub generation_model: ModelId,
}

pub struct ReasoningPipeline {
    router: Arc<ModelRouter>,
    reasoning_model: ModelId,
    generation_model: ModelId,
}

impl ReasoningPipeline {
    pub fn new(router: Arc<ModelRouter>, config: &PipelineConfig) -> Self {
        Self {
            router,
            reasoning_model: ModelId::from(config.reasoning_model.clone()),
            generation_model: ModelId::from(config.generation_model.clone()),
        }
    }

    /// Run both stages for one prompt. Each stage routes (and caches)
    /// independently, so a cached reasoning artifact survives
    /// generation-model changes.
    pub async fn execute(&self, prompt: &str) -> Result<PipelineResult, PipelineError> {
        let mut state = PipelineState::Start;
        debug!("Pipeline state: {:?}", state);

        state = PipelineState::ReasoningRequested;
        debug!("Pipeline state: {:?}", state);
        let reasoning_request = RoutingRequest::new(prompt, self.reasoning_model.clone())
            .with_stage(RoutingStage::Reasoning)
            .with_deadline(self.router.default_deadline());
        let reasoning_raw = match self.router.route(&reasoning_request).await {
            Ok(result) => result,
            Err(e) => {
                state = PipelineState::Failed;
                warn!("Pipeline failed in {:?}: {}", state, e);
                return Err(PipelineError::ReasoningUnavailable(e));
            }
        };

        let reasoning = extract_reasoning(&reasoning_raw.content);
        state = PipelineState::ReasoningExtracted;
        debug!("Pipeline state: {:?}", state);

        state = PipelineState::GenerationRequested;
        debug!("Pipeline state: {:?}", state);
        let generation_prompt = compose_generation_prompt(prompt, &reasoning);
        let generation_request =
            RoutingRequest::new(generation_prompt, self.generation_model.clone())
                .with_stage(RoutingStage::Generation)
                .with_deadline(self.router.default_deadline());
        let generated = match self.router.route(&generation_request).await {
            Ok(result) => result,
            Err(e) => {
                state = PipelineState::Failed;
                warn!("Pipeline failed in {:?}: {}", state, e);
                return Err(PipelineError::GenerationUnavailable {
                    reasoning,
                    source: e,
                });
            }
        };

        state = PipelineState::Done;
        debug!("Pipeline state: {:?}", state);
        Ok(PipelineResult {
            content: generated.content,
            reasoning,
            reasoning_model: reasoning_raw.model_id,
            generation_model: generated.model_id,
        })
    }
}

/// Isolate the reasoning content from surrounding formatting. Pure function
/// of the raw text. When no discernible reasoning section exists the full
/// raw text is returned verbatim, so nothing is dropped in the ambiguous
/// case.
pub fn extract_reasoning(raw: &str) -> String {
    for (open, close) in [("<think>", "</think>"), ("<reasoning>", "</reasoning>")] {
        if let Some(start) = raw.find(open) {
            if let Some(end) = raw[start + open.len()..].find(close) {
                let inner = &raw[start + open.len()..start + open.len() + end];
                let trimmed = inner.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    // "Reasoning:" section header, up to the next section header or EOF.
    if let Some(start) = raw.find("Reasoning:") {
        let body = &raw[start + "Reasoning:".len()..];
        let end = body.find("\nAnswer:").unwrap_or(body.len());
        let trimmed = body[..end].trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    raw.to_string()
}

fn compose_generation_prompt(prompt: &str, reasoning: &str) -> String {
    format!(
        "{prompt}\n\n<context>\nPreliminary reasoning from an earlier pass:\n{reasoning}\n</context>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{CacheConfig, RoutingConfig};
    use crate::domain::llm::{
        CostClass, GenerationOptions, GenerationResponse, ModelDescriptor, ModelKind,
        ModelProvider, ModelProviderAdapter, ProviderError, TokenUsage,
    };
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::llm::cache::ResultCache;
    use crate::infrastructure::llm::registry::ProviderRegistry;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[test]
    fn extracts_think_tags() {
        let raw = "prefix <think> the key insight is X </think> suffix";
        assert_eq!(extract_reasoning(raw), "the key insight is X");
    }

    #[test]
    fn extracts_reasoning_section() {
        let raw = "Reasoning:\nfirst this, then that\nAnswer: 42";
        assert_eq!(extract_reasoning(raw), "first this, then that");
    }

    #[test]
    fn falls_back_to_full_text() {
        let raw = "no markers anywhere in this output";
        assert_eq!(extract_reasoning(raw), raw);

        // Empty tag bodies do not count as a discernible section.
        let raw = "<think>   </think> rest";
        assert_eq!(extract_reasoning(raw), raw);
    }

    /// Records every prompt it sees; answers reasoning and generation
    /// stages differently.
    struct RecordingAdapter {
        prompts: Mutex<Vec<(String, String)>>,
        reasoning_output: String,
        fail_generation: bool,
    }

    impl RecordingAdapter {
        fn new(reasoning_output: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reasoning_output: reasoning_output.to_string(),
                fail_generation: false,
            }
        }
    }

    #[async_trait]
    impl ModelProviderAdapter for RecordingAdapter {
        fn name(&self) -> &str {
            "recording"
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
            self.prompts
                .lock()
                .push((model.as_str().to_string(), prompt.to_string()));
            if model.as_str() == "writer" {
                if self.fail_generation {
                    return Err(ProviderError::InvalidRequest("forced".into()));
                }
                return Ok(GenerationResponse {
                    text: "final answer".to_string(),
                    usage: TokenUsage::default(),
                    model: model.clone(),
                });
            }
            Ok(GenerationResponse {
                text: self.reasoning_output.clone(),
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

    fn pipeline_with(adapter: Arc<RecordingAdapter>) -> ReasoningPipeline {
        let mut registry = ProviderRegistry::new();
        registry.register_adapter(
            "local".to_string(),
            adapter,
            vec![descriptor("thinker"), descriptor("writer")],
        );
        let router = Arc::new(ModelRouter::new(
            Arc::new(registry),
            Arc::new(ResultCache::new(CacheConfig::default())),
            RoutingConfig {
                retry_backoff_ms: 1,
                ..Default::default()
            },
            EventBus::with_default_capacity(),
        ));
        ReasoningPipeline::new(
            router,
            &PipelineConfig {
                reasoning_model: "thinker".to_string(),
                generation_model: "writer".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn result_carries_reasoning_and_content() {
        let adapter = Arc::new(RecordingAdapter::new(
            "<think>route through the cache first</think>ignored",
        ));
        let pipeline = pipeline_with(adapter.clone());

        let result = pipeline.execute("how should requests flow?").await.unwrap();
        assert_eq!(result.content, "final answer");
        assert_eq!(result.reasoning, "route through the cache first");
        assert_eq!(result.reasoning_model, ModelId::from("thinker"));
        assert_eq!(result.generation_model, ModelId::from("writer"));

        // Stage 2 saw the original prompt plus the extracted reasoning.
        let prompts = adapter.prompts.lock();
        let generation_prompt = &prompts
            .iter()
            .find(|(model, _)| model == "writer")
            .unwrap()
            .1;
        assert!(generation_prompt.contains("how should requests flow?"));
        assert!(generation_prompt.contains("route through the cache first"));
    }

    #[tokio::test]
    async fn unextractable_reasoning_passes_raw_text_to_stage_two() {
        let raw = "stream of tokens with no markers";
        let adapter = Arc::new(RecordingAdapter::new(raw));
        let pipeline = pipeline_with(adapter.clone());

        let result = pipeline.execute("question").await.unwrap();
        assert_eq!(result.reasoning, raw);

        let prompts = adapter.prompts.lock();
        let generation_prompt = &prompts
            .iter()
            .find(|(model, _)| model == "writer")
            .unwrap()
            .1;
        assert!(generation_prompt.contains(raw));
    }

    #[tokio::test]
    async fn generation_failure_preserves_reasoning() {
        let mut adapter = RecordingAdapter::new("<think>partial insight</think>");
        adapter.fail_generation = true;
        let pipeline = pipeline_with(Arc::new(adapter));

        match pipeline.execute("question").await {
            Err(PipelineError::GenerationUnavailable { reasoning, .. }) => {
                assert_eq!(reasoning, "partial insight");
            }
            other => panic!("expected generation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reasoning_failure_fails_fast() {
        struct DeadAdapter;

        #[async_trait]
        impl ModelProviderAdapter for DeadAdapter {
            fn name(&self) -> &str {
                "dead"
            }
            fn provider(&self) -> ModelProvider {
                ModelProvider::LocalRuntime
            }
            async fn generate(
                &self,
                _prompt: &str,
                _model: &ModelId,
                _options: &GenerationOptions,
            ) -> Result<GenerationResponse, ProviderError> {
                Err(ProviderError::InvalidRequest("no".into()))
            }
            async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
                Ok(vec![])
            }
            async fn embed(
                &self,
                _text: &str,
                _model: &ModelId,
            ) -> Result<Vec<f32>, ProviderError> {
                Ok(vec![])
            }
            async fn health_check(&self) -> Result<(), ProviderError> {
                Ok(())
            }
        }

        let mut registry = ProviderRegistry::new();
        registry.register_adapter(
            "dead".to_string(),
            Arc::new(DeadAdapter),
            vec![descriptor("thinker"), descriptor("writer")],
        );
        let router = Arc::new(ModelRouter::new(
            Arc::new(registry),
            Arc::new(ResultCache::new(CacheConfig::default())),
            RoutingConfig {
                retry_backoff_ms: 1,
                ..Default::default()
            },
            EventBus::with_default_capacity(),
        ));
        let pipeline = ReasoningPipeline::new(
            router,
            &PipelineConfig {
                reasoning_model: "thinker".to_string(),
                generation_model: "writer".to_string(),
            },
        );

        assert!(matches!(
            pipeline.execute("question").await,
            Err(PipelineError::ReasoningUnavailable(_))
        ));
    }
}
