// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Model provider domain interface (Anti-Corruption Layer).
//!
//! Defines the uniform capability set every backend implements
//! (`generate`, `list_models`, `embed`, `health_check`) plus the classified
//! error taxonomy the router's retry/fallback logic reacts to.
//!
//! Implementations live in `infrastructure/llm/`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Stable model identifier (e.g. "llama3.2", "gpt-4o").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which backend family serves a model. Local runtimes are preferred in the
/// default fallback ordering (no external cost, no rate limit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModelProvider {
    LocalRuntime,
    RemoteApi { name: String },
}

impl ModelProvider {
    pub fn is_local(&self) -> bool {
        matches!(self, ModelProvider::LocalRuntime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Multimodal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    Free,
    Low,
    High,
}

/// Live view of one model, populated by polling the owning adapter.
/// Read-only to everything except the provider registry's health poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: ModelId,
    pub provider: ModelProvider,
    pub kind: ModelKind,
    pub cost_class: CostClass,
    pub max_tokens: u32,
    pub is_available: bool,
}

/// Options for a generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.7),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub model: ModelId,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors a provider adapter can surface, classified so the router knows
/// whether to retry (transient) or advance the fallback chain (permanent).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Provider unreachable: {0}")]
    Unavailable(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Model not found: {0}")]
    ModelNotFound(ModelId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Transient failures get one retry with backoff before the chain
    /// advances; permanent ones advance immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout
            | ProviderError::Unavailable(_)
            | ProviderError::RateLimited
            | ProviderError::Provider(_) => true,
            ProviderError::Authentication(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::InvalidRequest(_) => false,
        }
    }
}

/// Uniform capability set implemented once per backend.
#[async_trait]
pub trait ModelProviderAdapter: Send + Sync {
    /// Human-readable adapter name, used in descriptors and logs.
    fn name(&self) -> &str;

    /// Which provider family this adapter belongs to.
    fn provider(&self) -> ModelProvider;

    async fn generate(
        &self,
        prompt: &str,
        model: &ModelId,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ProviderError>;

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError>;

    async fn embed(&self, text: &str, model: &ModelId) -> Result<Vec<f32>, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}
