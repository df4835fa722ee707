// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// Defines the configuration schema for the orchestration engine:
// - Provider configuration (local runtimes and remote APIs)
// - Routing policy (retry, backoff, deadlines, cache TTLs, health polling)
// - Reasoning/generation pipeline model selection
// - Training batch policy

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level orchestrator configuration, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    /// Model provider configurations
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Routing and caching policy
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Reasoning/generation hybrid pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,

    /// Training batch policy
    #[serde(default)]
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g. "local-ollama", "production-gpt")
    pub name: String,

    /// Provider type: "local-runtime" or "remote-api"
    #[serde(rename = "type")]
    pub provider_type: String,

    /// HTTP endpoint of the backend
    pub endpoint: String,

    /// API key; supports "env:VAR_NAME" indirection. Absent for local
    /// runtimes without auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Models served by this provider
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,

    /// "text" or "multimodal"
    #[serde(default = "default_model_kind")]
    pub kind: String,

    /// "free", "low" or "high"
    #[serde(default = "default_cost_class")]
    pub cost_class: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Backoff before the single transient retry, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-request deadline in seconds
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Health-check poll interval in seconds
    #[serde(default = "default_health_interval_secs")]
    pub health_check_interval_secs: u64,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff_ms(),
            deadline_secs: default_deadline_secs(),
            health_check_interval_secs: default_health_interval_secs(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for deterministic (low-temperature) generations, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,

    /// TTL for time-sensitive / high-temperature results, in seconds
    #[serde(default = "default_volatile_ttl_secs")]
    pub volatile_ttl_secs: u64,

    /// Temperature at or below which a generation counts as deterministic
    #[serde(default = "default_deterministic_temperature")]
    pub deterministic_temperature: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
            volatile_ttl_secs: default_volatile_ttl_secs(),
            deterministic_temperature: default_deterministic_temperature(),
        }
    }
}

/// Model selection for the two-stage reasoning/generation hybrid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub reasoning_model: String,
    pub generation_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Minimum records before a training job runs instead of reporting an
    /// empty batch
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_batch_size: default_min_batch_size(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for provider in &self.providers {
            match provider.provider_type.as_str() {
                "local-runtime" | "remote-api" => {}
                other => anyhow::bail!(
                    "Provider '{}': unsupported type '{}'",
                    provider.name,
                    other
                ),
            }
            if provider.endpoint.trim().is_empty() {
                anyhow::bail!("Provider '{}': endpoint must not be empty", provider.name);
            }
        }
        if let Some(pipeline) = &self.pipeline {
            if pipeline.reasoning_model == pipeline.generation_model {
                tracing::warn!(
                    "Pipeline reasoning and generation models are identical ('{}')",
                    pipeline.reasoning_model
                );
            }
        }
        Ok(())
    }
}

/// Resolve an API key from config (supports "env:VAR_NAME" syntax).
pub fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
    match key {
        Some(k) if k.starts_with("env:") => {
            let var_name = k.strip_prefix("env:").unwrap();
            std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name))
        }
        Some(k) => Ok(k.clone()),
        None => Ok(String::new()), // Local providers without auth
    }
}

// Defaults
fn default_true() -> bool { true }
fn default_model_kind() -> String { "text".to_string() }
fn default_cost_class() -> String { "low".to_string() }
fn default_max_tokens() -> u32 { 8192 }
fn default_retry_backoff_ms() -> u64 { 250 }
fn default_deadline_secs() -> u64 { 60 }
fn default_health_interval_secs() -> u64 { 30 }
fn default_cache_ttl_secs() -> u64 { 3600 }
fn default_volatile_ttl_secs() -> u64 { 60 }
fn default_deterministic_temperature() -> f32 { 0.3 }
fn default_min_batch_size() -> usize { 8 }
