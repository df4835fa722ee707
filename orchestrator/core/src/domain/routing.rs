// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Routing request and fingerprint types.
//!
//! A [`RoutingRequest`] is ephemeral: it exists for one routing decision and
//! is never persisted beyond the cache entry it produces. Its
//! [`Fingerprint`] is a deterministic SHA-256 over the request's semantic
//! inputs (stage, model id, prompt, normalized options) and is the cache key.

use crate::domain::llm::{GenerationOptions, ModelId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStage {
    Single,
    Reasoning,
    Generation,
}

impl RoutingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStage::Single => "single",
            RoutingStage::Reasoning => "reasoning",
            RoutingStage::Generation => "generation",
        }
    }
}

/// Cache key derived from a request's semantic inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RoutingRequest {
    pub prompt: String,
    pub preferred_model: ModelId,
    /// Ordered sequence of models tried after the preferred one fails.
    pub fallback_chain: Vec<ModelId>,
    pub stage: RoutingStage,
    pub options: GenerationOptions,
    /// Implicit per-request deadline; overrun counts as a transient failure.
    pub deadline: Duration,
}

impl RoutingRequest {
    pub fn new(prompt: impl Into<String>, preferred_model: ModelId) -> Self {
        Self {
            prompt: prompt.into(),
            preferred_model,
            fallback_chain: Vec::new(),
            stage: RoutingStage::Single,
            options: GenerationOptions::default(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_fallback_chain(mut self, chain: Vec<ModelId>) -> Self {
        self.fallback_chain = chain;
        self
    }

    pub fn with_stage(mut self, stage: RoutingStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fingerprint for a specific model in the chain. Options are
    /// normalized (fixed-precision temperature, explicit absent markers) so
    /// semantically equal requests hash identically.
    pub fn fingerprint_for(&self, model: &ModelId) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.stage.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.prompt.as_bytes());
        hasher.update([0u8]);
        match self.options.max_tokens {
            Some(n) => hasher.update(n.to_be_bytes()),
            None => hasher.update(b"-"),
        }
        hasher.update([0u8]);
        match self.options.temperature {
            Some(t) => hasher.update(format!("{t:.4}").as_bytes()),
            None => hasher.update(b"-"),
        }
        hasher.update([0u8]);
        if let Some(stops) = &self.options.stop_sequences {
            for stop in stops {
                hasher.update(stop.as_bytes());
                hasher.update([0u8]);
            }
        }
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Fingerprint under the preferred model.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint_for(&self.preferred_model)
    }
}

/// Outcome of one routing decision: which model produced the content and
/// how long the provider call took (zero for cache hits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedResult {
    pub model_id: ModelId,
    pub content: String,
    pub latency: Duration,
    pub cached: bool,
}
