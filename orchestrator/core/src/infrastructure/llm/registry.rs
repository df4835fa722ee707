// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Registry - Adapter Construction and Model Health Tracking
//
// Builds one adapter per configured backend and keeps the live
// ModelDescriptor table. Descriptors are seeded from config and refreshed by
// a periodic health poll; `is_available` is the only mutable shared state,
// read by the router without locking. Staleness of one poll interval is
// acceptable.

use crate::domain::config::{resolve_api_key, ModelEntry, OrchestratorConfig};
use crate::domain::llm::{
    CostClass, ModelDescriptor, ModelId, ModelKind, ModelProvider, ModelProviderAdapter,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::local::LocalRuntimeAdapter;
use super::remote::RemoteApiAdapter;

#[derive(Clone)]
struct ModelSlot {
    descriptor: ModelDescriptor,
    provider_name: String,
}

pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ModelProviderAdapter>>,
    models: DashMap<ModelId, ModelSlot>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            models: DashMap::new(),
        }
    }

    /// Build adapters and seed the model table from configuration. A
    /// provider that fails to initialize is skipped, not fatal.
    pub fn from_config(config: &OrchestratorConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        info!("Initializing model provider registry");

        for provider_config in &config.providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            let adapter: Arc<dyn ModelProviderAdapter> = match provider_config
                .provider_type
                .as_str()
            {
                "local-runtime" => Arc::new(LocalRuntimeAdapter::new(
                    provider_config.name.clone(),
                    provider_config.endpoint.clone(),
                )),
                "remote-api" => {
                    let api_key = match resolve_api_key(&provider_config.api_key) {
                        Ok(key) => key,
                        Err(e) => {
                            warn!(
                                "Failed to initialize provider '{}': {}",
                                provider_config.name, e
                            );
                            continue;
                        }
                    };
                    Arc::new(RemoteApiAdapter::new(
                        provider_config.name.clone(),
                        provider_config.endpoint.clone(),
                        api_key,
                    ))
                }
                other => anyhow::bail!("Unsupported provider type: {}", other),
            };

            let descriptors = provider_config
                .models
                .iter()
                .map(|entry| descriptor_from_entry(entry, adapter.provider()))
                .collect();
            registry.register_adapter(provider_config.name.clone(), adapter, descriptors);
        }

        if registry.adapters.is_empty() {
            warn!("No model providers configured - routing will fail until one registers");
        }

        Ok(registry)
    }

    /// Register an adapter with its initially known models. Also the seam
    /// tests use to install scripted adapters.
    pub fn register_adapter(
        &mut self,
        name: String,
        adapter: Arc<dyn ModelProviderAdapter>,
        models: Vec<ModelDescriptor>,
    ) {
        for descriptor in models {
            info!(
                "Mapping model '{}' -> provider '{}'",
                descriptor.id, name
            );
            self.models.insert(
                descriptor.id.clone(),
                ModelSlot {
                    descriptor,
                    provider_name: name.clone(),
                },
            );
        }
        self.adapters.insert(name, adapter);
    }

    pub fn adapter_for(&self, model: &ModelId) -> Option<Arc<dyn ModelProviderAdapter>> {
        let slot = self.models.get(model)?;
        self.adapters.get(&slot.provider_name).cloned()
    }

    pub fn descriptor(&self, model: &ModelId) -> Option<ModelDescriptor> {
        self.models.get(model).map(|slot| slot.descriptor.clone())
    }

    pub fn is_available(&self, model: &ModelId) -> bool {
        self.models
            .get(model)
            .map(|slot| slot.descriptor.is_available)
            .unwrap_or(false)
    }

    /// Operator override / health-poller hook for one model's liveness.
    pub fn set_available(&self, model: &ModelId, available: bool) {
        if let Some(mut slot) = self.models.get_mut(model) {
            slot.descriptor.is_available = available;
        }
    }

    pub fn list_descriptors(&self) -> Vec<ModelDescriptor> {
        self.models
            .iter()
            .map(|entry| entry.value().descriptor.clone())
            .collect()
    }

    /// Default fallback chain: local-runtime models before remote APIs,
    /// cheaper cost classes first within each group.
    pub fn default_chain(&self) -> Vec<ModelId> {
        let mut descriptors = self.list_descriptors();
        descriptors.sort_by_key(|d| (!d.provider.is_local(), d.cost_class, d.id.as_str().to_string()));
        descriptors.into_iter().map(|d| d.id).collect()
    }

    /// One health poll cycle: probe each adapter, flip availability for all
    /// of its models, and merge any newly reported models into the table.
    pub async fn refresh_availability(&self) {
        for (name, adapter) in &self.adapters {
            let healthy = match adapter.health_check().await {
                Ok(()) => true,
                Err(e) => {
                    debug!("Provider '{}' health check failed: {}", name, e);
                    false
                }
            };

            if healthy {
                match adapter.list_models().await {
                    Ok(discovered) => {
                        for descriptor in discovered {
                            self.models
                                .entry(descriptor.id.clone())
                                .or_insert_with(|| ModelSlot {
                                    descriptor,
                                    provider_name: name.clone(),
                                });
                        }
                    }
                    Err(e) => debug!("Provider '{}' list_models failed: {}", name, e),
                }
            }

            let mut flipped = 0usize;
            for mut entry in self.models.iter_mut() {
                if entry.value().provider_name == *name
                    && entry.value().descriptor.is_available != healthy
                {
                    entry.value_mut().descriptor.is_available = healthy;
                    flipped += 1;
                }
            }
            if flipped > 0 {
                info!(
                    "Provider '{}' is now {}; {} model(s) updated",
                    name,
                    if healthy { "available" } else { "unavailable" },
                    flipped
                );
            }
        }
    }

    /// Spawn the background health poller. Cancelled via the token on
    /// shutdown.
    pub fn spawn_health_task(
        registry: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Health poller shutting down");
                        return;
                    }
                    _ = ticker.tick() => {
                        registry.refresh_availability().await;
                    }
                }
            }
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn descriptor_from_entry(entry: &ModelEntry, provider: ModelProvider) -> ModelDescriptor {
    let kind = match entry.kind.as_str() {
        "multimodal" => ModelKind::Multimodal,
        _ => ModelKind::Text,
    };
    let cost_class = match entry.cost_class.as_str() {
        "free" => CostClass::Free,
        "high" => CostClass::High,
        _ => CostClass::Low,
    };
    ModelDescriptor {
        id: ModelId::from(entry.id.clone()),
        provider,
        kind,
        cost_class,
        max_tokens: entry.max_tokens,
        // Assumed reachable until the first poll says otherwise.
        is_available: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{CacheConfig, ProviderConfig, RoutingConfig};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            providers: vec![
                ProviderConfig {
                    name: "remote-gpt".to_string(),
                    provider_type: "remote-api".to_string(),
                    endpoint: "https://api.example.com/v1".to_string(),
                    api_key: Some("sk-test".to_string()),
                    enabled: true,
                    models: vec![ModelEntry {
                        id: "gpt-4o".to_string(),
                        kind: "multimodal".to_string(),
                        cost_class: "high".to_string(),
                        max_tokens: 128_000,
                    }],
                },
                ProviderConfig {
                    name: "local-ollama".to_string(),
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
                },
            ],
            routing: RoutingConfig {
                cache: CacheConfig::default(),
                ..Default::default()
            },
            pipeline: None,
            training: Default::default(),
        }
    }

    #[test]
    fn from_config_builds_model_table() {
        let registry = ProviderRegistry::from_config(&config()).unwrap();

        let descriptor = registry.descriptor(&ModelId::from("gpt-4o")).unwrap();
        assert_eq!(descriptor.kind, ModelKind::Multimodal);
        assert_eq!(descriptor.cost_class, CostClass::High);
        assert!(descriptor.is_available);

        assert!(registry.adapter_for(&ModelId::from("llama3.2")).is_some());
        assert!(registry.adapter_for(&ModelId::from("unknown")).is_none());
    }

    #[test]
    fn default_chain_prefers_local_models() {
        let registry = ProviderRegistry::from_config(&config()).unwrap();
        let chain = registry.default_chain();
        assert_eq!(chain, vec![ModelId::from("llama3.2"), ModelId::from("gpt-4o")]);
    }

    #[test]
    fn availability_flag_round_trip() {
        let registry = ProviderRegistry::from_config(&config()).unwrap();
        let model = ModelId::from("llama3.2");

        assert!(registry.is_available(&model));
        registry.set_available(&model, false);
        assert!(!registry.is_available(&model));

        // Unknown models are never available.
        assert!(!registry.is_available(&ModelId::from("unknown")));
    }

    #[test]
    fn disabled_providers_are_skipped() {
        let mut cfg = config();
        cfg.providers[0].enabled = false;
        let registry = ProviderRegistry::from_config(&cfg).unwrap();
        assert!(registry.adapter_for(&ModelId::from("gpt-4o")).is_none());
        assert!(registry.adapter_for(&ModelId::from("llama3.2")).is_some());
    }
}
