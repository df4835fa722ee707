// Local Runtime Provider Adapter
//
// Anti-Corruption Layer for an Ollama-style local model runtime. Supports
// air-gapped deployments; no auth, no external cost, so its models sort
// first in the default fallback chain.

use crate::domain::llm::{
    CostClass, GenerationOptions, GenerationResponse, ModelDescriptor, ModelId, ModelKind,
    ModelProvider, ModelProviderAdapter, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct LocalRuntimeAdapter {
    client: reqwest::Client,
    name: String,
    endpoint: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<RuntimeOptions>,
}

#[derive(Serialize)]
struct RuntimeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl LocalRuntimeAdapter {
    pub fn new(name: String, endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name,
            endpoint,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn classify_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Unavailable(e.to_string())
        } else {
            ProviderError::Provider(e.to_string())
        }
    }

    async fn classify_status(
        response: reqwest::Response,
        model: &ModelId,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            404 => ProviderError::ModelNotFound(model.clone()),
            429 => ProviderError::RateLimited,
            400..=499 => ProviderError::InvalidRequest(format!("HTTP {status}: {body}")),
            _ => ProviderError::Provider(format!("HTTP {status}: {body}")),
        })
    }
}

#[async_trait]
impl ModelProviderAdapter for LocalRuntimeAdapter {
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
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ProviderError> {
        let request = GenerateRequest {
            model: model.as_str().to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: Some(RuntimeOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens.map(|t| t as i32),
                stop: options.stop_sequences.clone(),
            }),
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_send_error)?;
        let response = Self::classify_status(response, model).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("Failed to parse response: {e}")))?;

        let prompt_tokens = body.prompt_eval_count.unwrap_or(0);
        let completion_tokens = body.eval_count.unwrap_or(0);
        Ok(GenerationResponse {
            text: body.response,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            model: model.clone(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        if !response.status().is_success() {
            return Err(ProviderError::Provider(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("Failed to parse response: {e}")))?;

        Ok(tags
            .models
            .into_iter()
            .map(|tag| ModelDescriptor {
                id: ModelId::from(tag.name),
                provider: ModelProvider::LocalRuntime,
                kind: ModelKind::Text,
                cost_class: CostClass::Free,
                max_tokens: 8192,
                is_available: true,
            })
            .collect())
    }

    async fn embed(&self, text: &str, model: &ModelId) -> Result<Vec<f32>, ProviderError> {
        let request = EmbedRequest {
            model: model.as_str().to_string(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(self.url("/api/embeddings"))
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_send_error)?;
        let response = Self::classify_status(response, model).await?;

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("Failed to parse response: {e}")))?;
        Ok(body.embedding)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // Listing tags doubles as the liveness probe.
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }
}
