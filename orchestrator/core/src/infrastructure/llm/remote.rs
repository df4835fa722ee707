// Remote API Provider Adapter
//
// Anti-Corruption Layer for OpenAI-compatible remote APIs (also covers
// LM Studio, vLLM, and other compatible gateways). Remote models carry
// external cost and rate limits, so they sort after local runtimes in the
// default fallback chain.

use crate::domain::llm::{
    CostClass, GenerationOptions, GenerationResponse, ModelDescriptor, ModelId, ModelKind,
    ModelProvider, ModelProviderAdapter, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct RemoteApiAdapter {
    client: reqwest::Client,
    name: String,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelsEntry>,
}

#[derive(Deserialize)]
struct ModelsEntry {
    id: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsEntry>,
}

#[derive(Deserialize)]
struct EmbeddingsEntry {
    embedding: Vec<f32>,
}

impl RemoteApiAdapter {
    pub fn new(name: String, endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name,
            endpoint,
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.api_key))
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
            401 | 403 => ProviderError::Authentication(body),
            404 => ProviderError::ModelNotFound(model.clone()),
            429 => ProviderError::RateLimited,
            400..=499 => ProviderError::InvalidRequest(format!("HTTP {status}: {body}")),
            _ => ProviderError::Provider(format!("HTTP {status}: {body}")),
        })
    }
}

#[async_trait]
impl ModelProviderAdapter for RemoteApiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> ModelProvider {
        ModelProvider::RemoteApi {
            name: self.name.clone(),
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &ModelId,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ProviderError> {
        let request = ChatRequest {
            model: model.as_str().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: options.stop_sequences.clone(),
        };

        let response = self
            .auth(self.client.post(self.url("/chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_send_error)?;
        let response = Self::classify_status(response, model).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("Failed to parse response: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Provider("No response from model".into()))?;

        Ok(GenerationResponse {
            text: choice.message.content,
            usage: TokenUsage {
                prompt_tokens: body.usage.prompt_tokens,
                completion_tokens: body.usage.completion_tokens,
                total_tokens: body.usage.total_tokens,
            },
            model: model.clone(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let response = self
            .auth(self.client.get(self.url("/models")))
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 401 || status.as_u16() == 403 {
                ProviderError::Authentication(body)
            } else {
                ProviderError::Provider(format!("HTTP {status}: {body}"))
            });
        }

        let body: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("Failed to parse response: {e}")))?;

        Ok(body
            .data
            .into_iter()
            .map(|entry| ModelDescriptor {
                id: ModelId::from(entry.id),
                provider: ModelProvider::RemoteApi {
                    name: self.name.clone(),
                },
                kind: ModelKind::Text,
                cost_class: CostClass::High,
                max_tokens: 8192,
                is_available: true,
            })
            .collect())
    }

    async fn embed(&self, text: &str, model: &ModelId) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingsRequest {
            model: model.as_str().to_string(),
            input: text.to_string(),
        };

        let response = self
            .auth(self.client.post(self.url("/embeddings")))
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_send_error)?;
        let response = Self::classify_status(response, model).await?;

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("Failed to parse response: {e}")))?;
        body.data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| ProviderError::Provider("No embedding in response".into()))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .auth(self.client.get(self.url("/models")))
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            Err(ProviderError::Authentication("Invalid API key".into()))
        } else {
            Err(ProviderError::Unavailable(format!("HTTP {status}")))
        }
    }
}
