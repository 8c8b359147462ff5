use crate::traits::{ChatModel, Embedder};
use crate::{ChatMessage, ServiceError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai.text-embedding-3-large";
pub const DEFAULT_CHAT_MODEL: &str = "openai.gpt-4o";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Inputs per embeddings request. The API rejects requests with more than
/// 2048 inputs.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub timeout: Duration,
    pub embedding_batch_size: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible REST API. Serves both as the embedding
/// service and as the chat-completion service.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    embedding_model: String,
    chat_model: String,
    embedding_batch_size: usize,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: config
                .api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            embedding_model: config.embedding_model,
            chat_model: config.chat_model,
            embedding_batch_size: config.embedding_batch_size.max(1),
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotReady("OPENAI_API_KEY is not set".to_string()))?;
        Ok(request.bearer_auth(api_key))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = self
            .client
            .post(self.endpoint("embeddings")?)
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                input: batch,
            });

        debug!(model = %self.embedding_model, inputs = batch.len(), "requesting embeddings");
        let response = self.authorized(request)?.send().await?;
        let response = ensure_success("embeddings", response).await?;
        let payload: EmbeddingResponse = serde_json::from_slice(&response.bytes().await?)?;

        vectors_in_input_order(payload.data, batch.len())
    }
}

async fn ensure_success(backend: &str, response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::BackendResponse {
        backend: backend.to_string(),
        details: format!("{status}: {}", body.trim()),
    })
}

fn vectors_in_input_order(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    if data.len() != expected {
        return Err(ServiceError::BackendResponse {
            backend: "embeddings".to_string(),
            details: format!("expected {expected} vectors, got {}", data.len()),
        });
    }

    if data.iter().any(|item| item.index.is_some()) {
        data.sort_by_key(|item| item.index);
        let positions_match = data
            .iter()
            .enumerate()
            .all(|(position, item)| item.index == Some(position));
        if !positions_match {
            return Err(ServiceError::BackendResponse {
                backend: "embeddings".to_string(),
                details: format!("vector indices are not exactly 0..{expected}"),
            });
        }
    }

    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiClient {
    /// Sends one request per batch, in input order. The first failing batch
    /// fails the whole call.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedding_batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ServiceError> {
        let request = self
            .client
            .post(self.endpoint("chat/completions")?)
            .json(&ChatCompletionRequest {
                model: &self.chat_model,
                messages: messages
                    .iter()
                    .map(|message| WireMessage {
                        role: message.role.as_str(),
                        content: &message.content,
                    })
                    .collect(),
                temperature,
            });

        debug!(model = %self.chat_model, messages = messages.len(), "requesting chat completion");
        let response = self.authorized(request)?.send().await?;
        let response = ensure_success("chat completions", response).await?;
        let payload: ChatCompletionResponse = serde_json::from_slice(&response.bytes().await?)?;

        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ServiceError::BackendResponse {
                backend: "chat completions".to_string(),
                details: "response has no choices".to_string(),
            })
    }
}
