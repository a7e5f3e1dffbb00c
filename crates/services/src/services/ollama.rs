//! Client for a local Ollama runtime: embeddings and chat completions.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::config::OllamaConfig;

#[derive(Debug, Clone, Error)]
pub enum OllamaError {
    #[error("Ollama is not reachable at {0}")]
    ServerNotRunning(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("Ollama returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Ollama n'a pas renvoyé d'embedding. Exécutez : ollama pull {model}")]
    MissingEmbedding { model: String },
    #[error("json error: {0}")]
    Serde(String),
}

/// One turn of a chat, in the shape Ollama expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a Value>,
}

/// Produces embedding vectors; implemented by [`OllamaClient`] and by fakes in tests
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, OllamaError>;
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    chat_model: String,
    embed_model: String,
}

impl OllamaClient {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(config: &OllamaConfig) -> Result<Self, OllamaError> {
        // No overall timeout: streamed completions can run for minutes
        let http = Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .user_agent(concat!("family-assistant/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OllamaError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// POST /api/embeddings
    pub async fn embeddings(&self, prompt: &str) -> Result<Vec<f64>, OllamaError> {
        let res = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.embed_model,
                prompt,
            })
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        // An unknown model comes back as an error body; judge by content, not status
        let status = res.status();
        let body = res.bytes().await.map_err(|e| self.map_reqwest_error(e))?;
        let embedding = serde_json::from_slice::<EmbeddingResponse>(&body)
            .ok()
            .and_then(|b| b.embedding);

        match embedding {
            Some(embedding) if !embedding.is_empty() => Ok(embedding),
            _ => {
                debug!(%status, model = %self.embed_model, "no embedding in response");
                Err(OllamaError::MissingEmbedding {
                    model: self.embed_model.clone(),
                })
            }
        }
    }

    /// Non-streaming POST /api/chat; returns the raw response body
    pub async fn chat(
        &self,
        messages: &[ChatTurn],
        options: Option<&Value>,
    ) -> Result<Bytes, OllamaError> {
        let res = self.send_chat(messages, false, options).await?;
        res.bytes().await.map_err(|e| self.map_reqwest_error(e))
    }

    /// Streaming POST /api/chat; yields upstream NDJSON bytes as they arrive
    pub async fn chat_stream(
        &self,
        messages: &[ChatTurn],
        options: Option<&Value>,
    ) -> Result<BoxStream<'static, Result<Bytes, OllamaError>>, OllamaError> {
        let res = self.send_chat(messages, true, options).await?;
        let base_url = self.base_url.clone();
        Ok(res
            .bytes_stream()
            .map_err(move |e| map_reqwest_error(&base_url, e))
            .boxed())
    }

    async fn send_chat(
        &self,
        messages: &[ChatTurn],
        stream: bool,
        options: Option<&Value>,
    ) -> Result<reqwest::Response, OllamaError> {
        debug!(model = %self.chat_model, turns = messages.len(), stream, "sending chat request");
        let res = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&ChatRequest {
                model: &self.chat_model,
                messages,
                stream,
                options,
            })
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;
        Self::check_status(res).await
    }

    async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, OllamaError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(OllamaError::Http {
            status: status.as_u16(),
            body,
        })
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> OllamaError {
        map_reqwest_error(&self.base_url, e)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, OllamaError> {
        self.embeddings(text).await
    }
}

fn map_reqwest_error(base_url: &str, e: reqwest::Error) -> OllamaError {
    if e.is_connect() {
        OllamaError::ServerNotRunning(base_url.to_string())
    } else if e.is_timeout() {
        OllamaError::Timeout
    } else {
        OllamaError::Transport(e.to_string())
    }
}

/// `message.content` of a chat response object (one NDJSON line or a full non-streamed body)
pub fn message_content(value: &Value) -> Option<&str> {
    value.get("message")?.get("content")?.as_str()
}
