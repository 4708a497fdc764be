// HTTP client for the hosted embeddings endpoint
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cli::config::EmbeddingConfig;
use crate::embedding::EmbeddingService;
use crate::errors::ServiceError;
use crate::index::store::is_finite;

/// Embeddings client for Mistral-compatible `/embeddings` endpoints
#[derive(Clone)]
pub struct MistralEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: usize,
    retry_base_delay: Duration,
}

impl MistralEmbedder {
    /// Create a client for `base_url` (e.g. `https://api.mistral.ai/v1`)
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ServiceError> {
        if api_key.trim().is_empty() {
            return Err(ServiceError::MissingApiKey(
                "key passed to the client is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.trim().to_string(),
            model,
            max_retries,
            retry_base_delay: Duration::from_millis(500),
        })
    }

    /// Create from configuration, reading the key from the configured variable
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::MissingApiKey(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;

        Self::new(
            &config.base_url,
            api_key,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    /// Override the first backoff interval (doubles per attempt)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("bad embedding payload: {}", e)))?;

        let vector = parsed
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::InvalidResponse("no embedding returned".to_string()))?;

        if vector.is_empty() {
            return Err(ServiceError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }
        if !is_finite(&vector) {
            return Err(ServiceError::InvalidResponse(
                "embedding contains a value outside the f32 range".to_string(),
            ));
        }
        Ok(vector)
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.retry_base_delay * (1 << capped)
    }
}

#[async_trait]
impl EmbeddingService for MistralEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut attempt = 0usize;
        loop {
            match self.request_once(text).await {
                Ok(vector) => {
                    debug!(dimension = vector.len(), attempt, "embedding received");
                    return Ok(vector);
                }
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let wait = self.backoff(attempt);
                    warn!(error = %err, attempt, wait_ms = wait.as_millis() as u64, "embedding request failed, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for MistralEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
