// Chat-completion boundary and its HTTP client
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cli::config::ChatConfig;
use crate::errors::ServiceError;

/// Input to one generation call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPrompt {
    /// Instructions sent as the system message
    pub system: String,
    /// Primary user text
    pub text: String,
    /// Optional PNG attached to the user message
    pub image_png: Option<Vec<u8>>,
}

/// Generates text from a prompt plus retrieved reference context
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn generate(&self, prompt: &ChatPrompt, context: &str) -> Result<String, ServiceError>;
}

#[async_trait]
impl<T: ChatService + ?Sized> ChatService for Arc<T> {
    async fn generate(&self, prompt: &ChatPrompt, context: &str) -> Result<String, ServiceError> {
        (**self).generate(prompt, context).await
    }
}

/// Client for Mistral-compatible `/chat/completions` endpoints
#[derive(Clone)]
pub struct MistralChat {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl MistralChat {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        if api_key.trim().is_empty() {
            return Err(ServiceError::MissingApiKey(
                "key passed to the client is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.trim().to_string(),
            model,
            max_tokens,
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, ServiceError> {
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
            config.max_tokens,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Request body for one prompt; context is prepended to the user text
    fn request_body(&self, prompt: &ChatPrompt, context: &str) -> Value {
        let user_text = if context.is_empty() {
            prompt.text.clone()
        } else {
            format!("Reference material:\n{}\n\n{}", context, prompt.text)
        };

        let mut content = vec![json!({ "type": "text", "text": user_text })];
        if let Some(png) = &prompt.image_png {
            content.push(json!({
                "type": "image_url",
                "image_url": format!("data:image/png;base64,{}", STANDARD.encode(png)),
            }));
        }

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": content },
            ],
        })
    }
}

#[async_trait]
impl ChatService for MistralChat {
    async fn generate(&self, prompt: &ChatPrompt, context: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, context))
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("bad chat payload: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("no completion returned".to_string()))?;

        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

impl std::fmt::Debug for MistralChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
