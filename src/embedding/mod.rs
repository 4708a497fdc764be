//! Embedding service boundary
//!
//! The builder and retriever only see [`EmbeddingService`]; the HTTP client
//! for the hosted model lives in [`mistral`].

pub mod mistral;

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::ServiceError;

pub use mistral::MistralEmbedder;

/// Turns text into a fixed-dimension vector
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
impl<T: EmbeddingService + ?Sized> EmbeddingService for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed(text).await
    }
}

#[async_trait]
impl<T: EmbeddingService + ?Sized> EmbeddingService for Box<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed(text).await
    }
}
