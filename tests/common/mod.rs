//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tutor_rag::embedding::EmbeddingService;
use tutor_rag::{Corpus, PageRecord, ServiceError};

/// Deterministic embedding service with scripted vectors and failures
#[derive(Default)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `vector` for exactly `text`
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail every input containing `marker` until [`ScriptedEmbedder::heal`]
    pub fn failing_on(self, marker: &str) -> Self {
        self.failing.lock().unwrap().insert(marker.to_string());
        self
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Stable 4-d vector derived from the text bytes
    pub fn derived(text: &str) -> Vec<f32> {
        let bytes = text.as_bytes();
        let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
        vec![
            bytes.len() as f32,
            (sum % 97) as f32 + 1.0,
            bytes.first().copied().unwrap_or(0) as f32,
            bytes.last().copied().unwrap_or(0) as f32,
        ]
    }
}

#[async_trait]
impl EmbeddingService for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.calls.lock().unwrap().push(text.to_string());

        let failing = self.failing.lock().unwrap();
        if failing.iter().any(|marker| text.contains(marker.as_str())) {
            return Err(ServiceError::Api {
                status: 503,
                body: "scripted outage".to_string(),
            });
        }
        drop(failing);

        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| Self::derived(text)))
    }
}

/// Corpus of pages 1..=n with distinct text
pub fn numbered_corpus(n: u32) -> Corpus {
    Corpus::new(
        (1..=n)
            .map(|p| PageRecord::new(p, format!("Section {} covers topic {}", p, p * 7)))
            .collect(),
    )
    .unwrap()
}

/// 2-d unit vector whose cosine with [1, 0] is `similarity`
pub fn with_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}

pub fn page_numbers(records: &[PageRecord]) -> Vec<u32> {
    records.iter().map(|r| r.page_number).collect()
}
