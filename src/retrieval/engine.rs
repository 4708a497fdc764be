// Nearest-neighbour page retrieval over a loaded embedding index
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::corpus::PageRecord;
use crate::embedding::EmbeddingService;
use crate::errors::ServiceError;
use crate::index::store::is_finite;
use crate::index::EmbeddingIndex;
use crate::retrieval::similarity::top_k;

/// Number of pages returned when the caller does not choose
pub const DEFAULT_TOP_K: usize = 3;

/// Retrieved page with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPage {
    pub record: PageRecord,
    pub score: f32,
}

/// Embeds queries and ranks index pages by cosine similarity.
///
/// Holds no index state; every call reads the index it is given, so one
/// index can serve many concurrent retrievals.
pub struct Retriever<E> {
    embedder: E,
    top_k: usize,
}

impl<E: EmbeddingService> Retriever<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set the default result count used by [`Retriever::retrieve_default`]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Most relevant pages first; empty when retrieval is unavailable
    pub async fn retrieve(&self, query: &str, index: &EmbeddingIndex, top_k: usize) -> Vec<PageRecord> {
        self.retrieve_scored(query, index, top_k)
            .await
            .into_iter()
            .map(|p| p.record)
            .collect()
    }

    /// [`Retriever::retrieve`] with the configured default `top_k`
    pub async fn retrieve_default(&self, query: &str, index: &EmbeddingIndex) -> Vec<PageRecord> {
        self.retrieve(query, index, self.top_k).await
    }

    /// Like [`Retriever::retrieve`] but keeps the similarity scores
    pub async fn retrieve_scored(&self, query: &str, index: &EmbeddingIndex, top_k: usize) -> Vec<ScoredPage> {
        match self.try_retrieve(query, index, top_k).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!(error = %e, "query embedding failed, continuing without retrieval");
                Vec::new()
            }
        }
    }

    /// Ranked retrieval that surfaces embedding failures instead of degrading
    pub async fn try_retrieve(
        &self,
        query: &str,
        index: &EmbeddingIndex,
        top_k_count: usize,
    ) -> Result<Vec<ScoredPage>, ServiceError> {
        if index.is_empty() || top_k_count == 0 {
            debug!(pages = index.len(), top_k = top_k_count, "nothing to retrieve");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        if !is_finite(&query_vector) {
            return Err(ServiceError::InvalidResponse(
                "query embedding contains a non-finite value".to_string(),
            ));
        }
        if index.dimension() != Some(query_vector.len()) {
            return Err(ServiceError::InvalidResponse(format!(
                "query embedding has dimension {}, index has {}",
                query_vector.len(),
                index.dimension().unwrap_or(0)
            )));
        }

        let ranked = top_k(
            &query_vector,
            index.vectors().iter().map(|v| v.as_slice()),
            top_k_count,
        );

        let pages: Vec<ScoredPage> = ranked
            .into_iter()
            .map(|r| ScoredPage {
                record: index.metadata()[r.position].clone(),
                score: r.score,
            })
            .collect();

        debug!(
            returned = pages.len(),
            best = pages.first().map(|p| p.record.page_number),
            "retrieved pages"
        );
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        vector: Option<Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn returning(vector: Vec<f32>) -> Self {
            Self {
                vector: Some(vector),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                vector: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingService for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vector
                .clone()
                .ok_or_else(|| ServiceError::Unavailable("down".to_string()))
        }
    }

    fn index() -> EmbeddingIndex {
        EmbeddingIndex::from_parts(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            (1..=3).map(|n| PageRecord::new(n, format!("p{}", n))).collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let retriever = Retriever::new(FixedEmbedder::returning(vec![1.0, 0.0]));
        let pages = retriever.retrieve("q", &EmbeddingIndex::new(), 3).await;
        assert!(pages.is_empty());
        assert_eq!(retriever.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_empty() {
        let retriever = Retriever::new(FixedEmbedder::failing());
        assert!(retriever.retrieve("q", &index(), 3).await.is_empty());
        assert!(retriever.try_retrieve("q", &index(), 3).await.is_err());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_degrades_to_empty() {
        let retriever = Retriever::new(FixedEmbedder::returning(vec![1.0, 0.0, 0.0]));
        assert!(retriever.retrieve("q", &index(), 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_query_is_invalid() {
        let retriever = Retriever::new(FixedEmbedder::returning(vec![f32::NAN, 1.0]));
        let err = retriever.try_retrieve("q", &index(), 3).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
        assert!(retriever.retrieve("q", &index(), 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_scores_descending() {
        let retriever = Retriever::new(FixedEmbedder::returning(vec![1.0, 0.1]));
        let pages = retriever.retrieve_scored("q", &index(), 3).await;
        let order: Vec<u32> = pages.iter().map(|p| p.record.page_number).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert!(pages[0].score >= pages[1].score && pages[1].score >= pages[2].score);
    }

    #[tokio::test]
    async fn test_default_top_k() {
        let retriever = Retriever::new(FixedEmbedder::returning(vec![1.0, 0.0])).with_top_k(1);
        assert_eq!(retriever.top_k(), 1);
        let pages = retriever.retrieve_default("q", &index()).await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
    }
}
