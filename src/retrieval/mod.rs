//! Nearest-neighbour retrieval
//!
//! - Similarity: cosine scoring and stable top-k selection
//! - Engine: query embedding plus ranking over an [`crate::index::EmbeddingIndex`]

pub mod engine;
pub mod similarity;

pub use engine::{Retriever, ScoredPage, DEFAULT_TOP_K};
pub use similarity::{cosine_similarity, top_k, Ranked};
