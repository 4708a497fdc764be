//! tutor-rag - Textbook page retrieval for grounded tutoring feedback
//!
//! Finds the pages of a reference document most relevant to a question,
//! using precomputed page embeddings and cosine similarity, and feeds them
//! alongside the learner's attempt to a chat model.
//!
//! # Architecture
//!
//! - **Index**: resumable page-at-a-time embedding of a corpus into a
//!   persisted [`index::EmbeddingIndex`]
//! - **Retrieval**: query embedding plus stable top-k cosine ranking
//! - **Feedback**: context assembly and the chat-completion call

pub mod errors;
pub use errors::{RagError, Result, ServiceError};

pub mod corpus;
pub use corpus::{Corpus, PageRecord};

// Service boundaries
pub mod embedding;

// Offline: corpus -> persisted index
pub mod index;

// Online: query -> ranked pages -> feedback
pub mod retrieval;
pub mod feedback;

// Command-line surface
pub mod cli;
pub mod logging;
