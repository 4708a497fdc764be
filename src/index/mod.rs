//! Embedding index over the paginated reference document
//!
//! - Store: in-memory vectors and page metadata with their invariants
//! - Persistence: atomic JSON snapshot shared between builder and retriever
//! - Builder: resumable, page-at-a-time embedding of a corpus

pub mod builder;
pub mod persistence;
pub mod store;

pub use builder::{
    BuildEvent, BuildOutcome, BuildReport, BuilderOptions, IndexBuilder, PageFailure, ResumePolicy,
};
pub use persistence::IndexStore;
pub use store::EmbeddingIndex;
