//! Retrieval-augmented feedback
//!
//! Combines a learner submission (question text and an image of the attempt)
//! with the most relevant reference pages and hands both to a chat model.
//!
//! Components:
//! - Chat: generation boundary and HTTP client
//! - Context: page text assembly under a token budget
//! - Images: filters for page images forwarded to the caller
//! - Engine: end-to-end orchestration

pub mod chat;
pub mod context;
pub mod engine;
pub mod images;

pub use chat::{ChatPrompt, ChatService, MistralChat};
pub use context::{AssembledContext, ContextBuilder, ContextConfig};
pub use engine::{Feedback, FeedbackEngine, Submission};
pub use images::{AcceptAll, ExistingFiles, ImageFilter};
