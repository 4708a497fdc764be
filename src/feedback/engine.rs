// Composes a submission with retrieved pages and asks the chat service for feedback
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::corpus::PageRecord;
use crate::embedding::EmbeddingService;
use crate::errors::Result;
use crate::feedback::chat::{ChatPrompt, ChatService};
use crate::feedback::context::{AssembledContext, ContextBuilder, ContextConfig};
use crate::feedback::images::{AcceptAll, ImageFilter};
use crate::index::EmbeddingIndex;
use crate::retrieval::Retriever;

/// Learner input: the question text plus an image of their attempt
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub question: String,
    pub image_png: Option<Vec<u8>>,
}

impl Submission {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            image_png: None,
        }
    }

    pub fn with_image(mut self, png: Vec<u8>) -> Self {
        self.image_png = Some(png);
        self
    }
}

/// Generated feedback and the reference pages that informed it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub text: String,
    /// Retrieved pages, most relevant first, with filtered image paths
    pub pages: Vec<PageRecord>,
    /// Pages whose text made it into the generation context
    pub context_pages: Vec<u32>,
}

/// Retrieval-augmented feedback over one loaded index
pub struct FeedbackEngine<E, C> {
    retriever: Retriever<E>,
    chat: C,
    context_builder: ContextBuilder,
    image_filter: Arc<dyn ImageFilter>,
    system_prompt: String,
}

impl<E: EmbeddingService, C: ChatService> FeedbackEngine<E, C> {
    pub fn new(retriever: Retriever<E>, chat: C, system_prompt: impl Into<String>) -> Self {
        Self {
            retriever,
            chat,
            context_builder: ContextBuilder::new(),
            image_filter: Arc::new(AcceptAll),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn with_context_config(mut self, config: ContextConfig) -> Self {
        self.context_builder = ContextBuilder::with_config(config);
        self
    }

    pub fn with_image_filter(mut self, filter: Arc<dyn ImageFilter>) -> Self {
        self.image_filter = filter;
        self
    }

    pub fn retriever(&self) -> &Retriever<E> {
        &self.retriever
    }

    /// Retrieve supporting pages, then generate feedback.
    ///
    /// Retrieval problems degrade to generation without context; a failed
    /// generation call is returned as an error.
    pub async fn feedback(&self, index: &EmbeddingIndex, submission: &Submission) -> Result<Feedback> {
        let scored = self
            .retriever
            .retrieve_scored(&submission.question, index, self.retriever.top_k())
            .await;
        let context: AssembledContext = self.context_builder.build(&scored);

        info!(
            retrieved = scored.len(),
            context_pages = context.page_numbers.len(),
            has_image = submission.image_png.is_some(),
            "requesting feedback"
        );

        let prompt = ChatPrompt {
            system: self.system_prompt.clone(),
            text: submission.question.clone(),
            image_png: submission.image_png.clone(),
        };
        let text = self.chat.generate(&prompt, &context.text).await?;

        let pages = scored
            .into_iter()
            .map(|p| self.filter_images(p.record))
            .collect();

        Ok(Feedback {
            text,
            pages,
            context_pages: context.page_numbers,
        })
    }

    fn filter_images(&self, mut record: PageRecord) -> PageRecord {
        record
            .image_paths
            .retain(|path| self.image_filter.is_useful(path));
        record
    }
}
