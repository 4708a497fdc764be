// Context block assembled from retrieved pages for the generation call
use serde::{Deserialize, Serialize};

use crate::retrieval::ScoredPage;

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum estimated tokens of page text to include
    pub max_context_tokens: usize,
    /// Show similarity scores next to page headers
    pub include_scores: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 2000,
            include_scores: false,
        }
    }
}

/// Assembled reference material
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Formatted context text, empty when no page fits
    pub text: String,
    /// Estimated token count
    pub estimated_tokens: usize,
    /// Pages included, in relevance order
    pub page_numbers: Vec<u32>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.page_numbers.is_empty()
    }
}

/// Formats retrieved pages into a single context block
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Add pages in relevance order until the token budget is reached
    pub fn build(&self, pages: &[ScoredPage]) -> AssembledContext {
        let mut parts = Vec::new();
        let mut total_tokens = 0;
        let mut page_numbers = Vec::new();

        for page in pages {
            // Rough estimate: ~4 chars per token
            let page_tokens = page.record.text.len() / 4;
            if total_tokens + page_tokens > self.config.max_context_tokens {
                break;
            }

            parts.push(self.format_page(page));
            total_tokens += page_tokens;
            page_numbers.push(page.record.page_number);
        }

        if parts.is_empty() {
            return AssembledContext::default();
        }

        AssembledContext {
            text: parts.join("\n\n"),
            estimated_tokens: total_tokens,
            page_numbers,
        }
    }

    fn format_page(&self, page: &ScoredPage) -> String {
        if self.config.include_scores {
            format!(
                "[Page {}] (score: {:.2})\n{}",
                page.record.page_number, page.score, page.record.text
            )
        } else {
            format!("[Page {}]\n{}", page.record.page_number, page.record.text)
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
