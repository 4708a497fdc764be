//! Paginated document records produced by the extraction pipeline

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{RagError, Result};

/// One extracted page of the reference document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-based page number in source pagination order
    pub page_number: u32,
    /// Extracted text, possibly empty
    #[serde(default)]
    pub text: String,
    /// Images found on the page, in page order
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
}

impl PageRecord {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            image_paths: Vec::new(),
        }
    }

    pub fn with_images(mut self, image_paths: Vec<PathBuf>) -> Self {
        self.image_paths = image_paths;
        self
    }

    /// Text submitted to the embedding service for this page
    pub fn embedding_input(&self) -> String {
        format!("Page {}: {}", self.page_number, self.text)
    }
}

/// Ordered collection of pages available for indexing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pages: Vec<PageRecord>,
}

impl Corpus {
    /// Build a corpus, rejecting zero, duplicate or out-of-order page numbers
    pub fn new(pages: Vec<PageRecord>) -> Result<Self> {
        let mut previous: Option<u32> = None;
        for page in &pages {
            if page.page_number == 0 {
                return Err(RagError::Corpus(
                    "page numbers must be positive, found 0".to_string(),
                ));
            }
            if let Some(prev) = previous {
                if page.page_number <= prev {
                    return Err(RagError::Corpus(format!(
                        "page {} follows page {}; pages must be strictly ascending",
                        page.page_number, prev
                    )));
                }
            }
            previous = Some(page.page_number);
        }
        Ok(Self { pages })
    }

    /// Load the extraction pipeline's JSON array of pages
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            RagError::Corpus(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let pages: Vec<PageRecord> = serde_json::from_str(json)
            .map_err(|e| RagError::Corpus(format!("Failed to parse corpus: {}", e)))?;
        Self::new(pages)
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// First n pages, used to stage partial builds
    pub fn prefix(&self, n: usize) -> Corpus {
        Corpus {
            pages: self.pages.iter().take(n).cloned().collect(),
        }
    }
}
