// In-memory embedding index: parallel vectors and page metadata
use serde::{Deserialize, Serialize};

use crate::corpus::PageRecord;
use crate::errors::{RagError, Result};

/// Page embeddings with their source records.
///
/// `vectors[i]` is the embedding of `metadata[i]`. Page numbers are strictly
/// increasing and all vectors share one dimension. Every constructor and
/// mutator checks these, so any `EmbeddingIndex` value is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbeddingIndex {
    vectors: Vec<Vec<f32>>,
    metadata: Vec<PageRecord>,
}

impl EmbeddingIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble an index from stored parts, validating every invariant
    pub fn from_parts(vectors: Vec<Vec<f32>>, metadata: Vec<PageRecord>) -> Result<Self> {
        if vectors.len() != metadata.len() {
            return Err(RagError::InvariantViolation(format!(
                "{} vectors but {} metadata entries",
                vectors.len(),
                metadata.len()
            )));
        }

        if let Some(first) = vectors.first() {
            let dim = first.len();
            if dim == 0 {
                return Err(RagError::InvariantViolation(
                    "vectors must not be empty".to_string(),
                ));
            }
            if let Some(pos) = vectors.iter().position(|v| v.len() != dim) {
                return Err(RagError::InvariantViolation(format!(
                    "vector {} has dimension {}, expected {}",
                    pos,
                    vectors[pos].len(),
                    dim
                )));
            }
            if let Some(pos) = vectors.iter().position(|v| !is_finite(v)) {
                return Err(RagError::InvariantViolation(format!(
                    "vector {} contains a non-finite value",
                    pos
                )));
            }
        }

        for pair in metadata.windows(2) {
            if pair[1].page_number <= pair[0].page_number {
                return Err(RagError::InvariantViolation(format!(
                    "page {} stored after page {}",
                    pair[1].page_number, pair[0].page_number
                )));
            }
        }

        Ok(Self { vectors, metadata })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Embedding dimension, or None while the index is empty
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(|v| v.len())
    }

    /// Page number of the most recently appended page
    pub fn last_page_number(&self) -> Option<u32> {
        self.metadata.last().map(|r| r.page_number)
    }

    pub fn contains_page(&self, page_number: u32) -> bool {
        self.position_of(page_number).is_ok()
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn metadata(&self) -> &[PageRecord] {
        &self.metadata
    }

    /// Iterate `(vector, record)` pairs in index order
    pub fn entries(&self) -> impl Iterator<Item = (&[f32], &PageRecord)> {
        self.vectors
            .iter()
            .map(|v| v.as_slice())
            .zip(self.metadata.iter())
    }

    /// Append a page after every page already indexed
    pub fn push(&mut self, vector: Vec<f32>, record: PageRecord) -> Result<()> {
        self.check_vector(&vector)?;
        if let Some(last) = self.last_page_number() {
            if record.page_number <= last {
                return Err(RagError::InvariantViolation(format!(
                    "cannot append page {} after page {}",
                    record.page_number, last
                )));
            }
        }
        self.vectors.push(vector);
        self.metadata.push(record);
        Ok(())
    }

    /// Insert a page at its ordered position; the page must not already exist
    pub fn insert(&mut self, vector: Vec<f32>, record: PageRecord) -> Result<usize> {
        self.check_vector(&vector)?;
        match self.position_of(record.page_number) {
            Ok(_) => Err(RagError::InvariantViolation(format!(
                "page {} is already indexed",
                record.page_number
            ))),
            Err(pos) => {
                self.vectors.insert(pos, vector);
                self.metadata.insert(pos, record);
                Ok(pos)
            }
        }
    }

    /// Whether a vector can join this index without breaking the dimension invariant
    pub fn accepts_dimension(&self, dim: usize) -> bool {
        dim > 0 && self.dimension().map_or(true, |d| d == dim)
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if !self.accepts_dimension(vector.len()) {
            return Err(RagError::InvariantViolation(format!(
                "vector has dimension {}, index expects {}",
                vector.len(),
                self.dimension().unwrap_or(0)
            )));
        }
        if !is_finite(vector) {
            return Err(RagError::InvariantViolation(
                "vector contains a non-finite value".to_string(),
            ));
        }
        Ok(())
    }

    fn position_of(&self, page_number: u32) -> std::result::Result<usize, usize> {
        self.metadata
            .binary_search_by_key(&page_number, |r| r.page_number)
    }
}

/// NaN and infinities cannot round-trip through the JSON file
pub fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

/// Serialized layout, kept separate so loading can report count mismatches
#[derive(Debug, Deserialize)]
pub(crate) struct RawIndex {
    #[serde(default)]
    pub vectors: Vec<Vec<f32>>,
    #[serde(default)]
    pub metadata: Vec<PageRecord>,
}
