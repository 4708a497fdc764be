// Persisted index: one JSON document replaced atomically on every save
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::corpus::PageRecord;
use crate::errors::{RagError, Result};
use crate::index::store::{EmbeddingIndex, RawIndex};

#[derive(Serialize)]
struct IndexFileRef<'a> {
    vectors: &'a [Vec<f32>],
    metadata: &'a [PageRecord],
}

/// File-backed home of an [`EmbeddingIndex`].
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// concurrent reader sees either the previous or the new index, never a mix.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the persisted index; a missing file is an empty index
    pub fn load(&self) -> Result<EmbeddingIndex> {
        if !self.exists() {
            debug!(path = %self.path.display(), "no persisted index, starting empty");
            return Ok(EmbeddingIndex::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let raw: RawIndex = serde_json::from_str(&contents)
            .map_err(|e| RagError::corrupt(&self.path, format!("unreadable index: {}", e)))?;

        let index = EmbeddingIndex::from_parts(raw.vectors, raw.metadata).map_err(|e| match e {
            RagError::InvariantViolation(reason) => RagError::corrupt(&self.path, reason),
            other => other,
        })?;

        debug!(
            path = %self.path.display(),
            pages = index.len(),
            "loaded persisted index"
        );
        Ok(index)
    }

    /// Persist the full index, replacing the previous copy
    pub fn save(&self, index: &EmbeddingIndex) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let body = IndexFileRef {
            vectors: index.vectors(),
            metadata: index.metadata(),
        };
        let json = serde_json::to_vec(&body)?;

        let tmp_path = self.temp_path();
        let written = write_synced(&tmp_path, &json).and_then(|()| fs::rename(&tmp_path, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Remove the persisted index if present
    pub fn remove(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "index".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
