// Incremental, resumable embedding index builder
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::corpus::{Corpus, PageRecord};
use crate::embedding::EmbeddingService;
use crate::errors::Result;
use crate::index::persistence::IndexStore;
use crate::index::store::{is_finite, EmbeddingIndex};

/// Which corpus pages a build considers already done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Skip every page up to the last indexed page number. A page that failed
    /// before a later page succeeded is never revisited.
    #[default]
    LastPage,
    /// Embed every corpus page missing from the index, inserting it in order
    MissingPages,
}

/// Builder tuning
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Pause between consecutive embedding calls
    pub delay: Duration,
    pub resume: ResumePolicy,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            resume: ResumePolicy::LastPage,
        }
    }
}

/// Progress notifications emitted while building
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// Pages left to embed after applying the resume policy
    Started { pending: usize, resume_after: Option<u32> },
    Embedded { page_number: u32 },
    Failed { page_number: u32, reason: String },
    Finished { embedded: usize, failed: usize },
}

/// A page the embedding service could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub page_number: u32,
    pub reason: String,
}

/// Summary of one build run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Pages appended this run, in processing order
    pub embedded: Vec<u32>,
    pub failed: Vec<PageFailure>,
    /// Corpus pages the resume policy treated as done
    pub skipped: usize,
    pub elapsed_ms: u64,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Index produced by a build plus its report
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub index: EmbeddingIndex,
    pub report: BuildReport,
}

type ProgressCallback = Box<dyn FnMut(&BuildEvent) + Send>;

/// Embeds corpus pages one at a time and persists after every append.
///
/// Embedding failures never abort a build: the page is reported and left out
/// of the index. Only persistence failures are returned as errors.
pub struct IndexBuilder<E> {
    embedder: E,
    store: Option<IndexStore>,
    options: BuilderOptions,
    progress: Option<ProgressCallback>,
}

impl<E: EmbeddingService> IndexBuilder<E> {
    /// Builder that persists to `store` after each page
    pub fn new(embedder: E, store: IndexStore) -> Self {
        Self {
            embedder,
            store: Some(store),
            options: BuilderOptions::default(),
            progress: None,
        }
    }

    /// Builder that keeps the index in memory only
    pub fn in_memory(embedder: E) -> Self {
        Self {
            embedder,
            store: None,
            options: BuilderOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a callback receiving every [`BuildEvent`]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&BuildEvent) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Load the persisted index (empty if absent) and extend it from `corpus`
    pub async fn resume(&mut self, corpus: &Corpus) -> Result<BuildOutcome> {
        let existing = match &self.store {
            Some(store) => store.load()?,
            None => EmbeddingIndex::new(),
        };
        self.build(corpus, existing).await
    }

    /// Extend `existing` with the corpus pages the resume policy marks as pending
    pub async fn build(&mut self, corpus: &Corpus, existing: EmbeddingIndex) -> Result<BuildOutcome> {
        let started = Instant::now();
        let mut index = existing;
        let resume_after = index.last_page_number();

        let pending: Vec<&PageRecord> = corpus
            .pages()
            .iter()
            .filter(|page| match self.options.resume {
                ResumePolicy::LastPage => resume_after.map_or(true, |last| page.page_number > last),
                ResumePolicy::MissingPages => !index.contains_page(page.page_number),
            })
            .collect();

        let mut report = BuildReport {
            skipped: corpus.len() - pending.len(),
            ..BuildReport::default()
        };

        info!(
            pending = pending.len(),
            skipped = report.skipped,
            resume_after = ?resume_after,
            "starting index build"
        );
        self.emit(BuildEvent::Started {
            pending: pending.len(),
            resume_after,
        });

        for (i, page) in pending.into_iter().enumerate() {
            if i > 0 && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }

            let input = page.embedding_input();
            let embedded = self.embedder.embed(&input).await;
            let vector = match embedded {
                Ok(v) if !is_finite(&v) => {
                    let reason = "embedding contains a non-finite value".to_string();
                    self.record_failure(&mut report, page.page_number, reason);
                    continue;
                }
                Ok(v) if index.accepts_dimension(v.len()) => v,
                Ok(v) => {
                    let reason = format!(
                        "embedding has dimension {}, index expects {}",
                        v.len(),
                        index.dimension().unwrap_or(0)
                    );
                    self.record_failure(&mut report, page.page_number, reason);
                    continue;
                }
                Err(e) => {
                    self.record_failure(&mut report, page.page_number, e.to_string());
                    continue;
                }
            };

            match self.options.resume {
                ResumePolicy::LastPage => index.push(vector, page.clone())?,
                ResumePolicy::MissingPages => {
                    index.insert(vector, page.clone())?;
                }
            }

            if let Some(store) = &self.store {
                store.save(&index)?;
            }

            debug!(page = page.page_number, total = index.len(), "embedded page");
            report.embedded.push(page.page_number);
            self.emit(BuildEvent::Embedded {
                page_number: page.page_number,
            });
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            embedded = report.embedded.len(),
            failed = report.failed.len(),
            total = index.len(),
            elapsed_ms = report.elapsed_ms,
            "index build finished"
        );
        self.emit(BuildEvent::Finished {
            embedded: report.embedded.len(),
            failed: report.failed.len(),
        });

        Ok(BuildOutcome { index, report })
    }

    fn record_failure(&mut self, report: &mut BuildReport, page_number: u32, reason: String) {
        warn!(page = page_number, error = %reason, "failed to embed page, skipping");
        self.emit(BuildEvent::Failed {
            page_number,
            reason: reason.clone(),
        });
        report.failed.push(PageFailure {
            page_number,
            reason,
        });
    }

    fn emit(&mut self, event: BuildEvent) {
        if let Some(callback) = self.progress.as_mut() {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Embeds by page length; fails for inputs containing "FAIL"
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingService for LengthEmbedder {
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
            if text.contains("FAIL") {
                return Err(ServiceError::Unavailable("forced".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn options(resume: ResumePolicy) -> BuilderOptions {
        BuilderOptions {
            delay: Duration::ZERO,
            resume,
        }
    }

    fn corpus(texts: &[&str]) -> Corpus {
        Corpus::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| PageRecord::new(i as u32 + 1, *t))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_from_empty() {
        let mut builder = IndexBuilder::in_memory(LengthEmbedder).with_options(options(ResumePolicy::LastPage));
        let outcome = builder
            .build(&corpus(&["a", "bb", "ccc"]), EmbeddingIndex::new())
            .await
            .unwrap();
        assert_eq!(outcome.index.len(), 3);
        assert_eq!(outcome.report.embedded, vec![1, 2, 3]);
        assert_eq!(outcome.report.skipped, 0);
        assert!(outcome.report.is_complete());
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let mut builder = IndexBuilder::in_memory(LengthEmbedder).with_options(options(ResumePolicy::LastPage));
        let outcome = builder
            .build(&corpus(&["a", "FAIL", "c"]), EmbeddingIndex::new())
            .await
            .unwrap();
        let pages: Vec<u32> = outcome.index.metadata().iter().map(|r| r.page_number).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(outcome.report.failed.len(), 1);
        assert_eq!(outcome.report.failed[0].page_number, 2);
    }

    #[tokio::test]
    async fn test_dimension_change_counts_as_failure() {
        let mut existing = EmbeddingIndex::new();
        existing.push(vec![1.0, 2.0, 3.0], PageRecord::new(1, "x")).unwrap();

        let mut builder = IndexBuilder::in_memory(LengthEmbedder).with_options(options(ResumePolicy::LastPage));
        let outcome = builder.build(&corpus(&["x", "y"]), existing).await.unwrap();
        assert_eq!(outcome.index.len(), 1);
        assert_eq!(outcome.report.failed[0].page_number, 2);
        assert!(outcome.report.failed[0].reason.contains("dimension"));
    }

    #[tokio::test]
    async fn test_progress_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut builder = IndexBuilder::in_memory(LengthEmbedder)
            .with_options(options(ResumePolicy::LastPage))
            .on_progress(move |e| sink.lock().unwrap().push(e.clone()));

        builder
            .build(&corpus(&["a", "FAIL"]), EmbeddingIndex::new())
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            BuildEvent::Started {
                pending: 2,
                resume_after: None
            }
        );
        assert_eq!(events[1], BuildEvent::Embedded { page_number: 1 });
        assert!(matches!(events[2], BuildEvent::Failed { page_number: 2, .. }));
        assert_eq!(events[3], BuildEvent::Finished { embedded: 1, failed: 1 });
    }

    #[test]
    fn test_resume_policy_serde() {
        let json = serde_json::to_string(&ResumePolicy::MissingPages).unwrap();
        assert_eq!(json, "\"missing_pages\"");
        assert_eq!(ResumePolicy::default(), ResumePolicy::LastPage);
    }
}
