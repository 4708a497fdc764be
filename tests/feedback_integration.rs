//! Integration tests for retrieval-augmented feedback

mod common;

use async_trait::async_trait;
use common::{page_numbers, with_similarity, ScriptedEmbedder};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tutor_rag::feedback::{ChatPrompt, ChatService, ContextConfig, FeedbackEngine, Submission};
use tutor_rag::index::EmbeddingIndex;
use tutor_rag::retrieval::Retriever;
use tutor_rag::{PageRecord, RagError, ServiceError};

const QUESTION: &str = "Factorise x^2 + 5x + 6";

/// Chat service that records every prompt and replies with a fixed text
#[derive(Default)]
struct RecordingChat {
    requests: Mutex<Vec<(ChatPrompt, String)>>,
    fail: bool,
}

impl RecordingChat {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn last(&self) -> (ChatPrompt, String) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatService for RecordingChat {
    async fn generate(&self, prompt: &ChatPrompt, context: &str) -> Result<String, ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((prompt.clone(), context.to_string()));
        if self.fail {
            return Err(ServiceError::Api {
                status: 500,
                body: "model overloaded".to_string(),
            });
        }
        Ok("Check the sign of the constant term.".to_string())
    }
}

fn textbook_index() -> EmbeddingIndex {
    let pages = vec![
        PageRecord::new(1, "Expanding brackets").with_images(vec![PathBuf::from("img/p1.png")]),
        PageRecord::new(2, "Factorising quadratics").with_images(vec![
            PathBuf::from("img/p2_a.png"),
            PathBuf::from("img/p2_b.png"),
        ]),
        PageRecord::new(3, "Simultaneous equations"),
    ];
    EmbeddingIndex::from_parts(
        vec![with_similarity(0.6), with_similarity(0.95), with_similarity(0.1)],
        pages,
    )
    .unwrap()
}

fn retriever() -> Retriever<ScriptedEmbedder> {
    Retriever::new(ScriptedEmbedder::new().with_vector(QUESTION, vec![1.0, 0.0])).with_top_k(2)
}

#[tokio::test]
async fn test_feedback_grounds_prompt_in_retrieved_pages() {
    let chat = Arc::new(RecordingChat::default());
    let engine = FeedbackEngine::new(retriever(), Arc::clone(&chat), "You are a maths tutor.");
    let submission = Submission::new(QUESTION).with_image(vec![0x89, b'P', b'N', b'G']);

    let feedback = engine.feedback(&textbook_index(), &submission).await.unwrap();

    assert_eq!(feedback.text, "Check the sign of the constant term.");
    assert_eq!(page_numbers(&feedback.pages), vec![2, 1]);
    assert_eq!(feedback.context_pages, vec![2, 1]);

    let (prompt, context) = chat.last();
    assert_eq!(prompt.system, "You are a maths tutor.");
    assert_eq!(prompt.text, QUESTION);
    assert_eq!(prompt.image_png.as_deref(), Some(&[0x89, b'P', b'N', b'G'][..]));
    let factorising = context.find("[Page 2]").unwrap();
    let expanding = context.find("[Page 1]").unwrap();
    assert!(factorising < expanding);
    assert!(!context.contains("Simultaneous"));
}

#[tokio::test]
async fn test_feedback_without_index_still_generates() {
    let chat = Arc::new(RecordingChat::default());
    let engine = FeedbackEngine::new(retriever(), Arc::clone(&chat), "");

    let feedback = engine
        .feedback(&EmbeddingIndex::new(), &Submission::new(QUESTION))
        .await
        .unwrap();

    assert!(feedback.pages.is_empty());
    assert!(feedback.context_pages.is_empty());
    assert_eq!(chat.last().1, "");
}

#[tokio::test]
async fn test_feedback_survives_query_embedding_failure() {
    let chat = Arc::new(RecordingChat::default());
    let retriever = Retriever::new(ScriptedEmbedder::new().failing_on(QUESTION));
    let engine = FeedbackEngine::new(retriever, Arc::clone(&chat), "");

    let feedback = engine
        .feedback(&textbook_index(), &Submission::new(QUESTION))
        .await
        .unwrap();

    assert!(feedback.pages.is_empty());
    assert_eq!(chat.last().1, "");
}

#[tokio::test]
async fn test_chat_failure_is_reported() {
    let engine = FeedbackEngine::new(retriever(), RecordingChat::failing(), "");

    let err = engine
        .feedback(&textbook_index(), &Submission::new(QUESTION))
        .await
        .unwrap_err();

    match err {
        RagError::Service(ServiceError::Api { status, .. }) => assert_eq!(status, 500),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_image_filter_drops_unwanted_images() {
    let keep_first = |path: &Path| !path.to_string_lossy().ends_with("_b.png");
    let engine = FeedbackEngine::new(retriever(), RecordingChat::default(), "")
        .with_image_filter(Arc::new(keep_first));

    let feedback = engine
        .feedback(&textbook_index(), &Submission::new(QUESTION))
        .await
        .unwrap();

    assert_eq!(feedback.pages[0].image_paths, vec![PathBuf::from("img/p2_a.png")]);
    assert_eq!(feedback.pages[1].image_paths, vec![PathBuf::from("img/p1.png")]);
}

#[tokio::test]
async fn test_context_budget_limits_pages_sent_to_chat() {
    let chat = Arc::new(RecordingChat::default());
    let long_page = "x".repeat(400);
    let index = EmbeddingIndex::from_parts(
        vec![with_similarity(0.9), with_similarity(0.8)],
        vec![PageRecord::new(1, long_page.clone()), PageRecord::new(2, long_page)],
    )
    .unwrap();

    let engine = FeedbackEngine::new(retriever(), Arc::clone(&chat), "").with_context_config(ContextConfig {
        max_context_tokens: 150,
        include_scores: false,
    });
    let feedback = engine.feedback(&index, &Submission::new(QUESTION)).await.unwrap();

    assert_eq!(page_numbers(&feedback.pages), vec![1, 2]);
    assert_eq!(feedback.context_pages, vec![1]);
    assert!(chat.last().1.starts_with("[Page 1]"));
}
