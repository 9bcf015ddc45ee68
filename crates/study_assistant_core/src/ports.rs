//! crates/study_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

use crate::chunker::TextChunk;
use crate::domain::{
    Chunk, Creation, CreationKind, Document, DocumentStatus, ExtractedText, Flashcard,
    FlashcardSet, NewDocument, NewQuizQuestion, Quiz, QuizSummary, UserAnswer,
};
use crate::parser::ParsedFlashcard;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for every entity the core touches.
///
/// Methods taking a `user_id` are owner-scoped: a row owned by someone else is
/// reported as `PortError::NotFound`.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Document Management ---
    async fn create_document(&self, document: NewDocument) -> PortResult<Document>;

    async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Document>;

    /// Unscoped lookup used by the ingestion worker.
    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document>;

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>>;

    /// Unscoped listing used to resume ingestion after a restart.
    async fn list_documents_by_status(&self, status: DocumentStatus) -> PortResult<Vec<Document>>;

    async fn touch_document(&self, document_id: Uuid, accessed_at: DateTime<Utc>)
        -> PortResult<()>;

    async fn update_document_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> PortResult<()>;

    /// Atomically replaces the document's chunks, stores the extracted text and
    /// marks the document `ready`.
    async fn complete_ingestion(
        &self,
        document_id: Uuid,
        extracted_text: &str,
        chunks: &[TextChunk],
    ) -> PortResult<()>;

    /// Deletes the document together with its chunks, flashcards and quizzes.
    async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()>;

    /// Chunks ordered by `chunk_index`.
    async fn get_chunks(&self, document_id: Uuid) -> PortResult<Vec<Chunk>>;

    // --- Flashcard Management ---
    async fn create_flashcard_set(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        cards: &[ParsedFlashcard],
    ) -> PortResult<FlashcardSet>;

    /// Newest first, optionally restricted to one document.
    async fn list_flashcard_sets(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> PortResult<Vec<FlashcardSet>>;

    async fn delete_flashcard_set(&self, user_id: Uuid, set_id: Uuid) -> PortResult<()>;

    async fn get_flashcard(&self, user_id: Uuid, card_id: Uuid) -> PortResult<Flashcard>;

    async fn record_flashcard_review(
        &self,
        card_id: Uuid,
        reviewed_at: DateTime<Utc>,
    ) -> PortResult<Flashcard>;

    async fn set_flashcard_starred(&self, card_id: Uuid, starred: bool) -> PortResult<Flashcard>;

    // --- Quiz Management ---
    async fn create_quiz(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        title: &str,
        questions: &[NewQuizQuestion],
    ) -> PortResult<Quiz>;

    async fn get_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> PortResult<Quiz>;

    /// Newest first, optionally restricted to one document.
    async fn list_quizzes(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> PortResult<Vec<QuizSummary>>;

    /// Records a submission unless the quiz is already completed. Returns
    /// `false` when another submission got there first.
    async fn complete_quiz(
        &self,
        quiz_id: Uuid,
        score: u32,
        answers: &[UserAnswer],
        completed_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn delete_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> PortResult<()>;

    // --- Creations ---
    async fn save_creation(
        &self,
        user_id: Uuid,
        kind: CreationKind,
        prompt: &str,
        content: &str,
    ) -> PortResult<Creation>;

    /// Newest first.
    async fn list_creations(&self, user_id: Uuid, kind: CreationKind)
        -> PortResult<Vec<Creation>>;

    async fn get_creation(
        &self,
        user_id: Uuid,
        creation_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<Creation>;

    async fn delete_creation(
        &self,
        user_id: Uuid,
        creation_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<()>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Extracts the full text (and page count, if known) from a stored file.
    async fn extract_text(&self, file_path: &Path) -> PortResult<ExtractedText>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends a prompt to a generative text model and returns its raw reply.
    async fn generate(&self, prompt: &str) -> PortResult<String>;
}
