//! crates/study_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Documents and Chunks
//=========================================================================================

/// Lifecycle of an uploaded document as it moves through ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(format!("unknown document status '{}'", other)),
        }
    }
}

/// Represents a PDF document uploaded by a user.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub file_size: i64,
    /// Populated once ingestion succeeds.
    pub extracted_text: Option<String>,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// The fields needed to register a freshly uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: Uuid,
    pub title: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub file_size: i64,
}

/// A stored slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub page_number: u32,
    pub chunk_index: u32,
}

/// Output of the text extraction port.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    /// `None` when the extractor could not determine the page count.
    pub page_count: Option<u32>,
}

//=========================================================================================
// Generated Learning Content
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    /// Strict parse of an already-normalized value. Model output goes through
    /// `parser::resolve_difficulty` instead, which never fails.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// A single flashcard belonging to a flashcard set.
#[derive(Debug, Clone)]
pub struct Flashcard {
    pub id: Uuid,
    pub set_id: Uuid,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub review_count: u32,
    pub is_starred: bool,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

/// The cards produced by one flashcard generation request.
#[derive(Debug, Clone)]
pub struct FlashcardSet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub cards: Vec<Flashcard>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub question: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub correct_answer: String,
    pub options: Vec<QuizOption>,
}

/// A quiz question that passed correct-option validation and is ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuizQuestion {
    pub question: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub correct_answer: String,
    /// Option texts paired with their correctness flag; exactly one flag is set.
    pub options: Vec<(String, bool)>,
}

/// One recorded answer from a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAnswer {
    pub question_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
    /// Percentage in 0..=100, set on submission.
    pub score: Option<u32>,
    pub user_answers: Vec<UserAnswer>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An answer as submitted by the user, addressed by question position.
#[derive(Debug, Clone)]
pub struct QuizAnswer {
    pub question_index: usize,
    pub selected_answer: String,
}

/// The outcome of grading a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub quiz_id: Uuid,
    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,
    pub user_answers: Vec<UserAnswer>,
}

/// A quiz as it appears in listings: no questions, just their count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSummary {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub question_count: u32,
    pub score: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuizSummary {
    pub fn is_submitted(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One question of a completed quiz next to the answer the user gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_index: usize,
    pub question: String,
    pub options: Vec<QuizOption>,
    pub correct_answer: String,
    /// `None` when the question was left unanswered.
    pub selected_answer: Option<String>,
    pub is_correct: bool,
    pub explanation: String,
}

/// The graded breakdown of a completed quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizReview {
    pub quiz_id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub score: u32,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
    pub questions: Vec<QuestionReview>,
}

//=========================================================================================
// Free-form Creations
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationKind {
    Article,
}

impl CreationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationKind::Article => "article",
        }
    }
}

/// Generated content that is not tied to a document (e.g. an article on a topic).
#[derive(Debug, Clone)]
pub struct Creation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub content: String,
    pub kind: CreationKind,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Progress
//=========================================================================================

/// Aggregate learning statistics for one user.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub total_documents: usize,
    pub total_flashcard_sets: usize,
    pub total_flashcards: usize,
    /// Cards reviewed at least once.
    pub reviewed_flashcards: usize,
    pub starred_flashcards: usize,
    pub total_quizzes: usize,
    pub completed_quizzes: usize,
    /// Rounded mean score of completed quizzes, 0 when there are none.
    pub average_score: u32,
    pub total_articles: usize,
    /// Most recently accessed documents first.
    pub recent_documents: Vec<Document>,
    /// Most recently created quizzes first.
    pub recent_quizzes: Vec<QuizSummary>,
}
