//! In-memory fakes of the core ports, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use study_assistant_core::{
    Chunk, Creation, CreationKind, DatabaseService, Document, DocumentStatus, ExtractedText,
    Flashcard, FlashcardSet, NewDocument, NewQuizQuestion, PortError, PortResult, Quiz,
    QuizOption, QuizQuestion, QuizSummary, TextChunk, TextExtractionService,
    TextGenerationService, UserAnswer,
};
use study_assistant_core::parser::ParsedFlashcard;

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    documents: HashMap<Uuid, Document>,
    chunks: HashMap<Uuid, Vec<Chunk>>,
    flashcard_sets: Vec<FlashcardSet>,
    quizzes: HashMap<Uuid, Quiz>,
    creations: Vec<Creation>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    pub ingestion_writes: AtomicUsize,
    /// Makes `get_quiz` report every quiz as still open, like a read that
    /// raced a concurrent submission.
    pub stale_quiz_reads: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert_document(
        &self,
        user_id: Uuid,
        status: DocumentStatus,
        text: Option<&str>,
    ) -> Document {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            user_id,
            title: "Cell Biology".to_string(),
            file_name: "cells.pdf".to_string(),
            file_path: PathBuf::from("/tmp/cells.pdf"),
            file_size: 1024,
            extracted_text: text.map(str::to_string),
            status,
            uploaded_at: now,
            last_accessed_at: now,
        };
        self.tables
            .lock()
            .await
            .documents
            .insert(document.id, document.clone());
        document
    }

    pub async fn document(&self, document_id: Uuid) -> Option<Document> {
        self.tables.lock().await.documents.get(&document_id).cloned()
    }

    pub async fn chunks(&self, document_id: Uuid) -> Vec<Chunk> {
        self.tables
            .lock()
            .await
            .chunks
            .get(&document_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn flashcard_set_count(&self) -> usize {
        self.tables.lock().await.flashcard_sets.len()
    }

    pub async fn quiz_count(&self) -> usize {
        self.tables.lock().await.quizzes.len()
    }

    pub async fn creations(&self) -> Vec<Creation> {
        self.tables.lock().await.creations.clone()
    }

    fn find_card(tables: &mut Tables, card_id: Uuid) -> Option<(&mut Flashcard, Uuid)> {
        tables.flashcard_sets.iter_mut().find_map(|set| {
            let owner = set.user_id;
            set.cards
                .iter_mut()
                .find(|card| card.id == card_id)
                .map(|card| (card, owner))
        })
    }
}

fn not_found(what: &str, id: Uuid) -> PortError {
    PortError::NotFound(format!("{} {} not found", what, id))
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_document(&self, new: NewDocument) -> PortResult<Document> {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            file_name: new.file_name,
            file_path: new.file_path,
            file_size: new.file_size,
            extracted_text: None,
            status: DocumentStatus::Processing,
            uploaded_at: now,
            last_accessed_at: now,
        };
        self.tables
            .lock()
            .await
            .documents
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Document> {
        self.tables
            .lock()
            .await
            .documents
            .get(&document_id)
            .filter(|d| d.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Document", document_id))
    }

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document> {
        self.document(document_id)
            .await
            .ok_or_else(|| not_found("Document", document_id))
    }

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        Ok(self
            .tables
            .lock()
            .await
            .documents
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_documents_by_status(&self, status: DocumentStatus) -> PortResult<Vec<Document>> {
        Ok(self
            .tables
            .lock()
            .await
            .documents
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn touch_document(
        &self,
        document_id: Uuid,
        accessed_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let document = tables
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| not_found("Document", document_id))?;
        document.last_accessed_at = accessed_at;
        Ok(())
    }

    async fn update_document_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let document = tables
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| not_found("Document", document_id))?;
        document.status = status;
        Ok(())
    }

    async fn complete_ingestion(
        &self,
        document_id: Uuid,
        extracted_text: &str,
        chunks: &[TextChunk],
    ) -> PortResult<()> {
        self.ingestion_writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().await;
        let document = tables
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| not_found("Document", document_id))?;
        document.extracted_text = Some(extracted_text.to_string());
        document.status = DocumentStatus::Ready;

        let rows = chunks
            .iter()
            .map(|c| Chunk {
                id: Uuid::new_v4(),
                document_id,
                content: c.content.clone(),
                page_number: c.page_number,
                chunk_index: c.chunk_index,
            })
            .collect();
        tables.chunks.insert(document_id, rows);
        Ok(())
    }

    async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.documents.get(&document_id) {
            Some(d) if d.user_id == user_id => {}
            _ => return Err(not_found("Document", document_id)),
        }
        tables.documents.remove(&document_id);
        tables.chunks.remove(&document_id);
        tables.flashcard_sets.retain(|s| s.document_id != document_id);
        tables.quizzes.retain(|_, q| q.document_id != document_id);
        Ok(())
    }

    async fn get_chunks(&self, document_id: Uuid) -> PortResult<Vec<Chunk>> {
        let mut chunks = self.chunks(document_id).await;
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn create_flashcard_set(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        cards: &[ParsedFlashcard],
    ) -> PortResult<FlashcardSet> {
        let set_id = Uuid::new_v4();
        let set = FlashcardSet {
            id: set_id,
            user_id,
            document_id,
            cards: cards
                .iter()
                .map(|card| Flashcard {
                    id: Uuid::new_v4(),
                    set_id,
                    question: card.question.clone(),
                    answer: card.answer.clone(),
                    difficulty: card.difficulty,
                    review_count: 0,
                    is_starred: false,
                    last_reviewed_at: None,
                })
                .collect(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.flashcard_sets.push(set.clone());
        Ok(set)
    }

    async fn list_flashcard_sets(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> PortResult<Vec<FlashcardSet>> {
        Ok(self
            .tables
            .lock()
            .await
            .flashcard_sets
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .filter(|s| document_id.map_or(true, |id| s.document_id == id))
            .cloned()
            .collect())
    }

    async fn delete_flashcard_set(&self, user_id: Uuid, set_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.flashcard_sets.len();
        tables
            .flashcard_sets
            .retain(|s| !(s.id == set_id && s.user_id == user_id));
        if tables.flashcard_sets.len() == before {
            return Err(not_found("Flashcard set", set_id));
        }
        Ok(())
    }

    async fn get_flashcard(&self, user_id: Uuid, card_id: Uuid) -> PortResult<Flashcard> {
        let mut tables = self.tables.lock().await;
        match Self::find_card(&mut tables, card_id) {
            Some((card, owner)) if owner == user_id => Ok(card.clone()),
            _ => Err(not_found("Flashcard", card_id)),
        }
    }

    async fn record_flashcard_review(
        &self,
        card_id: Uuid,
        reviewed_at: DateTime<Utc>,
    ) -> PortResult<Flashcard> {
        let mut tables = self.tables.lock().await;
        let (card, _) = Self::find_card(&mut tables, card_id)
            .ok_or_else(|| not_found("Flashcard", card_id))?;
        card.review_count += 1;
        card.last_reviewed_at = Some(reviewed_at);
        Ok(card.clone())
    }

    async fn set_flashcard_starred(&self, card_id: Uuid, starred: bool) -> PortResult<Flashcard> {
        let mut tables = self.tables.lock().await;
        let (card, _) = Self::find_card(&mut tables, card_id)
            .ok_or_else(|| not_found("Flashcard", card_id))?;
        card.is_starred = starred;
        Ok(card.clone())
    }

    async fn create_quiz(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        title: &str,
        questions: &[NewQuizQuestion],
    ) -> PortResult<Quiz> {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            user_id,
            document_id,
            title: title.to_string(),
            questions: questions
                .iter()
                .map(|q| QuizQuestion {
                    id: Uuid::new_v4(),
                    question: q.question.clone(),
                    explanation: q.explanation.clone(),
                    difficulty: q.difficulty,
                    correct_answer: q.correct_answer.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|(text, is_correct)| QuizOption {
                            id: Uuid::new_v4(),
                            text: text.clone(),
                            is_correct: *is_correct,
                        })
                        .collect(),
                })
                .collect(),
            score: None,
            user_answers: Vec::new(),
            completed_at: None,
            created_at: Utc::now(),
        };
        self.tables.lock().await.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> PortResult<Quiz> {
        let mut quiz = self
            .tables
            .lock()
            .await
            .quizzes
            .get(&quiz_id)
            .filter(|q| q.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Quiz", quiz_id))?;
        if self.stale_quiz_reads.load(Ordering::SeqCst) {
            quiz.score = None;
            quiz.user_answers.clear();
            quiz.completed_at = None;
        }
        Ok(quiz)
    }

    async fn list_quizzes(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> PortResult<Vec<QuizSummary>> {
        let tables = self.tables.lock().await;
        let mut summaries: Vec<QuizSummary> = tables
            .quizzes
            .values()
            .filter(|q| q.user_id == user_id)
            .filter(|q| document_id.map_or(true, |id| q.document_id == id))
            .map(|q| QuizSummary {
                id: q.id,
                document_id: q.document_id,
                title: q.title.clone(),
                question_count: q.questions.len() as u32,
                score: q.score,
                completed_at: q.completed_at,
                created_at: q.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn complete_quiz(
        &self,
        quiz_id: Uuid,
        score: u32,
        answers: &[UserAnswer],
        completed_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut tables = self.tables.lock().await;
        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| not_found("Quiz", quiz_id))?;
        if quiz.completed_at.is_some() {
            return Ok(false);
        }
        quiz.score = Some(score);
        quiz.user_answers = answers.to_vec();
        quiz.completed_at = Some(completed_at);
        Ok(true)
    }

    async fn delete_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.quizzes.get(&quiz_id) {
            Some(q) if q.user_id == user_id => {}
            _ => return Err(not_found("Quiz", quiz_id)),
        }
        tables.quizzes.remove(&quiz_id);
        Ok(())
    }

    async fn save_creation(
        &self,
        user_id: Uuid,
        kind: CreationKind,
        prompt: &str,
        content: &str,
    ) -> PortResult<Creation> {
        let creation = Creation {
            id: Uuid::new_v4(),
            user_id,
            prompt: prompt.to_string(),
            content: content.to_string(),
            kind,
            created_at: Utc::now(),
        };
        self.tables.lock().await.creations.push(creation.clone());
        Ok(creation)
    }

    async fn list_creations(
        &self,
        user_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<Vec<Creation>> {
        Ok(self
            .tables
            .lock()
            .await
            .creations
            .iter()
            .rev()
            .filter(|c| c.kind == kind && c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_creation(
        &self,
        user_id: Uuid,
        creation_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<Creation> {
        self.tables
            .lock()
            .await
            .creations
            .iter()
            .find(|c| c.kind == kind && c.id == creation_id && c.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Creation", creation_id))
    }

    async fn delete_creation(
        &self,
        user_id: Uuid,
        creation_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.creations.len();
        tables
            .creations
            .retain(|c| !(c.kind == kind && c.id == creation_id && c.user_id == user_id));
        if tables.creations.len() == before {
            return Err(not_found("Creation", creation_id));
        }
        Ok(())
    }
}

//=========================================================================================
// Extraction
//=========================================================================================

/// Returns a fixed text, or fails, optionally waiting for a release signal first.
pub struct FakeExtractor {
    result: Result<ExtractedText, String>,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn returning(text: &str, page_count: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(ExtractedText {
                text: text.to_string(),
                page_count,
            }),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Blocks each extraction until the gate is notified.
    pub fn gated(text: &str, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(ExtractedText {
                text: text.to_string(),
                page_count: Some(1),
            }),
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextExtractionService for FakeExtractor {
    async fn extract_text(&self, _file_path: &Path) -> PortResult<ExtractedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.result.clone().map_err(PortError::Unexpected)
    }
}

//=========================================================================================
// Generation
//=========================================================================================

/// Replays scripted replies in order; once exhausted, repeats the last one.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<PortResult<String>>>,
    last: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<PortResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl TextGenerationService for ScriptedModel {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().await.push(prompt.to_string());
        match self.replies.lock().await.pop_front() {
            Some(Ok(reply)) => {
                *self.last.lock().await = Some(reply.clone());
                Ok(reply)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .await
                .clone()
                .ok_or_else(|| PortError::Unexpected("no scripted reply".to_string())),
        }
    }
}

/// Polls until the document leaves `processing`, or gives up after ~2s.
pub async fn wait_for_status(db: &InMemoryDatabase, document_id: Uuid) -> DocumentStatus {
    for _ in 0..200 {
        if let Some(document) = db.document(document_id).await {
            if document.status != DocumentStatus::Processing {
                return document.status;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    DocumentStatus::Processing
}
