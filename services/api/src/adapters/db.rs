//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries are built at runtime (`query_as` + `bind`) so the crate compiles without
//! a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::path::PathBuf;
use study_assistant_core::domain::{
    Chunk, Creation, CreationKind, Difficulty, Document, DocumentStatus, Flashcard, FlashcardSet,
    NewDocument, NewQuizQuestion, Quiz, QuizOption, QuizQuestion, QuizSummary, UserAnswer,
};
use study_assistant_core::parser::ParsedFlashcard;
use study_assistant_core::ports::{DatabaseService, PortError, PortResult};
use study_assistant_core::TextChunk;
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "id, user_id, title, file_name, file_path, file_size, \
     extracted_text, status, uploaded_at, last_accessed_at";
const FLASHCARD_COLUMNS: &str =
    "id, set_id, question, answer, difficulty, review_count, is_starred, last_reviewed_at";
const QUIZ_COLUMNS: &str =
    "id, user_id, document_id, title, score, user_answers, completed_at, created_at";
const CREATION_COLUMNS: &str = "id, user_id, prompt, content, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct PgDbAdapter {
    pool: PgPool,
}

impl PgDbAdapter {
    /// Creates a new `PgDbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Loads the cards of the given sets, grouped by set and in generation order.
    async fn cards_by_set(&self, set_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Flashcard>>> {
        let sql = format!(
            "SELECT {} FROM flashcards WHERE set_id = ANY($1) ORDER BY position ASC",
            FLASHCARD_COLUMNS
        );
        let records = sqlx::query_as::<_, FlashcardRecord>(&sql)
            .bind(set_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut cards: HashMap<Uuid, Vec<Flashcard>> = HashMap::new();
        for record in records {
            let card = record.to_domain()?;
            cards.entry(card.set_id).or_default().push(card);
        }
        Ok(cards)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(
    what: &'static str,
    id: Uuid,
) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse_difficulty(raw: &str) -> PortResult<Difficulty> {
    raw.parse().map_err(PortError::Unexpected)
}

fn ensure_affected(rows_affected: u64, what: &str, id: Uuid) -> PortResult<()> {
    if rows_affected == 0 {
        return Err(PortError::NotFound(format!("{} {} not found", what, id)));
    }
    Ok(())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    file_name: String,
    file_path: String,
    file_size: i64,
    extracted_text: Option<String>,
    status: String,
    uploaded_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        Ok(Document {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            file_name: self.file_name,
            file_path: PathBuf::from(self.file_path),
            file_size: self.file_size,
            extracted_text: self.extracted_text,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            uploaded_at: self.uploaded_at,
            last_accessed_at: self.last_accessed_at,
        })
    }
}

#[derive(FromRow)]
struct ChunkRecord {
    id: Uuid,
    document_id: Uuid,
    content: String,
    page_number: i32,
    chunk_index: i32,
}
impl ChunkRecord {
    fn to_domain(self) -> Chunk {
        Chunk {
            id: self.id,
            document_id: self.document_id,
            content: self.content,
            page_number: self.page_number.max(0) as u32,
            chunk_index: self.chunk_index.max(0) as u32,
        }
    }
}

#[derive(FromRow)]
struct FlashcardSetRecord {
    id: Uuid,
    user_id: Uuid,
    document_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct FlashcardRecord {
    id: Uuid,
    set_id: Uuid,
    question: String,
    answer: String,
    difficulty: String,
    review_count: i32,
    is_starred: bool,
    last_reviewed_at: Option<DateTime<Utc>>,
}
impl FlashcardRecord {
    fn to_domain(self) -> PortResult<Flashcard> {
        Ok(Flashcard {
            id: self.id,
            set_id: self.set_id,
            question: self.question,
            answer: self.answer,
            difficulty: parse_difficulty(&self.difficulty)?,
            review_count: self.review_count.max(0) as u32,
            is_starred: self.is_starred,
            last_reviewed_at: self.last_reviewed_at,
        })
    }
}

/// Stored form of a submitted answer inside `quizzes.user_answers`.
#[derive(Serialize, Deserialize)]
struct UserAnswerRecord {
    question_id: Uuid,
    selected_answer: String,
    is_correct: bool,
    answered_at: DateTime<Utc>,
}
impl UserAnswerRecord {
    fn from_domain(answer: &UserAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_answer: answer.selected_answer.clone(),
            is_correct: answer.is_correct,
            answered_at: answer.answered_at,
        }
    }

    fn to_domain(self) -> UserAnswer {
        UserAnswer {
            question_id: self.question_id,
            selected_answer: self.selected_answer,
            is_correct: self.is_correct,
            answered_at: self.answered_at,
        }
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    user_id: Uuid,
    document_id: Uuid,
    title: String,
    score: Option<i32>,
    user_answers: Json<Vec<UserAnswerRecord>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl QuizRecord {
    fn to_domain(self, questions: Vec<QuizQuestion>) -> Quiz {
        Quiz {
            id: self.id,
            user_id: self.user_id,
            document_id: self.document_id,
            title: self.title,
            questions,
            score: self.score.map(|s| s.max(0) as u32),
            user_answers: self
                .user_answers
                .0
                .into_iter()
                .map(UserAnswerRecord::to_domain)
                .collect(),
            completed_at: self.completed_at,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizSummaryRecord {
    id: Uuid,
    document_id: Uuid,
    title: String,
    question_count: i64,
    score: Option<i32>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl QuizSummaryRecord {
    fn to_domain(self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            document_id: self.document_id,
            title: self.title,
            question_count: self.question_count.max(0) as u32,
            score: self.score.map(|s| s.max(0) as u32),
            completed_at: self.completed_at,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizQuestionRecord {
    id: Uuid,
    question: String,
    explanation: String,
    difficulty: String,
    correct_answer: String,
}

#[derive(FromRow)]
struct QuizOptionRecord {
    id: Uuid,
    question_id: Uuid,
    text: String,
    is_correct: bool,
}

#[derive(FromRow)]
struct CreationRecord {
    id: Uuid,
    user_id: Uuid,
    prompt: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl CreationRecord {
    fn to_domain(self, kind: CreationKind) -> Creation {
        Creation {
            id: self.id,
            user_id: self.user_id,
            prompt: self.prompt,
            content: self.content,
            kind,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for PgDbAdapter {
    // --- Documents ---

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let sql = format!(
            "INSERT INTO documents (id, user_id, title, file_name, file_path, file_size, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(document.user_id)
            .bind(&document.title)
            .bind(&document.file_name)
            .bind(document.file_path.to_string_lossy().into_owned())
            .bind(document.file_size)
            .bind(DocumentStatus::Processing.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Document> {
        let sql = format!(
            "SELECT {} FROM documents WHERE id = $1 AND user_id = $2",
            DOCUMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(document_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Document", document_id))?;
        record.to_domain()
    }

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", DOCUMENT_COLUMNS);
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Document", document_id))?;
        record.to_domain()
    }

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE user_id = $1 ORDER BY uploaded_at DESC",
            DOCUMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        records.into_iter().map(DocumentRecord::to_domain).collect()
    }

    async fn list_documents_by_status(&self, status: DocumentStatus) -> PortResult<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE status = $1 ORDER BY uploaded_at ASC",
            DOCUMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        records.into_iter().map(DocumentRecord::to_domain).collect()
    }

    async fn touch_document(
        &self,
        document_id: Uuid,
        accessed_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE documents SET last_accessed_at = $1 WHERE id = $2")
            .bind(accessed_at)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn update_document_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE documents SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), "Document", document_id)
    }

    async fn complete_ingestion(
        &self,
        document_id: Uuid,
        extracted_text: &str,
        chunks: &[TextChunk],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let ids: Vec<Uuid> = chunks.iter().map(|_| Uuid::new_v4()).collect();
        let document_ids = vec![document_id; chunks.len()];
        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let pages: Vec<i32> = chunks.iter().map(|c| c.page_number as i32).collect();
        let indexes: Vec<i32> = chunks.iter().map(|c| c.chunk_index as i32).collect();

        sqlx::query(
            "INSERT INTO document_chunks (id, document_id, content, page_number, chunk_index) \
             SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::int4[], $5::int4[])",
        )
        .bind(&ids)
        .bind(&document_ids)
        .bind(&contents)
        .bind(&pages)
        .bind(&indexes)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let result =
            sqlx::query("UPDATE documents SET extracted_text = $1, status = $2 WHERE id = $3")
                .bind(extracted_text)
                .bind(DocumentStatus::Ready.as_str())
                .bind(document_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), "Document", document_id)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
            .bind(document_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), "Document", document_id)
    }

    async fn get_chunks(&self, document_id: Uuid) -> PortResult<Vec<Chunk>> {
        let records = sqlx::query_as::<_, ChunkRecord>(
            "SELECT id, document_id, content, page_number, chunk_index FROM document_chunks \
             WHERE document_id = $1 ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(ChunkRecord::to_domain).collect())
    }

    // --- Flashcards ---

    async fn create_flashcard_set(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        cards: &[ParsedFlashcard],
    ) -> PortResult<FlashcardSet> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let set = sqlx::query_as::<_, FlashcardSetRecord>(
            "INSERT INTO flashcard_sets (id, user_id, document_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, document_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let mut stored = Vec::with_capacity(cards.len());
        for (position, card) in cards.iter().enumerate() {
            let sql = format!(
                "INSERT INTO flashcards (id, set_id, position, question, answer, difficulty) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
                FLASHCARD_COLUMNS
            );
            let record = sqlx::query_as::<_, FlashcardRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(set.id)
                .bind(position as i32)
                .bind(&card.question)
                .bind(&card.answer)
                .bind(card.difficulty.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
            stored.push(record.to_domain()?);
        }

        tx.commit().await.map_err(unexpected)?;

        Ok(FlashcardSet {
            id: set.id,
            user_id: set.user_id,
            document_id: set.document_id,
            cards: stored,
            created_at: set.created_at,
        })
    }

    async fn list_flashcard_sets(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> PortResult<Vec<FlashcardSet>> {
        let sets = sqlx::query_as::<_, FlashcardSetRecord>(
            "SELECT id, user_id, document_id, created_at FROM flashcard_sets \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR document_id = $2) \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let set_ids: Vec<Uuid> = sets.iter().map(|s| s.id).collect();
        let mut cards = self.cards_by_set(&set_ids).await?;

        Ok(sets
            .into_iter()
            .map(|set| FlashcardSet {
                cards: cards.remove(&set.id).unwrap_or_default(),
                id: set.id,
                user_id: set.user_id,
                document_id: set.document_id,
                created_at: set.created_at,
            })
            .collect())
    }

    async fn delete_flashcard_set(&self, user_id: Uuid, set_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM flashcard_sets WHERE id = $1 AND user_id = $2")
            .bind(set_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), "Flashcard set", set_id)
    }

    async fn get_flashcard(&self, user_id: Uuid, card_id: Uuid) -> PortResult<Flashcard> {
        let sql = format!(
            "SELECT {} FROM flashcards f WHERE f.id = $1 AND EXISTS \
             (SELECT 1 FROM flashcard_sets s WHERE s.id = f.set_id AND s.user_id = $2)",
            FLASHCARD_COLUMNS
        );
        let record = sqlx::query_as::<_, FlashcardRecord>(&sql)
            .bind(card_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Flashcard", card_id))?;
        record.to_domain()
    }

    async fn record_flashcard_review(
        &self,
        card_id: Uuid,
        reviewed_at: DateTime<Utc>,
    ) -> PortResult<Flashcard> {
        let sql = format!(
            "UPDATE flashcards SET review_count = review_count + 1, last_reviewed_at = $2 \
             WHERE id = $1 RETURNING {}",
            FLASHCARD_COLUMNS
        );
        let record = sqlx::query_as::<_, FlashcardRecord>(&sql)
            .bind(card_id)
            .bind(reviewed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Flashcard", card_id))?;
        record.to_domain()
    }

    async fn set_flashcard_starred(&self, card_id: Uuid, starred: bool) -> PortResult<Flashcard> {
        let sql = format!(
            "UPDATE flashcards SET is_starred = $2 WHERE id = $1 RETURNING {}",
            FLASHCARD_COLUMNS
        );
        let record = sqlx::query_as::<_, FlashcardRecord>(&sql)
            .bind(card_id)
            .bind(starred)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Flashcard", card_id))?;
        record.to_domain()
    }

    // --- Quizzes ---

    async fn create_quiz(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        title: &str,
        questions: &[NewQuizQuestion],
    ) -> PortResult<Quiz> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let sql = format!(
            "INSERT INTO quizzes (id, user_id, document_id, title) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            QUIZ_COLUMNS
        );
        let quiz = sqlx::query_as::<_, QuizRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(document_id)
            .bind(title)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;

        let mut stored = Vec::with_capacity(questions.len());
        for (position, question) in questions.iter().enumerate() {
            let question_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO quiz_questions \
                 (id, quiz_id, position, question, explanation, difficulty, correct_answer) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(question_id)
            .bind(quiz.id)
            .bind(position as i32)
            .bind(&question.question)
            .bind(&question.explanation)
            .bind(question.difficulty.as_str())
            .bind(&question.correct_answer)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

            let mut options = Vec::with_capacity(question.options.len());
            for (option_position, (text, is_correct)) in question.options.iter().enumerate() {
                let option_id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO quiz_options (id, question_id, position, text, is_correct) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(option_id)
                .bind(question_id)
                .bind(option_position as i32)
                .bind(text)
                .bind(*is_correct)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;

                options.push(QuizOption {
                    id: option_id,
                    text: text.clone(),
                    is_correct: *is_correct,
                });
            }

            stored.push(QuizQuestion {
                id: question_id,
                question: question.question.clone(),
                explanation: question.explanation.clone(),
                difficulty: question.difficulty,
                correct_answer: question.correct_answer.clone(),
                options,
            });
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(quiz.to_domain(stored))
    }

    async fn get_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> PortResult<Quiz> {
        let sql = format!(
            "SELECT {} FROM quizzes WHERE id = $1 AND user_id = $2",
            QUIZ_COLUMNS
        );
        let quiz = sqlx::query_as::<_, QuizRecord>(&sql)
            .bind(quiz_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Quiz", quiz_id))?;

        let question_records = sqlx::query_as::<_, QuizQuestionRecord>(
            "SELECT id, question, explanation, difficulty, correct_answer FROM quiz_questions \
             WHERE quiz_id = $1 ORDER BY position ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let question_ids: Vec<Uuid> = question_records.iter().map(|q| q.id).collect();
        let option_records = sqlx::query_as::<_, QuizOptionRecord>(
            "SELECT id, question_id, text, is_correct FROM quiz_options \
             WHERE question_id = ANY($1) ORDER BY position ASC",
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut options_by_question: HashMap<Uuid, Vec<QuizOption>> = HashMap::new();
        for option in option_records {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(QuizOption {
                    id: option.id,
                    text: option.text,
                    is_correct: option.is_correct,
                });
        }

        let questions = question_records
            .into_iter()
            .map(|q| {
                Ok(QuizQuestion {
                    options: options_by_question.remove(&q.id).unwrap_or_default(),
                    id: q.id,
                    difficulty: parse_difficulty(&q.difficulty)?,
                    question: q.question,
                    explanation: q.explanation,
                    correct_answer: q.correct_answer,
                })
            })
            .collect::<PortResult<Vec<_>>>()?;

        Ok(quiz.to_domain(questions))
    }

    async fn list_quizzes(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> PortResult<Vec<QuizSummary>> {
        let records = sqlx::query_as::<_, QuizSummaryRecord>(
            "SELECT q.id, q.document_id, q.title, q.score, q.completed_at, q.created_at, \
             COUNT(qq.id) AS question_count \
             FROM quizzes q LEFT JOIN quiz_questions qq ON qq.quiz_id = q.id \
             WHERE q.user_id = $1 AND ($2::uuid IS NULL OR q.document_id = $2) \
             GROUP BY q.id ORDER BY q.created_at DESC",
        )
        .bind(user_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(QuizSummaryRecord::to_domain).collect())
    }

    async fn complete_quiz(
        &self,
        quiz_id: Uuid,
        score: u32,
        answers: &[UserAnswer],
        completed_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let answers: Vec<UserAnswerRecord> =
            answers.iter().map(UserAnswerRecord::from_domain).collect();

        // Zero rows means a concurrent submission completed the quiz first.
        let result = sqlx::query(
            "UPDATE quizzes SET score = $1, user_answers = $2, completed_at = $3 \
             WHERE id = $4 AND completed_at IS NULL",
        )
        .bind(score as i32)
        .bind(Json(answers))
        .bind(completed_at)
        .bind(quiz_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1 AND user_id = $2")
            .bind(quiz_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), "Quiz", quiz_id)
    }

    // --- Creations ---

    async fn save_creation(
        &self,
        user_id: Uuid,
        kind: CreationKind,
        prompt: &str,
        content: &str,
    ) -> PortResult<Creation> {
        let sql = format!(
            "INSERT INTO creations (id, user_id, prompt, content, kind) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            CREATION_COLUMNS
        );
        let record = sqlx::query_as::<_, CreationRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(prompt)
            .bind(content)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain(kind))
    }

    async fn list_creations(
        &self,
        user_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<Vec<Creation>> {
        let sql = format!(
            "SELECT {} FROM creations WHERE user_id = $1 AND kind = $2 \
             ORDER BY created_at DESC",
            CREATION_COLUMNS
        );
        let records = sqlx::query_as::<_, CreationRecord>(&sql)
            .bind(user_id)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(kind)).collect())
    }

    async fn get_creation(
        &self,
        user_id: Uuid,
        creation_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<Creation> {
        let sql = format!(
            "SELECT {} FROM creations WHERE id = $1 AND user_id = $2 AND kind = $3",
            CREATION_COLUMNS
        );
        let record = sqlx::query_as::<_, CreationRecord>(&sql)
            .bind(creation_id)
            .bind(user_id)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Creation", creation_id))?;
        Ok(record.to_domain(kind))
    }

    async fn delete_creation(
        &self,
        user_id: Uuid,
        creation_id: Uuid,
        kind: CreationKind,
    ) -> PortResult<()> {
        let result =
            sqlx::query("DELETE FROM creations WHERE id = $1 AND user_id = $2 AND kind = $3")
                .bind(creation_id)
                .bind(user_id)
                .bind(kind.as_str())
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        ensure_affected(result.rows_affected(), "Creation", creation_id)
    }
}
