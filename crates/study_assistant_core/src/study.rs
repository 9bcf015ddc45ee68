//! crates/study_assistant_core/src/study.rs
//!
//! User-facing study actions on already generated material: document access,
//! flashcard and quiz management, review and starring, quiz submission and the
//! progress dashboard.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Chunk, Creation, CreationKind, Dashboard, Document, Flashcard, FlashcardSet, QuestionReview,
    Quiz, QuizAnswer, QuizResult, QuizReview, QuizSummary, UserAnswer,
};
use crate::error::{StudyError, StudyResult};
use crate::ports::DatabaseService;

pub struct StudyService {
    db: Arc<dyn DatabaseService>,
}

impl StudyService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    // --- Documents ---

    pub async fn list_documents(&self, user_id: Uuid) -> StudyResult<Vec<Document>> {
        Ok(self.db.list_documents(user_id).await?)
    }

    /// Fetches a document and records the access time.
    pub async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> StudyResult<Document> {
        let mut document = self.db.get_document(user_id, document_id).await?;
        let now = Utc::now();
        self.db.touch_document(document_id, now).await?;
        document.last_accessed_at = now;
        Ok(document)
    }

    /// Deletes a document and everything generated from it. Returns the deleted
    /// row so the caller can clean up the stored file.
    pub async fn delete_document(&self, user_id: Uuid, document_id: Uuid) -> StudyResult<Document> {
        let document = self.db.get_document(user_id, document_id).await?;
        self.db.delete_document(user_id, document_id).await?;
        info!("Deleted document {} for user {}.", document_id, user_id);
        Ok(document)
    }

    pub async fn get_chunks(&self, user_id: Uuid, document_id: Uuid) -> StudyResult<Vec<Chunk>> {
        self.db.get_document(user_id, document_id).await?;
        Ok(self.db.get_chunks(document_id).await?)
    }

    // --- Flashcards ---

    /// Every flashcard set the user owns, newest first.
    pub async fn list_flashcard_sets(&self, user_id: Uuid) -> StudyResult<Vec<FlashcardSet>> {
        Ok(self.db.list_flashcard_sets(user_id, None).await?)
    }

    pub async fn list_document_flashcard_sets(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> StudyResult<Vec<FlashcardSet>> {
        self.db.get_document(user_id, document_id).await?;
        Ok(self
            .db
            .list_flashcard_sets(user_id, Some(document_id))
            .await?)
    }

    pub async fn delete_flashcard_set(&self, user_id: Uuid, set_id: Uuid) -> StudyResult<()> {
        self.db.delete_flashcard_set(user_id, set_id).await?;
        info!("Deleted flashcard set {} for user {}.", set_id, user_id);
        Ok(())
    }

    pub async fn review_flashcard(&self, user_id: Uuid, card_id: Uuid) -> StudyResult<Flashcard> {
        self.db.get_flashcard(user_id, card_id).await?;
        Ok(self.db.record_flashcard_review(card_id, Utc::now()).await?)
    }

    pub async fn toggle_star(&self, user_id: Uuid, card_id: Uuid) -> StudyResult<Flashcard> {
        let card = self.db.get_flashcard(user_id, card_id).await?;
        Ok(self.db.set_flashcard_starred(card_id, !card.is_starred).await?)
    }

    // --- Quizzes ---

    pub async fn get_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> StudyResult<Quiz> {
        Ok(self.db.get_quiz(user_id, quiz_id).await?)
    }

    pub async fn list_document_quizzes(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> StudyResult<Vec<QuizSummary>> {
        self.db.get_document(user_id, document_id).await?;
        Ok(self.db.list_quizzes(user_id, Some(document_id)).await?)
    }

    /// The per-question breakdown of a submitted quiz.
    pub async fn get_quiz_results(&self, user_id: Uuid, quiz_id: Uuid) -> StudyResult<QuizReview> {
        let quiz = self.db.get_quiz(user_id, quiz_id).await?;
        review_quiz(&quiz)
    }

    pub async fn delete_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> StudyResult<()> {
        self.db.delete_quiz(user_id, quiz_id).await?;
        info!("Deleted quiz {} for user {}.", quiz_id, user_id);
        Ok(())
    }

    /// Grades and stores a submission. A quiz can only be submitted once.
    pub async fn submit_quiz(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        answers: &[QuizAnswer],
    ) -> StudyResult<QuizResult> {
        let quiz = self.db.get_quiz(user_id, quiz_id).await?;
        if quiz.completed_at.is_some() {
            return Err(StudyError::AlreadyCompleted(quiz_id));
        }

        let now = Utc::now();
        let result = grade_quiz(&quiz, answers, now)?;
        let recorded = self
            .db
            .complete_quiz(quiz_id, result.score, &result.user_answers, now)
            .await?;
        if !recorded {
            return Err(StudyError::AlreadyCompleted(quiz_id));
        }

        info!(
            "Quiz {} submitted: {}/{} correct ({}%).",
            quiz_id, result.correct_count, result.total_questions, result.score
        );
        Ok(result)
    }

    // --- Articles ---

    pub async fn list_articles(&self, user_id: Uuid) -> StudyResult<Vec<Creation>> {
        Ok(self
            .db
            .list_creations(user_id, CreationKind::Article)
            .await?)
    }

    pub async fn get_article(&self, user_id: Uuid, article_id: Uuid) -> StudyResult<Creation> {
        Ok(self
            .db
            .get_creation(user_id, article_id, CreationKind::Article)
            .await?)
    }

    pub async fn delete_article(&self, user_id: Uuid, article_id: Uuid) -> StudyResult<()> {
        self.db
            .delete_creation(user_id, article_id, CreationKind::Article)
            .await?;
        info!("Deleted article {} for user {}.", article_id, user_id);
        Ok(())
    }

    // --- Progress ---

    pub async fn dashboard(&self, user_id: Uuid) -> StudyResult<Dashboard> {
        let documents = self.db.list_documents(user_id).await?;
        let sets = self.db.list_flashcard_sets(user_id, None).await?;
        let quizzes = self.db.list_quizzes(user_id, None).await?;
        let articles = self
            .db
            .list_creations(user_id, CreationKind::Article)
            .await?;
        Ok(build_dashboard(documents, &sets, quizzes, articles.len()))
    }
}

const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Folds a user's content into dashboard totals and recent activity.
pub fn build_dashboard(
    mut documents: Vec<Document>,
    sets: &[FlashcardSet],
    mut quizzes: Vec<QuizSummary>,
    total_articles: usize,
) -> Dashboard {
    let cards = move || sets.iter().flat_map(|set| set.cards.iter());
    let scores: Vec<u32> = quizzes.iter().filter_map(|q| q.score).collect();
    let average_score = if scores.is_empty() {
        0
    } else {
        (scores.iter().sum::<u32>() as f64 / scores.len() as f64).round() as u32
    };
    let total_documents = documents.len();
    let total_quizzes = quizzes.len();
    let completed_quizzes = quizzes.iter().filter(|q| q.is_submitted()).count();

    documents.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
    documents.truncate(RECENT_ACTIVITY_LIMIT);
    quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    quizzes.truncate(RECENT_ACTIVITY_LIMIT);

    Dashboard {
        total_documents,
        total_flashcard_sets: sets.len(),
        total_flashcards: cards().count(),
        reviewed_flashcards: cards().filter(|c| c.review_count > 0).count(),
        starred_flashcards: cards().filter(|c| c.is_starred).count(),
        total_quizzes,
        completed_quizzes,
        average_score,
        total_articles,
        recent_documents: documents,
        recent_quizzes: quizzes,
    }
}

/// Lines each question of a completed quiz up with the recorded answer.
pub fn review_quiz(quiz: &Quiz) -> StudyResult<QuizReview> {
    let completed_at = quiz.completed_at.ok_or_else(|| {
        StudyError::InvalidInput(format!("quiz {} has not been submitted yet", quiz.id))
    })?;

    let questions = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let answer = quiz
                .user_answers
                .iter()
                .find(|a| a.question_id == question.id);
            QuestionReview {
                question_index: index,
                question: question.question.clone(),
                options: question.options.clone(),
                correct_answer: question.correct_answer.clone(),
                selected_answer: answer.map(|a| a.selected_answer.clone()),
                is_correct: answer.is_some_and(|a| a.is_correct),
                explanation: question.explanation.clone(),
            }
        })
        .collect();

    Ok(QuizReview {
        quiz_id: quiz.id,
        document_id: quiz.document_id,
        title: quiz.title.clone(),
        score: quiz.score.unwrap_or(0),
        total_questions: quiz.questions.len() as u32,
        completed_at,
        questions,
    })
}

/// Grades answers against a quiz's stored options.
///
/// An answer is correct when the option whose text equals the selected answer is
/// flagged correct. Answers pointing past the last question are ignored. The
/// score is the rounded percentage of all questions answered correctly.
pub fn grade_quiz(
    quiz: &Quiz,
    answers: &[QuizAnswer],
    answered_at: DateTime<Utc>,
) -> StudyResult<QuizResult> {
    let total = quiz.questions.len();
    if total == 0 {
        return Err(StudyError::InvalidInput(format!(
            "quiz {} has no questions",
            quiz.id
        )));
    }

    let user_answers: Vec<UserAnswer> = answers
        .iter()
        .filter_map(|answer| {
            let question = quiz.questions.get(answer.question_index)?;
            let is_correct = question
                .options
                .iter()
                .find(|option| option.text == answer.selected_answer)
                .is_some_and(|option| option.is_correct);
            Some(UserAnswer {
                question_id: question.id,
                selected_answer: answer.selected_answer.clone(),
                is_correct,
                answered_at,
            })
        })
        .collect();

    let correct_count = user_answers.iter().filter(|a| a.is_correct).count();
    let score = ((correct_count as f64 / total as f64) * 100.0).round() as u32;

    Ok(QuizResult {
        quiz_id: quiz.id,
        score,
        correct_count: correct_count as u32,
        total_questions: total as u32,
        user_answers,
    })
}
