//! crates/study_assistant_core/src/generation.rs
//!
//! AI-generated study material: flashcards, quizzes, summaries, concept
//! explanations and articles.
//!
//! Every request goes through the `TextGenerationService` port with retry and
//! exponential backoff. Structured replies are parsed by `crate::parser` and only
//! persisted once the whole reply has been parsed and validated.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Creation, CreationKind, Document, DocumentStatus, FlashcardSet, Quiz};
use crate::error::{StudyError, StudyResult};
use crate::parser;
use crate::ports::{DatabaseService, TextGenerationService};

pub const DEFAULT_FLASHCARD_COUNT: usize = 10;
pub const DEFAULT_QUIZ_QUESTIONS: usize = 5;
pub const DEFAULT_ARTICLE_LENGTH: &str = "medium";

/// Characters of document text sent with flashcard, quiz and explanation prompts.
pub const SHORT_CONTEXT_CHARS: usize = 1_500;
/// Characters of document text sent with summary prompts.
pub const SUMMARY_CONTEXT_CHARS: usize = 20_000;

const FLASHCARD_PROMPT: &str = r#"Create exactly {count} study flashcards from the text below.
Write every flashcard in this form:
Q: [a clear, specific question]
A: [a short, accurate answer]
D: [difficulty: easy, medium, or hard]

Put a line containing only "---" between flashcards.

Text:
{text}"#;

const QUIZ_PROMPT: &str = r#"Create exactly {count} multiple choice questions from the text below.
Write every question in this form:
Q: [the question]
O1: [first option]
O2: [second option]
O3: [third option]
O4: [fourth option]
C: [the correct option, copied exactly as written above]
E: [a brief explanation]
D: [difficulty: easy, medium, or hard]

Put a line containing only "---" between questions.

Text:
{text}"#;

const SUMMARY_PROMPT: &str =
    r#"Summarize the text below. Highlight the key concepts, main ideas and important details.
Keep the summary clear and well structured.

Text:
{text}"#;

const EXPLAIN_PROMPT: &str =
    r#"Explain the concept below clearly and concisely, using the text as reference.

Concept: {concept}

Text:
{text}

Use simple language and add an example where it helps. Keep the explanation short."#;

const ARTICLE_PROMPT: &str = r#"Write a clean, well-structured article on the topic below.
Target length: {length}.
Use headings, subheadings and paragraphs, and keep it engaging and informative.

Topic:
{topic}"#;

//=========================================================================================
// Retry Policy
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls made before giving up, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

//=========================================================================================
// The Generator
//=========================================================================================

pub struct ContentGenerator {
    db: Arc<dyn DatabaseService>,
    model: Arc<dyn TextGenerationService>,
    retry: RetryPolicy,
}

impl ContentGenerator {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        model: Arc<dyn TextGenerationService>,
        retry: RetryPolicy,
    ) -> Self {
        Self { db, model, retry }
    }

    /// Generates up to `count` flashcards and stores them as one new set.
    pub async fn generate_flashcards(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        count: usize,
    ) -> StudyResult<FlashcardSet> {
        require_positive("count", count)?;
        let document = self.ready_document(user_id, document_id).await?;

        let prompt = FLASHCARD_PROMPT
            .replace("{count}", &count.to_string())
            .replace("{text}", &excerpt(&document, SHORT_CONTEXT_CHARS));
        let reply = self.complete(&prompt).await?;

        let cards = parser::parse_flashcards(&reply, count);
        if cards.is_empty() {
            return Err(StudyError::GenerationFailed(
                "the model reply contained no usable flashcards".to_string(),
            ));
        }
        info!(
            "Parsed {} of {} requested flashcards for document {}.",
            cards.len(),
            count,
            document_id
        );

        Ok(self
            .db
            .create_flashcard_set(user_id, document_id, &cards)
            .await?)
    }

    /// Generates up to `num_questions` quiz questions and stores them as a quiz.
    ///
    /// Questions whose correct answer does not match exactly one option are
    /// dropped before truncation.
    pub async fn generate_quiz(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        num_questions: usize,
        title: Option<&str>,
    ) -> StudyResult<Quiz> {
        require_positive("numQuestions", num_questions)?;
        let document = self.ready_document(user_id, document_id).await?;

        let prompt = QUIZ_PROMPT
            .replace("{count}", &num_questions.to_string())
            .replace("{text}", &excerpt(&document, SHORT_CONTEXT_CHARS));
        let reply = self.complete(&prompt).await?;

        let questions: Vec<_> = parser::quiz_candidates(&reply)
            .filter_map(parser::resolve_correct_option)
            .take(num_questions)
            .collect();
        if questions.is_empty() {
            return Err(StudyError::GenerationFailed(
                "the model reply contained no usable quiz questions".to_string(),
            ));
        }

        let title = match title.map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("{} - Quiz", document.title),
        };
        info!(
            "Parsed {} of {} requested quiz questions for document {}.",
            questions.len(),
            num_questions,
            document_id
        );

        Ok(self
            .db
            .create_quiz(user_id, document_id, &title, &questions)
            .await?)
    }

    pub async fn generate_summary(&self, user_id: Uuid, document_id: Uuid) -> StudyResult<String> {
        let document = self.ready_document(user_id, document_id).await?;
        let prompt = SUMMARY_PROMPT.replace("{text}", &excerpt(&document, SUMMARY_CONTEXT_CHARS));
        Ok(self.complete(&prompt).await?.trim().to_string())
    }

    pub async fn explain_concept(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        concept: &str,
    ) -> StudyResult<String> {
        let concept = concept.trim();
        if concept.is_empty() {
            return Err(StudyError::InvalidInput("concept must not be empty".to_string()));
        }
        let document = self.ready_document(user_id, document_id).await?;

        let prompt = EXPLAIN_PROMPT
            .replace("{concept}", concept)
            .replace("{text}", &excerpt(&document, SHORT_CONTEXT_CHARS));
        Ok(self.complete(&prompt).await?.trim().to_string())
    }

    /// Writes an article on `topic` and stores it as a creation.
    pub async fn generate_article(
        &self,
        user_id: Uuid,
        topic: &str,
        length: Option<&str>,
    ) -> StudyResult<Creation> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StudyError::InvalidInput("topic must not be empty".to_string()));
        }
        let length = length
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_ARTICLE_LENGTH);

        let prompt = ARTICLE_PROMPT
            .replace("{length}", length)
            .replace("{topic}", topic);
        let article = self.complete(&prompt).await?;

        Ok(self
            .db
            .save_creation(user_id, CreationKind::Article, topic, article.trim())
            .await?)
    }

    /// Loads a document the user owns and checks that ingestion has finished.
    async fn ready_document(&self, user_id: Uuid, document_id: Uuid) -> StudyResult<Document> {
        let document = self.db.get_document(user_id, document_id).await?;
        if document.status != DocumentStatus::Ready {
            return Err(StudyError::NotReady(document_id));
        }
        Ok(document)
    }

    /// Calls the model with retry. Empty replies count as failed attempts.
    async fn complete(&self, prompt: &str) -> StudyResult<String> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.model.generate(prompt).await {
                Ok(reply) if !reply.trim().is_empty() => return Ok(reply),
                Ok(_) => last_error = "the model returned an empty response".to_string(),
                Err(e) => last_error = e.to_string(),
            }

            if attempt < attempts {
                let delay = self.retry.backoff_for(attempt);
                warn!(
                    "Generation failed (attempt {}/{}): {}. Retrying in {:?}",
                    attempt, attempts, last_error, delay
                );
                sleep(delay).await;
            }
        }

        Err(StudyError::GenerationFailed(last_error))
    }
}

fn excerpt(document: &Document, max_chars: usize) -> String {
    document
        .extracted_text
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(max_chars)
        .collect()
}

fn require_positive(name: &str, value: usize) -> StudyResult<()> {
    if value == 0 {
        return Err(StudyError::InvalidInput(format!("{} must be positive", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            initial_backoff: Duration::MAX,
        };
        assert_eq!(policy.backoff_for(40), Duration::MAX);
    }
}
