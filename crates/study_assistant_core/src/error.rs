//! crates/study_assistant_core/src/error.rs
//!
//! The error taxonomy for core operations (ingestion, generation, study actions).

use crate::ports::PortError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    /// Invalid chunker parameters. The call site must be fixed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The source file could not be turned into text.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The upstream model failed or produced nothing usable.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document {0} is not ready")]
    NotReady(Uuid),

    #[error("Quiz {0} has already been completed")]
    AlreadyCompleted(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service Port Error: {0}")]
    Port(PortError),
}

impl From<PortError> for StudyError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => StudyError::NotFound(what),
            other => StudyError::Port(other),
        }
    }
}

/// A convenience type alias for `Result<T, StudyError>`.
pub type StudyResult<T> = Result<T, StudyError>;
