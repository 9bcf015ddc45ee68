pub mod chunker;
pub mod domain;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod parser;
pub mod ports;
pub mod study;

pub use chunker::{TextChunk, TextChunker};
pub use domain::{
    Chunk, Creation, CreationKind, Dashboard, Difficulty, Document, DocumentStatus, ExtractedText,
    Flashcard, FlashcardSet, NewDocument, NewQuizQuestion, QuestionReview, Quiz, QuizAnswer,
    QuizOption, QuizQuestion, QuizResult, QuizReview, QuizSummary, UserAnswer,
};
pub use error::{StudyError, StudyResult};
pub use generation::{ContentGenerator, RetryPolicy};
pub use ingestion::{IngestionPipeline, IngestionQueue, QueueConfig, SubmitOutcome};
pub use ports::{
    DatabaseService, PortError, PortResult, TextExtractionService, TextGenerationService,
};
pub use study::StudyService;
