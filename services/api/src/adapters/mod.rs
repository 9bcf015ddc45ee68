pub mod db;
pub mod generation_llm;
pub mod pdf;

pub use db::PgDbAdapter;
pub use generation_llm::OpenAiGenerationAdapter;
pub use pdf::PdfTextExtractor;
