//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_assistant_core::{ContentGenerator, DatabaseService, IngestionQueue, StudyService};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub study: Arc<StudyService>,
    pub generator: Arc<ContentGenerator>,
    pub ingestion: Arc<IngestionQueue>,
}
