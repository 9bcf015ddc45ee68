//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{OpenAiGenerationAdapter, PdfTextExtractor, PgDbAdapter},
    config::Config,
    error::ApiError,
    web::{require_user, rest, ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_assistant_core::{
    ContentGenerator, DatabaseService, IngestionPipeline, IngestionQueue, QueueConfig,
    RetryPolicy, StudyService, TextChunker,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(PgDbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    let db: Arc<dyn DatabaseService> = db_adapter;

    // --- 3. Initialize Service Adapters ---
    let api_key = config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
    let llm_client = OpenAiGenerationAdapter::client_for(api_key, &config.gemini_api_base);
    let generation_adapter = Arc::new(OpenAiGenerationAdapter::new(
        llm_client,
        config.generation_model.clone(),
    ));
    let extractor = Arc::new(PdfTextExtractor::new());
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // --- 4. Start the Ingestion Queue ---
    let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
    let pipeline = Arc::new(IngestionPipeline::new(db.clone(), extractor, chunker));
    let shutdown = CancellationToken::new();
    let (ingestion, ingestion_worker) = IngestionQueue::start(
        pipeline,
        QueueConfig {
            capacity: config.ingest_queue_capacity,
            concurrency: config.ingest_concurrency,
        },
        shutdown.clone(),
    );
    info!(
        "Ingestion queue started ({} workers, chunks of {} words with {} overlap).",
        config.ingest_concurrency, config.chunk_size, config.chunk_overlap
    );
    let resumed = ingestion.resume_stranded().await?;
    if resumed > 0 {
        info!("Resumed {} document(s) left in processing by a previous run.", resumed);
    }

    // --- 5. Build the Shared AppState ---
    let retry = RetryPolicy {
        max_attempts: config.generation_max_attempts,
        initial_backoff: config.generation_backoff,
    };
    let app_state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        study: Arc::new(StudyService::new(db.clone())),
        generator: Arc::new(ContentGenerator::new(db, generation_adapter, retry)),
        ingestion,
    });

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static("x-user-id")]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route(
            "/documents",
            post(rest::upload_document_handler).get(rest::list_documents_handler),
        )
        .route(
            "/documents/{id}",
            get(rest::get_document_handler).delete(rest::delete_document_handler),
        )
        .route("/documents/{id}/chunks", get(rest::get_chunks_handler))
        .route("/ai/flashcards", post(rest::generate_flashcards_handler))
        .route("/ai/quiz", post(rest::generate_quiz_handler))
        .route("/ai/summary", post(rest::generate_summary_handler))
        .route("/ai/explain", post(rest::explain_concept_handler))
        .route("/ai/article", post(rest::generate_article_handler))
        .route("/flashcards/{cardId}/review", post(rest::review_flashcard_handler))
        .route("/flashcards/{cardId}/star", put(rest::toggle_star_handler))
        .route(
            "/documents/{id}/flashcard-sets",
            get(rest::list_document_flashcard_sets_handler),
        )
        .route("/documents/{id}/quizzes", get(rest::list_document_quizzes_handler))
        .route("/flashcard-sets", get(rest::list_flashcard_sets_handler))
        .route("/flashcard-sets/{id}", delete(rest::delete_flashcard_set_handler))
        .route(
            "/quizzes/{id}",
            get(rest::get_quiz_handler).delete(rest::delete_quiz_handler),
        )
        .route("/quizzes/{id}/submit", post(rest::submit_quiz_handler))
        .route("/quizzes/{id}/results", get(rest::get_quiz_results_handler))
        .route("/articles", get(rest::list_articles_handler))
        .route(
            "/articles/{id}",
            get(rest::get_article_handler).delete(rest::delete_article_handler),
        )
        .route("/progress/dashboard", get(rest::dashboard_handler))
        .layer(axum_middleware::from_fn(require_user))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // --- 8. Drain the Ingestion Queue ---
    // Queued jobs are marked failed; jobs already running are awaited.
    shutdown.cancel();
    if let Err(e) = ingestion_worker.await {
        warn!("Ingestion worker ended abnormally: {}", e);
    }
    info!("Server stopped.");

    Ok(())
}

/// Resolves on Ctrl+C and tells background work to stop taking new jobs.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for the shutdown signal: {}", e);
        return std::future::pending().await;
    }
    info!("Shutdown signal received.");
    shutdown.cancel();
}
