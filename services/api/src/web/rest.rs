//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::middleware::AuthenticatedUser;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use study_assistant_core::generation::{DEFAULT_FLASHCARD_COUNT, DEFAULT_QUIZ_QUESTIONS};
use study_assistant_core::{
    Chunk, Creation, Dashboard, Document, DocumentStatus, Flashcard, FlashcardSet, NewDocument,
    QuestionReview, Quiz, QuizAnswer, QuizOption, QuizResult, QuizReview, QuizSummary, StudyError,
    SubmitOutcome, UserAnswer,
};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

type ApiResult<T> = Result<T, (StatusCode, String)>;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_document_handler,
        list_documents_handler,
        get_document_handler,
        delete_document_handler,
        get_chunks_handler,
        generate_flashcards_handler,
        generate_quiz_handler,
        generate_summary_handler,
        explain_concept_handler,
        generate_article_handler,
        review_flashcard_handler,
        toggle_star_handler,
        get_quiz_handler,
        submit_quiz_handler,
        list_flashcard_sets_handler,
        list_document_flashcard_sets_handler,
        delete_flashcard_set_handler,
        list_document_quizzes_handler,
        get_quiz_results_handler,
        delete_quiz_handler,
        list_articles_handler,
        get_article_handler,
        delete_article_handler,
        dashboard_handler,
    ),
    components(schemas(
        DocumentResponse,
        ChunkResponse,
        FlashcardResponse,
        FlashcardSetResponse,
        QuizResponse,
        QuizQuestionResponse,
        UserAnswerResponse,
        QuizResultResponse,
        TextResponse,
        CreationResponse,
        GenerateFlashcardsRequest,
        GenerateQuizRequest,
        DocumentRequest,
        ExplainRequest,
        ArticleRequest,
        SubmitQuizRequest,
        QuizAnswerRequest,
        QuizSummaryResponse,
        QuizOptionResponse,
        QuestionReviewResponse,
        QuizReviewResponse,
        DashboardResponse,
        DashboardOverview,
        RecentActivity,
    )),
    tags(
        (
            name = "Study Assistant API",
            description = "Upload course PDFs and generate flashcards, quizzes and summaries."
        )
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a core error onto an HTTP status and a client-facing message.
pub fn study_error_response(err: StudyError) -> (StatusCode, String) {
    let status = match &err {
        StudyError::InvalidInput(_) | StudyError::Configuration(_) => StatusCode::BAD_REQUEST,
        StudyError::NotFound(_) => StatusCode::NOT_FOUND,
        StudyError::NotReady(_) | StudyError::AlreadyCompleted(_) => StatusCode::CONFLICT,
        StudyError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
        StudyError::Extraction(_) | StudyError::Port(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        return (status, "An internal error occurred".to_string());
    }
    (status, err.to_string())
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    id: Uuid,
    title: String,
    file_name: String,
    file_size: i64,
    /// One of `processing`, `ready` or `failed`.
    status: String,
    uploaded_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    /// Only included when fetching a single document.
    #[serde(skip_serializing_if = "Option::is_none")]
    extracted_text: Option<String>,
}

impl DocumentResponse {
    fn summary(document: Document) -> Self {
        Self {
            extracted_text: None,
            ..Self::full(document)
        }
    }

    fn full(document: Document) -> Self {
        Self {
            id: document.id,
            title: document.title,
            file_name: document.file_name,
            file_size: document.file_size,
            status: document.status.to_string(),
            uploaded_at: document.uploaded_at,
            last_accessed_at: document.last_accessed_at,
            extracted_text: document.extracted_text,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    id: Uuid,
    content: String,
    page_number: u32,
    chunk_index: u32,
}

impl From<Chunk> for ChunkResponse {
    fn from(chunk: Chunk) -> Self {
        Self {
            id: chunk.id,
            content: chunk.content,
            page_number: chunk.page_number,
            chunk_index: chunk.chunk_index,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardResponse {
    id: Uuid,
    question: String,
    answer: String,
    difficulty: String,
    review_count: u32,
    is_starred: bool,
    last_reviewed_at: Option<DateTime<Utc>>,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(card: Flashcard) -> Self {
        Self {
            id: card.id,
            question: card.question,
            answer: card.answer,
            difficulty: card.difficulty.to_string(),
            review_count: card.review_count,
            is_starred: card.is_starred,
            last_reviewed_at: card.last_reviewed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardSetResponse {
    id: Uuid,
    document_id: Uuid,
    cards: Vec<FlashcardResponse>,
    created_at: DateTime<Utc>,
}

impl From<FlashcardSet> for FlashcardSetResponse {
    fn from(set: FlashcardSet) -> Self {
        Self {
            id: set.id,
            document_id: set.document_id,
            cards: set.cards.into_iter().map(Into::into).collect(),
            created_at: set.created_at,
        }
    }
}

/// A quiz question. The answer key is withheld until the quiz is completed.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionResponse {
    id: Uuid,
    question: String,
    options: Vec<String>,
    difficulty: String,
    correct_answer: Option<String>,
    explanation: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswerResponse {
    question_id: Uuid,
    selected_answer: String,
    is_correct: bool,
    answered_at: DateTime<Utc>,
}

impl From<UserAnswer> for UserAnswerResponse {
    fn from(answer: UserAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_answer: answer.selected_answer,
            is_correct: answer.is_correct,
            answered_at: answer.answered_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    id: Uuid,
    document_id: Uuid,
    title: String,
    questions: Vec<QuizQuestionResponse>,
    score: Option<u32>,
    user_answers: Vec<UserAnswerResponse>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<Quiz> for QuizResponse {
    fn from(quiz: Quiz) -> Self {
        let reveal = quiz.completed_at.is_some();
        Self {
            id: quiz.id,
            document_id: quiz.document_id,
            title: quiz.title,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuizQuestionResponse {
                    id: q.id,
                    question: q.question,
                    options: q.options.into_iter().map(|o| o.text).collect(),
                    difficulty: q.difficulty.to_string(),
                    correct_answer: reveal.then_some(q.correct_answer),
                    explanation: reveal.then_some(q.explanation),
                })
                .collect(),
            score: quiz.score,
            user_answers: quiz.user_answers.into_iter().map(Into::into).collect(),
            completed_at: quiz.completed_at,
            created_at: quiz.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultResponse {
    quiz_id: Uuid,
    score: u32,
    correct_count: u32,
    total_questions: u32,
    user_answers: Vec<UserAnswerResponse>,
}

impl From<QuizResult> for QuizResultResponse {
    fn from(result: QuizResult) -> Self {
        Self {
            quiz_id: result.quiz_id,
            score: result.score,
            correct_count: result.correct_count,
            total_questions: result.total_questions,
            user_answers: result.user_answers.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TextResponse {
    content: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreationResponse {
    id: Uuid,
    kind: String,
    prompt: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<Creation> for CreationResponse {
    fn from(creation: Creation) -> Self {
        Self {
            id: creation.id,
            kind: creation.kind.as_str().to_string(),
            prompt: creation.prompt,
            content: creation.content,
            created_at: creation.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFlashcardsRequest {
    document_id: Uuid,
    /// Defaults to 10.
    count: Option<usize>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    document_id: Uuid,
    /// Defaults to 5.
    num_questions: Option<usize>,
    title: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequest {
    document_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    document_id: Uuid,
    concept: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ArticleRequest {
    topic: String,
    /// Free-form target length, e.g. "short" or "800 words". Defaults to "medium".
    length: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerRequest {
    question_index: usize,
    selected_answer: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    answers: Vec<QuizAnswerRequest>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummaryResponse {
    id: Uuid,
    document_id: Uuid,
    title: String,
    questions_count: u32,
    score: Option<u32>,
    submitted: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<QuizSummary> for QuizSummaryResponse {
    fn from(quiz: QuizSummary) -> Self {
        Self {
            submitted: quiz.is_submitted(),
            id: quiz.id,
            document_id: quiz.document_id,
            title: quiz.title,
            questions_count: quiz.question_count,
            score: quiz.score,
            completed_at: quiz.completed_at,
            created_at: quiz.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizOptionResponse {
    text: String,
    is_correct: bool,
}

impl From<QuizOption> for QuizOptionResponse {
    fn from(option: QuizOption) -> Self {
        Self {
            text: option.text,
            is_correct: option.is_correct,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReviewResponse {
    question_index: usize,
    question: String,
    options: Vec<QuizOptionResponse>,
    correct_answer: String,
    selected_answer: Option<String>,
    is_correct: bool,
    explanation: String,
}

impl From<QuestionReview> for QuestionReviewResponse {
    fn from(review: QuestionReview) -> Self {
        Self {
            question_index: review.question_index,
            question: review.question,
            options: review.options.into_iter().map(Into::into).collect(),
            correct_answer: review.correct_answer,
            selected_answer: review.selected_answer,
            is_correct: review.is_correct,
            explanation: review.explanation,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizReviewResponse {
    quiz_id: Uuid,
    document_id: Uuid,
    title: String,
    score: u32,
    total_questions: u32,
    completed_at: DateTime<Utc>,
    results: Vec<QuestionReviewResponse>,
}

impl From<QuizReview> for QuizReviewResponse {
    fn from(review: QuizReview) -> Self {
        Self {
            quiz_id: review.quiz_id,
            document_id: review.document_id,
            title: review.title,
            score: review.score,
            total_questions: review.total_questions,
            completed_at: review.completed_at,
            results: review.questions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    total_documents: usize,
    total_flashcard_sets: usize,
    total_flashcards: usize,
    reviewed_flashcards: usize,
    starred_flashcards: usize,
    total_quizzes: usize,
    completed_quizzes: usize,
    average_score: u32,
    total_articles: usize,
}

#[derive(Serialize, ToSchema)]
pub struct RecentActivity {
    documents: Vec<DocumentResponse>,
    quizzes: Vec<QuizSummaryResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    overview: DashboardOverview,
    recent_activity: RecentActivity,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            overview: DashboardOverview {
                total_documents: dashboard.total_documents,
                total_flashcard_sets: dashboard.total_flashcard_sets,
                total_flashcards: dashboard.total_flashcards,
                reviewed_flashcards: dashboard.reviewed_flashcards,
                starred_flashcards: dashboard.starred_flashcards,
                total_quizzes: dashboard.total_quizzes,
                completed_quizzes: dashboard.completed_quizzes,
                average_score: dashboard.average_score,
                total_articles: dashboard.total_articles,
            },
            recent_activity: RecentActivity {
                documents: dashboard
                    .recent_documents
                    .into_iter()
                    .map(DocumentResponse::summary)
                    .collect(),
                quizzes: dashboard
                    .recent_quizzes
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            },
        }
    }
}

//=========================================================================================
// Document Handlers
//=========================================================================================

/// Upload a PDF and start processing it in the background.
///
/// Accepts a multipart/form-data request with a `file` part (PDF) and an optional
/// `title` part. The document is returned in the `processing` state; poll
/// `GET /documents/{id}` until it becomes `ready` or `failed`.
#[utoipa::path(
    post,
    path = "/documents",
    request_body(
        content_type = "multipart/form-data",
        description = "A `file` part (PDF) and an optional `title` part."
    ),
    responses(
        (
            status = 201,
            description = "Document stored and queued for processing",
            body = DocumentResponse
        ),
        (status = 400, description = "Bad request (e.g., missing or non-PDF file)"),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 503, description = "The ingestion queue is full"),
        (status = 500, description = "Internal server error")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn upload_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut title: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let part = field.name().unwrap_or_default().to_string();
        match part.as_str() {
            "title" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read title: {}", e)))?;
                title = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            "file" => {
                let name = field.file_name().unwrap_or("document.pdf").to_string();
                let is_pdf = field.content_type() == Some("application/pdf")
                    || name.to_lowercase().ends_with(".pdf");
                if !is_pdf {
                    return Err(bad_request("Only PDF files are supported"));
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file bytes: {}", e)))?;
                file = Some((name, data.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or_else(|| bad_request("Multipart form must include a file"))?;
    if data.is_empty() {
        return Err(bad_request("Uploaded file is empty"));
    }
    let title = title.unwrap_or_else(|| default_title(&file_name));

    let file_path = store_upload(&app_state.config.upload_dir, &file_name, &data)
        .await
        .map_err(|e| {
            error!("Failed to store upload {}: {}", file_name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store the uploaded file".to_string())
        })?;

    let new_document = NewDocument {
        user_id,
        title,
        file_name,
        file_path: file_path.clone(),
        file_size: data.len() as i64,
    };
    let document = match app_state.db.create_document(new_document).await {
        Ok(document) => document,
        Err(e) => {
            remove_upload(&file_path).await;
            return Err(study_error_response(e.into()));
        }
    };

    match app_state.ingestion.submit(document.id, file_path.clone()) {
        Ok(SubmitOutcome::Accepted) | Ok(SubmitOutcome::AlreadyInFlight) => {}
        Ok(SubmitOutcome::QueueFull) => {
            if let Err(e) = app_state.db.delete_document(user_id, document.id).await {
                error!("Could not discard rejected document {}: {}", document.id, e);
            }
            remove_upload(&file_path).await;
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "Too many documents are being processed; try again shortly".to_string(),
            ));
        }
        Err(e) => {
            if let Err(mark_err) = app_state
                .db
                .update_document_status(document.id, DocumentStatus::Failed)
                .await
            {
                error!("Could not mark document {} as failed: {}", document.id, mark_err);
            }
            return Err(study_error_response(e));
        }
    }

    info!("User {} uploaded document {} ({} bytes).", user_id, document.id, data.len());
    Ok((StatusCode::CREATED, Json(DocumentResponse::summary(document))))
}

/// List the caller's documents, newest first.
#[utoipa::path(
    get,
    path = "/documents",
    responses((status = 200, description = "The caller's documents", body = [DocumentResponse])),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<DocumentResponse>>> {
    let documents = app_state
        .study
        .list_documents(user_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(documents.into_iter().map(DocumentResponse::summary).collect()))
}

/// Fetch a document (including its extracted text) and record the access.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    responses(
        (status = 200, description = "The document", body = DocumentResponse),
        (status = 404, description = "No such document for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Document id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<DocumentResponse>> {
    let document = app_state
        .study
        .get_document(user_id, document_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(DocumentResponse::full(document)))
}

/// Delete a document, everything generated from it, and the stored file.
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "No such document for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Document id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let document = app_state
        .study
        .delete_document(user_id, document_id)
        .await
        .map_err(study_error_response)?;
    remove_upload(&document.file_path).await;
    Ok(StatusCode::NO_CONTENT)
}

/// List a document's chunks in order.
#[utoipa::path(
    get,
    path = "/documents/{id}/chunks",
    responses(
        (status = 200, description = "The document's chunks", body = [ChunkResponse]),
        (status = 404, description = "No such document for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Document id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_chunks_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ChunkResponse>>> {
    let chunks = app_state
        .study
        .get_chunks(user_id, document_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(chunks.into_iter().map(Into::into).collect()))
}

//=========================================================================================
// Generation Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/ai/flashcards",
    request_body = GenerateFlashcardsRequest,
    responses(
        (status = 201, description = "A new flashcard set", body = FlashcardSetResponse),
        (status = 409, description = "The document is not ready"),
        (status = 502, description = "The model produced no usable flashcards")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn generate_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(request): Json<GenerateFlashcardsRequest>,
) -> ApiResult<impl IntoResponse> {
    let set = app_state
        .generator
        .generate_flashcards(
            user_id,
            request.document_id,
            request.count.unwrap_or(DEFAULT_FLASHCARD_COUNT),
        )
        .await
        .map_err(study_error_response)?;
    Ok((StatusCode::CREATED, Json(FlashcardSetResponse::from(set))))
}

#[utoipa::path(
    post,
    path = "/ai/quiz",
    request_body = GenerateQuizRequest,
    responses(
        (status = 201, description = "A new quiz", body = QuizResponse),
        (status = 409, description = "The document is not ready"),
        (status = 502, description = "The model produced no usable questions")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn generate_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(request): Json<GenerateQuizRequest>,
) -> ApiResult<impl IntoResponse> {
    let quiz = app_state
        .generator
        .generate_quiz(
            user_id,
            request.document_id,
            request.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS),
            request.title.as_deref(),
        )
        .await
        .map_err(study_error_response)?;
    Ok((StatusCode::CREATED, Json(QuizResponse::from(quiz))))
}

#[utoipa::path(
    post,
    path = "/ai/summary",
    request_body = DocumentRequest,
    responses(
        (status = 200, description = "A summary of the document", body = TextResponse),
        (status = 409, description = "The document is not ready")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn generate_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(request): Json<DocumentRequest>,
) -> ApiResult<Json<TextResponse>> {
    let content = app_state
        .generator
        .generate_summary(user_id, request.document_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(TextResponse { content }))
}

#[utoipa::path(
    post,
    path = "/ai/explain",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "An explanation of the concept", body = TextResponse),
        (status = 400, description = "Empty concept"),
        (status = 409, description = "The document is not ready")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn explain_concept_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(request): Json<ExplainRequest>,
) -> ApiResult<Json<TextResponse>> {
    let content = app_state
        .generator
        .explain_concept(user_id, request.document_id, &request.concept)
        .await
        .map_err(study_error_response)?;
    Ok(Json(TextResponse { content }))
}

#[utoipa::path(
    post,
    path = "/ai/article",
    request_body = ArticleRequest,
    responses(
        (status = 201, description = "The saved article", body = CreationResponse),
        (status = 400, description = "Empty topic")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn generate_article_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(request): Json<ArticleRequest>,
) -> ApiResult<impl IntoResponse> {
    let creation = app_state
        .generator
        .generate_article(user_id, &request.topic, request.length.as_deref())
        .await
        .map_err(study_error_response)?;
    Ok((StatusCode::CREATED, Json(CreationResponse::from(creation))))
}

//=========================================================================================
// Flashcard and Quiz Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/flashcards/{cardId}/review",
    responses(
        (status = 200, description = "The reviewed card", body = FlashcardResponse),
        (status = 404, description = "No such card for this user")
    ),
    params(
        ("cardId" = Uuid, Path, description = "Flashcard id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn review_flashcard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<Json<FlashcardResponse>> {
    let card = app_state
        .study
        .review_flashcard(user_id, card_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(card.into()))
}

#[utoipa::path(
    put,
    path = "/flashcards/{cardId}/star",
    responses(
        (status = 200, description = "The card with its star toggled", body = FlashcardResponse),
        (status = 404, description = "No such card for this user")
    ),
    params(
        ("cardId" = Uuid, Path, description = "Flashcard id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn toggle_star_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<Json<FlashcardResponse>> {
    let card = app_state
        .study
        .toggle_star(user_id, card_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(card.into()))
}

#[utoipa::path(
    get,
    path = "/quizzes/{id}",
    responses(
        (status = 200, description = "The quiz", body = QuizResponse),
        (status = 404, description = "No such quiz for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Quiz id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<Json<QuizResponse>> {
    let quiz = app_state
        .study
        .get_quiz(user_id, quiz_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(quiz.into()))
}

#[utoipa::path(
    post,
    path = "/quizzes/{id}/submit",
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "The graded submission", body = QuizResultResponse),
        (status = 404, description = "No such quiz for this user"),
        (status = 409, description = "The quiz was already submitted")
    ),
    params(
        ("id" = Uuid, Path, description = "Quiz id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn submit_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
    Json(request): Json<SubmitQuizRequest>,
) -> ApiResult<Json<QuizResultResponse>> {
    let answers: Vec<QuizAnswer> = request
        .answers
        .into_iter()
        .map(|a| QuizAnswer {
            question_index: a.question_index,
            selected_answer: a.selected_answer,
        })
        .collect();

    let result = app_state
        .study
        .submit_quiz(user_id, quiz_id, &answers)
        .await
        .map_err(study_error_response)?;
    Ok(Json(result.into()))
}

//=========================================================================================
// Listing, Results and Deletion Handlers
//=========================================================================================

/// Every flashcard set the caller owns, newest first.
#[utoipa::path(
    get,
    path = "/flashcard-sets",
    responses(
        (status = 200, description = "The caller's flashcard sets", body = [FlashcardSetResponse])
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_flashcard_sets_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<FlashcardSetResponse>>> {
    let sets = app_state
        .study
        .list_flashcard_sets(user_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(sets.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/documents/{id}/flashcard-sets",
    responses(
        (status = 200, description = "Sets for the document", body = [FlashcardSetResponse]),
        (status = 404, description = "No such document for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Document id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_document_flashcard_sets_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Vec<FlashcardSetResponse>>> {
    let sets = app_state
        .study
        .list_document_flashcard_sets(user_id, document_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(sets.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/flashcard-sets/{id}",
    responses(
        (status = 204, description = "Flashcard set deleted"),
        (status = 404, description = "No such flashcard set for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Flashcard set id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_flashcard_set_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(set_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    app_state
        .study
        .delete_flashcard_set(user_id, set_id)
        .await
        .map_err(study_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/documents/{id}/quizzes",
    responses(
        (status = 200, description = "Quizzes for the document", body = [QuizSummaryResponse]),
        (status = 404, description = "No such document for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Document id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_document_quizzes_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Vec<QuizSummaryResponse>>> {
    let quizzes = app_state
        .study
        .list_document_quizzes(user_id, document_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(quizzes.into_iter().map(Into::into).collect()))
}

/// Per-question results of a submitted quiz, answer key included.
#[utoipa::path(
    get,
    path = "/quizzes/{id}/results",
    responses(
        (status = 200, description = "The graded breakdown", body = QuizReviewResponse),
        (status = 400, description = "The quiz has not been submitted yet"),
        (status = 404, description = "No such quiz for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Quiz id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_quiz_results_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<Json<QuizReviewResponse>> {
    let review = app_state
        .study
        .get_quiz_results(user_id, quiz_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(review.into()))
}

#[utoipa::path(
    delete,
    path = "/quizzes/{id}",
    responses(
        (status = 204, description = "Quiz deleted"),
        (status = 404, description = "No such quiz for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Quiz id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    app_state
        .study
        .delete_quiz(user_id, quiz_id)
        .await
        .map_err(study_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/articles",
    responses(
        (status = 200, description = "The caller's saved articles", body = [CreationResponse])
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_articles_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<CreationResponse>>> {
    let articles = app_state
        .study
        .list_articles(user_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(articles.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/articles/{id}",
    responses(
        (status = 200, description = "The article", body = CreationResponse),
        (status = 404, description = "No such article for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Article id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_article_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(article_id): Path<Uuid>,
) -> ApiResult<Json<CreationResponse>> {
    let article = app_state
        .study
        .get_article(user_id, article_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(article.into()))
}

#[utoipa::path(
    delete,
    path = "/articles/{id}",
    responses(
        (status = 204, description = "Article deleted"),
        (status = 404, description = "No such article for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "Article id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_article_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(article_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    app_state
        .study
        .delete_article(user_id, article_id)
        .await
        .map_err(study_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Learning statistics and recent activity for the caller.
#[utoipa::path(
    get,
    path = "/progress/dashboard",
    responses((status = 200, description = "The caller's dashboard", body = DashboardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> ApiResult<Json<DashboardResponse>> {
    let dashboard = app_state
        .study
        .dashboard(user_id)
        .await
        .map_err(study_error_response)?;
    Ok(Json(dashboard.into()))
}

//=========================================================================================
// Upload Storage Helpers
//=========================================================================================

/// Title used when the upload carries none: the file name without its extension.
fn default_title(file_name: &str) -> String {
    FsPath::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Untitled document")
        .to_string()
}

/// Reduces a client-supplied file name to a safe single path component.
fn sanitize_file_name(file_name: &str) -> String {
    let base = FsPath::new(file_name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document.pdf");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}

async fn store_upload(
    upload_dir: &FsPath,
    file_name: &str,
    data: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name)));
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

async fn remove_upload(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove stored file {}: {}", path.display(), e);
    }
}
