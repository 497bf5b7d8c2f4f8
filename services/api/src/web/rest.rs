//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{self, AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use muneccim_core::domain::{SkillLevel, User};
use muneccim_core::flows::WorkspaceHandle;
use muneccim_core::i18n::{translations, Guidance, Language};
use muneccim_core::ingestion::IncomingFile;
use muneccim_core::ports::PortError;
use muneccim_core::table::TableAction;
use muneccim_core::workspace::{AssessmentView, Stage, WorkspaceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        get_workspace_handler,
        set_language_handler,
        new_chat_handler,
        get_assessment_handler,
        answer_handler,
        upload_handler,
        list_uploads_handler,
        select_upload_handler,
        delete_upload_handler,
        get_table_handler,
        table_action_handler,
        train_handler,
        translations_handler,
        file_handler,
        health_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            LanguageRequest,
            AnswerRequest,
            TableActionRequest,
        )
    ),
    tags(
        (name = "Muneccim API", description = "Assessment, dataset upload and model training workspace.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LanguageRequest {
    /// `en` or `tr`.
    pub language: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// Index of the chosen option, 0 to 4.
    pub option: u8,
}

/// One interaction with the data table.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableActionRequest {
    SetFilter { column: String, value: String },
    ClearFilters,
    ToggleSort { column: String },
    SetPageSize { page_size: usize },
    NextPage,
    PreviousPage,
    GoToPage { page: usize },
}

impl From<TableActionRequest> for TableAction {
    fn from(req: TableActionRequest) -> Self {
        match req {
            TableActionRequest::SetFilter { column, value } => TableAction::SetFilter { column, value },
            TableActionRequest::ClearFilters => TableAction::ClearFilters,
            TableActionRequest::ToggleSort { column } => TableAction::ToggleSort { column },
            TableActionRequest::SetPageSize { page_size } => TableAction::SetPageSize { page_size },
            TableActionRequest::NextPage => TableAction::NextPage,
            TableActionRequest::PreviousPage => TableAction::PreviousPage,
            TableActionRequest::GoToPage { page } => TableAction::GoToPage { page },
        }
    }
}

#[derive(Serialize)]
pub struct AssessmentStatus {
    pub stage: Stage,
    pub assessment: Option<AssessmentView>,
    pub skill_level: Option<SkillLevel>,
    pub guidance: Option<&'static Guidance>,
}

//=========================================================================================
// Helpers
//=========================================================================================

type HandlerError = (StatusCode, String);

fn status_for(error: &WorkspaceError) -> StatusCode {
    match error {
        WorkspaceError::Busy => StatusCode::CONFLICT,
        WorkspaceError::NoDataset
        | WorkspaceError::AssessmentPending
        | WorkspaceError::Validation(_)
        | WorkspaceError::Dataset(_)
        | WorkspaceError::Assessment(_)
        | WorkspaceError::Table(_) => StatusCode::BAD_REQUEST,
        WorkspaceError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
        WorkspaceError::Port(PortError::Remote { .. }) => StatusCode::BAD_GATEWAY,
        WorkspaceError::Port(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turns a workflow error into a status and the user-facing message.
async fn reject(handle: &WorkspaceHandle, error: WorkspaceError) -> HandlerError {
    (status_for(&error), handle.describe(&error).await)
}

async fn workspace_for(state: &AppState, user: &User) -> Result<WorkspaceHandle, HandlerError> {
    state.registry.get_or_load(user).await.map_err(|e| {
        error!("Failed to load workspace for {}: {:?}", user.user_id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load workspace".to_string(),
        )
    })
}

fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => "text/csv; charset=utf-8",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

//=========================================================================================
// Workspace Handlers
//=========================================================================================

/// The full state of the training view for the signed-in user.
#[utoipa::path(
    get,
    path = "/workspace",
    responses(
        (status = 200, description = "Current workspace snapshot"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_workspace_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    Ok(Json(handle.snapshot().await))
}

/// Switch the language the workspace is rendered in.
#[utoipa::path(
    put,
    path = "/workspace/language",
    request_body = LanguageRequest,
    responses(
        (status = 200, description = "Workspace snapshot in the new language"),
        (status = 400, description = "Unsupported language")
    )
)]
pub async fn set_language_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<LanguageRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let language = Language::from_code(&req.language).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unsupported language '{}'", req.language),
        )
    })?;
    let handle = workspace_for(&state, &user).await?;
    Ok(Json(handle.set_language(language).await))
}

/// Reset to an empty ingestion view. Any in-flight operation is abandoned.
#[utoipa::path(
    post,
    path = "/workspace/new-chat",
    responses((status = 200, description = "The reset workspace"))
)]
pub async fn new_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    Ok(Json(handle.new_chat().await))
}

//=========================================================================================
// Assessment Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/assessment",
    responses((status = 200, description = "The current question, or the result once completed"))
)]
pub async fn get_assessment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let snapshot = workspace_for(&state, &user).await?.snapshot().await;
    Ok(Json(AssessmentStatus {
        stage: snapshot.stage,
        assessment: snapshot.assessment,
        skill_level: snapshot.skill_level,
        guidance: snapshot.guidance,
    }))
}

/// Answer the current question. The last answer stores the result.
#[utoipa::path(
    post,
    path = "/assessment/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Workspace after the answer"),
        (status = 400, description = "Option out of range or assessment already completed"),
        (status = 500, description = "The result could not be saved")
    )
)]
pub async fn answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.answer(&state.ctx, req.option).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => Err(reject(&handle, e).await),
    }
}

//=========================================================================================
// Upload and History Handlers
//=========================================================================================

/// Upload a dataset file.
///
/// Accepts a multipart/form-data request with a single file part (.csv or .xlsx, at most 5 MiB).
#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content_type = "multipart/form-data", description = "The dataset to upload."),
    responses(
        (status = 201, description = "Upload stored and loaded into the workspace"),
        (status = 400, description = "Invalid format, too large, or unreadable"),
        (status = 409, description = "Another operation is in progress"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let file = match multipart.next_field().await.map_err(|e| {
        warn!("Failed to read multipart data: {}", e);
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        Some(field) => {
            let name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read file bytes: {}", e),
                )
            })?;
            IncomingFile::new(name, data)
        }
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            ))
        }
    };

    let handle = workspace_for(&state, &user).await?;
    match handle.ingest(&state.ctx, file).await {
        Ok(snapshot) => Ok((StatusCode::CREATED, Json(snapshot))),
        Err(e) => Err(reject(&handle, e).await),
    }
}

/// The signed-in user's upload history, most recent first.
#[utoipa::path(
    get,
    path = "/uploads",
    responses(
        (status = 200, description = "Upload history"),
        (status = 500, description = "History could not be listed")
    )
)]
pub async fn list_uploads_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.refresh_history(&state.ctx).await {
        Ok(history) => Ok(Json(history)),
        Err(e) => Err(reject(&handle, e).await),
    }
}

/// Load a previous upload back into the workspace.
#[utoipa::path(
    post,
    path = "/uploads/{id}/select",
    params(("id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "The upload is the current dataset"),
        (status = 404, description = "No such upload for this user"),
        (status = 409, description = "Another operation is in progress")
    )
)]
pub async fn select_upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.select_history(&state.ctx, id).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => Err(reject(&handle, e).await),
    }
}

/// Delete an upload record. There is no undo.
#[utoipa::path(
    delete,
    path = "/uploads/{id}",
    params(("id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "Workspace without the deleted entry"),
        (status = 404, description = "No such upload for this user")
    )
)]
pub async fn delete_upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.delete_history(&state.ctx, id).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => Err(reject(&handle, e).await),
    }
}

//=========================================================================================
// Table Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/workspace/table",
    responses(
        (status = 200, description = "The visible page of the data table"),
        (status = 400, description = "No dataset loaded")
    )
)]
pub async fn get_table_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.table_page().await {
        Ok(page) => Ok(Json(page)),
        Err(e) => Err(reject(&handle, e).await),
    }
}

/// Filter, sort or page the data table.
#[utoipa::path(
    post,
    path = "/workspace/table",
    request_body = TableActionRequest,
    responses(
        (status = 200, description = "The visible page after the action"),
        (status = 400, description = "No dataset, unknown column or unsupported page size")
    )
)]
pub async fn table_action_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<TableActionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.apply_table(req.into()).await {
        Ok(page) => Ok(Json(page)),
        Err(e) => Err(reject(&handle, e).await),
    }
}

//=========================================================================================
// Training Handler
//=========================================================================================

/// Start training on the current dataset.
///
/// Returns immediately with the workspace in the analyzing phase; progress and the
/// outcome show up in later `GET /workspace` snapshots.
#[utoipa::path(
    post,
    path = "/train",
    responses(
        (status = 202, description = "Training started"),
        (status = 400, description = "No dataset loaded"),
        (status = 409, description = "Another operation is in progress")
    )
)]
pub async fn train_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let handle = workspace_for(&state, &user).await?;
    match handle.spawn_training(&state.ctx).await {
        Ok(snapshot) => Ok((StatusCode::ACCEPTED, Json(snapshot))),
        Err(e) => Err(reject(&handle, e).await),
    }
}

//=========================================================================================
// Public Handlers
//=========================================================================================

/// The complete string table for one language.
#[utoipa::path(
    get,
    path = "/i18n/{lang}",
    params(("lang" = String, Path, description = "`en` or `tr`")),
    responses(
        (status = 200, description = "All user-facing strings"),
        (status = 404, description = "Unsupported language")
    )
)]
pub async fn translations_handler(Path(lang): Path<String>) -> Result<impl IntoResponse, HandlerError> {
    let language = Language::from_code(&lang).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Unsupported language '{}'", lang),
        )
    })?;
    Ok(Json(translations(language)))
}

/// Serve a stored object, so the analysis backend can fetch uploaded files.
#[utoipa::path(
    get,
    path = "/files/{key}",
    params(("key" = String, Path, description = "Storage key, e.g. uploads/{user_id}/{object_id}/{file_name}")),
    responses(
        (status = 200, description = "The stored bytes"),
        (status = 404, description = "No such object")
    )
)]
pub async fn file_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    match state.storage.get_object(&key).await {
        Ok(data) => Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data)),
        Err(PortError::NotFound(_)) => Err((StatusCode::NOT_FOUND, "Not found".to_string())),
        Err(e) => {
            error!("Failed to read object {}: {:?}", key, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file".to_string(),
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}
