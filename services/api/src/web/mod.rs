pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::web::auth::{login_handler, logout_handler, me_handler, signup_handler};
use crate::web::rest::{
    answer_handler, delete_upload_handler, file_handler, get_assessment_handler,
    get_table_handler, get_workspace_handler, health_handler, list_uploads_handler,
    new_chat_handler, select_upload_handler, set_language_handler, table_action_handler,
    train_handler, translations_handler, upload_handler,
};
use crate::web::state::AppState;

/// Uploads over 5 MiB are still read so they can be rejected with a proper message.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Builds the API routes. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/i18n/{lang}", get(translations_handler))
        .route("/files/{*key}", get(file_handler))
        .route("/health", get(health_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/workspace", get(get_workspace_handler))
        .route("/workspace/language", put(set_language_handler))
        .route("/workspace/new-chat", post(new_chat_handler))
        .route(
            "/workspace/table",
            get(get_table_handler).post(table_action_handler),
        )
        .route("/assessment", get(get_assessment_handler))
        .route("/assessment/answer", post(answer_handler))
        .route("/uploads", post(upload_handler).get(list_uploads_handler))
        .route("/uploads/{id}/select", post(select_upload_handler))
        .route("/uploads/{id}", axum::routing::delete(delete_upload_handler))
        .route("/train", post(train_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(app_state)
}
