//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, FsStorageAdapter, RemoteAnalysisAdapter, SimulatedAnalysisAdapter},
    config::{AnalysisMode, Config},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::http::{
    header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use muneccim_core::context::{ServiceContext, WorkflowSettings};
use muneccim_core::ports::AnalysisService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;
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
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    tokio::fs::create_dir_all(&config.storage_root).await?;
    let storage_adapter = Arc::new(FsStorageAdapter::new(
        config.storage_root.clone(),
        &config.public_base_url,
    ));

    let analysis_adapter: Arc<dyn AnalysisService> = match config.analysis_mode {
        AnalysisMode::Remote => {
            info!("Using remote analysis at {}", config.analysis_api_url);
            Arc::new(RemoteAnalysisAdapter::new(
                &config.analysis_api_url,
                config.analysis_timeout,
            )?)
        }
        AnalysisMode::Simulated => {
            info!("Using simulated analysis");
            Arc::new(SimulatedAnalysisAdapter::new(config.simulated_step))
        }
    };

    // --- 4. Build the Shared AppState ---
    let ctx = ServiceContext {
        db: db_adapter,
        storage: storage_adapter,
        analysis: analysis_adapter,
        settings: WorkflowSettings {
            assets_base_url: config.analysis_assets_url.clone(),
            payload: config.analysis_payload,
        },
    };
    let app_state = Arc::new(AppState::new(ctx));
    app_state.registry.clone().evict_idle_every(
        config.workspace_idle,
        config.workspace_idle.min(Duration::from_secs(60)),
    );

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, ACCEPT_LANGUAGE]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
