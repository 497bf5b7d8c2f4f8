//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use muneccim_core::AnalysisPayload;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which analysis backend the training workflow talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisMode {
    Remote,
    Simulated,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub storage_root: PathBuf,
    pub public_base_url: String,
    pub analysis_mode: AnalysisMode,
    pub analysis_api_url: String,
    pub analysis_assets_url: String,
    pub analysis_payload: AnalysisPayload,
    pub analysis_timeout: Duration,
    pub simulated_step: Duration,
    /// How long a signed-in user's workspace is kept in memory without being used.
    pub workspace_idle: Duration,
    pub cors_origin: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage ---
        let storage_root = PathBuf::from(var_or("STORAGE_ROOT", "./storage"));
        let public_base_url = var_or("PUBLIC_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();

        // --- Analysis ---
        let analysis_mode = match var_or("ANALYSIS_MODE", "simulated").to_ascii_lowercase().as_str() {
            "remote" => AnalysisMode::Remote,
            "simulated" => AnalysisMode::Simulated,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ANALYSIS_MODE".to_string(),
                    format!("'{}' is neither 'remote' nor 'simulated'", other),
                ))
            }
        };
        let analysis_api_url = var_or("ANALYSIS_API_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_string();
        let analysis_assets_url = std::env::var("ANALYSIS_ASSETS_URL")
            .unwrap_or_else(|_| format!("{}/static", analysis_api_url));

        let payload_str = var_or("ANALYSIS_PAYLOAD", "url");
        let analysis_payload = AnalysisPayload::parse(&payload_str).ok_or_else(|| {
            ConfigError::InvalidValue(
                "ANALYSIS_PAYLOAD".to_string(),
                format!("'{}' is neither 'url' nor 'inline'", payload_str),
            )
        })?;

        let analysis_timeout = Duration::from_secs(parse_u64("ANALYSIS_TIMEOUT_SECS", 300)?);
        let simulated_step = Duration::from_millis(parse_u64("SIMULATED_STEP_MILLIS", 1500)?);

        // --- Workspaces ---
        let workspace_idle_secs = parse_u64("WORKSPACE_IDLE_SECS", 3600)?;
        if workspace_idle_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKSPACE_IDLE_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let workspace_idle = Duration::from_secs(workspace_idle_secs);

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            storage_root,
            public_base_url,
            analysis_mode,
            analysis_api_url,
            analysis_assets_url,
            analysis_payload,
            analysis_timeout,
            simulated_step,
            workspace_idle,
            cors_origin,
        })
    }
}
