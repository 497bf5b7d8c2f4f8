//! services/api/src/adapters/analysis.rs
//!
//! The remote implementation of the `AnalysisService` port: one blocking
//! `POST {base}/analyze/csv` call per training run.

use async_trait::async_trait;
use muneccim_core::domain::AnalysisReport;
use muneccim_core::ports::{AnalysisRequest, AnalysisService, PortError, PortResult, ProgressSink};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

/// The parts of a successful analysis response this service uses.
#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    visualization_files: Vec<String>,
    #[serde(default)]
    gemini_analysis: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Value,
}

/// Only a plain string `detail` is passed on; structured details are dropped.
fn string_detail(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorBody>(body).ok()?.detail {
        Value::String(detail) => Some(detail),
        _ => None,
    }
}

fn narrative(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(&other).unwrap_or_default(),
    }
}

pub struct RemoteAnalysisAdapter {
    client: Client,
    base_url: String,
}

impl RemoteAnalysisAdapter {
    /// Creates a new `RemoteAnalysisAdapter`. The timeout bounds a whole analysis run.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AnalysisService for RemoteAnalysisAdapter {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        _progress: &dyn ProgressSink,
    ) -> PortResult<AnalysisReport> {
        let url = format!("{}/analyze/csv", self.base_url);
        info!("Requesting analysis from {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Analysis request failed: {}", e);
                PortError::Unexpected(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = string_detail(&body);
            error!(code = status.as_u16(), body = %body, "Analysis service error");
            return Err(PortError::Remote {
                status: status.as_u16(),
                detail,
            });
        }

        let body: AnalyzeResponse = response.json().await.map_err(|e| {
            error!("Failed to decode analysis response: {}", e);
            PortError::Unexpected(e.to_string())
        })?;

        Ok(AnalysisReport {
            narrative: narrative(body.gemini_analysis),
            image_urls: body.visualization_files,
        })
    }
}
