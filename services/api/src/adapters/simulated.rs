//! services/api/src/adapters/simulated.rs
//!
//! An `AnalysisService` that needs no backend: it walks the fixed progress schedule
//! with a pause before each step and answers with a canned report.

use async_trait::async_trait;
use muneccim_core::domain::AnalysisReport;
use muneccim_core::ports::{AnalysisRequest, AnalysisService, PortResult, ProgressSink};
use muneccim_core::training::{TrainingProgress, SIMULATED_SCHEDULE};
use std::time::Duration;
use tracing::debug;

pub struct SimulatedAnalysisAdapter {
    step: Duration,
}

impl SimulatedAnalysisAdapter {
    pub fn new(step: Duration) -> Self {
        Self { step }
    }
}

fn describe(request: &AnalysisRequest) -> String {
    match request {
        AnalysisRequest::FileUrl { file_name, .. } => format!("Simulated training on {}.", file_name),
        AnalysisRequest::Inline { data } => format!("Simulated training on {} rows.", data.len()),
    }
}

#[async_trait]
impl AnalysisService for SimulatedAnalysisAdapter {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressSink,
    ) -> PortResult<AnalysisReport> {
        for (percent, step, remaining) in SIMULATED_SCHEDULE {
            tokio::time::sleep(self.step).await;
            debug!("Simulated training at {}%", percent);
            progress
                .report(TrainingProgress {
                    percent,
                    step,
                    remaining,
                })
                .await;
        }

        Ok(AnalysisReport {
            narrative: describe(request),
            image_urls: Vec::new(),
        })
    }
}
