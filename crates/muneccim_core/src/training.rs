//! crates/muneccim_core/src/training.rs
//!
//! The training run state machine: `Idle -> Analyzing -> Complete | Failed`.

use serde::Serialize;
use std::time::Duration;

use crate::domain::AnalysisReport;
use crate::i18n::Translations;

/// Progress shown as soon as a run enters `Analyzing`.
pub const INITIAL_PROGRESS: u8 = 10;

/// The stepped progress of the simulated trainer after the initial 10%.
pub const SIMULATED_SCHEDULE: [(u8, TrainingStep, Option<Duration>); 3] = [
    (50, TrainingStep::TrainingModel, Some(Duration::from_secs(120))),
    (90, TrainingStep::Finalizing, Some(Duration::from_secs(30))),
    (100, TrainingStep::Completed, None),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    #[default]
    Idle,
    Analyzing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStep {
    ProcessingData,
    TrainingModel,
    Finalizing,
    Completed,
}

impl TrainingStep {
    pub fn label(&self, t: &Translations) -> &'static str {
        match self {
            TrainingStep::ProcessingData => t.step_processing_data,
            TrainingStep::TrainingModel => t.step_training_model,
            TrainingStep::Finalizing => t.step_finalizing,
            TrainingStep::Completed => t.step_completed,
        }
    }
}

/// One progress report from an analysis backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingProgress {
    pub percent: u8,
    pub step: TrainingStep,
    pub remaining: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingRun {
    phase: TrainingPhase,
    step: Option<TrainingStep>,
    progress: u8,
    remaining: Option<Duration>,
    result: Option<AnalysisReport>,
}

impl TrainingRun {
    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn step(&self) -> Option<TrainingStep> {
        self.step
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    pub fn is_completed(&self) -> bool {
        self.phase == TrainingPhase::Complete
    }

    pub fn result(&self) -> Option<&AnalysisReport> {
        self.result.as_ref()
    }

    /// Starts a fresh run. Anything left from a previous run is discarded.
    pub fn begin(&mut self) {
        *self = Self {
            phase: TrainingPhase::Analyzing,
            step: Some(TrainingStep::ProcessingData),
            progress: INITIAL_PROGRESS,
            remaining: None,
            result: None,
        };
    }

    /// Applies a report while analyzing. Reports that would move progress backwards are ignored.
    pub fn advance(&mut self, report: TrainingProgress) -> bool {
        if self.phase != TrainingPhase::Analyzing || report.percent < self.progress {
            return false;
        }
        self.progress = report.percent.min(100);
        self.step = Some(report.step);
        self.remaining = report.remaining;
        true
    }

    pub fn complete(&mut self, report: AnalysisReport) {
        self.phase = TrainingPhase::Complete;
        self.step = Some(TrainingStep::Completed);
        self.progress = 100;
        self.remaining = None;
        self.result = Some(report);
    }

    /// Terminal for this run; progress stays where it stopped.
    pub fn fail(&mut self) {
        self.phase = TrainingPhase::Failed;
        self.remaining = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Renders a remaining duration with the localized "about N minutes/seconds" template.
pub fn format_remaining(t: &Translations, remaining: Duration) -> String {
    let secs = remaining.as_secs();
    if secs >= 60 {
        t.minutes_remaining
            .replace("{n}", &secs.div_ceil(60).to_string())
    } else {
        t.seconds_remaining.replace("{n}", &secs.to_string())
    }
}

/// Turns the backend's image file references into URLs under the static asset base.
/// References that are already absolute http(s) URLs are kept.
pub fn rewrite_image_urls(assets_base_url: &str, references: &[String]) -> Vec<String> {
    let base = assets_base_url.trim_end_matches('/');
    references
        .iter()
        .filter(|reference| !reference.trim().is_empty())
        .map(|reference| {
            if reference.starts_with("http://") || reference.starts_with("https://") {
                return reference.clone();
            }
            let file_name = reference
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(reference.as_str());
            format!("{}/{}", base, file_name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{translations, Language};

    fn report() -> AnalysisReport {
        AnalysisReport {
            narrative: "Three clusters found.".to_string(),
            image_urls: vec!["http://assets/cluster.png".to_string()],
        }
    }

    #[test]
    fn begin_enters_analyzing_at_ten_percent() {
        let mut run = TrainingRun::default();
        run.begin();
        assert_eq!(run.phase(), TrainingPhase::Analyzing);
        assert_eq!(run.progress(), INITIAL_PROGRESS);
        assert_eq!(run.step(), Some(TrainingStep::ProcessingData));
        assert!(!run.is_completed());
    }

    #[test]
    fn progress_is_monotonic() {
        let mut run = TrainingRun::default();
        run.begin();
        let (percent, step, remaining) = SIMULATED_SCHEDULE[1];
        assert!(run.advance(TrainingProgress { percent, step, remaining }));
        assert!(!run.advance(TrainingProgress {
            percent: 50,
            step: TrainingStep::TrainingModel,
            remaining: None,
        }));
        assert_eq!(run.progress(), 90);
        assert_eq!(run.step(), Some(TrainingStep::Finalizing));
    }

    #[test]
    fn reports_outside_analyzing_are_ignored() {
        let mut run = TrainingRun::default();
        assert!(!run.advance(TrainingProgress {
            percent: 50,
            step: TrainingStep::TrainingModel,
            remaining: None,
        }));
        assert_eq!(run, TrainingRun::default());
    }

    #[test]
    fn complete_and_fail_are_terminal() {
        let mut run = TrainingRun::default();
        run.begin();
        run.complete(report());
        assert!(run.is_completed());
        assert_eq!(run.progress(), 100);
        assert_eq!(run.result(), Some(&report()));

        run.begin();
        assert_eq!(run.result(), None);
        run.fail();
        assert_eq!(run.phase(), TrainingPhase::Failed);
        assert_eq!(run.progress(), INITIAL_PROGRESS);
        assert!(!run.advance(TrainingProgress {
            percent: 90,
            step: TrainingStep::Finalizing,
            remaining: None,
        }));
    }

    #[test]
    fn remaining_time_is_localized() {
        let en = translations(Language::En);
        let tr = translations(Language::Tr);
        assert_eq!(format_remaining(en, Duration::from_secs(120)), "About 2 minutes remaining");
        assert_eq!(format_remaining(en, Duration::from_secs(90)), "About 2 minutes remaining");
        assert_eq!(format_remaining(tr, Duration::from_secs(30)), "Yaklaşık 30 saniye kaldı");
    }

    #[test]
    fn image_references_become_asset_urls() {
        let refs = vec![
            "visualizations/elbow.png".to_string(),
            "scatter.png".to_string(),
            "https://cdn.example.com/pca.png".to_string(),
            " ".to_string(),
        ];
        assert_eq!(
            rewrite_image_urls("http://localhost:8000/static/", &refs),
            vec![
                "http://localhost:8000/static/elbow.png",
                "http://localhost:8000/static/scatter.png",
                "https://cdn.example.com/pca.png",
            ]
        );
    }
}
