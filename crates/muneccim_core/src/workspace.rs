//! crates/muneccim_core/src/workspace.rs
//!
//! The per-user state of the training view: assessment progress, the selected dataset,
//! the table view over it, the current training run and the last error message.
//!
//! Every transition here is synchronous. Network work happens in `flows`, which
//! brackets it with a `begin_*` call returning a `Ticket` and a matching `finish_*`.
//! At most one ticketed operation is in flight per workspace.

use serde::Serialize;
use uuid::Uuid;

use crate::assessment::{AssessmentError, AssessmentFlow, AssessmentStep, QUESTION_COUNT};
use crate::context::AnalysisPayload;
use crate::domain::{
    AnalysisReport, AssessmentResult, ParsedDataset, SkillLevel, UploadSession, User,
};
use crate::i18n::{translations, Guidance, Language, Question, Translations};
use crate::ingestion::{validate_upload, DatasetError, IncomingFile, UploadFormat, ValidationError};
use crate::ports::{AnalysisRequest, InlineRows, PortError, PortResult};
use crate::table::{TableAction, TableError, TablePage, TableState};
use crate::training::{
    format_remaining, rewrite_image_urls, TrainingPhase, TrainingProgress, TrainingRun,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Another operation is already in progress")]
    Busy,
    #[error("No dataset has been loaded")]
    NoDataset,
    #[error("The assessment has not been completed")]
    AssessmentPending,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// The kinds of work that occupy the workspace's single in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upload,
    SelectHistory,
    Training,
}

/// Proof that an operation was started. Finishing with a ticket from an older
/// generation (before a "new chat") is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    operation: Operation,
}

impl Ticket {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// Everything a successful upload chain produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub upload: UploadSession,
    pub dataset: ParsedDataset,
    pub history: Vec<UploadSession>,
}

#[derive(Debug)]
pub struct TrainWorkspace {
    user: User,
    language: Language,
    generation: u64,
    in_flight: Option<Operation>,
    assessment: AssessmentFlow,
    skill_level: Option<SkillLevel>,
    history: Vec<UploadSession>,
    selected_file: Option<String>,
    current_upload: Option<UploadSession>,
    dataset: Option<ParsedDataset>,
    table: TableState,
    training: TrainingRun,
    error_message: Option<String>,
}

impl TrainWorkspace {
    /// Builds the workspace from what was loaded for the user. A stored assessment
    /// skips the quiz entirely.
    pub fn new(user: User, assessment: Option<AssessmentResult>, history: Vec<UploadSession>) -> Self {
        let mut flow = AssessmentFlow::new();
        let skill_level = assessment.map(|result| {
            flow.mark_completed();
            result.skill_level()
        });
        Self {
            user,
            language: Language::default(),
            generation: 0,
            in_flight: None,
            assessment: flow,
            skill_level,
            history,
            selected_file: None,
            current_upload: None,
            dataset: None,
            table: TableState::new(),
            training: TrainingRun::default(),
            error_message: None,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> Uuid {
        self.user.user_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn skill_level(&self) -> Option<SkillLevel> {
        self.skill_level
    }

    pub fn history(&self) -> &[UploadSession] {
        &self.history
    }

    pub fn dataset(&self) -> Option<&ParsedDataset> {
        self.dataset.as_ref()
    }

    pub fn training(&self) -> &TrainingRun {
        &self.training
    }

    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn t(&self) -> &'static Translations {
        translations(self.language)
    }

    //-------------------------------------------------------------------------------------
    // In-flight slot
    //-------------------------------------------------------------------------------------

    fn begin(&mut self, operation: Operation) -> Result<Ticket, WorkspaceError> {
        if self.in_flight.is_some() {
            self.error_message = Some(self.t().busy.to_string());
            return Err(WorkspaceError::Busy);
        }
        self.in_flight = Some(operation);
        self.error_message = None;
        Ok(Ticket {
            generation: self.generation,
            operation,
        })
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation && self.in_flight == Some(ticket.operation)
    }

    /// Releases the slot and records the localized message. Stale tickets change nothing.
    pub fn fail_operation(&mut self, ticket: Ticket, error: &WorkspaceError) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        self.in_flight = None;
        let fallback = match ticket.operation {
            Operation::Upload | Operation::SelectHistory => self.t().upload_failed,
            Operation::Training => self.t().analysis_failed,
        };
        self.error_message = Some(self.message_for(error, fallback));
        true
    }

    /// The user-facing text for an error; port failures use `port_fallback`.
    pub fn message_for(&self, error: &WorkspaceError, port_fallback: &str) -> String {
        let t = self.t();
        match error {
            WorkspaceError::Busy => t.busy.to_string(),
            WorkspaceError::NoDataset => t.no_dataset.to_string(),
            WorkspaceError::AssessmentPending => t.assessment_pending.to_string(),
            WorkspaceError::Validation(ValidationError::InvalidFormat) => t.invalid_format.to_string(),
            WorkspaceError::Validation(ValidationError::FileTooLarge { .. }) => {
                t.file_too_large.to_string()
            }
            WorkspaceError::Dataset(_) => t.unreadable_dataset.to_string(),
            WorkspaceError::Assessment(e) => e.to_string(),
            WorkspaceError::Table(e) => e.to_string(),
            WorkspaceError::Port(_) => port_fallback.to_string(),
        }
    }

    /// Records a message outside of any ticketed operation.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    //-------------------------------------------------------------------------------------
    // Assessment
    //-------------------------------------------------------------------------------------

    pub fn select_answer(&mut self, option: u8) -> Result<AssessmentStep, WorkspaceError> {
        if self.skill_level.is_some() {
            return Err(AssessmentError::AlreadyCompleted.into());
        }
        let step = self.assessment.select(self.user.user_id, option)?;
        self.error_message = None;
        Ok(step)
    }

    pub fn complete_assessment(&mut self, result: &AssessmentResult) {
        self.assessment.mark_completed();
        self.skill_level = Some(result.skill_level());
    }

    pub fn assessment_save_failed(&mut self) {
        self.error_message = Some(self.t().assessment_failed.to_string());
    }

    //-------------------------------------------------------------------------------------
    // Ingestion and history
    //-------------------------------------------------------------------------------------

    /// Validates the file and claims the in-flight slot. A rejected file only changes
    /// the error message.
    pub fn begin_upload(&mut self, file: &IncomingFile) -> Result<(Ticket, UploadFormat), WorkspaceError> {
        if self.skill_level.is_none() {
            self.error_message = Some(self.t().assessment_pending.to_string());
            return Err(WorkspaceError::AssessmentPending);
        }
        let format = match validate_upload(&file.file_name, file.data.len() as u64) {
            Ok(format) => format,
            Err(e) => {
                let error = WorkspaceError::Validation(e);
                self.error_message = Some(self.message_for(&error, self.t().upload_failed));
                return Err(error);
            }
        };
        let ticket = self.begin(Operation::Upload)?;
        Ok((ticket, format))
    }

    /// Settles an upload. The record is committed either way, so a stale ticket still
    /// takes the re-queried history; only the dataset is left alone.
    pub fn finish_upload(&mut self, ticket: Ticket, outcome: IngestOutcome) -> bool {
        if !self.is_current(&ticket) {
            self.history = outcome.history;
            return false;
        }
        self.in_flight = None;
        self.history = outcome.history;
        self.load_dataset(outcome.upload, outcome.dataset);
        true
    }

    pub fn begin_select(&mut self) -> Result<Ticket, WorkspaceError> {
        self.begin(Operation::SelectHistory)
    }

    /// Replaces the displayed dataset with a re-fetched history entry.
    pub fn finish_select(&mut self, ticket: Ticket, upload: UploadSession, dataset: ParsedDataset) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        self.in_flight = None;
        self.load_dataset(upload, dataset);
        true
    }

    fn load_dataset(&mut self, upload: UploadSession, dataset: ParsedDataset) {
        self.selected_file = Some(upload.file_name.clone());
        self.current_upload = Some(upload);
        self.dataset = Some(dataset);
        self.table = TableState::new();
        self.training.reset();
        self.error_message = None;
    }

    pub fn set_history(&mut self, history: Vec<UploadSession>) {
        self.history = history;
    }

    pub fn history_load_failed(&mut self) {
        self.error_message = Some(self.t().history_failed.to_string());
    }

    pub fn remove_history_entry(&mut self, upload_id: Uuid) {
        self.history.retain(|entry| entry.id != upload_id);
    }

    //-------------------------------------------------------------------------------------
    // Table
    //-------------------------------------------------------------------------------------

    pub fn table_page(&self) -> Result<TablePage, WorkspaceError> {
        let dataset = self.dataset.as_ref().ok_or(WorkspaceError::NoDataset)?;
        Ok(self.table.page(dataset))
    }

    pub fn apply_table(&mut self, action: TableAction) -> Result<TablePage, WorkspaceError> {
        let dataset = self.dataset.as_ref().ok_or(WorkspaceError::NoDataset)?;
        self.table.apply(dataset, action)?;
        Ok(self.table.page(dataset))
    }

    //-------------------------------------------------------------------------------------
    // Training
    //-------------------------------------------------------------------------------------

    /// Enters `Analyzing` and builds the request for the analysis backend.
    pub fn begin_training(
        &mut self,
        payload: AnalysisPayload,
    ) -> Result<(Ticket, AnalysisRequest), WorkspaceError> {
        let request = match (&self.dataset, &self.current_upload) {
            (Some(dataset), Some(upload)) => match payload {
                AnalysisPayload::FileUrl => AnalysisRequest::FileUrl {
                    file_url: upload.file_url.clone(),
                    file_name: upload.file_name.clone(),
                },
                AnalysisPayload::Inline => AnalysisRequest::Inline {
                    data: InlineRows {
                        columns: dataset.columns.clone(),
                        rows: dataset.rows.clone(),
                    },
                },
            },
            _ => {
                self.error_message = Some(self.t().no_dataset.to_string());
                return Err(WorkspaceError::NoDataset);
            }
        };
        let ticket = self.begin(Operation::Training)?;
        self.training.begin();
        Ok((ticket, request))
    }

    pub fn report_progress(&mut self, ticket: &Ticket, progress: TrainingProgress) -> bool {
        self.is_current(ticket) && self.training.advance(progress)
    }

    /// Settles the run. A remote string `detail` is shown verbatim; any other failure
    /// shows the localized generic message.
    pub fn finish_training(
        &mut self,
        ticket: Ticket,
        result: PortResult<AnalysisReport>,
        assets_base_url: &str,
    ) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        self.in_flight = None;
        match result {
            Ok(report) => {
                let image_urls = rewrite_image_urls(assets_base_url, &report.image_urls);
                self.training.complete(AnalysisReport {
                    narrative: report.narrative,
                    image_urls,
                });
                self.error_message = None;
            }
            Err(error) => {
                self.training.fail();
                let message = match error {
                    PortError::Remote {
                        detail: Some(detail),
                        ..
                    } => detail,
                    _ => self.t().analysis_failed.to_string(),
                };
                self.error_message = Some(message);
            }
        }
        true
    }

    //-------------------------------------------------------------------------------------
    // Reset
    //-------------------------------------------------------------------------------------

    /// Back to an empty ingestion view from any state. Whatever was in flight is abandoned.
    pub fn new_chat(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.selected_file = None;
        self.current_upload = None;
        self.dataset = None;
        self.table = TableState::new();
        self.training.reset();
        self.error_message = None;
    }

    //-------------------------------------------------------------------------------------
    // Snapshot
    //-------------------------------------------------------------------------------------

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let t = self.t();
        let stage = if self.skill_level.is_some() {
            Stage::Ingestion
        } else {
            Stage::Assessment
        };
        let assessment = match stage {
            Stage::Assessment => {
                let index = self.assessment.current_question();
                Some(AssessmentView {
                    question_number: index + 1,
                    question_count: QUESTION_COUNT,
                    question: &t.questions[index],
                })
            }
            Stage::Ingestion => None,
        };

        WorkspaceSnapshot {
            user: self.user.clone(),
            language: self.language,
            stage,
            assessment,
            skill_level: self.skill_level,
            guidance: self.skill_level.map(|level| t.guidance(level)),
            history: self.history.clone(),
            selected_file: self.selected_file.clone(),
            current_upload_id: self.current_upload.as_ref().map(|upload| upload.id),
            dataset: self.dataset.as_ref().map(|dataset| DatasetSummary {
                columns: dataset.columns.clone(),
                row_count: dataset.row_count(),
            }),
            uploading: matches!(
                self.in_flight,
                Some(Operation::Upload) | Some(Operation::SelectHistory)
            ),
            analyzing: self.training.phase() == TrainingPhase::Analyzing,
            training: TrainingView {
                phase: self.training.phase(),
                step: self.training.step().map(|step| step.label(t)),
                progress: self.training.progress(),
                estimated_time: self.training.remaining().map(|d| format_remaining(t, d)),
                completed: self.training.is_completed(),
                result: self.training.result().cloned(),
            },
            error_message: self.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Assessment,
    Ingestion,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentView {
    pub question_number: usize,
    pub question_count: usize,
    pub question: &'static Question,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingView {
    pub phase: TrainingPhase,
    pub step: Option<&'static str>,
    pub progress: u8,
    pub estimated_time: Option<String>,
    pub completed: bool,
    pub result: Option<AnalysisReport>,
}

/// What the client renders. Serializable as-is.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub user: User,
    pub language: Language,
    pub stage: Stage,
    pub assessment: Option<AssessmentView>,
    pub skill_level: Option<SkillLevel>,
    pub guidance: Option<&'static Guidance>,
    pub history: Vec<UploadSession>,
    pub selected_file: Option<String>,
    pub current_upload_id: Option<Uuid>,
    pub dataset: Option<DatasetSummary>,
    pub uploading: bool,
    pub analyzing: bool,
    pub training: TrainingView,
    pub error_message: Option<String>,
}
