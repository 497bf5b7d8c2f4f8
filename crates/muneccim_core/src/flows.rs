//! crates/muneccim_core/src/flows.rs
//!
//! The asynchronous workflows over a user's workspace. Each one locks the workspace
//! to start (claiming a ticket), releases it while the ports are awaited, and locks
//! again to settle. The lock is never held across a port call.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assessment::AssessmentStep;
use crate::context::ServiceContext;
use crate::domain::{NewUploadSession, ParsedDataset, UploadSession, User};
use crate::i18n::Language;
use crate::ingestion::{parse_dataset, sanitize_file_name, storage_key, IncomingFile, UploadFormat, ValidationError};
use crate::ports::{AnalysisRequest, PortResult, ProgressSink};
use crate::table::{TableAction, TablePage};
use crate::training::TrainingProgress;
use crate::workspace::{IngestOutcome, Ticket, TrainWorkspace, WorkspaceError, WorkspaceSnapshot};

/// Builds a fresh workspace for a signed-in user. A history that cannot be listed
/// starts empty with the localized banner; a failed assessment lookup is an error.
pub async fn load_workspace(ctx: &ServiceContext, user: User) -> PortResult<WorkspaceHandle> {
    let assessment = ctx.db.get_assessment(user.user_id).await?;
    let (history, history_error) = match ctx.db.list_upload_sessions(user.user_id).await {
        Ok(history) => (history, None),
        Err(e) => {
            warn!("Failed to list upload history for {}: {}", user.user_id, e);
            (Vec::new(), Some(e))
        }
    };

    let user_id = user.user_id;
    let mut workspace = TrainWorkspace::new(user, assessment, history);
    if history_error.is_some() {
        workspace.history_load_failed();
    }
    info!(
        "Loaded workspace for {} (assessed: {})",
        user_id,
        workspace.skill_level().is_some()
    );
    Ok(WorkspaceHandle::new(workspace))
}

/// Shared, lockable access to one user's workspace.
#[derive(Clone)]
pub struct WorkspaceHandle {
    user_id: Uuid,
    inner: Arc<Mutex<TrainWorkspace>>,
}

impl WorkspaceHandle {
    pub fn new(workspace: TrainWorkspace) -> Self {
        Self {
            user_id: workspace.user_id(),
            inner: Arc::new(Mutex::new(workspace)),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// True when nothing is in flight. A workspace whose lock is currently held counts as busy.
    pub fn is_settled(&self) -> bool {
        self.inner
            .try_lock()
            .map(|ws| ws.in_flight().is_none())
            .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> WorkspaceSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn language(&self) -> Language {
        self.inner.lock().await.language()
    }

    pub async fn set_language(&self, language: Language) -> WorkspaceSnapshot {
        let mut ws = self.inner.lock().await;
        ws.set_language(language);
        ws.snapshot()
    }

    pub async fn new_chat(&self) -> WorkspaceSnapshot {
        let mut ws = self.inner.lock().await;
        ws.new_chat();
        debug!("Workspace for {} reset", self.user_id);
        ws.snapshot()
    }

    /// The localized text for an error returned by one of these flows. Port failures
    /// have already set the banner, so that is what they read as.
    pub async fn describe(&self, error: &WorkspaceError) -> String {
        let ws = self.inner.lock().await;
        match (error, ws.error_message()) {
            (WorkspaceError::Port(_), Some(banner)) => banner.to_string(),
            (WorkspaceError::Port(e), None) => e.to_string(),
            _ => ws.message_for(error, ""),
        }
    }

    //-------------------------------------------------------------------------------------
    // Assessment
    //-------------------------------------------------------------------------------------

    /// Records one quiz answer. The final answer persists the result before the
    /// workspace moves on to ingestion.
    pub async fn answer(&self, ctx: &ServiceContext, option: u8) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let step = self.inner.lock().await.select_answer(option)?;

        if let AssessmentStep::Complete(result) = step {
            if let Err(e) = ctx.db.save_assessment(&result).await {
                error!("Failed to save assessment for {}: {}", self.user_id, e);
                self.inner.lock().await.assessment_save_failed();
                return Err(e.into());
            }
            info!(
                "User {} completed the assessment as {}",
                self.user_id,
                result.skill_level().as_str()
            );
            self.inner.lock().await.complete_assessment(&result);
        }

        Ok(self.snapshot().await)
    }

    //-------------------------------------------------------------------------------------
    // Ingestion and history
    //-------------------------------------------------------------------------------------

    /// Validates, parses, stores and records a new upload, then refreshes the history.
    pub async fn ingest(&self, ctx: &ServiceContext, file: IncomingFile) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let (ticket, format) = self.inner.lock().await.begin_upload(&file)?;
        info!(
            "Ingesting {} ({} bytes) for {}",
            file.file_name,
            file.data.len(),
            self.user_id
        );

        match ingest_chain(ctx, self.user_id, format, file).await {
            Ok(outcome) => {
                let mut ws = self.inner.lock().await;
                if !ws.finish_upload(ticket, outcome) {
                    debug!("Discarding stale upload result for {}", self.user_id);
                }
                Ok(ws.snapshot())
            }
            Err(e) => Err(self.fail(ticket, e).await),
        }
    }

    /// Re-fetches a stored upload and makes it the current dataset. No new history
    /// entry is created.
    pub async fn select_history(&self, ctx: &ServiceContext, upload_id: Uuid) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let ticket = self.inner.lock().await.begin_select()?;

        match fetch_upload(ctx, self.user_id, upload_id).await {
            Ok((upload, dataset)) => {
                let mut ws = self.inner.lock().await;
                if !ws.finish_select(ticket, upload, dataset) {
                    debug!("Discarding stale history selection for {}", self.user_id);
                }
                Ok(ws.snapshot())
            }
            Err(e) => Err(self.fail(ticket, e).await),
        }
    }

    pub async fn refresh_history(&self, ctx: &ServiceContext) -> Result<Vec<UploadSession>, WorkspaceError> {
        match ctx.db.list_upload_sessions(self.user_id).await {
            Ok(history) => {
                self.inner.lock().await.set_history(history.clone());
                Ok(history)
            }
            Err(e) => {
                warn!("Failed to list upload history for {}: {}", self.user_id, e);
                self.inner.lock().await.history_load_failed();
                Err(e.into())
            }
        }
    }

    /// Deletes the record and its stored object, drops it from the panel, then re-lists.
    /// The currently loaded dataset stays on screen even if it came from the deleted entry.
    pub async fn delete_history(&self, ctx: &ServiceContext, upload_id: Uuid) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let removed = match delete_upload(ctx, self.user_id, upload_id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to delete upload {} for {}: {}", upload_id, self.user_id, e);
                self.inner.lock().await.history_load_failed();
                return Err(e.into());
            }
        };
        self.inner.lock().await.remove_history_entry(upload_id);
        info!("Deleted upload {} for {}", upload_id, self.user_id);

        if let Err(e) = ctx.storage.delete_object(&removed.storage_key).await {
            warn!("Failed to delete stored object {}: {}", removed.storage_key, e);
        }

        // The local removal stands even if the re-list fails.
        let _ = self.refresh_history(ctx).await;
        Ok(self.snapshot().await)
    }

    //-------------------------------------------------------------------------------------
    // Table
    //-------------------------------------------------------------------------------------

    pub async fn table_page(&self) -> Result<TablePage, WorkspaceError> {
        self.inner.lock().await.table_page()
    }

    pub async fn apply_table(&self, action: TableAction) -> Result<TablePage, WorkspaceError> {
        self.inner.lock().await.apply_table(action)
    }

    //-------------------------------------------------------------------------------------
    // Training
    //-------------------------------------------------------------------------------------

    /// Runs a training to completion and returns the settled workspace.
    pub async fn train(&self, ctx: &ServiceContext) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let (ticket, request) = self.begin_training(ctx).await?;
        Ok(self.run_training(ctx, ticket, request).await)
    }

    /// Starts a training in the background and returns the `Analyzing` workspace.
    /// Progress and the outcome are observed through later snapshots.
    pub async fn spawn_training(&self, ctx: &ServiceContext) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let (ticket, request) = self.begin_training(ctx).await?;
        let snapshot = self.snapshot().await;

        let handle = self.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            handle.run_training(&ctx, ticket, request).await;
        });
        Ok(snapshot)
    }

    async fn begin_training(&self, ctx: &ServiceContext) -> Result<(Ticket, AnalysisRequest), WorkspaceError> {
        let started = self.inner.lock().await.begin_training(ctx.settings.payload)?;
        info!("Training started for {}", self.user_id);
        Ok(started)
    }

    async fn run_training(&self, ctx: &ServiceContext, ticket: Ticket, request: AnalysisRequest) -> WorkspaceSnapshot {
        let sink = TicketedProgress {
            workspace: self.inner.clone(),
            ticket,
        };
        let result = ctx.analysis.analyze(&request, &sink).await;
        match &result {
            Ok(report) => info!(
                "Training finished for {} with {} images",
                self.user_id,
                report.image_urls.len()
            ),
            Err(e) => error!("Training failed for {}: {}", self.user_id, e),
        }

        let mut ws = self.inner.lock().await;
        if !ws.finish_training(ticket, result, &ctx.settings.assets_base_url) {
            debug!("Discarding stale training result for {}", self.user_id);
        }
        ws.snapshot()
    }

    async fn fail(&self, ticket: Ticket, error: WorkspaceError) -> WorkspaceError {
        warn!("{:?} failed for {}: {}", ticket.operation(), self.user_id, error);
        self.inner.lock().await.fail_operation(ticket, &error);
        error
    }
}

/// Forwards progress into the workspace only while its ticket is still current.
struct TicketedProgress {
    workspace: Arc<Mutex<TrainWorkspace>>,
    ticket: Ticket,
}

#[async_trait]
impl ProgressSink for TicketedProgress {
    async fn report(&self, progress: TrainingProgress) {
        let percent = progress.percent;
        if self.workspace.lock().await.report_progress(&self.ticket, progress) {
            debug!("Training progress {}%", percent);
        }
    }
}

async fn ingest_chain(
    ctx: &ServiceContext,
    user_id: Uuid,
    format: UploadFormat,
    file: IncomingFile,
) -> Result<IngestOutcome, WorkspaceError> {
    let dataset = parse_dataset(format, &file.data)?;
    let file_name = sanitize_file_name(&file.file_name).to_string();
    let key = storage_key(user_id, Uuid::new_v4(), &file_name);

    let stored = ctx.storage.put_object(&key, file.data).await?;
    let upload = ctx
        .db
        .create_upload_session(NewUploadSession {
            user_id,
            file_name,
            storage_key: stored.key,
            file_url: stored.url,
        })
        .await?;
    let history = ctx.db.list_upload_sessions(user_id).await?;

    Ok(IngestOutcome {
        upload,
        dataset,
        history,
    })
}

async fn delete_upload(ctx: &ServiceContext, user_id: Uuid, upload_id: Uuid) -> PortResult<UploadSession> {
    let upload = ctx.db.get_upload_session(user_id, upload_id).await?;
    ctx.db.delete_upload_session(user_id, upload_id).await?;
    Ok(upload)
}

async fn fetch_upload(
    ctx: &ServiceContext,
    user_id: Uuid,
    upload_id: Uuid,
) -> Result<(UploadSession, ParsedDataset), WorkspaceError> {
    let upload = ctx.db.get_upload_session(user_id, upload_id).await?;
    let format = UploadFormat::from_file_name(&upload.file_name).ok_or(ValidationError::InvalidFormat)?;
    let data = ctx.storage.get_object(&upload.storage_key).await?;
    let dataset = parse_dataset(format, &data)?;
    Ok((upload, dataset))
}
