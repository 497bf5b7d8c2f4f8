//! crates/muneccim_core/src/memory.rs
//!
//! In-process implementations of the ports. They back the workflow tests and the HTTP
//! router tests, and behave like the real adapters where it matters: lookups are scoped
//! by user, history is newest first, and a missing row is `NotFound`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::{
    AnalysisReport, AssessmentResult, NewUploadSession, UploadSession, User, UserCredentials,
};
use crate::ports::{
    AnalysisRequest, AnalysisService, DatabaseService, ObjectStorage, PortError, PortResult,
    ProgressSink, StoredObject,
};
use crate::training::TrainingProgress;

fn poisoned() -> PortError {
    PortError::Unexpected("in-memory store lock poisoned".to_string())
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    uploads: Vec<UploadSession>,
    assessments: HashMap<Uuid, AssessmentResult>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    fail_history: Mutex<bool>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every history read and write fail until switched back.
    pub fn set_history_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.fail_history.lock() {
            *flag = failing;
        }
    }

    fn check_history(&self) -> PortResult<()> {
        match self.fail_history.lock() {
            Ok(flag) if *flag => Err(PortError::Unexpected("history store unavailable".to_string())),
            Ok(_) => Ok(()),
            Err(_) => Err(poisoned()),
        }
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        if tables.users.iter().any(|user| user.email == email) {
            return Err(PortError::Conflict(format!("email {} already registered", email)));
        }
        let credentials = UserCredentials {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id,
            email: credentials.email.clone(),
        };
        tables.users.push(credentials);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        tables
            .users
            .iter()
            .find(|user| user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("user {}", email)))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        tables
            .users
            .iter()
            .find(|user| user.user_id == user_id)
            .map(|user| User {
                user_id: user.user_id,
                email: user.email.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        tables
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        match tables.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        tables.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn create_upload_session(&self, upload: NewUploadSession) -> PortResult<UploadSession> {
        self.check_history()?;
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let session = UploadSession {
            id: Uuid::new_v4(),
            user_id: upload.user_id,
            file_name: upload.file_name,
            storage_key: upload.storage_key,
            file_url: upload.file_url,
            created_at: Utc::now(),
        };
        tables.uploads.push(session.clone());
        Ok(session)
    }

    async fn list_upload_sessions(&self, user_id: Uuid) -> PortResult<Vec<UploadSession>> {
        self.check_history()?;
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        // Insertion order breaks timestamp ties so the newest upload always comes first.
        Ok(tables
            .uploads
            .iter()
            .rev()
            .filter(|upload| upload.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_upload_session(&self, user_id: Uuid, upload_id: Uuid) -> PortResult<UploadSession> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        tables
            .uploads
            .iter()
            .find(|upload| upload.id == upload_id && upload.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("upload session {}", upload_id)))
    }

    async fn delete_upload_session(&self, user_id: Uuid, upload_id: Uuid) -> PortResult<()> {
        self.check_history()?;
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let before = tables.uploads.len();
        tables
            .uploads
            .retain(|upload| !(upload.id == upload_id && upload.user_id == user_id));
        if tables.uploads.len() == before {
            return Err(PortError::NotFound(format!("upload session {}", upload_id)));
        }
        Ok(())
    }

    async fn get_assessment(&self, user_id: Uuid) -> PortResult<Option<AssessmentResult>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables.assessments.get(&user_id).cloned())
    }

    async fn save_assessment(&self, result: &AssessmentResult) -> PortResult<()> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        tables.assessments.insert(result.user_id, result.clone());
        Ok(())
    }
}

//=========================================================================================
// Object storage
//=========================================================================================

/// With a gate, `put_object` waits for `release` before writing.
pub struct InMemoryStorage {
    base_url: String,
    objects: Mutex<HashMap<String, Bytes>>,
    gate: Option<Notify>,
}

impl InMemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put_object(&self, key: &str, data: Bytes) -> PortResult<StoredObject> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut objects = self.objects.lock().map_err(|_| poisoned())?;
        objects.insert(key.to_string(), data);
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{}", self.base_url.trim_end_matches('/'), key),
        })
    }

    async fn get_object(&self, key: &str) -> PortResult<Bytes> {
        let objects = self.objects.lock().map_err(|_| poisoned())?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("object {}", key)))
    }

    async fn delete_object(&self, key: &str) -> PortResult<()> {
        let mut objects = self.objects.lock().map_err(|_| poisoned())?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("object {}", key)))
    }
}

//=========================================================================================
// Analysis
//=========================================================================================

/// Replays fixed progress reports, then answers with a fixed outcome.
/// With a gate, the answer is held back until `release` is called.
pub struct ScriptedAnalysis {
    progress: Vec<TrainingProgress>,
    outcome: Mutex<Option<PortResult<AnalysisReport>>>,
    gate: Option<Notify>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedAnalysis {
    pub fn succeeding(report: AnalysisReport) -> Self {
        Self::with_outcome(Ok(report))
    }

    pub fn failing(error: PortError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: PortResult<AnalysisReport>) -> Self {
        Self {
            progress: Vec::new(),
            outcome: Mutex::new(Some(outcome)),
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_progress(mut self, progress: Vec<TrainingProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    /// Lets a gated analysis finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressSink,
    ) -> PortResult<AnalysisReport> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        for report in &self.progress {
            progress.report(report.clone()).await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        // Keep the outcome for repeated runs.
        let mut outcome = self.outcome.lock().map_err(|_| poisoned())?;
        match outcome.take() {
            Some(Ok(report)) => {
                *outcome = Some(Ok(report.clone()));
                Ok(report)
            }
            Some(Err(error)) => {
                *outcome = Some(Err(copy_error(&error)));
                Err(error)
            }
            None => Err(PortError::Unexpected("no scripted outcome".to_string())),
        }
    }
}

fn copy_error(error: &PortError) -> PortError {
    match error {
        PortError::NotFound(what) => PortError::NotFound(what.clone()),
        PortError::Conflict(what) => PortError::Conflict(what.clone()),
        PortError::Unauthorized => PortError::Unauthorized,
        PortError::Remote { status, detail } => PortError::Remote {
            status: *status,
            detail: detail.clone(),
        },
        PortError::Unexpected(what) => PortError::Unexpected(what.clone()),
    }
}
