//! crates/muneccim_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database, object store and analysis backend.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::domain::{
    AnalysisReport, AssessmentResult, NewUploadSession, Record, UploadSession, User,
    UserCredentials,
};
use crate::training::TrainingProgress;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// A remote service answered with a non-success status.
    /// `detail` is only set when the body carried a plain string detail.
    #[error("Remote service returned {status}: {}", detail.as_deref().unwrap_or("<no detail>"))]
    Remote { status: u16, detail: Option<String> },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user id, or `Unauthorized` when missing or expired.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Upload History ---
    async fn create_upload_session(&self, upload: NewUploadSession) -> PortResult<UploadSession>;

    /// Lists the user's uploads, most recent first.
    async fn list_upload_sessions(&self, user_id: Uuid) -> PortResult<Vec<UploadSession>>;

    async fn get_upload_session(&self, user_id: Uuid, upload_id: Uuid)
        -> PortResult<UploadSession>;

    async fn delete_upload_session(&self, user_id: Uuid, upload_id: Uuid) -> PortResult<()>;

    // --- Assessments ---
    async fn get_assessment(&self, user_id: Uuid) -> PortResult<Option<AssessmentResult>>;

    /// Stores the result, replacing any previous one for the same user.
    async fn save_assessment(&self, result: &AssessmentResult) -> PortResult<()>;
}

/// Where an object landed after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Writes the bytes under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, data: Bytes) -> PortResult<StoredObject>;

    async fn get_object(&self, key: &str) -> PortResult<Bytes>;

    /// Removes the object. A missing key is `NotFound`.
    async fn delete_object(&self, key: &str) -> PortResult<()>;
}

/// The two request shapes the analysis backend has been called with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisRequest {
    FileUrl { file_url: String, file_name: String },
    Inline { data: InlineRows },
}

/// Dataset rows sent inline. Each row serializes as an object whose keys
/// follow the file's header order; absent cells are sent as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineRows {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl InlineRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for InlineRows {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&OrderedRow {
                columns: &self.columns,
                row,
            })?;
        }
        seq.end()
    }
}

struct OrderedRow<'a> {
    columns: &'a [String],
    row: &'a Record,
}

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            let value = self.row.get(column).map(String::as_str).unwrap_or("");
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Receives intermediate progress while an analysis runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: TrainingProgress);
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Runs one analysis to completion. There is no cancellation.
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressSink,
    ) -> PortResult<AnalysisReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_rows_keep_header_order() {
        let request = AnalysisRequest::Inline {
            data: InlineRows {
                columns: vec!["region".to_string(), "amount".to_string()],
                rows: vec![
                    Record::from([
                        ("region".to_string(), "north".to_string()),
                        ("amount".to_string(), "10".to_string()),
                    ]),
                    Record::from([("region".to_string(), "south".to_string())]),
                ],
            },
        };

        let body = serde_json::to_string(&request).unwrap();
        assert_eq!(
            body,
            r#"{"data":[{"region":"north","amount":"10"},{"region":"south","amount":""}]}"#
        );
    }
}
