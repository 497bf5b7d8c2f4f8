//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muneccim_core::assessment::{MAX_OPTION, QUESTION_COUNT};
use muneccim_core::domain::{
    AssessmentResult, NewUploadSession, UploadSession, User, UserCredentials,
};
use muneccim_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// `RowNotFound` becomes `NotFound(what)`; everything else is unexpected.
fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct UploadSessionRecord {
    id: Uuid,
    user_id: Uuid,
    file_name: String,
    storage_key: String,
    file_url: String,
    created_at: DateTime<Utc>,
}
impl UploadSessionRecord {
    fn to_domain(self) -> UploadSession {
        UploadSession {
            id: self.id,
            user_id: self.user_id,
            file_name: self.file_name,
            storage_key: self.storage_key,
            file_url: self.file_url,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AssessmentRecord {
    user_id: Uuid,
    answers: Vec<i16>,
}
impl AssessmentRecord {
    /// The skill level column is informational; the level is always re-derived from the answers.
    fn to_domain(self) -> PortResult<AssessmentResult> {
        let answers = answers_from_column(self.user_id, &self.answers)?;
        Ok(AssessmentResult::new(self.user_id, answers))
    }
}

/// Every stored answer must be a valid option index and there must be exactly five.
fn answers_from_column(user_id: Uuid, column: &[i16]) -> PortResult<[u8; QUESTION_COUNT]> {
    let malformed = || PortError::Unexpected(format!("assessment for {} is malformed", user_id));
    let answers = column
        .iter()
        .map(|answer| {
            u8::try_from(*answer)
                .ok()
                .filter(|option| *option <= MAX_OPTION)
                .ok_or_else(malformed)
        })
        .collect::<PortResult<Vec<u8>>>()?;
    answers.try_into().map_err(|_| malformed())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("email {} already registered", email))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", email)))?;

        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT user_id, email FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", user_id)))?;

        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_upload_session(&self, upload: NewUploadSession) -> PortResult<UploadSession> {
        let record = sqlx::query_as::<_, UploadSessionRecord>(
            "INSERT INTO upload_sessions (id, user_id, file_name, storage_key, file_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, user_id, file_name, storage_key, file_url, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(upload.user_id)
        .bind(&upload.file_name)
        .bind(&upload.storage_key)
        .bind(&upload.file_url)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn list_upload_sessions(&self, user_id: Uuid) -> PortResult<Vec<UploadSession>> {
        let records = sqlx::query_as::<_, UploadSessionRecord>(
            "SELECT id, user_id, file_name, storage_key, file_url, created_at
             FROM upload_sessions WHERE user_id = $1
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_upload_session(&self, user_id: Uuid, upload_id: Uuid) -> PortResult<UploadSession> {
        let record = sqlx::query_as::<_, UploadSessionRecord>(
            "SELECT id, user_id, file_name, storage_key, file_url, created_at
             FROM upload_sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(upload_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Upload session {} not found", upload_id)))?;

        Ok(record.to_domain())
    }

    async fn delete_upload_session(&self, user_id: Uuid, upload_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM upload_sessions WHERE id = $1 AND user_id = $2")
            .bind(upload_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Upload session {} not found",
                upload_id
            )));
        }
        Ok(())
    }

    async fn get_assessment(&self, user_id: Uuid) -> PortResult<Option<AssessmentResult>> {
        let record = sqlx::query_as::<_, AssessmentRecord>(
            "SELECT user_id, answers FROM assessments WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => match record.to_domain() {
                Ok(result) => Ok(Some(result)),
                Err(e) => {
                    warn!("Ignoring malformed assessment: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save_assessment(&self, result: &AssessmentResult) -> PortResult<()> {
        let answers: Vec<i16> = result.answers().iter().map(|a| i16::from(*a)).collect();
        sqlx::query(
            "INSERT INTO assessments (user_id, answers, skill_level, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (user_id)
             DO UPDATE SET answers = EXCLUDED.answers, skill_level = EXCLUDED.skill_level, updated_at = NOW()",
        )
        .bind(result.user_id)
        .bind(answers)
        .bind(result.skill_level().as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_answers_convert_when_in_range() {
        let answers = answers_from_column(Uuid::nil(), &[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(answers, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_answers_are_malformed() {
        for column in [[0, 1, -1, 3, 4], [0, 1, 300, 3, 4], [0, 1, 5, 3, 4]] {
            assert!(matches!(
                answers_from_column(Uuid::nil(), &column),
                Err(PortError::Unexpected(_))
            ));
        }
    }

    #[test]
    fn wrong_answer_count_is_malformed() {
        assert!(matches!(
            answers_from_column(Uuid::nil(), &[1, 2, 3]),
            Err(PortError::Unexpected(_))
        ));
    }
}
