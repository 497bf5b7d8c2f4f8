//! crates/muneccim_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::assessment::{classify, QUESTION_COUNT};

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// One previously uploaded dataset file, re-selectable from the history panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to record a new upload. The id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUploadSession {
    pub user_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub file_url: String,
}

/// Coarse self-assessed proficiency, derived from the quiz answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "advanced" => Some(SkillLevel::Advanced),
            _ => None,
        }
    }
}

/// A user's completed assessment. The skill level is always derived from the answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentResult {
    pub user_id: Uuid,
    answers: [u8; QUESTION_COUNT],
    skill_level: SkillLevel,
}

impl AssessmentResult {
    pub fn new(user_id: Uuid, answers: [u8; QUESTION_COUNT]) -> Self {
        Self {
            user_id,
            answers,
            skill_level: classify(&answers),
        }
    }

    pub fn answers(&self) -> &[u8; QUESTION_COUNT] {
        &self.answers
    }

    pub fn skill_level(&self) -> SkillLevel {
        self.skill_level
    }
}

/// A single dataset record, keyed by column name. Values are kept as raw text.
pub type Record = BTreeMap<String, String>;

/// Rows parsed from an uploaded file, together with the header-derived column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl ParsedDataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What the analysis backend produced for one training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub narrative: String,
    pub image_urls: Vec<String>,
}
