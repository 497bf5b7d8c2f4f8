//! crates/muneccim_core/src/context.rs
//!
//! The adapters and settings every workflow needs, bundled so they can be passed around
//! as one cheaply cloneable value.

use std::sync::Arc;

use crate::ports::{AnalysisService, DatabaseService, ObjectStorage};

/// Which request shape the analysis backend is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisPayload {
    /// Send the public URL of the stored file.
    #[default]
    FileUrl,
    /// Send the parsed rows inline.
    Inline,
}

impl AnalysisPayload {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "url" | "file_url" => Some(AnalysisPayload::FileUrl),
            "inline" | "data" => Some(AnalysisPayload::Inline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    /// Base URL that relative image references in analysis results are resolved against.
    pub assets_base_url: String,
    pub payload: AnalysisPayload,
}

#[derive(Clone)]
pub struct ServiceContext {
    pub db: Arc<dyn DatabaseService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub analysis: Arc<dyn AnalysisService>,
    pub settings: WorkflowSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_names() {
        assert_eq!(AnalysisPayload::parse("url"), Some(AnalysisPayload::FileUrl));
        assert_eq!(AnalysisPayload::parse(" Inline "), Some(AnalysisPayload::Inline));
        assert_eq!(AnalysisPayload::parse("base64"), None);
    }
}
