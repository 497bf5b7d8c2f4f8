pub mod assessment;
pub mod context;
pub mod credentials;
pub mod domain;
pub mod flows;
pub mod i18n;
pub mod ingestion;
pub mod memory;
pub mod ports;
pub mod registry;
pub mod session;
pub mod table;
pub mod training;
pub mod workspace;

pub use context::{AnalysisPayload, ServiceContext, WorkflowSettings};
pub use domain::{
    AnalysisReport, AssessmentResult, ParsedDataset, SkillLevel, UploadSession, User,
    UserCredentials,
};
pub use flows::WorkspaceHandle;
pub use i18n::{translations, Language, Translations};
pub use ports::{
    AnalysisRequest, AnalysisService, DatabaseService, InlineRows, ObjectStorage, PortError,
    PortResult, ProgressSink, StoredObject,
};
pub use registry::WorkspaceRegistry;
pub use session::{SessionEvent, SessionEvents};
pub use workspace::{WorkspaceError, WorkspaceSnapshot};
