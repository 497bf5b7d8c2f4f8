pub mod analysis;
pub mod db;
pub mod simulated;
pub mod storage;

pub use analysis::RemoteAnalysisAdapter;
pub use db::DbAdapter;
pub use simulated::SimulatedAnalysisAdapter;
pub use storage::FsStorageAdapter;
