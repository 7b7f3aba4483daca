/// Recovery: the reconstruction engine and its report types
pub mod engine;
pub mod report;

pub use engine::{reconstruct, take_payload, RecoveryConfig, RecoveryEngine, RecoveryProgress};
pub use report::{FailedRecovery, RecoveredFile, RecoveryReport};
