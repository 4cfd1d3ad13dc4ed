//! Domain models for the batch-analysis workflow

mod file;
mod job;
mod session;

pub use file::{FileValidationResult, RequiredColumnSet, UploadedFile};
pub use job::{AccountBalance, AnalysisJob, AnalysisResult};
pub use session::{
    BatchSession, OrchestratorState, StateKind, StateTransition, StatusLevel, StatusMessage,
};
