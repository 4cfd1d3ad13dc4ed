//! Workflow failure taxonomy
//!
//! Every collaborator returns failures as typed values; nothing below the
//! orchestrator mutates workflow state directly. The orchestrator decides
//! which state a failure leaves the session in.

use lavado_common::Cents;
use thiserror::Error;

/// Batch-analysis workflow errors
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// File failed structural validation. Recoverable in place: the user
    /// can pick a new file.
    #[error("File validation failed: {reason}")]
    FileInvalid { reason: String },

    /// Required columns absent from the uploaded file. Blocks submission.
    #[error("Missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// Estimated cost exceeds the account balance. Blocks submission until
    /// the balance changes externally.
    #[error("Insufficient funds: balance is short by {shortfall}")]
    InsufficientFunds { shortfall: Cents },

    /// The submit endpoint rejected the upload. Recoverable by resubmitting.
    #[error("Submission failed with status {status}: {body}")]
    SubmissionFailed { status: u16, body: String },

    /// Authentication failure; terminal for the session.
    #[error("Session expired; re-authentication required")]
    SessionExpired,

    /// Result never became available within the polling budget. The job may
    /// still complete server-side; the client stops waiting.
    #[error("No result after {attempts} polling attempts")]
    PollTimeout { attempts: u32 },

    /// Network-level failure outside the submit path.
    #[error("Network error: {0}")]
    Transport(String),

    /// The in-flight operation was cancelled (new file selection, explicit
    /// cancel, or shutdown).
    #[error("Operation cancelled")]
    Cancelled,

    /// An operation was requested from a workflow state that does not
    /// permit it (e.g. submit before validation).
    #[error("Operation not valid in current state: {0}")]
    InvalidState(String),
}

impl AnalysisError {
    /// Whether the user can act on this failure without re-authenticating.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AnalysisError::SessionExpired)
    }
}
