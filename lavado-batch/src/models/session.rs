//! Upload-session state machine model
//!
//! One `BatchSession` exists per active upload session. The workflow state
//! is a single tagged value; every derived flag (can submit, is busy) is a
//! pure function of it, so nothing can drift out of sync. A new file
//! selection always resets to `Select`.

use crate::models::{AnalysisJob, AnalysisResult, FileValidationResult, UploadedFile};
use crate::pricing::CostEstimate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single authoritative workflow state.
#[derive(Debug, Clone)]
pub enum OrchestratorState {
    /// Waiting for a file selection (or recovering from a failure)
    Select,
    /// File validated and priced; submission gated on columns and balance
    Validated {
        validation: FileValidationResult,
        estimate: CostEstimate,
    },
    /// Job submitted; polling for the result
    Processing { job: AnalysisJob },
    /// Terminal artifact retrieved
    Results { result: AnalysisResult },
}

impl OrchestratorState {
    pub fn kind(&self) -> StateKind {
        match self {
            OrchestratorState::Select => StateKind::Select,
            OrchestratorState::Validated { .. } => StateKind::Validated,
            OrchestratorState::Processing { .. } => StateKind::Processing,
            OrchestratorState::Results { .. } => StateKind::Results,
        }
    }
}

/// Discriminant of `OrchestratorState`, for transition records and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Select,
    Validated,
    Processing,
    Results,
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: StateKind,
    pub new_state: StateKind,
    pub transitioned_at: DateTime<Utc>,
}

/// Severity of the status message accompanying the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Success,
    Error,
    Warning,
}

/// Single human-readable status line tied to the current state. Each new
/// message replaces the previous one; error messages persist until the
/// user acts, success messages may be auto-dismissed by the view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }
}

/// One upload session: workflow state plus the orthogonal status message
/// and the selected file.
#[derive(Debug, Clone)]
pub struct BatchSession {
    pub session_id: Uuid,
    pub state: OrchestratorState,
    pub status: Option<StatusMessage>,
    pub file: Option<UploadedFile>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl BatchSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: OrchestratorState::Select,
            status: None,
            file: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state, stamping `ended_at` on `Results`.
    pub fn transition_to(&mut self, new_state: OrchestratorState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state.kind(),
            new_state: new_state.kind(),
            transitioned_at: Utc::now(),
        };

        tracing::debug!(
            session_id = %self.session_id,
            old_state = ?transition.old_state,
            new_state = ?transition.new_state,
            "Session state transition"
        );

        if matches!(new_state, OrchestratorState::Results { .. }) {
            self.ended_at = Some(Utc::now());
        }
        self.state = new_state;
        transition
    }

    /// Replace the current status message.
    pub fn set_status(&mut self, status: StatusMessage) {
        self.status = Some(status);
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Whether a result has been retrieved for this session.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, OrchestratorState::Results { .. })
    }
}

impl Default for BatchSession {
    fn default() -> Self {
        Self::new()
    }
}
