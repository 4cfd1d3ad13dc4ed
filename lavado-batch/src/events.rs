//! Workflow events
//!
//! The orchestrator broadcasts `AnalysisEvent`s over a
//! `tokio::sync::broadcast` channel. Views (the CLI progress renderer, a
//! future web frontend) subscribe and render; nothing below the
//! orchestrator mutates view state directly.

use crate::models::StateKind;
use crate::progress::AnalysisStage;
use lavado_common::Cents;
use serde::Serialize;
use uuid::Uuid;

/// Events emitted during one batch-analysis session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// A file was selected and a fresh session started
    SessionStarted { session_id: Uuid, file_name: String },

    /// Server-side structural validation succeeded
    FileValidated {
        session_id: Uuid,
        row_count: u64,
        column_count: usize,
    },

    /// Tiered price computed for the validated row count
    CostEstimated {
        session_id: Uuid,
        transaction_count: u64,
        total_cost: Cents,
    },

    /// Upload byte progress, 0-100. Feeds the `uploading` stage only;
    /// distinct from ML-stage progress.
    UploadProgress { session_id: Uuid, percent: u8 },

    /// The submit endpoint accepted the batch
    JobSubmitted { session_id: Uuid, job_id: String },

    /// The backend reported a later pipeline stage
    StageChanged {
        session_id: Uuid,
        stage: AnalysisStage,
        progress_percent: u8,
    },

    /// Terminal artifact retrieved; session is in `Results`
    AnalysisCompleted { session_id: Uuid, job_id: String },

    /// The workflow failed; `state` is where the session ended up
    AnalysisFailed {
        session_id: Uuid,
        state: StateKind,
        error: String,
    },

    /// The session was reset to `Select`, discarding prior state
    SessionReset { session_id: Uuid, reason: String },
}

impl AnalysisEvent {
    /// Session the event belongs to, for stale-event filtering in views.
    pub fn session_id(&self) -> Uuid {
        match self {
            AnalysisEvent::SessionStarted { session_id, .. }
            | AnalysisEvent::FileValidated { session_id, .. }
            | AnalysisEvent::CostEstimated { session_id, .. }
            | AnalysisEvent::UploadProgress { session_id, .. }
            | AnalysisEvent::JobSubmitted { session_id, .. }
            | AnalysisEvent::StageChanged { session_id, .. }
            | AnalysisEvent::AnalysisCompleted { session_id, .. }
            | AnalysisEvent::AnalysisFailed { session_id, .. }
            | AnalysisEvent::SessionReset { session_id, .. } => *session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let id = Uuid::new_v4();
        let event = AnalysisEvent::StageChanged {
            session_id: id,
            stage: AnalysisStage::MlSupervised,
            progress_percent: 30,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage_changed");
        assert_eq!(json["stage"], "ml_supervised");
        assert_eq!(json["progress_percent"], 30);
    }

    #[test]
    fn session_id_accessor_covers_variants() {
        let id = Uuid::new_v4();
        let event = AnalysisEvent::SessionReset {
            session_id: id,
            reason: "new file selected".to_string(),
        };
        assert_eq!(event.session_id(), id);
    }
}
