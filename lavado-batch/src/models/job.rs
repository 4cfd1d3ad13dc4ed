//! Analysis job, result, and balance models

use crate::progress::AnalysisStage;
use chrono::{DateTime, Utc};
use lavado_common::Cents;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A server-side analysis job, as seen by the client. Created on
/// successful submission; at most one is active per orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Backend job identifier (`analysis_id` on the wire)
    pub job_id: String,
    /// Client session the job belongs to; poll responses carrying a
    /// different session are stale and discarded
    pub session_id: Uuid,
    /// Last known pipeline stage; only ever moves forward
    pub stage: AnalysisStage,
    /// Displayed progress, 0-100
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(job_id: String, session_id: Uuid) -> Self {
        Self {
            job_id,
            session_id,
            stage: AnalysisStage::Uploading,
            progress_percent: AnalysisStage::Uploading.watermark(),
            created_at: Utc::now(),
        }
    }

    /// Advance to a later stage. Out-of-order signals are ignored; the
    /// stage sequence is monotone.
    pub fn advance(&mut self, stage: AnalysisStage) {
        if stage > self.stage {
            self.stage = stage;
        }
        let watermark = self.stage.watermark();
        if watermark > self.progress_percent {
            self.progress_percent = watermark;
        }
    }

    /// Apply a stage and percentage pair from a poll tick. The percentage
    /// may exceed the stage watermark; neither value ever regresses.
    pub fn apply_progress(&mut self, stage: AnalysisStage, percent: u8) {
        self.advance(stage);
        let incoming = percent.min(100);
        if incoming > self.progress_percent {
            self.progress_percent = incoming;
        }
    }
}

/// Terminal artifact of a completed analysis. Fetched at most once; after
/// the first successful retrieval polling stops.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub job_id: String,
    /// Risk-classified report bytes as returned by the result endpoint
    pub payload: Vec<u8>,
}

/// Current account balance as reported by the billing collaborator.
///
/// Read-mostly: refreshed before submission checks and after a completed
/// analysis, never decremented locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountBalance {
    pub balance: Cents,
    pub fetched_at: DateTime<Utc>,
}

impl AccountBalance {
    pub fn new(balance: Cents) -> Self {
        Self {
            balance,
            fetched_at: Utc::now(),
        }
    }
}
