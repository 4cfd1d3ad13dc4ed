//! Analysis stage sequence and progress tracking
//!
//! The backend pipeline reports seven stages in a fixed order. Each stage
//! has a display watermark so the portal can render determinate progress
//! even when the backend only signals stage names. Duplicate or
//! out-of-order signals never move progress backward.

use serde::{Deserialize, Serialize};

/// One named phase of the external ML pipeline, in pipeline order.
///
/// `Ord` follows pipeline order, so later stages compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Uploading,
    Validating,
    MlSupervised,
    MlUnsupervised,
    MlReinforcement,
    GeneratingReport,
    Complete,
}

impl AnalysisStage {
    /// Fixed pipeline sequence.
    pub const SEQUENCE: [AnalysisStage; 7] = [
        AnalysisStage::Uploading,
        AnalysisStage::Validating,
        AnalysisStage::MlSupervised,
        AnalysisStage::MlUnsupervised,
        AnalysisStage::MlReinforcement,
        AnalysisStage::GeneratingReport,
        AnalysisStage::Complete,
    ];

    /// Display progress watermark for this stage (strictly increasing
    /// across the sequence).
    pub fn watermark(self) -> u8 {
        match self {
            AnalysisStage::Uploading => 5,
            AnalysisStage::Validating => 15,
            AnalysisStage::MlSupervised => 30,
            AnalysisStage::MlUnsupervised => 55,
            AnalysisStage::MlReinforcement => 75,
            AnalysisStage::GeneratingReport => 90,
            AnalysisStage::Complete => 100,
        }
    }

    /// Human-readable stage label for status lines.
    pub fn label(self) -> &'static str {
        match self {
            AnalysisStage::Uploading => "Uploading batch",
            AnalysisStage::Validating => "Validating transactions",
            AnalysisStage::MlSupervised => "Supervised classification",
            AnalysisStage::MlUnsupervised => "Unsupervised anomaly detection",
            AnalysisStage::MlReinforcement => "Reinforcement scoring",
            AnalysisStage::GeneratingReport => "Generating report",
            AnalysisStage::Complete => "Complete",
        }
    }

    /// Parse a backend stage signal (snake_case wire string).
    pub fn parse_signal(signal: &str) -> Option<AnalysisStage> {
        match signal.trim().to_ascii_lowercase().as_str() {
            "uploading" => Some(AnalysisStage::Uploading),
            "validating" => Some(AnalysisStage::Validating),
            "ml_supervised" => Some(AnalysisStage::MlSupervised),
            "ml_unsupervised" => Some(AnalysisStage::MlUnsupervised),
            "ml_reinforcement" => Some(AnalysisStage::MlReinforcement),
            "generating_report" => Some(AnalysisStage::GeneratingReport),
            "complete" => Some(AnalysisStage::Complete),
            _ => None,
        }
    }
}

/// Tracks the currently active stage and display progress for one job.
///
/// Stage signals may arrive duplicated or out of order (the backend is
/// polled, not streamed). The tracker only ever moves forward: both the
/// stage and the percentage take `max(current, incoming)`.
#[derive(Debug, Clone)]
pub struct StageProgressTracker {
    current: AnalysisStage,
    percent: u8,
}

impl StageProgressTracker {
    pub fn new() -> Self {
        Self {
            current: AnalysisStage::Uploading,
            percent: 0,
        }
    }

    /// Apply a stage signal. Returns true when the visible state changed.
    pub fn observe(&mut self, stage: AnalysisStage) -> bool {
        let mut changed = false;
        if stage > self.current {
            self.current = stage;
            changed = true;
        }
        let watermark = self.current.watermark();
        if watermark > self.percent {
            self.percent = watermark;
            changed = true;
        }
        changed
    }

    /// Apply an explicit percentage signal from the backend. Clamped to
    /// 100; never regresses.
    pub fn observe_percent(&mut self, percent: u8) -> bool {
        let incoming = percent.min(100);
        if incoming > self.percent {
            self.percent = incoming;
            true
        } else {
            false
        }
    }

    pub fn current_stage(&self) -> AnalysisStage {
        self.current
    }

    pub fn progress_percent(&self) -> u8 {
        self.percent
    }

    /// Whether `stage` has already been passed (strictly before the
    /// current one).
    pub fn is_stage_past(&self, stage: AnalysisStage) -> bool {
        stage < self.current
    }

    pub fn is_complete(&self) -> bool {
        self.current == AnalysisStage::Complete
    }
}

impl Default for StageProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
