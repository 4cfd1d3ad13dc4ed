//! Batch analysis orchestration
//!
//! `BatchOrchestrator` composes the leaf services into the single
//! authoritative workflow: `Select → Validated → Processing → Results`.
//! It owns all transition rules and error recovery; the leaf components
//! only return values or fail with typed errors. Phases for one session
//! are strictly sequential (validate, then submit, then poll) and at most
//! one analysis job is active at a time.
//!
//! The orchestrator is generic over the four collaborator ports, so views
//! drive it against HTTP clients and tests drive it against fakes.

use crate::config::BatchConfig;
use crate::error::AnalysisError;
use crate::events::AnalysisEvent;
use crate::models::{
    AccountBalance, AnalysisJob, AnalysisResult, BatchSession, OrchestratorState,
    RequiredColumnSet, StatusMessage, UploadedFile,
};
use crate::pricing;
use crate::progress::{AnalysisStage, StageProgressTracker};
use crate::services::{
    check_affordability, ColumnValidator, FetchBalance, FetchResult, ResultPoller, SubmitAnalysis,
    ValidateFile,
};
use lavado_common::Cents;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The client-driven batch analysis workflow.
pub struct BatchOrchestrator<V, S, B, R> {
    column_validator: ColumnValidator,
    validation_client: V,
    submission_client: S,
    billing_client: B,
    result_client: R,
    poller: ResultPoller,
    session: BatchSession,
    balance: Option<AccountBalance>,
    event_tx: broadcast::Sender<AnalysisEvent>,
    cancel: CancellationToken,
}

impl<V, S, B, R> BatchOrchestrator<V, S, B, R>
where
    V: ValidateFile,
    S: SubmitAnalysis,
    B: FetchBalance,
    R: FetchResult,
{
    pub fn new(
        validation_client: V,
        submission_client: S,
        billing_client: B,
        result_client: R,
        config: &BatchConfig,
        event_tx: broadcast::Sender<AnalysisEvent>,
    ) -> Self {
        Self {
            column_validator: ColumnValidator::default(),
            validation_client,
            submission_client,
            billing_client,
            result_client,
            poller: ResultPoller::from_config(config),
            session: BatchSession::new(),
            balance: None,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the required-column contract (tests, staging backends).
    pub fn with_required_columns(mut self, required: RequiredColumnSet) -> Self {
        self.column_validator = ColumnValidator::new(required);
        self
    }

    pub fn session(&self) -> &BatchSession {
        &self.session
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.session.state
    }

    /// Last fetched balance, if any. Display-only; the billing backend
    /// owns the authoritative value.
    pub fn balance(&self) -> Option<Cents> {
        self.balance.map(|b| b.balance)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.event_tx.subscribe()
    }

    /// Refetch the balance from the billing collaborator.
    pub async fn refresh_balance(&mut self) -> Result<Cents, AnalysisError> {
        let balance = self.billing_client.fetch_balance().await?;
        self.balance = Some(AccountBalance::new(balance));
        Ok(balance)
    }

    /// Select a file for analysis. Unconditionally resets to `Select`
    /// first (cancelling any in-flight poll), then runs server-side
    /// validation and prices the batch.
    ///
    /// On success the session is in `Validated`; on failure it stays in
    /// `Select` with a persistent error status.
    pub async fn select_file(&mut self, file: UploadedFile) -> Result<(), AnalysisError> {
        self.reset_session("new file selected");

        let session_id = self.session.session_id;
        self.session.file = Some(file.clone());
        let _ = self.event_tx.send(AnalysisEvent::SessionStarted {
            session_id,
            file_name: file.name.clone(),
        });

        tracing::info!(
            session_id = %session_id,
            file = %file.name,
            size_bytes = file.size_bytes,
            "File selected, running validation"
        );

        let validation = match self.validation_client.validate(&file).await {
            Ok(validation) => validation,
            Err(e) => {
                self.session.set_status(StatusMessage::error(e.to_string()));
                let _ = self.event_tx.send(AnalysisEvent::AnalysisFailed {
                    session_id,
                    state: self.session.state.kind(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let _ = self.event_tx.send(AnalysisEvent::FileValidated {
            session_id,
            row_count: validation.row_count,
            column_count: validation.detected_columns.len(),
        });

        // Price is a pure function of the validated row count; recomputed
        // here, never carried over from a previous file.
        let estimate = pricing::estimate(validation.row_count);
        let _ = self.event_tx.send(AnalysisEvent::CostEstimated {
            session_id,
            transaction_count: estimate.transaction_count,
            total_cost: estimate.total_cost,
        });

        tracing::info!(
            session_id = %session_id,
            row_count = validation.row_count,
            total_cost = %estimate.total_cost,
            "File validated and priced"
        );

        self.session.transition_to(OrchestratorState::Validated {
            validation,
            estimate,
        });

        if let Err(e) = self.refresh_balance().await {
            tracing::warn!(session_id = %session_id, error = %e, "Balance fetch failed");
            self.session.set_status(StatusMessage::warning(format!(
                "Could not fetch account balance: {}",
                e
            )));
            return Ok(());
        }

        self.evaluate_submission_gates();
        Ok(())
    }

    /// What currently blocks submission, if anything. Pure function of the
    /// session state and the last fetched balance.
    pub fn submission_block(&self) -> Option<AnalysisError> {
        let (validation, estimate) = match &self.session.state {
            OrchestratorState::Validated {
                validation,
                estimate,
            } => (validation, estimate),
            _ => {
                return Some(AnalysisError::InvalidState(
                    "submission requires a validated file".to_string(),
                ))
            }
        };

        let report = self.column_validator.validate(&validation.detected_columns);
        if !report.is_complete() {
            return Some(AnalysisError::MissingColumns {
                missing: report.missing,
            });
        }

        match self.balance {
            Some(balance) => {
                let check = check_affordability(estimate.total_cost, balance.balance);
                if !check.affordable {
                    return Some(AnalysisError::InsufficientFunds {
                        shortfall: check.shortfall,
                    });
                }
                None
            }
            None => Some(AnalysisError::InvalidState(
                "account balance not loaded".to_string(),
            )),
        }
    }

    /// Derived, never stored: submission is allowed iff the session is
    /// `Validated` and nothing blocks it.
    pub fn can_submit(&self) -> bool {
        self.submission_block().is_none()
    }

    /// Submit the validated batch for analysis. On success the session is
    /// in `Processing`; on failure it stays in `Validated` so the user can
    /// retry or pick another file.
    pub async fn submit(&mut self) -> Result<(), AnalysisError> {
        if let Some(block) = self.submission_block() {
            self.session
                .set_status(StatusMessage::error(block.to_string()));
            let _ = self.event_tx.send(AnalysisEvent::AnalysisFailed {
                session_id: self.session.session_id,
                state: self.session.state.kind(),
                error: block.to_string(),
            });
            return Err(block);
        }

        let file = match &self.session.file {
            Some(file) => file.clone(),
            None => {
                return Err(AnalysisError::InvalidState(
                    "no file selected".to_string(),
                ))
            }
        };
        let session_id = self.session.session_id;

        match self.submission_client.submit(session_id, &file).await {
            Ok(job_id) => {
                let mut job = AnalysisJob::new(job_id.clone(), session_id);
                // The upload completed with the request itself.
                job.advance(AnalysisStage::Validating);

                let _ = self.event_tx.send(AnalysisEvent::JobSubmitted {
                    session_id,
                    job_id,
                });
                self.session
                    .transition_to(OrchestratorState::Processing { job });
                self.session
                    .set_status(StatusMessage::info("Analysis in progress"));
                Ok(())
            }
            Err(e) => {
                let e = self.enrich_shortfall(e);
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Submission failed, session stays validated"
                );
                self.session.set_status(StatusMessage::error(e.to_string()));
                let _ = self.event_tx.send(AnalysisEvent::AnalysisFailed {
                    session_id,
                    state: self.session.state.kind(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Poll until the result is ready and apply the outcome.
    ///
    /// On success the session is in `Results` and the balance is refetched
    /// from the billing backend (never decremented locally). On timeout or
    /// session expiry the session returns to `Select` with a persistent
    /// error status; the job may still finish server-side.
    pub async fn wait_for_result(&mut self) -> Result<(), AnalysisError> {
        let (job_id, mut tracker) = match &self.session.state {
            OrchestratorState::Processing { job } => {
                let mut tracker = StageProgressTracker::new();
                tracker.observe(job.stage);
                (job.job_id.clone(), tracker)
            }
            _ => {
                return Err(AnalysisError::InvalidState(
                    "no analysis in progress".to_string(),
                ))
            }
        };

        let session_id = self.session.session_id;
        let cancel = self.cancel.clone();
        // Stage signals are written back into the session's job as they
        // arrive, so the authoritative state never lags the events.
        let session = &mut self.session;
        let outcome = self
            .poller
            .poll(
                &self.result_client,
                session_id,
                &job_id,
                &mut tracker,
                &self.event_tx,
                &cancel,
                |stage, percent| {
                    if let OrchestratorState::Processing { job } = &mut session.state {
                        job.apply_progress(stage, percent);
                    }
                },
            )
            .await;

        self.finish_polling(session_id, outcome).await
    }

    /// Apply a poll outcome, discarding it when the session has been reset
    /// since the poll started (stale completion guard).
    pub(crate) async fn finish_polling(
        &mut self,
        session_id: Uuid,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> Result<(), AnalysisError> {
        if session_id != self.session.session_id {
            tracing::debug!(
                stale_session_id = %session_id,
                active_session_id = %self.session.session_id,
                "Discarding poll completion from a stale session"
            );
            return Ok(());
        }

        match outcome {
            Ok(result) => {
                let _ = self.event_tx.send(AnalysisEvent::AnalysisCompleted {
                    session_id,
                    job_id: result.job_id.clone(),
                });
                self.session
                    .transition_to(OrchestratorState::Results { result });
                self.session
                    .set_status(StatusMessage::success("Analysis complete"));

                // Reconcile with the billing backend's truth.
                if let Err(e) = self.refresh_balance().await {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "Post-analysis balance refresh failed"
                    );
                }
                Ok(())
            }
            // The session was reset while polling; nothing to apply.
            Err(AnalysisError::Cancelled) => Ok(()),
            Err(e) => {
                let _ = self.event_tx.send(AnalysisEvent::AnalysisFailed {
                    session_id,
                    state: crate::models::StateKind::Select,
                    error: e.to_string(),
                });
                self.session.transition_to(OrchestratorState::Select);
                self.session.file = None;
                self.session.set_status(StatusMessage::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Discard all file/job state and return to `Select`, cancelling any
    /// in-flight polling.
    pub fn start_new_analysis(&mut self) {
        self.reset_session("new analysis started");
    }

    fn reset_session(&mut self, reason: &str) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        let old_session_id = self.session.session_id;
        let _ = self.event_tx.send(AnalysisEvent::SessionReset {
            session_id: old_session_id,
            reason: reason.to_string(),
        });
        tracing::info!(
            session_id = %old_session_id,
            reason = reason,
            "Session reset"
        );
        self.session = BatchSession::new();
    }

    /// Set the `Validated` status line from the current gates.
    fn evaluate_submission_gates(&mut self) {
        match self.submission_block() {
            None => {
                if let OrchestratorState::Validated { estimate, .. } = &self.session.state {
                    self.session.set_status(StatusMessage::info(format!(
                        "{} transactions ready to submit for {}",
                        estimate.transaction_count, estimate.total_cost
                    )));
                }
            }
            Some(block) => {
                self.session
                    .set_status(StatusMessage::error(block.to_string()));
            }
        }
    }

    /// The submit endpoint's 402 carries no amount; fill in the locally
    /// computed shortfall when an estimate and balance are on hand.
    fn enrich_shortfall(&self, error: AnalysisError) -> AnalysisError {
        if let AnalysisError::InsufficientFunds { shortfall } = &error {
            if shortfall.is_zero() {
                if let (OrchestratorState::Validated { estimate, .. }, Some(balance)) =
                    (&self.session.state, self.balance)
                {
                    return AnalysisError::InsufficientFunds {
                        shortfall: estimate.total_cost.saturating_deficit(balance.balance),
                    };
                }
            }
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StateKind;
    use crate::services::PollResponse;

    struct NoopValidate;
    impl ValidateFile for NoopValidate {
        async fn validate(
            &self,
            _file: &UploadedFile,
        ) -> Result<crate::models::FileValidationResult, AnalysisError> {
            unreachable!("not used in these tests")
        }
    }

    struct NoopSubmit;
    impl SubmitAnalysis for NoopSubmit {
        async fn submit(
            &self,
            _session_id: Uuid,
            _file: &UploadedFile,
        ) -> Result<String, AnalysisError> {
            unreachable!("not used in these tests")
        }
    }

    struct FixedBalance(f64);
    impl FetchBalance for FixedBalance {
        async fn fetch_balance(&self) -> Result<Cents, AnalysisError> {
            Ok(Cents::from_dollars(self.0))
        }
    }

    struct NoopResult;
    impl FetchResult for NoopResult {
        async fn fetch_result(&self, _job_id: &str) -> Result<PollResponse, AnalysisError> {
            unreachable!("not used in these tests")
        }
    }

    /// Reports one stage signal and fires the cancel token, so the poll
    /// loop exits while the session is still in `Processing`.
    struct CancelAfterPending(CancellationToken);
    impl FetchResult for CancelAfterPending {
        async fn fetch_result(&self, _job_id: &str) -> Result<PollResponse, AnalysisError> {
            self.0.cancel();
            Ok(PollResponse::Pending {
                stage: Some(AnalysisStage::MlSupervised),
                progress_percent: None,
            })
        }
    }

    fn orchestrator() -> BatchOrchestrator<NoopValidate, NoopSubmit, FixedBalance, NoopResult> {
        let toml = lavado_common::config::TomlConfig {
            api_base_url: Some("https://api.test.example".to_string()),
            ..Default::default()
        };
        let config = BatchConfig::resolve(None, None, &toml).unwrap();
        let (event_tx, _rx) = broadcast::channel(64);
        BatchOrchestrator::new(
            NoopValidate,
            NoopSubmit,
            FixedBalance(1_000.0),
            NoopResult,
            &config,
            event_tx,
        )
    }

    #[tokio::test]
    async fn stale_poll_completion_is_discarded() {
        let mut orch = orchestrator();
        let stale_session = Uuid::new_v4();

        let outcome = Ok(AnalysisResult {
            job_id: "old-job".to_string(),
            payload: b"stale report".to_vec(),
        });
        orch.finish_polling(stale_session, outcome).await.unwrap();

        // The active session is untouched.
        assert_eq!(orch.state().kind(), StateKind::Select);
        assert!(orch.session().status.is_none());
    }

    #[tokio::test]
    async fn stale_poll_failure_is_discarded() {
        let mut orch = orchestrator();
        let stale_session = Uuid::new_v4();

        let result = orch
            .finish_polling(stale_session, Err(AnalysisError::PollTimeout { attempts: 150 }))
            .await;

        assert!(result.is_ok());
        assert_eq!(orch.state().kind(), StateKind::Select);
    }

    #[tokio::test]
    async fn cancelled_poll_applies_nothing() {
        let mut orch = orchestrator();
        let session_id = orch.session().session_id;

        let result = orch
            .finish_polling(session_id, Err(AnalysisError::Cancelled))
            .await;

        assert!(result.is_ok());
        assert_eq!(orch.state().kind(), StateKind::Select);
        assert!(orch.session().status.is_none());
    }

    #[tokio::test]
    async fn submit_from_select_is_rejected() {
        let mut orch = orchestrator();
        let result = orch.submit().await;
        assert!(matches!(result, Err(AnalysisError::InvalidState(_))));
        assert_eq!(orch.state().kind(), StateKind::Select);
    }

    #[tokio::test]
    async fn wait_for_result_from_select_is_rejected() {
        let mut orch = orchestrator();
        let result = orch.wait_for_result().await;
        assert!(matches!(result, Err(AnalysisError::InvalidState(_))));
    }

    #[tokio::test]
    async fn mid_poll_stage_is_written_back_into_processing_state() {
        let toml = lavado_common::config::TomlConfig {
            api_base_url: Some("https://api.test.example".to_string()),
            ..Default::default()
        };
        let config = BatchConfig::resolve(None, None, &toml).unwrap();
        let (event_tx, _rx) = broadcast::channel(64);

        let token = CancellationToken::new();
        let mut orch = BatchOrchestrator::new(
            NoopValidate,
            NoopSubmit,
            FixedBalance(1_000.0),
            CancelAfterPending(token.clone()),
            &config,
            event_tx,
        );
        orch.cancel = token;

        let job = AnalysisJob::new("job-1".to_string(), orch.session.session_id);
        orch.session
            .transition_to(OrchestratorState::Processing { job });

        orch.wait_for_result().await.unwrap();

        // The interrupted poll left the session in Processing, and the job
        // it holds reflects the stage reported before the interruption.
        match orch.state() {
            OrchestratorState::Processing { job } => {
                assert_eq!(job.stage, AnalysisStage::MlSupervised);
                assert_eq!(
                    job.progress_percent,
                    AnalysisStage::MlSupervised.watermark()
                );
            }
            other => panic!("expected Processing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn start_new_analysis_resets_session_id() {
        let mut orch = orchestrator();
        let first = orch.session().session_id;
        orch.start_new_analysis();
        assert_ne!(orch.session().session_id, first);
        assert_eq!(orch.state().kind(), StateKind::Select);
    }
}
