//! Result polling
//!
//! After submission the result endpoint must be polled until the report is
//! ready. The poller runs a fixed-interval, attempt-bounded loop with
//! strictly sequential requests (a new tick never fires while the previous
//! response is outstanding), stops immediately on an authentication
//! failure, and is cancellable at every suspension point. Every cycle is
//! tagged with the session id so the orchestrator can discard completions
//! from a stale session.

use crate::config::BatchConfig;
use crate::error::AnalysisError;
use crate::events::AnalysisEvent;
use crate::models::AnalysisResult;
use crate::progress::{AnalysisStage, StageProgressTracker};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One poll response from the result endpoint.
#[derive(Debug, Clone)]
pub enum PollResponse {
    /// Terminal artifact available; polling stops
    Ready(AnalysisResult),
    /// Not ready yet; the backend may include a stage signal
    Pending {
        stage: Option<AnalysisStage>,
        progress_percent: Option<u8>,
    },
}

/// Port for fetching a job's result.
#[allow(async_fn_in_trait)]
pub trait FetchResult {
    async fn fetch_result(&self, job_id: &str) -> Result<PollResponse, AnalysisError>;
}

/// Pending-status body of the result endpoint (HTTP 202).
#[derive(Debug, Deserialize)]
struct PendingBody {
    stage: Option<String>,
    progress: Option<u8>,
}

/// HTTP client for the result endpoint.
pub struct ResultClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ResultClient {
    pub fn new(http: reqwest::Client, config: &BatchConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
        }
    }
}

impl FetchResult for ResultClient {
    async fn fetch_result(&self, job_id: &str) -> Result<PollResponse, AnalysisError> {
        let url = format!("{}/api/analysis/{}/result", self.base_url, job_id);

        let mut request = self.http.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(format!("Result request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => Err(AnalysisError::SessionExpired),
            202 => {
                let pending: Option<PendingBody> = response.json().await.ok();
                let (stage, progress_percent) = pending
                    .map(|p| {
                        (
                            p.stage.as_deref().and_then(AnalysisStage::parse_signal),
                            p.progress,
                        )
                    })
                    .unwrap_or((None, None));
                Ok(PollResponse::Pending {
                    stage,
                    progress_percent,
                })
            }
            _ if status.is_success() => {
                let payload = response
                    .bytes()
                    .await
                    .map_err(|e| {
                        AnalysisError::Transport(format!("Result body read failed: {}", e))
                    })?
                    .to_vec();
                Ok(PollResponse::Ready(AnalysisResult {
                    job_id: job_id.to_string(),
                    payload,
                }))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AnalysisError::Transport(format!(
                    "Result endpoint returned {}: {}",
                    status.as_u16(),
                    body
                )))
            }
        }
    }
}

/// Fixed-interval, attempt-bounded poll loop.
pub struct ResultPoller {
    interval: Duration,
    max_attempts: u32,
}

impl ResultPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.poll_interval, config.max_attempts)
    }

    /// Poll until the result is ready, the attempt budget is exhausted,
    /// the session expires, or `cancel` fires.
    ///
    /// Exactly one request is in flight at a time, and no request is
    /// issued beyond `max_attempts`. Stage signals from pending responses
    /// advance `tracker` (never backward), are broadcast as `StageChanged`
    /// events tagged with `session_id`, and are handed to `on_progress` so
    /// the caller can keep its own view of the job current between ticks.
    pub async fn poll<C, F>(
        &self,
        client: &C,
        session_id: Uuid,
        job_id: &str,
        tracker: &mut StageProgressTracker,
        event_tx: &broadcast::Sender<AnalysisEvent>,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<AnalysisResult, AnalysisError>
    where
        C: FetchResult,
        F: FnMut(AnalysisStage, u8),
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                outcome = client.fetch_result(job_id) => outcome,
            };

            match outcome {
                Ok(PollResponse::Ready(result)) => {
                    tracker.observe(AnalysisStage::Complete);
                    on_progress(AnalysisStage::Complete, tracker.progress_percent());
                    let _ = event_tx.send(AnalysisEvent::StageChanged {
                        session_id,
                        stage: AnalysisStage::Complete,
                        progress_percent: tracker.progress_percent(),
                    });
                    tracing::info!(
                        session_id = %session_id,
                        job_id = %job_id,
                        attempt = attempt,
                        "Analysis result ready"
                    );
                    return Ok(result);
                }
                Ok(PollResponse::Pending {
                    stage,
                    progress_percent,
                }) => {
                    let mut changed = false;
                    if let Some(stage) = stage {
                        changed |= tracker.observe(stage);
                    }
                    if let Some(percent) = progress_percent {
                        changed |= tracker.observe_percent(percent);
                    }
                    if changed {
                        on_progress(tracker.current_stage(), tracker.progress_percent());
                        let _ = event_tx.send(AnalysisEvent::StageChanged {
                            session_id,
                            stage: tracker.current_stage(),
                            progress_percent: tracker.progress_percent(),
                        });
                    }
                }
                Err(AnalysisError::SessionExpired) => {
                    // Authentication failure aborts immediately; it does
                    // not keep counting toward the attempt budget.
                    return Err(AnalysisError::SessionExpired);
                }
                Err(e) => {
                    // Transient transport failures are retryable and spend
                    // an attempt like any other tick.
                    tracing::warn!(
                        session_id = %session_id,
                        job_id = %job_id,
                        attempt = attempt,
                        error = %e,
                        "Poll attempt failed, will retry"
                    );
                }
            }

            if attempt == self.max_attempts {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::warn!(
            session_id = %session_id,
            job_id = %job_id,
            attempts = self.max_attempts,
            "Polling budget exhausted without a result"
        );
        Err(AnalysisError::PollTimeout {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted fake: pops one response per fetch, repeating the last.
    struct ScriptedClient {
        script: Mutex<Vec<Result<PollResponse, AnalysisError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<PollResponse, AnalysisError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl FetchResult for ScriptedClient {
        async fn fetch_result(&self, _job_id: &str) -> Result<PollResponse, AnalysisError> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn pending() -> Result<PollResponse, AnalysisError> {
        Ok(PollResponse::Pending {
            stage: None,
            progress_percent: None,
        })
    }

    fn ready() -> Result<PollResponse, AnalysisError> {
        Ok(PollResponse::Ready(AnalysisResult {
            job_id: "job-1".to_string(),
            payload: b"report".to_vec(),
        }))
    }

    fn harness() -> (
        StageProgressTracker,
        broadcast::Sender<AnalysisEvent>,
        CancellationToken,
    ) {
        let (event_tx, _rx) = broadcast::channel(64);
        (StageProgressTracker::new(), event_tx, CancellationToken::new())
    }

    #[tokio::test]
    async fn exhausting_attempts_times_out_without_extra_request() {
        let client = ScriptedClient::new(vec![pending()]);
        let poller = ResultPoller::new(Duration::ZERO, 150);
        let (mut tracker, event_tx, cancel) = harness();

        let result = poller
            .poll(
                &client,
                Uuid::new_v4(),
                "job-1",
                &mut tracker,
                &event_tx,
                &cancel,
                |_, _| {},
            )
            .await;

        assert!(matches!(
            result,
            Err(AnalysisError::PollTimeout { attempts: 150 })
        ));
        // No 151st request is issued.
        assert_eq!(client.calls(), 150);
    }

    #[tokio::test]
    async fn stops_at_first_ready_response() {
        let client = ScriptedClient::new(vec![pending(), pending(), ready()]);
        let poller = ResultPoller::new(Duration::ZERO, 150);
        let (mut tracker, event_tx, cancel) = harness();

        let result = poller
            .poll(
                &client,
                Uuid::new_v4(),
                "job-1",
                &mut tracker,
                &event_tx,
                &cancel,
                |_, _| {},
            )
            .await
            .unwrap();

        assert_eq!(result.payload, b"report");
        assert_eq!(client.calls(), 3);
        assert!(tracker.is_complete());
    }

    #[tokio::test]
    async fn session_expiry_aborts_immediately() {
        let client =
            ScriptedClient::new(vec![pending(), Err(AnalysisError::SessionExpired), ready()]);
        let poller = ResultPoller::new(Duration::ZERO, 150);
        let (mut tracker, event_tx, cancel) = harness();

        let result = poller
            .poll(
                &client,
                Uuid::new_v4(),
                "job-1",
                &mut tracker,
                &event_tx,
                &cancel,
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(AnalysisError::SessionExpired)));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn transport_errors_are_retried_within_budget() {
        let client = ScriptedClient::new(vec![
            Err(AnalysisError::Transport("connection reset".to_string())),
            pending(),
            ready(),
        ]);
        let poller = ResultPoller::new(Duration::ZERO, 150);
        let (mut tracker, event_tx, cancel) = harness();

        let result = poller
            .poll(
                &client,
                Uuid::new_v4(),
                "job-1",
                &mut tracker,
                &event_tx,
                &cancel,
                |_, _| {},
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn cancellation_before_start_issues_no_request() {
        let client = ScriptedClient::new(vec![pending()]);
        let poller = ResultPoller::new(Duration::ZERO, 150);
        let (mut tracker, event_tx, cancel) = harness();
        cancel.cancel();

        let result = poller
            .poll(
                &client,
                Uuid::new_v4(),
                "job-1",
                &mut tracker,
                &event_tx,
                &cancel,
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(AnalysisError::Cancelled)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn stage_signals_advance_tracker_monotonically() {
        let client = ScriptedClient::new(vec![
            Ok(PollResponse::Pending {
                stage: Some(AnalysisStage::MlSupervised),
                progress_percent: None,
            }),
            // Out-of-order duplicate from the backend
            Ok(PollResponse::Pending {
                stage: Some(AnalysisStage::Validating),
                progress_percent: None,
            }),
            Ok(PollResponse::Pending {
                stage: Some(AnalysisStage::GeneratingReport),
                progress_percent: Some(95),
            }),
            ready(),
        ]);
        let poller = ResultPoller::new(Duration::ZERO, 150);
        let (mut tracker, event_tx, cancel) = harness();
        let mut event_rx = event_tx.subscribe();
        let mut progress_calls = Vec::new();

        poller
            .poll(
                &client,
                Uuid::new_v4(),
                "job-1",
                &mut tracker,
                &event_tx,
                &cancel,
                |stage, percent| progress_calls.push((stage, percent)),
            )
            .await
            .unwrap();

        assert!(tracker.is_complete());
        assert_eq!(tracker.progress_percent(), 100);

        // The caller sees the same monotone sequence the events carry; the
        // regressed signal produces no call.
        assert_eq!(
            progress_calls,
            vec![
                (AnalysisStage::MlSupervised, 30),
                (AnalysisStage::GeneratingReport, 95),
                (AnalysisStage::Complete, 100),
            ]
        );

        // First event reflects MlSupervised; the regressed signal emits
        // nothing.
        let first = event_rx.recv().await.unwrap();
        match first {
            AnalysisEvent::StageChanged { stage, .. } => {
                assert_eq!(stage, AnalysisStage::MlSupervised)
            }
            other => panic!("unexpected event {:?}", other),
        }
        let second = event_rx.recv().await.unwrap();
        match second {
            AnalysisEvent::StageChanged {
                stage,
                progress_percent,
                ..
            } => {
                assert_eq!(stage, AnalysisStage::GeneratingReport);
                assert_eq!(progress_percent, 95);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
