//! Analysis submission client
//!
//! Performs the actual batch upload that starts the server-side job. Files
//! can run to hundreds of megabytes, so the body is streamed from disk and
//! byte progress is reported through the event bus. Upload progress feeds
//! the `uploading` stage only and is never conflated with ML-stage
//! progress.

use crate::config::BatchConfig;
use crate::error::AnalysisError;
use crate::events::AnalysisEvent;
use crate::models::UploadedFile;
use futures::StreamExt;
use lavado_common::Cents;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Port for starting a server-side analysis job.
#[allow(async_fn_in_trait)]
pub trait SubmitAnalysis {
    /// Upload `file` and return the backend job identifier.
    async fn submit(
        &self,
        session_id: Uuid,
        file: &UploadedFile,
    ) -> Result<String, AnalysisError>;
}

/// Wire response of the submit endpoint.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    analysis_id: String,
}

/// HTTP client for the submit endpoint.
pub struct SubmissionClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    event_tx: broadcast::Sender<AnalysisEvent>,
}

impl SubmissionClient {
    pub fn new(
        http: reqwest::Client,
        config: &BatchConfig,
        event_tx: broadcast::Sender<AnalysisEvent>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
            event_tx,
        }
    }

    /// Streaming multipart part that emits `UploadProgress` events as
    /// bytes leave the client.
    async fn progress_part(
        &self,
        session_id: Uuid,
        file: &UploadedFile,
    ) -> Result<reqwest::multipart::Part, AnalysisError> {
        let handle = tokio::fs::File::open(&file.path)
            .await
            .map_err(|e| AnalysisError::Transport(format!(
                "Cannot open {}: {}",
                file.path.display(),
                e
            )))?;

        let total = file.size_bytes.max(1);
        let event_tx = self.event_tx.clone();
        let mut sent: u64 = 0;
        let mut last_percent: u8 = 0;

        let stream = ReaderStream::new(handle).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                let percent = ((sent * 100) / total).min(100) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    let _ = event_tx.send(AnalysisEvent::UploadProgress {
                        session_id,
                        percent,
                    });
                }
            }
            chunk
        });

        reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            file.size_bytes,
        )
        .file_name(file.name.clone())
        .mime_str(&file.mime_kind)
        .map_err(|e| AnalysisError::Transport(format!("Invalid MIME kind: {}", e)))
    }
}

impl SubmitAnalysis for SubmissionClient {
    async fn submit(
        &self,
        session_id: Uuid,
        file: &UploadedFile,
    ) -> Result<String, AnalysisError> {
        let url = format!("{}/api/analyze", self.base_url);

        tracing::info!(
            session_id = %session_id,
            file = %file.name,
            size_bytes = file.size_bytes,
            "Submitting batch for analysis"
        );

        let part = self.progress_part(session_id, file).await?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.http.post(&url).multipart(form);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(format!("Submission request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(AnalysisError::SessionExpired),
            // Insufficient funds at submission time; the orchestrator
            // enriches this with the locally computed shortfall.
            402 => {
                return Err(AnalysisError::InsufficientFunds {
                    shortfall: Cents::ZERO,
                })
            }
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AnalysisError::SubmissionFailed {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let parsed: SubmitResponse =
            response
                .json()
                .await
                .map_err(|e| AnalysisError::SubmissionFailed {
                    status: status.as_u16(),
                    body: format!("Malformed submit response: {}", e),
                })?;

        // The stream only reports percent increments; make sure the
        // uploading bar finishes.
        let _ = self.event_tx.send(AnalysisEvent::UploadProgress {
            session_id,
            percent: 100,
        });

        tracing::info!(
            session_id = %session_id,
            job_id = %parsed.analysis_id,
            "Submission accepted"
        );

        Ok(parsed.analysis_id)
    }
}
