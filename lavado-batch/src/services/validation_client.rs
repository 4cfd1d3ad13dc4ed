//! File validation client
//!
//! Submits the raw file to the remote validate endpoint and translates the
//! response into a `FileValidationResult`. Every failure on this path is a
//! `FileInvalid` value with a human-readable reason; nothing panics past
//! this boundary. A success response missing the row count or the column
//! list is treated as a validation failure; the row count is never
//! guessed from the file size.

use crate::config::BatchConfig;
use crate::error::AnalysisError;
use crate::models::{FileValidationResult, UploadedFile};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Port for server-side structural validation.
#[allow(async_fn_in_trait)]
pub trait ValidateFile {
    async fn validate(&self, file: &UploadedFile) -> Result<FileValidationResult, AnalysisError>;
}

/// Wire response of the validate endpoint.
#[derive(Debug, Deserialize)]
struct ValidateResponse {
    success: bool,
    #[serde(rename = "rowCount")]
    row_count: Option<u64>,
    columns: Option<Vec<String>>,
    error: Option<String>,
}

/// HTTP client for the validate endpoint.
pub struct ValidationClient {
    http: reqwest::Client,
    base_url: String,
}

impl ValidationClient {
    pub fn new(http: reqwest::Client, config: &BatchConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
        }
    }
}

impl ValidateFile for ValidationClient {
    async fn validate(&self, file: &UploadedFile) -> Result<FileValidationResult, AnalysisError> {
        let url = format!("{}/api/validate", self.base_url);

        tracing::debug!(file = %file.name, size_bytes = file.size_bytes, url = %url, "Validating file");

        let part = stream_part(file).await?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::FileInvalid {
                reason: format!("Validation request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::FileInvalid {
                reason: format!("Validation endpoint returned {}: {}", status.as_u16(), body),
            });
        }

        let parsed: ValidateResponse =
            response
                .json()
                .await
                .map_err(|e| AnalysisError::FileInvalid {
                    reason: format!("Malformed validation response: {}", e),
                })?;

        translate_response(parsed)
    }
}

/// Translate the wire response, rejecting incomplete success payloads.
fn translate_response(response: ValidateResponse) -> Result<FileValidationResult, AnalysisError> {
    if !response.success {
        return Err(AnalysisError::FileInvalid {
            reason: response
                .error
                .unwrap_or_else(|| "File failed structural validation".to_string()),
        });
    }

    let (row_count, columns) = match (response.row_count, response.columns) {
        (Some(rows), Some(columns)) => (rows, columns),
        _ => {
            // An endpoint omitting either field is a validation failure;
            // estimating rows from byte size produces wrong prices.
            return Err(AnalysisError::FileInvalid {
                reason: "Validation response omitted row count or columns".to_string(),
            });
        }
    };

    Ok(FileValidationResult {
        row_count,
        detected_columns: columns.into_iter().map(|c| c.trim().to_string()).collect(),
    })
}

/// Build a streaming multipart part for `file` without buffering it.
pub(crate) async fn stream_part(
    file: &UploadedFile,
) -> Result<reqwest::multipart::Part, AnalysisError> {
    let handle = tokio::fs::File::open(&file.path)
        .await
        .map_err(|e| AnalysisError::FileInvalid {
            reason: format!("Cannot open {}: {}", file.path.display(), e),
        })?;

    let body = reqwest::Body::wrap_stream(ReaderStream::new(handle));
    reqwest::multipart::Part::stream_with_length(body, file.size_bytes)
        .file_name(file.name.clone())
        .mime_str(&file.mime_kind)
        .map_err(|e| AnalysisError::FileInvalid {
            reason: format!("Invalid MIME kind {}: {}", file.mime_kind, e),
        })
}
