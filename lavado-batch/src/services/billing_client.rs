//! Billing client
//!
//! Reads the account balance from the billing collaborator. The balance is
//! owned server-side; the client never decrements it locally, it only
//! refetches (before submission checks and after each completed analysis).

use crate::config::BatchConfig;
use crate::error::AnalysisError;
use lavado_common::Cents;
use serde::Deserialize;

/// Port for reading the current account balance.
#[allow(async_fn_in_trait)]
pub trait FetchBalance {
    async fn fetch_balance(&self) -> Result<Cents, AnalysisError>;
}

/// Wire response of the balance endpoint (dollars).
#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: f64,
}

/// HTTP client for the balance endpoint.
pub struct BillingClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl BillingClient {
    pub fn new(http: reqwest::Client, config: &BatchConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
        }
    }
}

impl FetchBalance for BillingClient {
    async fn fetch_balance(&self) -> Result<Cents, AnalysisError> {
        let url = format!("{}/api/balance", self.base_url);

        let mut request = self.http.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(format!("Balance request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(AnalysisError::SessionExpired),
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AnalysisError::Transport(format!(
                    "Balance endpoint returned {}: {}",
                    status.as_u16(),
                    body
                )));
            }
            _ => {}
        }

        let parsed: BalanceResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Transport(format!("Malformed balance response: {}", e)))?;

        let balance = Cents::from_dollars(parsed.balance);
        tracing::debug!(balance = %balance, "Fetched account balance");
        Ok(balance)
    }
}
