//! Configuration resolution for lavado-batch
//!
//! Collapses CLI arguments, `LAVADO_*` environment variables, and the TOML
//! config file into one typed `BatchConfig`, with CLI taking priority over
//! environment over TOML.

use lavado_common::config::{resolve_setting, TomlConfig};
use lavado_common::{Error, Result};
use std::time::Duration;

/// Default result polling interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Default polling attempt budget (150 * 2 s = ~5 minutes).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;
/// Per-request timeout for collaborator endpoints.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_BASE_URL: &str = "LAVADO_API_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "LAVADO_AUTH_TOKEN";

/// Resolved runtime configuration for one orchestrator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Collaborator base URL, no trailing slash
    pub base_url: String,
    /// Bearer token for the submit endpoint
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl BatchConfig {
    /// Resolve from CLI overrides plus a loaded TOML config.
    pub fn resolve(
        cli_base_url: Option<&str>,
        cli_auth_token: Option<&str>,
        toml: &TomlConfig,
    ) -> Result<BatchConfig> {
        let base_url = resolve_setting(
            "api_base_url",
            cli_base_url,
            ENV_BASE_URL,
            toml.api_base_url.as_deref(),
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Analysis backend URL not configured. Provide one of:\n\
                 1. CLI flag: --base-url https://api.example.com\n\
                 2. Environment: {}=https://api.example.com\n\
                 3. TOML config: api_base_url = \"https://api.example.com\"",
                ENV_BASE_URL
            ))
        })?;

        let auth_token = resolve_setting(
            "auth_token",
            cli_auth_token,
            ENV_AUTH_TOKEN,
            toml.auth_token.as_deref(),
        );

        Ok(BatchConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            poll_interval: Duration::from_millis(
                toml.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            max_attempts: toml.poll_max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_polling_contract() {
        let toml = TomlConfig {
            api_base_url: Some("https://api.example.com/".to_string()),
            ..Default::default()
        };
        let config = BatchConfig::resolve(None, None, &toml).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.poll_interval, Duration::from_millis(2_000));
        assert_eq!(config.max_attempts, 150);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn cli_overrides_toml() {
        let toml = TomlConfig {
            api_base_url: Some("https://toml.example.com".to_string()),
            auth_token: Some("toml-token".to_string()),
            poll_interval_ms: Some(250),
            poll_max_attempts: Some(4),
            ..Default::default()
        };
        let config =
            BatchConfig::resolve(Some("https://cli.example.com"), Some("cli-token"), &toml)
                .unwrap();
        assert_eq!(config.base_url, "https://cli.example.com");
        assert_eq!(config.auth_token.as_deref(), Some("cli-token"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 4);
    }

    #[test]
    fn missing_base_url_is_config_error() {
        let result = BatchConfig::resolve(None, None, &TomlConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
