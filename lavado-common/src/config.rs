//! Configuration loading
//!
//! Values resolve in priority order: command-line argument, environment
//! variable, TOML config file, compiled default. The TOML file lives at the
//! platform config directory (`~/.config/lavado/config.toml` on Linux)
//! unless an explicit path is given.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the analysis backend (e.g. `https://api.example.com`)
    pub api_base_url: Option<String>,

    /// Bearer token presented to the submit endpoint
    pub auth_token: Option<String>,

    /// Result polling interval override, milliseconds
    pub poll_interval_ms: Option<u64>,

    /// Result polling attempt budget override
    pub poll_max_attempts: Option<u32>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing level filter (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from an explicit path, or from the default
    /// platform location when `path` is `None`.
    ///
    /// An explicit path that is missing or malformed is an error; a missing
    /// file at the default location yields defaults.
    pub fn load(path: Option<&Path>) -> Result<TomlConfig> {
        match path {
            Some(explicit) => Self::read_file(explicit),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::read_file(&default_path)
                } else {
                    Ok(TomlConfig::default())
                }
            }
        }
    }

    fn read_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("lavado").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./lavado-config.toml"))
}

/// Resolve a single string setting following the standard priority order:
/// CLI argument, then environment variable, then TOML value.
///
/// Logs a warning when the value is present in more than one source, since
/// that usually indicates a misconfiguration.
pub fn resolve_setting(
    name: &str,
    cli_value: Option<&str>,
    env_var: &str,
    toml_value: Option<&str>,
) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());

    let mut sources = Vec::new();
    if cli_value.is_some() {
        sources.push("command line");
    }
    if env_value.is_some() {
        sources.push("environment");
    }
    if toml_value.is_some() {
        sources.push("TOML");
    }
    if sources.len() > 1 {
        tracing::warn!(
            setting = name,
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    cli_value
        .map(str::to_string)
        .or(env_value)
        .or_else(|| toml_value.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_base_url = "https://api.test.example"
poll_interval_ms = 500

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = TomlConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://api.test.example")
        );
        assert_eq!(config.poll_interval_ms, Some(500));
        assert_eq!(config.poll_max_attempts, None);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn load_missing_explicit_file_is_error() {
        let result = TomlConfig::load(Some(Path::new("/nonexistent/lavado.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_base_url = [not valid").unwrap();
        let result = TomlConfig::load(Some(file.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn resolve_setting_prefers_cli() {
        let resolved = resolve_setting(
            "api_base_url",
            Some("https://cli.example"),
            "LAVADO_TEST_UNSET_VAR",
            Some("https://toml.example"),
        );
        assert_eq!(resolved.as_deref(), Some("https://cli.example"));
    }

    #[test]
    fn resolve_setting_falls_back_to_toml() {
        let resolved = resolve_setting(
            "api_base_url",
            None,
            "LAVADO_TEST_UNSET_VAR",
            Some("https://toml.example"),
        );
        assert_eq!(resolved.as_deref(), Some("https://toml.example"));
    }

    #[test]
    fn resolve_setting_empty_when_unset() {
        let resolved = resolve_setting("auth_token", None, "LAVADO_TEST_UNSET_VAR", None);
        assert_eq!(resolved, None);
    }
}
