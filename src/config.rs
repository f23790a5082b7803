//! Runtime configuration from the environment.
//!
//! Values come from process environment variables, a `.env` file in the
//! working directory, or `<config dir>/chatdesk/config.env`, in that order of
//! precedence.

use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const BACKEND_URL_VAR: &str = "CHATDESK_BACKEND_URL";
pub const TIMEOUT_VAR: &str = "CHATDESK_TIMEOUT_SECS";

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var} '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub backend_url: Url,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup(BACKEND_URL_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let backend_url = parse_backend_url(&raw_url)?;

        let request_timeout = match lookup(TIMEOUT_VAR) {
            Some(value) if !value.trim().is_empty() => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| ConfigError::Invalid {
                        var: TIMEOUT_VAR,
                        value: value.clone(),
                        reason: "expected a positive number of seconds".to_string(),
                    })?;
                Duration::from_secs(secs)
            }
            _ => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            backend_url,
            request_timeout,
        })
    }
}

fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: BACKEND_URL_VAR,
        value: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http or https url".to_string()));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("url cannot carry a path".to_string()));
    }
    Ok(url)
}

/// Per-user fallback env file.
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatdesk").join("config.env"))
}

/// Loads `.env`, falling back to the per-user config file. Variables already
/// present in the environment are never overridden.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Some(path) = user_config_file()
        && path.exists()
        && let Err(err) = dotenvy::from_path(&path)
    {
        tracing::warn!(path = %path.display(), error = %err, "failed to load config file");
    }
}
