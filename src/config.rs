//! Startup configuration read from the environment

use crate::state_machine::IntakeContext;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_USER_ID: &str = "guest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SYMPTOM_INTAKE_API is not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("SYMPTOM_INTAKE_API must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("SYMPTOM_INTAKE_TIMEOUT_SECS must be a positive number of seconds, got {0:?}")]
    InvalidTimeout(String),
}

/// Client configuration, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_id: String,
    pub phone: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = non_blank("SYMPTOM_INTAKE_API").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let parsed =
            reqwest::Url::parse(&api_url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let timeout = if let Some(raw) = non_blank("SYMPTOM_INTAKE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            }
        } else {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        };

        Ok(Self {
            api_url,
            user_id: non_blank("SYMPTOM_INTAKE_USER_ID")
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            phone: non_blank("SYMPTOM_INTAKE_PHONE"),
            timeout,
        })
    }

    /// Session identity handed to the state machine
    pub fn context(&self) -> IntakeContext {
        IntakeContext::new(&self.user_id, self.phone.clone())
    }
}
