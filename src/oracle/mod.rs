//! Reasoning oracle abstraction.
//!
//! The oracle maps a sequence of prompt turns to a text response. It is
//! stateless from the orchestrator's viewpoint: all accumulated context is
//! carried explicitly in the turns. Concrete backends implement [`Oracle`];
//! the pipeline only sees the trait.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OracleConfig;

pub use http::HttpOracle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of explicit context sent to the oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Errors that can occur during oracle calls
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            OracleError::Network(_) => true,
            OracleError::InvalidResponse(_) => false,
            OracleError::MissingApiKey { .. } => false,
        }
    }
}

/// Text-to-text reasoning service
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Single completion request, blocking until complete or timed out
    async fn request(&self, turns: &[Turn]) -> Result<String, OracleError>;
}

/// Bounded retry with exponential backoff for transient oracle failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.backoff_base_secs),
        }
    }

    /// Delay before retrying after the given zero-based attempt: base,
    /// 2*base, 4*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt.min(6))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Issue a request, retrying transient failures within the policy's budget.
pub async fn request_with_retry(
    oracle: &dyn Oracle,
    turns: &[Turn],
    policy: &RetryPolicy,
) -> Result<String, OracleError> {
    let mut attempt = 0;
    loop {
        match oracle.request(turns).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Oracle call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempts = attempt + 1, error = %e, "Oracle call failed");
                return Err(e);
            }
        }
    }
}
