//! Sandbox execution backend abstraction.
//!
//! A sandbox runs opaque code payloads in an isolated interpreter kernel
//! keyed by session identifier and returns the captured combined output.
//! Transport-level failures (unreachable backend, timeouts, garbage replies)
//! are kept strictly apart from code-level failures, which only ever appear
//! as content of the captured output.

pub mod http;
pub mod session;

use std::time::Duration;

use async_trait::async_trait;

pub use http::HttpSandbox;
pub use session::{SandboxSession, Submission};

/// Transport failures; none of these consume a revision slot
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Sandbox backend unreachable: {0}")]
    Connect(String),

    #[error("Submission timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed backend reply: {0}")]
    BadReply(String),

    #[error("Session already closed")]
    Closed,
}

impl SandboxError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout(_))
    }
}

/// Structured execution verdict from backends that report one.
/// When absent the classifier falls back to scanning the captured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Ok,
    Error,
}

/// Captured result of one code submission
#[derive(Debug, Clone)]
pub struct ExecReply {
    /// Combined stdout/stderr as captured by the kernel
    pub output: String,
    /// Structured verdict when the backend provides one
    pub status: Option<ExecStatus>,
    /// True when this submission caused a new kernel to be created
    pub fresh_kernel: bool,
}

/// Execution backend, keyed by opaque session identifiers.
///
/// Kernels are created lazily on first submission for a session id and live
/// until terminated, so successive submissions within one conversation share
/// interpreter state.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Run a payload in the session's kernel and capture its output.
    async fn submit(
        &self,
        session_id: &str,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecReply, SandboxError>;

    /// Tear down the session's kernel. Terminating an unknown session is
    /// not an error.
    async fn terminate(&self, session_id: &str) -> Result<(), SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(SandboxError::Timeout(Duration::from_secs(30)).is_timeout());
        assert!(!SandboxError::Connect("refused".into()).is_timeout());
        assert!(!SandboxError::BadReply("html".into()).is_timeout());
    }

    #[test]
    fn test_error_display() {
        let err = SandboxError::Connect("connection refused".to_string());
        assert_eq!(err.to_string(), "Sandbox backend unreachable: connection refused");
        assert_eq!(SandboxError::Closed.to_string(), "Session already closed");
    }
}
