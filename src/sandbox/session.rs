//! Session guard: scoped ownership of one sandbox kernel.
//!
//! A conversation holds exactly one `SandboxSession` for its whole lifetime.
//! The guard is the session handle: opening it twice for the same
//! conversation cannot happen because the conversation owns it, and the
//! backend itself is idempotent per session id (resubmitting reuses the
//! kernel). `close` releases the kernel exactly once; later calls are
//! no-ops, so every exit path may call it unconditionally.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::sandbox::{ExecReply, SandboxBackend, SandboxError};

/// A reply together with the caller-observed elapsed time
#[derive(Debug, Clone)]
pub struct Submission {
    pub reply: ExecReply,
    pub duration_ms: u64,
}

pub struct SandboxSession<B: SandboxBackend> {
    backend: Arc<B>,
    id: String,
    closed: bool,
}

impl<B: SandboxBackend> SandboxSession<B> {
    /// Bind a session identifier to the backend. The kernel itself is
    /// created lazily by the backend on first submission.
    pub fn open(backend: Arc<B>, id: String) -> Self {
        Self {
            backend,
            id,
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Submit a payload, measuring elapsed time from the caller's viewpoint.
    pub async fn submit(
        &mut self,
        code: &str,
        timeout: Duration,
    ) -> Result<Submission, SandboxError> {
        if self.closed {
            return Err(SandboxError::Closed);
        }
        let started = Instant::now();
        let reply = self.backend.submit(&self.id, code, timeout).await?;
        Ok(Submission {
            reply,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Discard the current kernel so the next submission gets a fresh one.
    ///
    /// After a timeout the old kernel must be assumed still running; it is
    /// terminated here rather than reused. The session identifier is
    /// unchanged.
    pub async fn reopen(&mut self) -> Result<(), SandboxError> {
        if self.closed {
            return Err(SandboxError::Closed);
        }
        if let Err(e) = self.backend.terminate(&self.id).await {
            tracing::warn!(session_id = %self.id, error = %e, "Kernel teardown during reopen failed");
        }
        Ok(())
    }

    /// Release the kernel. Safe to call on every exit path; only the first
    /// call reaches the backend.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.backend.terminate(&self.id).await {
            tracing::warn!(session_id = %self.id, error = %e, "Session teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingBackend {
        submits: AtomicU32,
        terminates: AtomicU32,
    }

    #[async_trait]
    impl SandboxBackend for CountingBackend {
        async fn submit(
            &self,
            _session_id: &str,
            _code: &str,
            _timeout: Duration,
        ) -> Result<ExecReply, SandboxError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(ExecReply {
                output: "ok".to_string(),
                status: None,
                fresh_kernel: false,
            })
        }

        async fn terminate(&self, _session_id: &str) -> Result<(), SandboxError> {
            self.terminates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_submit_measures_duration() {
        let backend = Arc::new(CountingBackend::default());
        let mut session = SandboxSession::open(backend.clone(), "s1".to_string());
        let submission = session.submit("print(1)", Duration::from_secs(5)).await.unwrap();
        assert_eq!(submission.reply.output, "ok");
        assert_eq!(backend.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_exactly_once() {
        let backend = Arc::new(CountingBackend::default());
        let mut session = SandboxSession::open(backend.clone(), "s1".to_string());
        session.close().await;
        session.close().await;
        session.close().await;
        assert_eq!(backend.terminates.load(Ordering::SeqCst), 1);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_submit_after_close_rejected() {
        let backend = Arc::new(CountingBackend::default());
        let mut session = SandboxSession::open(backend, "s1".to_string());
        session.close().await;
        let err = session.submit("print(1)", Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, SandboxError::Closed));
    }

    #[tokio::test]
    async fn test_reopen_keeps_id_and_terminates_kernel() {
        let backend = Arc::new(CountingBackend::default());
        let mut session = SandboxSession::open(backend.clone(), "s1".to_string());
        session.reopen().await.unwrap();
        assert_eq!(session.id(), "s1");
        assert!(!session.is_closed());
        assert_eq!(backend.terminates.load(Ordering::SeqCst), 1);

        // Closing afterwards still releases exactly once more
        session.close().await;
        assert_eq!(backend.terminates.load(Ordering::SeqCst), 2);
    }
}
