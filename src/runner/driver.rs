//! Per-task driver: owns the conversation and the sandbox session for one
//! task's lifetime.
//!
//! The driver never raises to its caller: every exit path, including
//! cancellation and oracle loss, produces a terminal report with the full
//! stage and attempt history, and releases the sandbox session exactly once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::domain::conversation::Conversation;
use crate::domain::outcome::{FailureCause, RunPhase};
use crate::domain::report::TaskReport;
use crate::domain::task::Task;
use crate::error::{GridpilotError, Result};
use crate::oracle::{Oracle, RetryPolicy};
use crate::pipeline::StagePipeline;
use crate::runner::revision::RevisionLoop;
use crate::sandbox::{SandboxBackend, SandboxSession};

pub struct TaskDriver<O: Oracle, B: SandboxBackend> {
    pipeline: Arc<StagePipeline<O>>,
    revision: RevisionLoop<O>,
    backend: Arc<B>,
    store: Arc<dyn ArtifactStore>,
    submit_timeout: Duration,
}

impl<O: Oracle, B: SandboxBackend> TaskDriver<O, B> {
    pub fn new(
        oracle: Arc<O>,
        backend: Arc<B>,
        store: Arc<dyn ArtifactStore>,
        config: &Config,
    ) -> Self {
        let pipeline = Arc::new(StagePipeline::new(
            oracle,
            RetryPolicy::from_config(&config.oracle),
        ));
        Self {
            revision: RevisionLoop::new(pipeline.clone(), config),
            pipeline,
            backend,
            store,
            submit_timeout: Duration::from_millis(config.sandbox.submit_timeout_ms),
        }
    }

    /// Drive one task to a terminal report. Never returns an error: faults
    /// become `success=false` reports carrying the cause and full history.
    pub async fn solve(&self, task: &Task, mut shutdown: watch::Receiver<bool>) -> TaskReport {
        let mut conversation = Conversation::new(&task.id);
        let mut session =
            SandboxSession::open(self.backend.clone(), conversation.session_id.clone());
        tracing::info!(task_id = %task.id, session_id = %conversation.session_id, "Starting task");

        let outcome = self
            .solve_inner(task, &mut conversation, &mut session, &mut shutdown)
            .await;

        // Session release happens on every exit path, exactly once
        session.close().await;

        if let Err(e) = outcome {
            let cause = match &e {
                GridpilotError::OracleUnavailable(_) => FailureCause::OracleUnavailable,
                GridpilotError::Observation(_) => FailureCause::ObservationFailed,
                GridpilotError::Cancelled => FailureCause::Cancelled,
                _ => FailureCause::Infrastructure,
            };
            tracing::warn!(task_id = %task.id, error = %e, ?cause, "Conversation aborted");
            if !conversation.is_terminal() {
                conversation.fail(cause);
            }
        }

        let artifact_path = self.verified_artifact(task, &mut conversation);
        TaskReport::from_conversation(task, &conversation, artifact_path)
    }

    async fn solve_inner(
        &self,
        task: &Task,
        conversation: &mut Conversation,
        session: &mut SandboxSession<B>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let input_path = task
            .primary_input()
            .ok_or_else(|| {
                GridpilotError::InvalidState(format!("task {} has no input artifact", task.id))
            })?
            .to_string_lossy()
            .to_string();
        let artifact_path = self.store.output_path(&task.id);
        let output_path = artifact_path.to_string_lossy().to_string();

        let payload = self
            .pipeline
            .produce(
                task,
                &input_path,
                &output_path,
                conversation,
                session,
                self.submit_timeout,
                shutdown,
            )
            .await?;

        self.revision
            .run(
                task,
                &input_path,
                &artifact_path,
                self.store.as_ref(),
                conversation,
                session,
                payload,
                shutdown,
            )
            .await
    }

    /// A succeeded conversation must have its artifact on disk; downgrade to
    /// failure if storage disagrees at report time.
    fn verified_artifact(&self, task: &Task, conversation: &mut Conversation) -> Option<PathBuf> {
        if conversation.phase != RunPhase::Succeeded {
            return None;
        }
        let path = self.store.output_path(&task.id);
        if self.store.exists(&path) {
            Some(path)
        } else {
            tracing::error!(
                task_id = %task.id,
                path = %path.display(),
                "Artifact vanished between execution and report"
            );
            conversation.fail(FailureCause::Infrastructure);
            None
        }
    }
}
