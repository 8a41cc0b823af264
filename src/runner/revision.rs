//! Execution and revision loop.
//!
//! State machine over one conversation: PENDING -> EXECUTING ->
//! {SUCCEEDED, RETRYING, FAILED}, looping RETRYING -> EXECUTING until
//! success or the revision budget runs out. Infrastructure failures replay
//! the same payload against a reopened kernel on a separate budget and
//! never consume a revision slot.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::domain::conversation::Conversation;
use crate::domain::outcome::{AttemptOutcome, FailureCause, RunPhase};
use crate::domain::task::Task;
use crate::error::{GridpilotError, Result};
use crate::oracle::Oracle;
use crate::pipeline::StagePipeline;
use crate::pool::cancelled;
use crate::runner::classify::{classify, error_excerpt};
use crate::sandbox::{SandboxBackend, SandboxSession};

pub struct RevisionLoop<O: Oracle> {
    pipeline: Arc<StagePipeline<O>>,
    max_revisions: u32,
    infra_retries: u32,
    infra_backoff: Duration,
    submit_timeout: Duration,
}

impl<O: Oracle> RevisionLoop<O> {
    pub fn new(pipeline: Arc<StagePipeline<O>>, config: &Config) -> Self {
        Self {
            pipeline,
            max_revisions: config.revision.max_revisions,
            infra_retries: config.sandbox.infra_retries,
            infra_backoff: Duration::from_millis(config.sandbox.infra_backoff_ms),
            submit_timeout: Duration::from_millis(config.sandbox.submit_timeout_ms),
        }
    }

    /// Run the loop to a terminal phase. Returns Err only for faults that
    /// abort the conversation from outside the loop's own budgets (oracle
    /// unavailable during repair, cancellation).
    #[allow(clippy::too_many_arguments)]
    pub async fn run<B: SandboxBackend>(
        &self,
        task: &Task,
        input_path: &str,
        artifact_path: &Path,
        store: &dyn ArtifactStore,
        conversation: &mut Conversation,
        session: &mut SandboxSession<B>,
        mut payload: String,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let output_path = artifact_path.to_string_lossy().to_string();
        let mut infra_failures = 0u32;

        loop {
            conversation.phase = RunPhase::Executing;
            if *shutdown.borrow() {
                return Err(GridpilotError::Cancelled);
            }

            let started = Instant::now();
            let submitted = tokio::select! {
                result = session.submit(&payload, self.submit_timeout) => result,
                _ = cancelled(shutdown) => return Err(GridpilotError::Cancelled),
            };

            let submission = match submitted {
                Err(e) => {
                    // Transport-level failure: no revision slot consumed
                    conversation.record_execution(
                        payload.clone(),
                        e.to_string(),
                        AttemptOutcome::Infrastructure,
                        started.elapsed().as_millis() as u64,
                    );
                    infra_failures += 1;
                    if infra_failures > self.infra_retries {
                        tracing::error!(
                            task_id = %task.id,
                            failures = infra_failures,
                            "Infrastructure budget exhausted"
                        );
                        conversation.fail(FailureCause::Infrastructure);
                        return Ok(());
                    }
                    tracing::warn!(
                        task_id = %task.id,
                        attempt = infra_failures,
                        budget = self.infra_retries,
                        timed_out = e.is_timeout(),
                        error = %e,
                        "Sandbox submission failed, reopening session"
                    );
                    // The old kernel may still be running; never reuse it
                    session.reopen().await.map_err(|e| GridpilotError::Sandbox(e.to_string()))?;
                    tokio::time::sleep(self.infra_backoff).await;
                    continue;
                }
                Ok(submission) => submission,
            };

            let artifact_exists = store.exists(artifact_path);
            let outcome = classify(&submission.reply, artifact_exists);
            conversation.record_execution(
                payload.clone(),
                submission.reply.output.clone(),
                outcome,
                submission.duration_ms,
            );

            match outcome {
                AttemptOutcome::Success => {
                    tracing::info!(
                        task_id = %task.id,
                        attempts = conversation.counted_attempts(),
                        revisions = conversation.revisions,
                        "Execution succeeded"
                    );
                    conversation.succeed();
                    return Ok(());
                }
                AttemptOutcome::CodeError | AttemptOutcome::ArtifactMissing => {
                    if conversation.revisions >= self.max_revisions {
                        tracing::warn!(
                            task_id = %task.id,
                            revisions = conversation.revisions,
                            "Revision budget exhausted"
                        );
                        conversation.fail(FailureCause::RevisionExhausted);
                        return Ok(());
                    }
                    conversation.revisions += 1;
                    conversation.phase = RunPhase::Retrying;

                    let error_text = if outcome == AttemptOutcome::ArtifactMissing {
                        format!(
                            "The code ran without raising, but no output workbook \
                             appeared at {}. Make sure the workbook is saved there.",
                            output_path
                        )
                    } else {
                        error_excerpt(&submission.reply.output)
                    };
                    tracing::info!(
                        task_id = %task.id,
                        revision = conversation.revisions,
                        ?outcome,
                        "Requesting repaired payload"
                    );
                    payload = self
                        .pipeline
                        .repair(task, input_path, &output_path, conversation, &payload, &error_text)
                        .await?;
                }
                // classify never produces this from a completed submission
                AttemptOutcome::Infrastructure => {
                    return Err(GridpilotError::InvalidState(
                        "infrastructure outcome from completed submission".to_string(),
                    ));
                }
            }
        }
    }
}
