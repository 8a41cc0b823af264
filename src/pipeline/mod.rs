//! Stage pipeline: a strict linear state machine that turns a task into a
//! candidate payload.
//!
//! OBSERVE runs the deterministic workbook probe through the conversation's
//! sandbox session; UNDERSTAND, PLAN, IMPLEMENT and VALIDATE each issue
//! exactly one oracle request built from the task, all prior stage records,
//! and a stage-specific template. VALIDATE may replace the candidate once
//! (the single pre-execution correction) before the pipeline reaches DONE.
//! The payload itself is opaque to the pipeline.
//!
//! The repair entry point serves the post-execution revision loop only; the
//! linear sequence never calls it.

pub mod extract;
pub mod observe;
pub mod prompts;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::domain::conversation::{Conversation, Stage};
use crate::domain::task::Task;
use crate::error::{GridpilotError, Result};
use crate::oracle::{Oracle, RetryPolicy, Turn, request_with_retry};
use crate::pool::cancelled;
use crate::sandbox::{SandboxBackend, SandboxSession};

pub use extract::{extract_code, normalize_paths};

pub struct StagePipeline<O: Oracle> {
    oracle: Arc<O>,
    retry: RetryPolicy,
}

impl<O: Oracle> StagePipeline<O> {
    pub fn new(oracle: Arc<O>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    /// Drive OBSERVE through VALIDATE and return the first candidate payload.
    #[allow(clippy::too_many_arguments)]
    pub async fn produce<B: SandboxBackend>(
        &self,
        task: &Task,
        input_path: &str,
        output_path: &str,
        conversation: &mut Conversation,
        session: &mut SandboxSession<B>,
        submit_timeout: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<String> {
        let mut stage = Stage::Observe;
        let mut payload: Option<String> = None;

        loop {
            if *shutdown.borrow() {
                return Err(GridpilotError::Cancelled);
            }
            match stage {
                Stage::Observe => {
                    self.run_observe(task, input_path, conversation, session, submit_timeout, shutdown)
                        .await?;
                }
                Stage::Understand => {
                    let observation = self.stage_response(conversation, Stage::Observe);
                    let prompt = prompts::understanding_prompt(task, &observation);
                    let (response, duration_ms) = self.ask(conversation, &prompt).await?;
                    conversation.record_stage(Stage::Understand, prompt, response, None, duration_ms);
                }
                Stage::Plan => {
                    let observation = self.stage_response(conversation, Stage::Observe);
                    let understanding = self.stage_response(conversation, Stage::Understand);
                    let prompt = prompts::planning_prompt(
                        task,
                        &observation,
                        &understanding,
                        input_path,
                        output_path,
                    );
                    let (response, duration_ms) = self.ask(conversation, &prompt).await?;
                    conversation.record_stage(Stage::Plan, prompt, response, None, duration_ms);
                }
                Stage::Implement => {
                    let observation = self.stage_response(conversation, Stage::Observe);
                    let understanding = self.stage_response(conversation, Stage::Understand);
                    let plan = self.stage_response(conversation, Stage::Plan);
                    let prompt = prompts::implementation_prompt(
                        &observation,
                        &understanding,
                        &plan,
                        input_path,
                        output_path,
                        &task.target.to_string(),
                    );
                    let (response, duration_ms) = self.ask(conversation, &prompt).await?;
                    let code = extract_code(&response)
                        .unwrap_or_else(|| response.trim().to_string());
                    let code = normalize_paths(&code, input_path, output_path);
                    payload = Some(code.clone());
                    conversation.record_stage(
                        Stage::Implement,
                        prompt,
                        response,
                        Some(code),
                        duration_ms,
                    );
                }
                Stage::Validate => {
                    let plan = self.stage_response(conversation, Stage::Plan);
                    let candidate = payload.as_deref().unwrap_or_default();
                    let prompt = prompts::validation_prompt(&plan, candidate);
                    let (response, duration_ms) = self.ask(conversation, &prompt).await?;

                    let corrected = if response.contains(prompts::VALIDATION_PASSED) {
                        None
                    } else {
                        // One pre-execution correction pass, independent of
                        // the post-execution revision budget
                        extract_code(&response)
                            .map(|code| normalize_paths(&code, input_path, output_path))
                    };
                    if let Some(code) = &corrected {
                        tracing::debug!(task_id = %task.id, "Validation replaced the candidate payload");
                        payload = Some(code.clone());
                    }
                    conversation.record_stage(Stage::Validate, prompt, response, corrected, duration_ms);
                }
                Stage::Repair => unreachable!("repair records never enter the linear sequence"),
            }

            match stage.next() {
                Some(next) => stage = next,
                None => break,
            }
        }

        payload.ok_or_else(|| {
            GridpilotError::InvalidState("pipeline finished without a payload".to_string())
        })
    }

    /// Repair entry point: one oracle request for a corrected payload, given
    /// the failing payload and the captured error text.
    pub async fn repair(
        &self,
        task: &Task,
        input_path: &str,
        output_path: &str,
        conversation: &mut Conversation,
        failing_payload: &str,
        error_text: &str,
    ) -> Result<String> {
        let observation = self.stage_response(conversation, Stage::Observe);
        let plan = self.stage_response(conversation, Stage::Plan);
        let prompt = prompts::revision_prompt(
            &task.instruction,
            &observation,
            &plan,
            failing_payload,
            error_text,
        );

        // Repairs carry a bounded context: the observation and plan pairs
        // plus the revision request, not the whole transcript
        let mut turns = Vec::new();
        for stage in [Stage::Observe, Stage::Plan] {
            if let Some(record) = conversation.last_record(stage) {
                turns.push(Turn::user(record.prompt.clone()));
                turns.push(Turn::assistant(record.response.clone()));
            }
        }
        turns.push(Turn::user(prompt.clone()));

        let started = Instant::now();
        let response = request_with_retry(self.oracle.as_ref(), &turns, &self.retry)
            .await
            .map_err(|e| GridpilotError::OracleUnavailable(e.to_string()))?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let code = extract_code(&response).unwrap_or_else(|| response.trim().to_string());
        let code = normalize_paths(&code, input_path, output_path);
        conversation.record_stage(Stage::Repair, prompt, response, Some(code.clone()), duration_ms);
        Ok(code)
    }

    async fn run_observe<B: SandboxBackend>(
        &self,
        task: &Task,
        input_path: &str,
        conversation: &mut Conversation,
        session: &mut SandboxSession<B>,
        submit_timeout: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let probe = observe::probe_script(input_path, &task.target);
        let summary = prompts::observation_summary(task, input_path);

        let submitted = tokio::select! {
            result = session.submit(&probe, submit_timeout) => result,
            _ = cancelled(shutdown) => return Err(GridpilotError::Cancelled),
        };
        let submission = submitted.map_err(|e| GridpilotError::Sandbox(e.to_string()))?;

        let usable = observe::probe_output_usable(&submission.reply.output);
        conversation.record_stage(
            Stage::Observe,
            summary,
            submission.reply.output.clone(),
            None,
            submission.duration_ms,
        );

        if !usable {
            return Err(GridpilotError::Observation(format!(
                "probe output unusable: {}",
                prompts::truncate(&submission.reply.output, 200)
            )));
        }
        Ok(())
    }

    /// One oracle request carrying all prior stage records as explicit turns.
    async fn ask(&self, conversation: &Conversation, prompt: &str) -> Result<(String, u64)> {
        let mut turns: Vec<Turn> = Vec::with_capacity(conversation.stages.len() * 2 + 1);
        for record in &conversation.stages {
            turns.push(Turn::user(record.prompt.clone()));
            turns.push(Turn::assistant(record.response.clone()));
        }
        turns.push(Turn::user(prompt.to_string()));

        let started = Instant::now();
        let response = request_with_retry(self.oracle.as_ref(), &turns, &self.retry)
            .await
            .map_err(|e| GridpilotError::OracleUnavailable(e.to_string()))?;
        Ok((response, started.elapsed().as_millis() as u64))
    }

    fn stage_response(&self, conversation: &Conversation, stage: Stage) -> String {
        conversation
            .last_record(stage)
            .map(|r| r.response.clone())
            .unwrap_or_default()
    }
}
