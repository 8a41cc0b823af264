//! Conversation state: the mutable unit of work for one task.
//!
//! A conversation owns exactly one sandbox session identifier and an
//! append-only history of stage records and execution attempts. It has a
//! single writer (the task driver), so no locking is involved; ordering of
//! the history is by construction.

use serde::{Deserialize, Serialize};

use crate::domain::outcome::{AttemptOutcome, FailureCause, RunPhase};
use crate::id::{generate_session_id, now_ms};

/// Pipeline stages, in order. `Repair` records come only from the
/// post-execution revision loop and never from the linear sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Observe,
    Understand,
    Plan,
    Implement,
    Validate,
    Repair,
}

impl Stage {
    /// Next stage in the linear sequence; None once VALIDATE is done or for
    /// repair records, which sit outside the sequence.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Observe => Some(Stage::Understand),
            Stage::Understand => Some(Stage::Plan),
            Stage::Plan => Some(Stage::Implement),
            Stage::Implement => Some(Stage::Validate),
            Stage::Validate => None,
            Stage::Repair => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Observe => "observe",
            Stage::Understand => "understand",
            Stage::Plan => "plan",
            Stage::Implement => "implement",
            Stage::Validate => "validate",
            Stage::Repair => "repair",
        }
    }
}

/// One entry per pipeline step. Append-only; never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    /// Prompt sent to the oracle (for OBSERVE: the probe script)
    pub prompt: String,
    /// Raw response (for OBSERVE: the captured probe output)
    pub response: String,
    /// Demarcated code block extracted from the response, if any
    pub payload: Option<String>,
    pub timestamp_ms: u64,
    pub duration_ms: u64,
}

/// One submission to the sandbox session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub payload: String,
    /// Captured combined output or transport error text
    pub captured: String,
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
}

/// Live processing state of one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub task_id: String,

    /// The single sandbox session identifier for this conversation's lifetime
    pub session_id: String,

    /// Ordered pipeline history
    pub stages: Vec<StageRecord>,

    /// Ordered submission history, infrastructure replays included
    pub executions: Vec<ExecutionAttempt>,

    /// Repair cycles consumed so far
    pub revisions: u32,

    pub phase: RunPhase,

    /// Set when the conversation terminates without success
    pub cause: Option<FailureCause>,
}

impl Conversation {
    pub fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            session_id: generate_session_id(task_id),
            stages: Vec::new(),
            executions: Vec::new(),
            revisions: 0,
            phase: RunPhase::Pending,
            cause: None,
        }
    }

    /// Append a stage record.
    pub fn record_stage(
        &mut self,
        stage: Stage,
        prompt: String,
        response: String,
        payload: Option<String>,
        duration_ms: u64,
    ) {
        self.stages.push(StageRecord {
            stage,
            prompt,
            response,
            payload,
            timestamp_ms: now_ms(),
            duration_ms,
        });
    }

    /// Append an execution attempt.
    pub fn record_execution(
        &mut self,
        payload: String,
        captured: String,
        outcome: AttemptOutcome,
        duration_ms: u64,
    ) {
        self.executions.push(ExecutionAttempt {
            payload,
            captured,
            outcome,
            duration_ms,
        });
    }

    /// Number of attempts that count against the `max_revisions + 1` budget.
    pub fn counted_attempts(&self) -> u32 {
        self.executions
            .iter()
            .filter(|a| a.outcome.counts_as_attempt())
            .count() as u32
    }

    /// Find the most recent record for a given stage.
    pub fn last_record(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().rev().find(|r| r.stage == stage)
    }

    pub fn succeed(&mut self) {
        self.phase = RunPhase::Succeeded;
        self.cause = None;
    }

    pub fn fail(&mut self, cause: FailureCause) {
        self.phase = RunPhase::Failed;
        self.cause = Some(cause);
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_linear_order() {
        let mut stage = Stage::Observe;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Observe,
                Stage::Understand,
                Stage::Plan,
                Stage::Implement,
                Stage::Validate
            ]
        );
    }

    #[test]
    fn test_repair_outside_sequence() {
        assert_eq!(Stage::Repair.next(), None);
    }

    #[test]
    fn test_new_conversation() {
        let conv = Conversation::new("task-9");
        assert!(conv.session_id.starts_with("task-9-"));
        assert_eq!(conv.phase, RunPhase::Pending);
        assert!(conv.stages.is_empty());
        assert!(conv.executions.is_empty());
        assert!(!conv.is_terminal());
    }

    #[test]
    fn test_record_stage_appends_in_order() {
        let mut conv = Conversation::new("t");
        conv.record_stage(Stage::Observe, "probe".into(), "out".into(), None, 5);
        conv.record_stage(Stage::Understand, "p2".into(), "r2".into(), None, 7);

        assert_eq!(conv.stages.len(), 2);
        assert_eq!(conv.stages[0].stage, Stage::Observe);
        assert_eq!(conv.stages[1].stage, Stage::Understand);
        assert!(conv.stages[0].timestamp_ms <= conv.stages[1].timestamp_ms);
    }

    #[test]
    fn test_counted_attempts_skips_infrastructure() {
        let mut conv = Conversation::new("t");
        conv.record_execution("code".into(), "timeout".into(), AttemptOutcome::Infrastructure, 30_000);
        conv.record_execution("code".into(), "Traceback".into(), AttemptOutcome::CodeError, 90);
        conv.record_execution("code2".into(), "ok".into(), AttemptOutcome::Success, 120);

        assert_eq!(conv.executions.len(), 3);
        assert_eq!(conv.counted_attempts(), 2);
    }

    #[test]
    fn test_last_record_finds_latest() {
        let mut conv = Conversation::new("t");
        conv.record_stage(Stage::Implement, "p".into(), "r1".into(), Some("v1".into()), 1);
        conv.record_stage(Stage::Repair, "p".into(), "r2".into(), Some("v2".into()), 1);
        conv.record_stage(Stage::Repair, "p".into(), "r3".into(), Some("v3".into()), 1);

        let latest = conv.last_record(Stage::Repair).unwrap();
        assert_eq!(latest.payload.as_deref(), Some("v3"));
    }

    #[test]
    fn test_terminal_transitions() {
        let mut conv = Conversation::new("t");
        conv.fail(FailureCause::RevisionExhausted);
        assert!(conv.is_terminal());
        assert_eq!(conv.cause, Some(FailureCause::RevisionExhausted));

        let mut conv = Conversation::new("t");
        conv.succeed();
        assert!(conv.is_terminal());
        assert_eq!(conv.cause, None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut conv = Conversation::new("t");
        conv.record_stage(Stage::Plan, "p".into(), "r".into(), None, 3);
        conv.record_execution("c".into(), "out".into(), AttemptOutcome::Success, 10);

        let json = serde_json::to_string(&conv).unwrap();
        let restored: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.session_id, conv.session_id);
        assert_eq!(restored.stages.len(), 1);
        assert_eq!(restored.executions.len(), 1);
    }
}
