//! Terminal projection of a conversation.
//!
//! Building a report re-executes nothing, mutates nothing, and reads no
//! clocks: the same terminated conversation always projects to the same
//! bytes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::conversation::{Conversation, ExecutionAttempt, StageRecord};
use crate::domain::outcome::FailureCause;
use crate::domain::task::Task;

/// The sole structured output boundary of the orchestrator: one record per
/// task, consumed downstream for comparison and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub kind: String,
    pub success: bool,

    /// Execution attempts that counted against the budget
    pub attempts: u32,
    /// Repair cycles consumed
    pub revisions: u32,

    /// Why the conversation failed; None on success
    pub cause: Option<FailureCause>,

    /// Full ordered pipeline transcript
    pub stages: Vec<StageRecord>,
    /// Full ordered submission history, infrastructure replays included
    pub executions: Vec<ExecutionAttempt>,

    /// The last payload submitted, if any
    pub final_payload: Option<String>,

    /// Output artifact location; present exactly when success is true and
    /// asserted to exist at report-creation time
    pub artifact_path: Option<PathBuf>,
}

impl TaskReport {
    /// Project a terminated conversation into its report.
    ///
    /// `artifact_path` must be the verified output location on success and
    /// None otherwise; the driver performs the existence assertion before
    /// calling this.
    pub fn from_conversation(
        task: &Task,
        conversation: &Conversation,
        artifact_path: Option<PathBuf>,
    ) -> Self {
        let success = conversation.phase == crate::domain::outcome::RunPhase::Succeeded;
        Self {
            task_id: task.id.clone(),
            kind: task.kind.clone(),
            success,
            attempts: conversation.counted_attempts(),
            revisions: conversation.revisions,
            cause: conversation.cause,
            stages: conversation.stages.clone(),
            executions: conversation.executions.clone(),
            final_payload: conversation.executions.last().map(|a| a.payload.clone()),
            artifact_path: if success { artifact_path } else { None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::Stage;
    use crate::domain::outcome::AttemptOutcome;
    use crate::domain::task::TargetRef;

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            instruction: "sum the totals".to_string(),
            kind: "cell_filling".to_string(),
            inputs: vec![PathBuf::from("/mnt/data/t1_input.xlsx")],
            target: TargetRef::parse("'Sheet1'!E2"),
        }
    }

    #[test]
    fn test_success_report_carries_artifact() {
        let mut conv = Conversation::new("t1");
        conv.record_execution("code".into(), "done".into(), AttemptOutcome::Success, 42);
        conv.succeed();

        let report = TaskReport::from_conversation(
            &task(),
            &conv,
            Some(PathBuf::from("/out/t1_output.xlsx")),
        );
        assert!(report.success);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.revisions, 0);
        assert_eq!(report.cause, None);
        assert_eq!(report.artifact_path, Some(PathBuf::from("/out/t1_output.xlsx")));
        assert_eq!(report.final_payload.as_deref(), Some("code"));
    }

    #[test]
    fn test_failed_report_has_no_artifact() {
        let mut conv = Conversation::new("t1");
        conv.record_execution("code".into(), "Traceback".into(), AttemptOutcome::CodeError, 10);
        conv.fail(FailureCause::RevisionExhausted);

        // Even if a stale path is passed in, failure drops it
        let report =
            TaskReport::from_conversation(&task(), &conv, Some(PathBuf::from("/out/x.xlsx")));
        assert!(!report.success);
        assert_eq!(report.artifact_path, None);
        assert_eq!(report.cause, Some(FailureCause::RevisionExhausted));
    }

    #[test]
    fn test_history_retained_on_failure() {
        let mut conv = Conversation::new("t1");
        conv.record_stage(Stage::Plan, "p".into(), "r".into(), None, 1);
        conv.record_execution("c1".into(), "err".into(), AttemptOutcome::CodeError, 1);
        conv.record_execution("c2".into(), "err".into(), AttemptOutcome::CodeError, 1);
        conv.revisions = 1;
        conv.fail(FailureCause::RevisionExhausted);

        let report = TaskReport::from_conversation(&task(), &conv, None);
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.executions.len(), 2);
        assert_eq!(report.final_payload.as_deref(), Some("c2"));
    }

    #[test]
    fn test_projection_is_deterministic() {
        let mut conv = Conversation::new("t1");
        conv.record_stage(Stage::Observe, "probe".into(), "out".into(), None, 2);
        conv.record_execution("c".into(), "ok".into(), AttemptOutcome::Success, 5);
        conv.succeed();

        let t = task();
        let path = Some(PathBuf::from("/out/t1_output.xlsx"));
        let a = serde_json::to_string(&TaskReport::from_conversation(&t, &conv, path.clone()))
            .unwrap();
        let b = serde_json::to_string(&TaskReport::from_conversation(&t, &conv, path)).unwrap();
        assert_eq!(a, b);
    }
}
