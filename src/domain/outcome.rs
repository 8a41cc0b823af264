//! Classified outcomes of execution attempts and conversations.
//!
//! These are expected results of the state machine, not errors: a failed
//! task still yields a full report, never a propagated error.

use serde::{Deserialize, Serialize};

/// Classification of one submission to the sandbox session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    /// Clean output and the expected artifact exists
    Success,
    /// Captured output carries an error signature; consumes a revision slot
    CodeError,
    /// Clean output but no artifact in storage; treated like CodeError
    ArtifactMissing,
    /// Backend unreachable, timed out, or replied garbage; distinct budget
    Infrastructure,
}

impl AttemptOutcome {
    /// Outcomes that consume a revision slot and trigger a repair request
    pub fn needs_revision(&self) -> bool {
        matches!(self, AttemptOutcome::CodeError | AttemptOutcome::ArtifactMissing)
    }

    /// Submissions that count against the execution-attempt budget.
    /// Infrastructure replays of the same payload do not.
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, AttemptOutcome::Infrastructure)
    }
}

/// Phase of the execution and revision loop over one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Pipeline has not produced a candidate payload yet
    Pending,
    /// A payload is in flight against the sandbox session
    Executing,
    /// A repair request is pending after a code-class failure
    Retrying,
    /// Terminal: artifact produced and verified
    Succeeded,
    /// Terminal: budget exhausted or unrecoverable fault
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// Why a conversation ended without success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Oracle unreachable after its retry budget
    OracleUnavailable,
    /// Sandbox unreachable or timing out past the infrastructure budget
    Infrastructure,
    /// Revision budget consumed without a successful attempt
    RevisionExhausted,
    /// The workbook probe produced unusable output
    ObservationFailed,
    /// External shutdown aborted the conversation
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_revision() {
        assert!(AttemptOutcome::CodeError.needs_revision());
        assert!(AttemptOutcome::ArtifactMissing.needs_revision());
        assert!(!AttemptOutcome::Success.needs_revision());
        assert!(!AttemptOutcome::Infrastructure.needs_revision());
    }

    #[test]
    fn test_counts_as_attempt() {
        assert!(AttemptOutcome::Success.counts_as_attempt());
        assert!(AttemptOutcome::CodeError.counts_as_attempt());
        assert!(AttemptOutcome::ArtifactMissing.counts_as_attempt());
        assert!(!AttemptOutcome::Infrastructure.counts_as_attempt());
    }

    #[test]
    fn test_run_phase_terminal() {
        assert!(RunPhase::Succeeded.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(!RunPhase::Pending.is_terminal());
        assert!(!RunPhase::Executing.is_terminal());
        assert!(!RunPhase::Retrying.is_terminal());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&AttemptOutcome::CodeError).unwrap();
        assert_eq!(json, "\"code-error\"");
        let json = serde_json::to_string(&AttemptOutcome::ArtifactMissing).unwrap();
        assert_eq!(json, "\"artifact-missing\"");
    }

    #[test]
    fn test_failure_cause_serialization() {
        let json = serde_json::to_string(&FailureCause::RevisionExhausted).unwrap();
        assert_eq!(json, "\"revision_exhausted\"");
        let restored: FailureCause = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, FailureCause::RevisionExhausted);
    }
}
