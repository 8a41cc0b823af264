//! Outcome classification for sandbox submissions.
//!
//! A structured status from the backend is authoritative when present. The
//! substring heuristic is only a fallback: it looks for Python traceback
//! shapes rather than the bare word "error", which shows up in legitimate
//! output too. Absence of an error signature is necessary but not
//! sufficient for success; the artifact must exist as well.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::outcome::AttemptOutcome;
use crate::sandbox::{ExecReply, ExecStatus};

static EXCEPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[\w.]*(Error|Exception):").expect("valid regex"));

/// Fallback detection of an error signature in captured output.
pub fn has_error_signature(output: &str) -> bool {
    output.contains("Traceback (most recent call last)") || EXCEPTION_LINE.is_match(output)
}

/// Classify one submission's reply against artifact storage.
pub fn classify(reply: &ExecReply, artifact_exists: bool) -> AttemptOutcome {
    match reply.status {
        Some(ExecStatus::Error) => return AttemptOutcome::CodeError,
        Some(ExecStatus::Ok) => {
            return if artifact_exists {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::ArtifactMissing
            };
        }
        None => {}
    }

    if has_error_signature(&reply.output) {
        AttemptOutcome::CodeError
    } else if !artifact_exists {
        // Covers the silent case too: no output, no error, no artifact
        AttemptOutcome::ArtifactMissing
    } else {
        AttemptOutcome::Success
    }
}

/// Condense a kernel traceback dump into the chunks worth feeding back to
/// the oracle: the exception, the failing cell, and the tail.
pub fn error_excerpt(output: &str) -> String {
    if !output.contains("-----") {
        return output.to_string();
    }
    let chunks: Vec<&str> = output.split("\n\n\n\n").collect();
    let mut excerpt = String::new();
    if let Some(chunk) = chunks.iter().find(|c| c.contains("Error")) {
        excerpt.push_str(chunk);
        excerpt.push('\n');
    }
    if let Some(chunk) = chunks.iter().find(|c| c.starts_with("Cell")) {
        excerpt.push_str(chunk);
        excerpt.push('\n');
    }
    if let Some(last) = chunks.last() {
        if !excerpt.ends_with(last) {
            excerpt.push_str(last);
        }
    }
    excerpt
}
