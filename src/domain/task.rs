//! Task definitions and dataset ingestion.
//!
//! A Task is the immutable input to the orchestrator: it owns no resources
//! and is never mutated after ingestion.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GridpilotError, Result};

/// One unit of requested work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier from the dataset
    pub id: String,

    /// Natural-language instruction, verbatim from the requesting user
    pub instruction: String,

    /// Task-kind tag carried through to the report
    pub kind: String,

    /// Input workbook locations as the sandbox sees them
    pub inputs: Vec<PathBuf>,

    /// Where the answer must land, e.g. `'Sheet1'!C2:C11`
    pub target: TargetRef,
}

impl Task {
    /// The primary input workbook driving the conversation
    pub fn primary_input(&self) -> Option<&Path> {
        self.inputs.first().map(PathBuf::as_path)
    }
}

/// A sheet-qualified cell range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    /// Sheet name when the range is qualified; the active sheet otherwise
    pub sheet: Option<String>,
    /// The cell range within the sheet, e.g. `C2:C11`
    pub range: String,
}

impl TargetRef {
    /// Parse a target descriptor of the form `'Sheet Name'!A1:B2` or `A1:B2`.
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix('\'') {
            if let Some((sheet, range)) = rest.split_once("'!") {
                return Self {
                    sheet: Some(sheet.to_string()),
                    range: range.to_string(),
                };
            }
        }
        Self {
            sheet: None,
            range: raw.to_string(),
        }
    }
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "'{}'!{}", sheet, self.range),
            None => write!(f, "{}", self.range),
        }
    }
}

/// Raw dataset entry as serialized on disk
#[derive(Debug, Deserialize)]
struct DatasetEntry {
    id: String,
    instruction: String,
    instruction_type: String,
    #[serde(default)]
    inputs: Vec<PathBuf>,
    answer_position: String,
}

/// Load the task dataset from a JSON array file.
pub fn load_dataset(path: &Path) -> Result<Vec<Task>> {
    let text = fs::read_to_string(path)?;
    let entries: Vec<DatasetEntry> = serde_json::from_str(&text)?;

    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.inputs.is_empty() {
            return Err(GridpilotError::InvalidState(format!(
                "task {} has no input artifacts",
                entry.id
            )));
        }
        tasks.push(Task {
            id: entry.id,
            instruction: entry.instruction,
            kind: entry.instruction_type,
            inputs: entry.inputs,
            target: TargetRef::parse(&entry.answer_position),
        });
    }
    Ok(tasks)
}
