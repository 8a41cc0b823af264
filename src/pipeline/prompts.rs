//! Instruction templates for the reasoning stages.
//!
//! Each builder assembles one stage-specific prompt from the task and the
//! accumulated context. Context excerpts are truncated so prompts stay
//! bounded as the conversation grows.

use crate::domain::task::Task;

/// Marker the validation stage must emit when the candidate needs no change
pub const VALIDATION_PASSED: &str = "VALIDATION PASSED";

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Task header carried as the first user turn of the conversation.
pub fn observation_summary(task: &Task, input_path: &str) -> String {
    format!(
        "SPREADSHEET OBSERVATION\n\n\
         Task: {}\n\
         Type: {}\n\
         Target: {}\n\
         File: {}\n\n\
         The structural probe below was executed against the workbook; its \
         output follows as the next message.",
        task.instruction, task.kind, task.target, input_path
    )
}

pub fn understanding_prompt(task: &Task, observation: &str) -> String {
    format!(
        "You are in the INSTRUCTION UNDERSTANDING stage.\n\n\
         This is a real-world spreadsheet request. Extract the core requirements.\n\n\
         ORIGINAL INSTRUCTION (may be long and informal):\n{}\n\n\
         SPREADSHEET STRUCTURE (from observation):\n{}\n\n\
         TASK TYPE: {}\n\n\
         Break the instruction into structured requirements:\n\n\
         ## 1. Core Objective\n\
         The primary goal, in one clear sentence.\n\n\
         ## 2. Input Data Location\n\
         Which cells or ranges hold the input data, and in what format.\n\n\
         ## 3. Output Requirements\n\
         Where results must be written and in what form (formula, value, formatting).\n\n\
         ## 4. Business Logic\n\
         The calculation or operation needed, with any conditions and edge cases.\n\n\
         Provide your structured analysis:",
        task.instruction,
        truncate(observation, 1000),
        task.kind
    )
}

pub fn planning_prompt(
    task: &Task,
    observation: &str,
    understanding: &str,
    input_path: &str,
    output_path: &str,
) -> String {
    format!(
        "You are in the SOLUTION PLANNING stage.\n\n\
         SPREADSHEET FACTS (structure may be non-standard):\n{}\n\n\
         UNDERSTOOD REQUIREMENTS:\n{}\n\n\
         FILE PATHS:\n\
         - Input: {}\n\
         - Output: {}\n\
         - Target cells: {}\n\n\
         Design a step-by-step implementation plan:\n\
         1. Load the workbook and locate the target sheet and range.\n\
         2. Locate input data dynamically from the observed structure; never assume data starts at A1.\n\
         3. Extract and convert values, handling empty and merged cells explicitly.\n\
         4. Apply the core operation, spelling out any formula to be written.\n\
         5. Write results to {} preserving the existing format pattern.\n\
         6. Save to the output path and close the workbook.\n\n\
         Avoid hardcoded cell references; use positions from the observation. \
         Provide the complete plan with specific cell references:",
        truncate(observation, 800),
        truncate(understanding, 800),
        input_path,
        output_path,
        task.target,
        task.target
    )
}

pub fn implementation_prompt(
    observation: &str,
    understanding: &str,
    plan: &str,
    input_path: &str,
    output_path: &str,
    target: &str,
) -> String {
    format!(
        "You are in the CODE IMPLEMENTATION stage.\n\n\
         OBSERVED STRUCTURE:\n{}\n\n\
         REQUIREMENTS SUMMARY:\n{}\n\n\
         IMPLEMENTATION PLAN:\n{}\n\n\
         Write complete Python code following the plan, using the openpyxl \
         library available in the execution environment.\n\n\
         Requirements:\n\
         - Load from: {}\n\
         - Save to: {}\n\
         - Target cells: {}\n\
         - Use dynamic references from the observation, not hardcoded positions.\n\
         - Check cell.value is not None before operating on it.\n\
         - Wrap the body in try/except and print the failure on error.\n\
         - Never write a formula that references its own target cell.\n\
         - No @ prefix before function or sheet names in formulas; concatenate \
           strings with & outside quotes, e.g. =\"*\"&A1&\"*\".\n\n\
         Respond with the full implementation in a single ```python block:",
        truncate(observation, 800),
        truncate(understanding, 800),
        plan,
        input_path,
        output_path,
        target
    )
}

pub fn validation_prompt(plan: &str, payload: &str) -> String {
    format!(
        "You are in the CODE VALIDATION stage.\n\n\
         Review the generated code for defects before it is executed.\n\n\
         IMPLEMENTATION PLAN (expected behavior):\n{}\n\n\
         GENERATED CODE:\n```python\n{}\n```\n\n\
         Check each point:\n\
         1. Cell references match the observed positions, not assumptions.\n\
         2. Try/except present; None and type checks before arithmetic.\n\
         3. All imports present.\n\
         4. Loads and saves the correct files and closes the workbook.\n\
         5. Steps follow the plan and write to the specified target cells.\n\
         6. No formula references its own target cell.\n\
         7. Formula syntax: no @ prefix, correct string concatenation with &.\n\n\
         If the code is correct, respond with exactly: {}\n\
         Otherwise respond with the corrected code in a single ```python block:",
        truncate(plan, 600),
        payload,
        VALIDATION_PASSED
    )
}

pub fn revision_prompt(
    instruction: &str,
    observation: &str,
    plan: &str,
    current_code: &str,
    error_text: &str,
) -> String {
    format!(
        "You are in ERROR RECOVERY mode.\n\n\
         TASK: {}\n\n\
         SPREADSHEET STRUCTURE (observed):\n{}\n\n\
         ORIGINAL PLAN:\n{}\n\n\
         CURRENT CODE (failed):\n```python\n{}\n```\n\n\
         EXECUTION ERROR:\n{}\n\n\
         Read the traceback, identify the root cause, and fix it rather than \
         patching symptoms. Typical causes: wrong range, None cell values, \
         sheet name mismatch, type conversion, formula syntax (@ prefix or \
         string concatenation), circular reference.\n\n\
         Respond with the complete corrected code in a single ```python block:",
        instruction,
        truncate(observation, 600),
        truncate(plan, 600),
        current_code,
        truncate(error_text, 2000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TargetRef;
    use std::path::PathBuf;

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            instruction: "Compute the running total in column E".to_string(),
            kind: "cell_filling".to_string(),
            inputs: vec![PathBuf::from("/mnt/data/t1_input.xlsx")],
            target: TargetRef::parse("'Sheet1'!E2:E9"),
        }
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long, 10).len(), 10);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld";
        let cut = truncate(text, 3);
        assert_eq!(cut.chars().count(), 3);
    }

    #[test]
    fn test_observation_summary_names_target() {
        let summary = observation_summary(&task(), "/mnt/data/t1_input.xlsx");
        assert!(summary.contains("'Sheet1'!E2:E9"));
        assert!(summary.contains("Compute the running total"));
    }

    #[test]
    fn test_understanding_prompt_truncates_observation() {
        let observation = "o".repeat(5000);
        let prompt = understanding_prompt(&task(), &observation);
        assert!(prompt.len() < 3000);
        assert!(prompt.contains("INSTRUCTION UNDERSTANDING"));
    }

    #[test]
    fn test_validation_prompt_carries_marker() {
        let prompt = validation_prompt("the plan", "print('x')");
        assert!(prompt.contains(VALIDATION_PASSED));
        assert!(prompt.contains("print('x')"));
    }

    #[test]
    fn test_revision_prompt_carries_error() {
        let prompt = revision_prompt(
            "task",
            "obs",
            "plan",
            "bad code",
            "NameError: name 'ws' is not defined",
        );
        assert!(prompt.contains("ERROR RECOVERY"));
        assert!(prompt.contains("NameError"));
        assert!(prompt.contains("bad code"));
    }
}
