//! Payload extraction from oracle responses.
//!
//! Responses carry candidate code in fenced blocks. The pipeline extracts
//! the block verbatim and pins workbook paths to the task's actual input and
//! output locations, since oracles routinely hardcode stale paths from the
//! accumulated context.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PYTHON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python\n(.*?)```").expect("valid regex"));

static GENERIC_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:[a-zA-Z0-9_-]*\n)?(.*?)```").expect("valid regex"));

static LOAD_WORKBOOK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"openpyxl\.load_workbook\(['"]([^'"]+)['"]\)"#).expect("valid regex")
});

static SAVE_WORKBOOK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"wb\.save\(['"]([^'"]+)['"]\)"#).expect("valid regex"));

static INPUT_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"input_path\s*=\s*['"]([^'"]+)['"]"#).expect("valid regex"));

static OUTPUT_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"output_path\s*=\s*['"]([^'"]+)['"]"#).expect("valid regex"));

/// Extract a demarcated code block from a response. Prefers ```python
/// fences, falls back to any fenced block. Returns None when the response
/// carries no fence at all.
pub fn extract_code(response: &str) -> Option<String> {
    if let Some(caps) = PYTHON_FENCE.captures(response) {
        return Some(caps[1].trim_matches('\n').to_string());
    }
    GENERIC_FENCE
        .captures(response)
        .map(|caps| caps[1].trim_matches('\n').to_string())
}

/// Rewrite workbook load/save sites and path variables so the payload
/// targets the task's actual files.
pub fn normalize_paths(code: &str, input_path: &str, output_path: &str) -> String {
    let code = LOAD_WORKBOOK.replace_all(code, |_: &Captures| {
        format!("openpyxl.load_workbook('{}')", input_path)
    });
    let code = SAVE_WORKBOOK.replace_all(&code, |_: &Captures| format!("wb.save('{}')", output_path));
    let code = INPUT_VAR.replace_all(&code, |_: &Captures| format!("input_path = '{}'", input_path));
    let code =
        OUTPUT_VAR.replace_all(&code, |_: &Captures| format!("output_path = '{}'", output_path));
    code.into_owned()
}
