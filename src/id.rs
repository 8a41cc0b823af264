//! ID generation utilities for Gridpilot
//!
//! Provides functions for generating sandbox session identifiers.

use std::sync::atomic::{AtomicU32, Ordering};

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a sandbox session identifier for a conversation.
///
/// Format: `{task_id}-{timestamp_ms}-{seq_hex}`
/// Example: `task-042-1738300800123-001f`
///
/// The timestamp plus a process-local sequence number keeps identifiers
/// unique even when many conversations start in the same millisecond, so no
/// two conversations ever share a backend kernel.
pub fn generate_session_id(task_id: &str) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{:04x}", task_id, now_ms(), seq & 0xffff)
}
