//! Configuration for the orchestrator.
//!
//! Nested structs with serde defaults; loaded from a YAML file when one is
//! given, otherwise every section falls back to its `Default`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GridpilotError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub oracle: OracleConfig,
    pub sandbox: SandboxConfig,
    pub revision: RevisionConfig,
    pub pool: PoolConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            oracle: OracleConfig::default(),
            sandbox: SandboxConfig::default(),
            revision: RevisionConfig::default(),
            pool: PoolConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Model name passed through to the completions API
    pub model: String,
    /// Base URL of the chat-completions endpoint
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-call timeout
    pub timeout_ms: u64,
    /// Attempts before the conversation fails with OracleUnavailable
    pub max_attempts: u32,
    /// Base for exponential backoff between attempts (2 -> 2s, 4s, 8s)
    pub backoff_base_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "GRIDPILOT_API_KEY".to_string(),
            timeout_ms: 120_000,
            max_attempts: 3,
            backoff_base_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Execution endpoint of the kernel backend
    pub exec_url: String,
    /// Per-submission timeout
    pub submit_timeout_ms: u64,
    /// Infrastructure retries per conversation, distinct from code revisions
    pub infra_retries: u32,
    /// Delay before resubmitting after an infrastructure failure
    pub infra_backoff_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            exec_url: "http://localhost:8080/execute".to_string(),
            submit_timeout_ms: 30_000,
            infra_retries: 2,
            infra_backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionConfig {
    /// Maximum repair cycles after the first execution attempt
    pub max_revisions: u32,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self { max_revisions: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Concurrent conversations, bounded by sandbox capacity
    pub max_concurrent: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the sandbox writes output workbooks
    pub output_dir: PathBuf,
    /// Where task reports are persisted
    pub report_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridpilot");
        Self {
            output_dir: base.join("outputs"),
            report_dir: base.join("reports"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, or defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let text = fs::read_to_string(p)?;
                serde_yaml::from_str(&text)
                    .map_err(|e| GridpilotError::Config(format!("{}: {}", p.display(), e)))
            }
            None => Ok(Self::default()),
        }
    }
}
