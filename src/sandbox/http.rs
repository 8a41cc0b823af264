//! HTTP kernel backend.
//!
//! Wire format: `POST exec_url` with `{"convid": <session>, "code": <payload>}`.
//! The reply is JSON with the captured combined output under `result`, a
//! `new_kernel_created` flag, and optionally a structured `status` of
//! `"ok"` or `"error"`. Termination posts `{"convid": ..., "action":
//! "shutdown"}` to the same endpoint; backends without shutdown support
//! answer 404, which is treated as already-gone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::config::SandboxConfig;
use crate::sandbox::{ExecReply, ExecStatus, SandboxBackend, SandboxError};

pub struct HttpSandbox {
    client: Client,
    exec_url: String,
}

impl HttpSandbox {
    pub fn new(config: &SandboxConfig) -> Result<Self, SandboxError> {
        let client = Client::builder()
            .build()
            .map_err(|e| SandboxError::Connect(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            exec_url: config.exec_url.clone(),
        })
    }

    fn parse_reply(raw: &str) -> Result<ExecReply, SandboxError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            let preview: String = raw.chars().take(500).collect();
            SandboxError::BadReply(format!("{}; body starts: {}", e, preview))
        })?;

        let output = value
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| SandboxError::BadReply("reply has no result field".to_string()))?
            .to_string();

        let fresh_kernel = value
            .get("new_kernel_created")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| match s {
                "ok" => Some(ExecStatus::Ok),
                "error" => Some(ExecStatus::Error),
                _ => None,
            });

        Ok(ExecReply {
            output,
            status,
            fresh_kernel,
        })
    }
}

#[async_trait]
impl SandboxBackend for HttpSandbox {
    async fn submit(
        &self,
        session_id: &str,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecReply, SandboxError> {
        let body = json!({ "convid": session_id, "code": code });

        let request = self.client.post(&self.exec_url).json(&body).send();
        let response = match tokio::time::timeout(timeout, request).await {
            Err(_) => return Err(SandboxError::Timeout(timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(SandboxError::Timeout(timeout)),
            Ok(Err(e)) => return Err(SandboxError::Connect(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| SandboxError::Connect(e.to_string()))?;

        if !status.is_success() {
            return Err(SandboxError::BadReply(format!(
                "backend returned {}: {}",
                status,
                raw.chars().take(200).collect::<String>()
            )));
        }

        let reply = Self::parse_reply(&raw)?;
        if reply.fresh_kernel {
            tracing::debug!(session_id, "New kernel created for session");
        }
        Ok(reply)
    }

    async fn terminate(&self, session_id: &str) -> Result<(), SandboxError> {
        let body = json!({ "convid": session_id, "action": "shutdown" });
        let response = self
            .client
            .post(&self.exec_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SandboxError::Connect(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(SandboxError::BadReply(format!(
                "shutdown returned {}",
                status
            )))
        }
    }
}
