//! HTTP oracle client for OpenAI-style chat-completions APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::config::OracleConfig;
use crate::oracle::{Oracle, OracleError, Role, Turn};

/// Oracle backed by a chat-completions endpoint
#[derive(Debug)]
pub struct HttpOracle {
    client: Client,
    api_key: String,
    config: OracleConfig,
}

impl HttpOracle {
    /// Create a client, reading the API key from the configured environment
    /// variable.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| OracleError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;
        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(api_key: String, config: OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn build_request(&self, turns: &[Turn]) -> Value {
        let messages: Vec<Value> = turns
            .iter()
            .map(|t| {
                json!({
                    "role": match t.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": t.text,
                })
            })
            .collect();

        json!({
            "model": self.config.model,
            "messages": messages,
        })
    }

    fn parse_response(body: Value) -> Result<String, OracleError> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                OracleError::InvalidResponse("response has no message content".to_string())
            })
    }

    async fn send_request(&self, body: Value) -> Result<Value, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = message.chars().take(500).collect();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response
            .json::<Value>()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("malformed body: {}", e)))?;
        Ok(parsed)
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn request(&self, turns: &[Turn]) -> Result<String, OracleError> {
        let body = self.build_request(turns);
        let reply = self.send_request(body).await?;
        Self::parse_response(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> HttpOracle {
        HttpOracle::with_api_key("test-key".to_string(), OracleConfig::default()).unwrap()
    }

    #[test]
    fn test_build_request_alternates_roles() {
        let turns = vec![
            Turn::user("observe summary"),
            Turn::assistant("observation output"),
            Turn::user("understand prompt"),
        ];
        let body = oracle().build_request(&turns);

        assert_eq!(body["model"], "gpt-4o");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"], "understand prompt");
    }

    #[test]
    fn test_parse_response_extracts_content() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "the plan"}}]
        });
        assert_eq!(HttpOracle::parse_response(body).unwrap(), "the plan");
    }

    #[test]
    fn test_parse_response_rejects_empty_choices() {
        let body = json!({ "choices": [] });
        let err = HttpOracle::parse_response(body).unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = OracleConfig::default();
        config.api_key_env = "GRIDPILOT_TEST_KEY_THAT_DOES_NOT_EXIST".to_string();
        let err = HttpOracle::new(config).unwrap_err();
        assert!(matches!(err, OracleError::MissingApiKey { .. }));
    }
}
