//! Client side of the structured-text-understanding service.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use nepi_core::{ConfigError, DelegatedConfig};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion request timed out after {0}s")]
    Timeout(u64),
    #[error("completion service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("completion request failed: {0}")]
    Transport(String),
    /// The service answered 2xx but the body was not a usable completion.
    #[error("completion response was malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A service that answers a prompt with a JSON document.
pub trait CompletionService: Send + Sync {
    /// Send `system_prompt` and `user_prompt`, asking for output shaped like
    /// `schema_hint`. Returns the raw response text, which is not guaranteed
    /// to be valid JSON.
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        schema_hint: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;
}

/// OpenAI-compatible chat completions client using JSON response mode.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAiCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletion")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiCompletion {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DelegatedConfig, client: reqwest::Client) -> Result<Self, ConfigError> {
        let api_key = config.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        Ok(Self::new(
            client,
            config.base_url.clone(),
            api_key,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str, schema_hint: &Value) -> Value {
        json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                {
                    "role": "system",
                    "content": format!("{system_prompt}\n\nRespond with a single JSON object shaped like:\n{schema_hint}"),
                },
                { "role": "user", "content": user_prompt },
            ],
        })
    }
}

impl CompletionService for OpenAiCompletion {
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        schema_hint: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url);
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&self.request_body(system_prompt, user_prompt, schema_hint))
                .send()
                .await
                .map_err(|e| self.classify(e))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(CompletionError::Http {
                    status: status.as_u16(),
                    body: body.chars().take(300).collect(),
                });
            }

            let data: ChatResponse = resp.json().await.map_err(|e| {
                if e.is_decode() {
                    CompletionError::Malformed(e.to_string())
                } else {
                    self.classify(e)
                }
            })?;
            data.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| CompletionError::Malformed("no message content".to_string()))
        })
    }
}

impl OpenAiCompletion {
    fn classify(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.timeout.as_secs())
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OpenAiCompletion {
        OpenAiCompletion::new(
            reqwest::Client::new(),
            "https://llm.example.test/v1/",
            "sk-secret",
            "test-model",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(service().base_url, "https://llm.example.test/v1");
    }

    #[test]
    fn request_asks_for_json_object() {
        let body = service().request_body("sys", "user text", &json!({"nmi": "string"}));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][1]["content"], "user text");
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with("sys"));
        assert!(system.contains("\"nmi\""));
    }

    #[test]
    fn debug_hides_key() {
        assert!(!format!("{:?}", service()).contains("sk-secret"));
    }

    #[test]
    fn parses_first_choice() {
        let data: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{}"}}]}"#,
        )
        .unwrap();
        assert_eq!(data.choices[0].message.content.as_deref(), Some("{}"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.choices.is_empty());
    }

    #[test]
    fn from_config_requires_key() {
        let config = DelegatedConfig::default();
        assert!(OpenAiCompletion::from_config(&config, reqwest::Client::new()).is_err());
    }
}
