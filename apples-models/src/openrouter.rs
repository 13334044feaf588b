//! OpenRouter chat-completions client

use std::fmt;
use std::time::Duration;

use apples_core::TokenUsage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::{Completion, CompletionClient, CompletionError};
use crate::messages::{Message, Messages};

/// Environment variable the CLI reads the API key from
pub const API_KEY_ENV: &str = "OPEN_ROUTER_KEY";

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Longest error body kept in `CompletionError::Api`
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for `OpenRouterClient`
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Sent as `X-Title` so runs are attributable on the provider dashboard
    pub app_name: Option<String>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(90),
            app_name: Some("apples-to-models".to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("app_name", &self.app_name)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    id: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenRouterClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl OpenRouterClient {
    pub fn new(config: ClientConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, model: &str, messages: &Messages) -> Result<Completion, CompletionError> {
        let body = ChatRequest {
            model,
            messages: messages.as_slice(),
            temperature: self.config.temperature,
        };

        let mut request = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(name) = &self.config.app_name {
            request = request.header("X-Title", name);
        }

        tracing::debug!(model, messages = messages.len(), "Sending completion request");
        let response = request
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
        completion_from_response(parsed)
    }
}

fn completion_from_response(parsed: ChatResponse) -> Result<Completion, CompletionError> {
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(CompletionError::EmptyResponse)?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(Completion {
        content,
        usage,
        id: parsed.id,
    })
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_config_debug_redacts_key() {
        let config = ClientConfig::new("sk-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_completions_url() {
        let config = ClientConfig::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let mut messages = Messages::new();
        messages.add_user("hi");
        let body = ChatRequest {
            model: "openai/gpt-4o",
            messages: messages.as_slice(),
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "openai/gpt-4o");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_completion_from_response() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"id": "gen-1", "choices": [{"message": {"content": "Hello"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}}"#,
        )
        .unwrap();
        let completion = completion_from_response(parsed).unwrap();
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.usage.total(), 15);
        assert_eq!(completion.id.as_deref(), Some("gen-1"));
    }

    #[test]
    fn test_missing_content_is_empty_response() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert_eq!(
            completion_from_response(parsed).unwrap_err(),
            CompletionError::EmptyResponse
        );

        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(completion_from_response(parsed).is_err());
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
