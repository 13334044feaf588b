//! The completion capability

use std::time::Duration;

use apples_core::TokenUsage;
use async_trait::async_trait;

use crate::messages::Messages;

/// A model's reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    /// Provider-side identifier of the generation, when reported
    pub id: Option<String>,
}

impl Completion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            id: None,
        }
    }
}

/// Failure of a single completion request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model response content was empty")]
    EmptyResponse,
}

impl CompletionError {
    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::RateLimited { .. }
            | CompletionError::Transport(_)
            | CompletionError::EmptyResponse => true,
            CompletionError::Api { status, .. } => *status >= 500,
            CompletionError::InvalidResponse(_) => false,
        }
    }

    /// Provider-requested delay before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CompletionError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Given a conversation, return a text completion from `model`
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, model: &str, messages: &Messages) -> Result<Completion, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CompletionError::RateLimited { retry_after: None }.is_retryable());
        assert!(CompletionError::Transport("reset".into()).is_retryable());
        assert!(CompletionError::Api { status: 502, body: String::new() }.is_retryable());
        assert!(!CompletionError::Api { status: 401, body: String::new() }.is_retryable());
        assert!(!CompletionError::InvalidResponse("not json".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let limited = CompletionError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(CompletionError::EmptyResponse.retry_after(), None);
    }
}
