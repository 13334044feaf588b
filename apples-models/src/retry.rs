//! Bounded retry around a completion client

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::client::{Completion, CompletionClient, CompletionError};
use crate::messages::Messages;

/// Upper bound on a provider-requested `Retry-After` wait
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// How many times a failed request is repeated, and how long to wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn delay_for(&self, error: &CompletionError) -> Duration {
        error
            .retry_after()
            .map(|d| d.min(MAX_RETRY_AFTER))
            .unwrap_or(self.backoff)
    }
}

/// Result of a request together with how many attempts it took
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<Completion, CompletionError>,
    pub attempts: u32,
}

impl RetryOutcome {
    /// Attempts that returned an error
    pub fn failures(&self) -> u32 {
        match self.result {
            Ok(_) => self.attempts.saturating_sub(1),
            Err(_) => self.attempts,
        }
    }
}

/// Send `messages`, repeating retryable failures up to `policy.max_retries` times
pub async fn complete_with_retry(
    client: &dyn CompletionClient,
    model: &str,
    messages: &Messages,
    policy: RetryPolicy,
) -> RetryOutcome {
    complete_counting(client, model, messages, policy, &AtomicU32::new(0)).await
}

/// Like `complete_with_retry`, bumping `sent` as each request goes out
///
/// A caller that drops the future part-way (on a timeout) can still read
/// how many requests were made.
pub async fn complete_counting(
    client: &dyn CompletionClient,
    model: &str,
    messages: &Messages,
    policy: RetryPolicy,
    sent: &AtomicU32,
) -> RetryOutcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        sent.fetch_add(1, Ordering::Relaxed);
        let result = client.complete(model, messages).await;

        let error = match result {
            Ok(completion) => {
                return RetryOutcome {
                    result: Ok(completion),
                    attempts,
                }
            }
            Err(error) => error,
        };

        if !error.is_retryable() || attempts > policy.max_retries {
            return RetryOutcome {
                result: Err(error),
                attempts,
            };
        }

        let delay = policy.delay_for(&error);
        tracing::warn!(
            model,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Completion failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
