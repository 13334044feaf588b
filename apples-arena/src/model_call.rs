//! One seat's request to a model
//!
//! Level 4 - Utilities
//!
//! Shared by model players and judges: retry, call accounting that survives
//! a timeout, and the per-call transcript.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use apples_models::{
    complete_counting, CallTranscript, Completion, CompletionClient, CompletionError, Messages,
    RetryPolicy, TranscriptLog,
};

use crate::player::CallStats;

pub(crate) struct ModelCall {
    client: Arc<dyn CompletionClient>,
    model: String,
    pub(crate) retry: RetryPolicy,
    pub(crate) transcripts: Option<Arc<TranscriptLog>>,
    /// Requests sent by the call in progress
    sent: AtomicU32,
}

/// What came back from `ModelCall::send`
pub(crate) struct SentCall {
    pub result: Result<Completion, CompletionError>,
    pub calls: CallStats,
    pub log_path: Option<PathBuf>,
}

impl ModelCall {
    pub fn new(client: Arc<dyn CompletionClient>, model: String) -> Self {
        Self {
            client,
            model,
            retry: RetryPolicy::default(),
            transcripts: None,
            sent: AtomicU32::new(0),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send with retry and write the transcript as `log_name`
    pub async fn send(&self, messages: &Messages, log_name: &str) -> SentCall {
        self.sent.store(0, Ordering::Relaxed);
        let started = Instant::now();
        let outcome =
            complete_counting(self.client.as_ref(), &self.model, messages, self.retry, &self.sent).await;
        let duration = started.elapsed();
        self.sent.store(0, Ordering::Relaxed);

        let calls = CallStats {
            attempts: outcome.attempts,
            failures: outcome.failures(),
            usage: outcome.result.as_ref().map(|c| c.usage).unwrap_or_default(),
        };

        let log_path = match &self.transcripts {
            Some(log) => {
                let transcript = CallTranscript {
                    model: &self.model,
                    messages,
                    duration,
                    attempts: outcome.attempts,
                    result: &outcome.result,
                };
                match log.write(log_name, &transcript).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!(model = %self.model, error = %e, "Failed to write model transcript");
                        None
                    }
                }
            }
            None => None,
        };

        SentCall {
            result: outcome.result,
            calls,
            log_path,
        }
    }

    /// Requests of a call that was dropped before returning, all counted as failed
    pub fn take_abandoned(&self) -> CallStats {
        let sent = self.sent.swap(0, Ordering::Relaxed);
        CallStats {
            attempts: sent,
            failures: sent,
            ..Default::default()
        }
    }
}
