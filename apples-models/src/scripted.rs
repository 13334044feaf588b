//! A completion client that replays canned answers
//!
//! Used for offline runs and tests. Queued replies are consumed in order;
//! once the queue is empty the fallback answer (if any) is returned forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{Completion, CompletionClient, CompletionError};
use crate::messages::Messages;

type Scripted = Result<String, CompletionError>;

#[derive(Default)]
pub struct ScriptedClient {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    delay: Option<Duration>,
    calls: AtomicU32,
    requests: Mutex<Vec<(String, Messages)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(self, content: impl Into<String>) -> Self {
        self.push(Ok(content.into()))
    }

    pub fn push_error(self, error: CompletionError) -> Self {
        self.push(Err(error))
    }

    fn push(self, item: Scripted) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(item);
        }
        self
    }

    pub fn always_reply(mut self, content: impl Into<String>) -> Self {
        self.fallback = Some(Ok(content.into()));
        self
    }

    pub fn always_fail(mut self, error: CompletionError) -> Self {
        self.fallback = Some(Err(error));
        self
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, as (model, messages)
    pub fn requests(&self) -> Vec<(String, Messages)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_answer(&self) -> Scripted {
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        queued
            .or_else(|| self.fallback.clone())
            .unwrap_or(Err(CompletionError::EmptyResponse))
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, model: &str, messages: &Messages) -> Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((model.to_string(), messages.clone()));
        }
        let answer = self.next_answer();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        answer.map(Completion::new)
    }
}
