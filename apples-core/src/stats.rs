//! Benchmark bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token counts reported by a completion call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Counters accumulated over a benchmark run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Completion requests issued, retries included
    pub model_calls: u32,
    /// Requests that returned an error
    pub failed_calls: u32,
    /// Model answers replaced by a fallback selection
    pub fallbacks: u32,
    pub forfeits: u32,
    pub judging_errors: u32,
    pub usage: TokenUsage,
}

impl BenchmarkStats {
    pub fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_finished(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock seconds between start and finish
    pub fn elapsed_secs(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}
