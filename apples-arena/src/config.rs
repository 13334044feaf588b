//! Configuration types for running a game
//!
//! Level 4 - Utilities and configuration

use std::path::PathBuf;
use std::time::Duration;

use apples_core::game::DEFAULT_HAND_SIZE;
use apples_models::RetryPolicy;

/// Settings shared by every seat and the round runner
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Rounds to play before the game is over
    pub rounds: usize,
    /// Cards each hand is refilled to
    pub hand_size: usize,
    /// Master seed; seat and shuffle RNGs derive from it
    pub seed: u64,
    /// Time a player has to choose a card
    pub play_timeout: Duration,
    /// Time the judge has to pick a winner
    pub judge_timeout: Duration,
    /// Retry policy for model requests
    pub retry: RetryPolicy,
    /// Whether models see previous rounds in their prompts
    pub include_history: bool,
    /// Where per-call model transcripts go; none are written when unset
    pub transcript_dir: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rounds: 10,
            hand_size: DEFAULT_HAND_SIZE,
            seed: 42,
            play_timeout: Duration::from_secs(120),
            judge_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            include_history: true,
            transcript_dir: None,
        }
    }
}

impl GameConfig {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            ..Default::default()
        }
    }

    pub fn with_hand_size(mut self, hand_size: usize) -> Self {
        self.hand_size = hand_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_play_timeout(mut self, timeout: Duration) -> Self {
        self.play_timeout = timeout;
        self
    }

    pub fn with_judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }
}
