//! Players: choosing a green card for the round's red card
//!
//! Level 3 - Step-level implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use apples_core::{GreenCard, RedCard, RoundRecord, TokenUsage};
use apples_models::prompts::{self, TableHistory};
use apples_models::{select_option, CompletionClient, CompletionError, RetryPolicy, TranscriptLog};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::model_call::ModelCall;

/// What a player is shown when asked to play
#[derive(Clone, Debug)]
pub struct PlayView {
    pub seat: usize,
    pub player_count: usize,
    pub round_number: usize,
    pub red_card: RedCard,
    pub hand: Vec<GreenCard>,
    /// Finished rounds, shared between all seats of the round
    pub history: Arc<[RoundRecord]>,
}

/// Model requests made while producing a choice
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub attempts: u32,
    pub failures: u32,
    pub usage: TokenUsage,
}

/// A player's decision for one round
#[derive(Clone, Debug)]
pub struct PlayChoice {
    pub card: GreenCard,
    pub reasoning: String,
    /// Why the model's answer was replaced by the first card in hand
    pub fallback: Option<String>,
    pub calls: CallStats,
    /// Transcript of the model call, when one was written
    pub log_path: Option<PathBuf>,
}

/// Why a seat produced no usable choice
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeatError {
    #[error("{error} (after {} attempts)", .calls.attempts)]
    Completion {
        error: CompletionError,
        calls: CallStats,
        log_path: Option<PathBuf>,
    },

    #[error("No cards to choose from")]
    NoOptions,
}

impl SeatError {
    pub fn calls(&self) -> CallStats {
        match self {
            SeatError::Completion { calls, .. } => *calls,
            SeatError::NoOptions => CallStats::default(),
        }
    }

    pub fn log_path(&self) -> Option<&Path> {
        match self {
            SeatError::Completion { log_path, .. } => log_path.as_deref(),
            SeatError::NoOptions => None,
        }
    }
}

/// Anything that can choose a card from a hand
#[async_trait]
pub trait Player: Send {
    async fn choose_play(&mut self, view: &PlayView) -> Result<PlayChoice, SeatError>;

    /// Requests made by a `choose_play` that was cancelled before returning
    fn take_abandoned_calls(&mut self) -> CallStats {
        CallStats::default()
    }
}

// ============================================================================
// RANDOM PLAYER
// ============================================================================

/// Plays a uniformly random card
pub struct RandomPlayer {
    rng: ChaCha8Rng,
}

impl RandomPlayer {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }
}

#[async_trait]
impl Player for RandomPlayer {
    async fn choose_play(&mut self, view: &PlayView) -> Result<PlayChoice, SeatError> {
        let card = view.hand.choose(&mut self.rng).ok_or(SeatError::NoOptions)?;
        Ok(PlayChoice {
            card: card.clone(),
            reasoning: "Random selection".to_string(),
            fallback: None,
            calls: CallStats::default(),
            log_path: None,
        })
    }
}

// ============================================================================
// MODEL PLAYER
// ============================================================================

/// Asks a language model which card to play
pub struct ModelPlayer {
    call: ModelCall,
    include_history: bool,
}

impl ModelPlayer {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            call: ModelCall::new(client, model.into()),
            include_history: true,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.call.retry = retry;
        self
    }

    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    /// Write a transcript of every request into `log`
    pub fn with_transcripts(mut self, log: Arc<TranscriptLog>) -> Self {
        self.call.transcripts = Some(log);
        self
    }

    pub fn model(&self) -> &str {
        self.call.model()
    }
}

#[async_trait]
impl Player for ModelPlayer {
    async fn choose_play(&mut self, view: &PlayView) -> Result<PlayChoice, SeatError> {
        let first = view.hand.first().ok_or(SeatError::NoOptions)?;

        let mut history = TableHistory::new(view.player_count, &view.history);
        if !self.include_history {
            history = history.without_rounds();
        }
        let messages = prompts::player_messages(history, view.seat, &view.red_card, &view.hand);
        tracing::debug!(seat = view.seat, model = %self.model(), prompt = %messages.transcript(), "Player prompt");

        let log_name = format!("round_{:03}_player_{}", view.round_number + 1, view.seat + 1);
        let sent = self.call.send(&messages, &log_name).await;
        let (calls, log_path) = (sent.calls, sent.log_path);
        let completion = match sent.result {
            Ok(completion) => completion,
            Err(error) => {
                return Err(SeatError::Completion {
                    error,
                    calls,
                    log_path,
                })
            }
        };

        let options: Vec<&str> = view.hand.iter().map(GreenCard::as_str).collect();
        match select_option(&completion.content, &options) {
            Ok((index, reasoning)) => Ok(PlayChoice {
                card: view.hand[index].clone(),
                reasoning,
                fallback: None,
                calls,
                log_path,
            }),
            Err(e) => {
                tracing::warn!(
                    seat = view.seat,
                    model = %self.model(),
                    error = %e,
                    "Invalid selection, playing first card"
                );
                Ok(PlayChoice {
                    card: first.clone(),
                    reasoning: completion.content,
                    fallback: Some(e.to_string()),
                    calls,
                    log_path,
                })
            }
        }
    }

    fn take_abandoned_calls(&mut self) -> CallStats {
        self.call.take_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apples_models::ScriptedClient;
    use rand::SeedableRng;
    use std::time::Duration;

    fn view(hand: &[&str]) -> PlayView {
        PlayView {
            seat: 1,
            player_count: 3,
            round_number: 0,
            red_card: RedCard::new("Big"),
            hand: hand.iter().map(|c| GreenCard::new(*c)).collect(),
            history: Arc::from(Vec::new()),
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::default().with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_random_player_plays_from_hand() {
        let mut player = RandomPlayer::new(ChaCha8Rng::seed_from_u64(3));
        let view = view(&["Dinosaurs", "Mountains", "Whales"]);
        for _ in 0..10 {
            let choice = player.choose_play(&view).await.unwrap();
            assert!(view.hand.contains(&choice.card));
            assert_eq!(choice.calls.attempts, 0);
        }
    }

    #[tokio::test]
    async fn test_random_player_empty_hand() {
        let mut player = RandomPlayer::new(ChaCha8Rng::seed_from_u64(3));
        assert_eq!(player.choose_play(&view(&[])).await.unwrap_err(), SeatError::NoOptions);
    }

    #[tokio::test]
    async fn test_model_player_valid_answer() {
        let client = Arc::new(
            ScriptedClient::new().push_reply(r#"{"reasoning": "Huge and ancient", "card": "Dinosaurs"}"#),
        );
        let mut player = ModelPlayer::new(client.clone(), "test/model").with_retry(fast());

        let choice = player.choose_play(&view(&["Mountains", "Dinosaurs"])).await.unwrap();
        assert_eq!(choice.card, GreenCard::new("Dinosaurs"));
        assert_eq!(choice.reasoning, "Huge and ancient");
        assert!(choice.fallback.is_none());
        assert_eq!(choice.calls.attempts, 1);

        let requests = client.requests();
        assert_eq!(requests[0].0, "test/model");
        let prompt = &requests[0].1.last().unwrap().content;
        assert!(prompt.contains("You are Player 2"));
        assert!(prompt.contains("Mountains, Dinosaurs"));
    }

    #[tokio::test]
    async fn test_model_player_falls_back_to_first_card() {
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "hmm", "card": "Volcanoes"}"#));
        let mut player = ModelPlayer::new(client, "m").with_retry(fast());

        let choice = player.choose_play(&view(&["Mountains", "Dinosaurs"])).await.unwrap();
        assert_eq!(choice.card, GreenCard::new("Mountains"));
        let fallback = choice.fallback.unwrap();
        assert!(fallback.contains("Volcanoes"));
    }

    #[tokio::test]
    async fn test_model_player_completion_failure() {
        let client = Arc::new(ScriptedClient::new().always_fail(CompletionError::Transport("down".into())));
        let mut player = ModelPlayer::new(client.clone(), "m").with_retry(fast());

        let err = player.choose_play(&view(&["Mountains"])).await.unwrap_err();
        assert!(matches!(err, SeatError::Completion { .. }));
        assert_eq!(err.calls().attempts, 2);
        assert_eq!(err.calls().failures, 2);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_model_player_without_history() {
        let client = Arc::new(ScriptedClient::new().always_reply("Mountains"));
        let mut player = ModelPlayer::new(client.clone(), "m").with_history(false);
        player.choose_play(&view(&["Mountains"])).await.unwrap();
        assert_eq!(client.requests()[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_model_player_rejects_card_containing_a_hand_card() {
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "sweet", "card": "Pineapple"}"#));
        let mut player = ModelPlayer::new(client, "m").with_retry(fast());

        let choice = player.choose_play(&view(&["Apple", "Dogs"])).await.unwrap();
        assert_eq!(choice.card, GreenCard::new("Apple"));
        assert!(choice.fallback.unwrap().contains("Pineapple"));
    }

    #[tokio::test]
    async fn test_model_player_writes_transcript() {
        let dir = std::env::temp_dir().join(format!("apples_player_logs_{}", std::process::id()));
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "tall", "card": "Mountains"}"#));
        let mut player = ModelPlayer::new(client, "test/model")
            .with_retry(fast())
            .with_transcripts(Arc::new(TranscriptLog::new(&dir)));

        let choice = player.choose_play(&view(&["Mountains", "Dinosaurs"])).await.unwrap();
        let path = choice.log_path.unwrap();
        assert_eq!(path, dir.join("round_001_player_2.log"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Model: test/model"));
        assert!(text.contains("You are Player 2"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_model_player_reports_calls_of_a_cancelled_request() {
        let client = Arc::new(ScriptedClient::new().always_reply("Mountains").with_delay(Duration::from_secs(60)));
        let mut player = ModelPlayer::new(client, "m").with_retry(fast());

        let view = view(&["Mountains"]);
        let cancelled = tokio::time::timeout(Duration::from_millis(50), player.choose_play(&view)).await;
        assert!(cancelled.is_err());

        let calls = player.take_abandoned_calls();
        assert_eq!((calls.attempts, calls.failures), (1, 1));
        assert_eq!(player.take_abandoned_calls().attempts, 0);
    }
}
