//! Judges: picking the winning green card
//!
//! Level 3 - Step-level implementation
//!
//! A judge always produces a winner. When a model's answer is unusable the
//! first anonymized card wins and the failure is carried in `JudgeChoice::error`.

use std::path::PathBuf;
use std::sync::Arc;

use apples_core::{GreenCard, RedCard, RoundRecord};
use apples_models::prompts::{self, TableHistory};
use apples_models::{select_option, CompletionClient, RetryPolicy, TranscriptLog};
use async_trait::async_trait;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::model_call::ModelCall;
use crate::player::CallStats;

/// What the judge is shown: the red card and the shuffled plays, without seats
#[derive(Clone, Debug)]
pub struct JudgeView {
    pub seat: usize,
    pub player_count: usize,
    pub round_number: usize,
    pub red_card: RedCard,
    pub cards: Vec<GreenCard>,
    pub history: Arc<[RoundRecord]>,
}

#[derive(Clone, Debug)]
pub struct JudgeChoice {
    /// Index into `JudgeView::cards`
    pub index: usize,
    pub reasoning: String,
    pub error: Option<String>,
    pub calls: CallStats,
    pub log_path: Option<PathBuf>,
}

impl JudgeChoice {
    /// First card wins, with the failure recorded
    pub fn fallback(error: impl Into<String>, calls: CallStats) -> Self {
        Self {
            index: 0,
            reasoning: String::new(),
            error: Some(error.into()),
            calls,
            log_path: None,
        }
    }

    fn with_log(mut self, log_path: Option<PathBuf>) -> Self {
        self.log_path = log_path;
        self
    }
}

#[async_trait]
pub trait Judge: Send {
    /// `view.cards` is never empty
    async fn select_winner(&mut self, view: &JudgeView) -> JudgeChoice;

    /// Requests made by a `select_winner` that was cancelled before returning
    fn take_abandoned_calls(&mut self) -> CallStats {
        CallStats::default()
    }
}

/// Picks a uniformly random winner
pub struct RandomJudge {
    rng: ChaCha8Rng,
}

impl RandomJudge {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }
}

#[async_trait]
impl Judge for RandomJudge {
    async fn select_winner(&mut self, view: &JudgeView) -> JudgeChoice {
        if view.cards.is_empty() {
            return JudgeChoice::fallback("No cards to judge", CallStats::default());
        }
        JudgeChoice {
            index: self.rng.gen_range(0..view.cards.len()),
            reasoning: "Random selection".to_string(),
            error: None,
            calls: CallStats::default(),
            log_path: None,
        }
    }
}

/// Asks a language model to pick the winner
pub struct ModelJudge {
    call: ModelCall,
    include_history: bool,
}

impl ModelJudge {
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

    pub fn with_transcripts(mut self, log: Arc<TranscriptLog>) -> Self {
        self.call.transcripts = Some(log);
        self
    }
}

#[async_trait]
impl Judge for ModelJudge {
    async fn select_winner(&mut self, view: &JudgeView) -> JudgeChoice {
        let mut history = TableHistory::new(view.player_count, &view.history);
        if !self.include_history {
            history = history.without_rounds();
        }
        let messages = prompts::judge_messages(
            history,
            view.seat,
            view.round_number,
            &view.red_card,
            &view.cards,
        );
        let model = self.call.model();
        tracing::debug!(seat = view.seat, model = %model, prompt = %messages.transcript(), "Judge prompt");

        let log_name = format!("round_{:03}_judge_{}", view.round_number + 1, view.seat + 1);
        let sent = self.call.send(&messages, &log_name).await;
        let calls = sent.calls;
        let completion = match sent.result {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(seat = view.seat, model = %model, error = %e, "Judge request failed, first card wins");
                return JudgeChoice::fallback(format!("Judge request failed: {}", e), calls).with_log(sent.log_path);
            }
        };

        let options: Vec<&str> = view.cards.iter().map(GreenCard::as_str).collect();
        match select_option(&completion.content, &options) {
            Ok((index, reasoning)) => JudgeChoice {
                index,
                reasoning,
                error: None,
                calls,
                log_path: sent.log_path,
            },
            Err(e) => {
                tracing::warn!(seat = view.seat, model = %model, error = %e, "Invalid judgment, first card wins");
                JudgeChoice {
                    index: 0,
                    reasoning: completion.content,
                    error: Some(e.to_string()),
                    calls,
                    log_path: sent.log_path,
                }
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
    use apples_models::{CompletionError, ScriptedClient};
    use rand::SeedableRng;
    use std::time::Duration;

    fn view(cards: &[&str]) -> JudgeView {
        JudgeView {
            seat: 0,
            player_count: 3,
            round_number: 2,
            red_card: RedCard::new("Scary"),
            cards: cards.iter().map(|c| GreenCard::new(*c)).collect(),
            history: Arc::from(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_random_judge_in_range() {
        let mut judge = RandomJudge::new(ChaCha8Rng::seed_from_u64(9));
        let view = view(&["Ghosts", "Spiders", "Clowns"]);
        for _ in 0..20 {
            let choice = judge.select_winner(&view).await;
            assert!(choice.index < 3);
            assert!(choice.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_model_judge_picks_named_card() {
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "Creepy", "card": "Spiders"}"#));
        let mut judge = ModelJudge::new(client.clone(), "m");

        let choice = judge.select_winner(&view(&["Ghosts", "Spiders"])).await;
        assert_eq!(choice.index, 1);
        assert_eq!(choice.reasoning, "Creepy");
        assert!(choice.error.is_none());

        let prompt = client.requests()[0].1.last().unwrap().content.clone();
        assert!(prompt.contains("Current Round 3"));
        assert!(prompt.contains("- Ghosts\n- Spiders"));
    }

    #[tokio::test]
    async fn test_model_judge_unknown_card_falls_back() {
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "x", "card": "Bats"}"#));
        let mut judge = ModelJudge::new(client, "m");

        let choice = judge.select_winner(&view(&["Ghosts", "Spiders"])).await;
        assert_eq!(choice.index, 0);
        assert!(choice.error.unwrap().contains("Bats"));
    }

    #[tokio::test]
    async fn test_model_judge_api_failure_falls_back() {
        let client = Arc::new(ScriptedClient::new().always_fail(CompletionError::EmptyResponse));
        let retry = RetryPolicy::default().with_backoff(Duration::from_millis(1));
        let mut judge = ModelJudge::new(client, "m").with_retry(retry);

        let choice = judge.select_winner(&view(&["Ghosts", "Spiders"])).await;
        assert_eq!(choice.index, 0);
        assert!(choice.error.unwrap().starts_with("Judge request failed"));
        assert_eq!(choice.calls.failures, 2);
    }

    #[tokio::test]
    async fn test_model_judge_rejects_card_containing_a_played_card() {
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "majestic", "card": "Sea Lions"}"#));
        let mut judge = ModelJudge::new(client, "m");

        let choice = judge.select_winner(&view(&["Tigers", "Lions"])).await;
        assert_eq!(choice.index, 0);
        assert!(choice.error.unwrap().contains("Sea Lions"));
    }

    #[tokio::test]
    async fn test_model_judge_links_transcript() {
        let dir = std::env::temp_dir().join(format!("apples_judge_logs_{}", std::process::id()));
        let client = Arc::new(ScriptedClient::new().push_reply(r#"{"reasoning": "Creepy", "card": "Spiders"}"#));
        let mut judge = ModelJudge::new(client, "m").with_transcripts(Arc::new(TranscriptLog::new(&dir)));

        let choice = judge.select_winner(&view(&["Ghosts", "Spiders"])).await;
        assert_eq!(choice.log_path, Some(dir.join("round_003_judge_1.log")));
        std::fs::remove_dir_all(&dir).ok();
    }
}
