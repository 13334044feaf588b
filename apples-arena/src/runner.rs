//! Game runner - drives a game round by round
//!
//! Level 2 - Round orchestration
//!
//! Each round: deal, ask every active player concurrently (each under its
//! own timeout), shuffle the plays, ask the judge, score. Failures of a
//! single seat never end the game; only an exhausted deck does.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use apples_core::{Game, GameError, RoundRecord};
use futures::future::join_all;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::GameConfig;
use crate::judge::{JudgeChoice, JudgeView};
use crate::player::{CallStats, PlayView};
use crate::seats::Seat;

/// Why the runner stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Every configured round was played
    Completed,
    /// A deck ran out; the game stopped at a round boundary
    DeckExhausted(GameError),
    /// Shutdown was requested; the unfinished round was abandoned
    Interrupted,
}

/// Outcome of running a game
#[derive(Debug)]
pub struct GameOutcome {
    pub game: Game,
    pub termination: Termination,
    /// Rounds finished during this run
    pub rounds_played: usize,
}

impl GameOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }
}

type RoundObserver = Box<dyn FnMut(&Game) + Send>;

/// Runs games with a fixed set of seats
pub struct GameRunner {
    seats: Vec<Seat>,
    config: GameConfig,
    /// Shuffles plays before judging
    rng: ChaCha8Rng,
    on_round: Option<RoundObserver>,
}

impl GameRunner {
    pub fn new(seats: Vec<Seat>, config: GameConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            seats,
            config,
            rng,
            on_round: None,
        }
    }

    /// Call `f` after every finished round
    pub fn on_round(mut self, f: impl FnMut(&Game) + Send + 'static) -> Self {
        self.on_round = Some(Box::new(f));
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Play until the game is over or a deck runs out
    pub async fn run(&mut self, game: Game) -> Result<GameOutcome, GameError> {
        self.run_until(game, std::future::pending()).await
    }

    /// Play until the game is over, a deck runs out, or `shutdown` resolves
    ///
    /// An `Err` means the runner broke a rule of the state machine; seat
    /// failures and deck exhaustion are reported through `Termination`.
    pub async fn run_until<F>(&mut self, mut game: Game, shutdown: F) -> Result<GameOutcome, GameError>
    where
        F: Future<Output = ()>,
    {
        if game.player_count() != self.seats.len() {
            return Err(GameError::SeatCountMismatch {
                players: game.player_count(),
                seats: self.seats.len(),
            });
        }

        // A continued game shuffles from a fresh stream rather than replaying
        // the shuffles of the rounds already played.
        let start = game.completed_rounds().len();
        self.rng.set_stream(start as u64);
        game.stats_mut().mark_started();

        tokio::pin!(shutdown);
        let termination = loop {
            if game.is_over() {
                break Termination::Completed;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    if game.abandon_round() {
                        tracing::warn!(round = game.rounds().len() + 1, "Shutdown requested, abandoning round");
                    }
                    break Termination::Interrupted;
                }
                result = self.play_round(&mut game) => match result {
                    Ok(()) => {
                        if let Some(f) = self.on_round.as_mut() {
                            f(&game);
                        }
                    }
                    Err(e) if e.is_deck_exhausted() => {
                        tracing::warn!(error = %e, "Stopping game early");
                        break Termination::DeckExhausted(e);
                    }
                    Err(e) => return Err(e),
                },
            }
        };

        game.stats_mut().mark_finished();
        let rounds_played = game.completed_rounds().len().saturating_sub(start);
        Ok(GameOutcome {
            game,
            termination,
            rounds_played,
        })
    }

    // ========================================================================
    // ROUND STEPS
    // ========================================================================

    async fn play_round(&mut self, game: &mut Game) -> Result<(), GameError> {
        let round = game.start_round()?;
        let round_number = round.round_number;
        let judge = round.judge;
        let red_card = round.red_card.clone();
        tracing::info!(
            round = round_number + 1,
            total = game.total_rounds(),
            judge = %game.player(judge)?.name,
            red_card = %red_card,
            "Starting round"
        );

        let history: Arc<[RoundRecord]> = Arc::from(game.completed_rounds());

        // Playing
        let mut views = Vec::new();
        for seat in game.waiting_seats() {
            views.push(PlayView {
                seat,
                player_count: game.player_count(),
                round_number,
                red_card: red_card.clone(),
                hand: game.player(seat)?.hand.clone(),
                history: Arc::clone(&history),
            });
        }
        self.collect_plays(game, &views).await?;

        // Judging
        let cards = game.close_plays(&mut self.rng)?;
        if cards.is_empty() {
            tracing::warn!(round = round_number + 1, "Every player forfeited, no winner this round");
        } else {
            let view = JudgeView {
                seat: judge,
                player_count: game.player_count(),
                round_number,
                red_card,
                cards,
                history,
            };
            let choice = self.ask_judge(&view).await;
            record_calls(game, choice.calls);
            game.judge_round(choice.index, choice.reasoning, choice.error)?;
            if let Some(path) = choice.log_path {
                game.attach_log(judge, path)?;
            }
        }

        // Scoring
        match game.finish_round()? {
            Some(seat) => {
                let card = game
                    .rounds()
                    .last()
                    .and_then(|r| r.decision.as_ref())
                    .map(|d| d.winning_card.to_string())
                    .unwrap_or_default();
                tracing::info!(
                    round = round_number + 1,
                    winner = %game.player(seat)?.name,
                    card = %card,
                    "Round won"
                );
            }
            None => tracing::info!(round = round_number + 1, "Round ended without a winner"),
        }
        Ok(())
    }

    /// Ask every active player at once and record plays or forfeits
    async fn collect_plays(&mut self, game: &mut Game, views: &[PlayView]) -> Result<(), GameError> {
        let timeout = self.config.play_timeout;
        let requests = self.seats.iter_mut().enumerate().filter_map(|(seat, s)| {
            let view = views.iter().find(|v| v.seat == seat)?;
            Some(async move { (seat, tokio::time::timeout(timeout, s.player.choose_play(view)).await) })
        });
        let results = join_all(requests).await;

        for (seat, result) in results {
            match result {
                Ok(Ok(choice)) => {
                    record_calls(game, choice.calls);
                    game.play_card(seat, &choice.card, choice.reasoning, choice.fallback)?;
                    if let Some(path) = choice.log_path {
                        game.attach_log(seat, path)?;
                    }
                }
                Ok(Err(e)) => {
                    record_calls(game, e.calls());
                    tracing::warn!(seat, error = %e, "Player forfeits the round");
                    game.forfeit(seat, e.to_string())?;
                    if let Some(path) = e.log_path() {
                        game.attach_log(seat, path)?;
                    }
                }
                Err(_) => {
                    let abandoned = match self.seats.get_mut(seat) {
                        Some(s) => s.player.take_abandoned_calls(),
                        None => CallStats::default(),
                    };
                    record_calls(game, abandoned);
                    tracing::warn!(seat, timeout_secs = timeout.as_secs_f64(), "Player timed out, forfeits the round");
                    game.forfeit(seat, format!("Timed out after {}", format_duration(timeout)))?;
                }
            }
        }
        Ok(())
    }

    async fn ask_judge(&mut self, view: &JudgeView) -> JudgeChoice {
        let timeout = self.config.judge_timeout;
        let Some(seat) = self.seats.get_mut(view.seat) else {
            return JudgeChoice::fallback(format!("No judge at seat {}", view.seat), CallStats::default());
        };

        let result = tokio::time::timeout(timeout, seat.judge.select_winner(view)).await;
        match result {
            Ok(choice) => choice,
            Err(_) => {
                tracing::warn!(seat = view.seat, "Judge timed out, first card wins");
                JudgeChoice::fallback(
                    format!("Judge timed out after {}", format_duration(timeout)),
                    seat.judge.take_abandoned_calls(),
                )
            }
        }
    }
}

fn record_calls(game: &mut Game, calls: CallStats) {
    let stats = game.stats_mut();
    stats.model_calls += calls.attempts;
    stats.failed_calls += calls.failures;
    stats.usage.add(calls.usage);
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
