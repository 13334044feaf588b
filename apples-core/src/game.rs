//! Game state and the round state machine

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::{CardPool, GreenCard, RedCard};
use crate::deck::{Deck, DeckKind};
use crate::error::GameError;
use crate::scoreboard::Scoreboard;
use crate::stats::BenchmarkStats;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Version tag written into saved games
pub const GAME_FORMAT_VERSION: &str = "1.0";

/// Cards each hand is refilled to at the start of a round
pub const DEFAULT_HAND_SIZE: usize = 7;

// ============================================================================
// CORE TYPES
// ============================================================================

/// What drives a seat: uniform random choices or a language model
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatKind {
    Random,
    Model(String),
}

impl SeatKind {
    pub fn is_model(&self) -> bool {
        matches!(self, SeatKind::Model(_))
    }

    pub fn label(&self) -> &str {
        match self {
            SeatKind::Random => "random",
            SeatKind::Model(id) => id,
        }
    }
}

impl FromStr for SeatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err("model identifier cannot be empty".to_string())
        } else if s.eq_ignore_ascii_case("random") {
            Ok(SeatKind::Random)
        } else {
            Ok(SeatKind::Model(s.to_string()))
        }
    }
}

impl fmt::Display for SeatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Round phase
///
/// `Dealing -> Playing -> Judging -> Scoring -> Done` each round, and
/// `GameOver` once the configured round count has been played.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Dealing,
    Playing,
    Judging,
    Scoring,
    Done,
    GameOver,
}

/// A seat at the table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    pub name: String,
    pub kind: SeatKind,
    pub hand: Vec<GreenCard>,
}

/// A card submitted for a round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Play {
    pub seat: usize,
    pub card: GreenCard,
    /// Private reasoning of the player
    pub reasoning: String,
    /// Set when the model's answer was unusable and a default card was played
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Transcript of the model call behind this play
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

/// A seat that contributed no play this round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forfeit {
    pub seat: usize,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

/// The judge's pick
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeDecision {
    /// Index into the plays as they were shown to the judge
    pub winning_index: usize,
    pub winning_seat: usize,
    pub winning_card: GreenCard,
    /// Public reasoning of the judge
    pub reasoning: String,
    /// Set when the judge's answer was unusable and the fallback winner applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

/// One round of play
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 0-based round number
    pub round_number: usize,
    pub red_card: RedCard,
    /// Seat of the judge
    pub judge: usize,
    /// Plays; once judging starts, in the (shuffled) order shown to the judge
    pub plays: Vec<Play>,
    #[serde(default)]
    pub forfeits: Vec<Forfeit>,
    pub decision: Option<JudgeDecision>,
}

impl RoundRecord {
    /// Whether a seat has played or forfeited
    pub fn has_acted(&self, seat: usize) -> bool {
        self.plays.iter().any(|p| p.seat == seat) || self.forfeits.iter().any(|f| f.seat == seat)
    }

    pub fn play_for(&self, seat: usize) -> Option<&Play> {
        self.plays.iter().find(|p| p.seat == seat)
    }

    /// Cards in presentation order, without seats
    pub fn anonymized_cards(&self) -> Vec<GreenCard> {
        self.plays.iter().map(|p| p.card.clone()).collect()
    }

    /// No active player submitted a usable play
    pub fn is_forfeited(&self) -> bool {
        self.plays.is_empty()
    }
}

/// Full game state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    pub version: String,
    players: Vec<PlayerState>,
    rounds: Vec<RoundRecord>,
    total_rounds: usize,
    hand_size: usize,
    red_deck: Deck<RedCard>,
    green_deck: Deck<GreenCard>,
    scoreboard: Scoreboard,
    phase: Phase,
    #[serde(default)]
    stats: BenchmarkStats,
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

impl Game {
    /// Create a game and deal the opening hands
    ///
    /// Fails with `DeckExhausted` if the green deck cannot fill every hand.
    pub fn new(
        kinds: Vec<SeatKind>,
        red_deck: Deck<RedCard>,
        mut green_deck: Deck<GreenCard>,
        hand_size: usize,
        total_rounds: usize,
    ) -> Result<Self, GameError> {
        if kinds.len() < 2 {
            return Err(GameError::NotEnoughPlayers(kinds.len()));
        }
        if hand_size == 0 {
            return Err(GameError::EmptyHandSize);
        }

        green_deck.ensure(kinds.len() * hand_size)?;

        let mut players = Vec::with_capacity(kinds.len());
        for (i, kind) in kinds.into_iter().enumerate() {
            let hand = green_deck.deal(hand_size)?;
            players.push(PlayerState {
                name: seat_name(i, &kind),
                kind,
                hand,
            });
        }

        let seats = players.len();
        Ok(Self {
            version: GAME_FORMAT_VERSION.to_string(),
            players,
            rounds: Vec::new(),
            total_rounds,
            hand_size,
            red_deck,
            green_deck,
            scoreboard: Scoreboard::new(seats),
            phase: if total_rounds == 0 { Phase::GameOver } else { Phase::Done },
            stats: BenchmarkStats::default(),
        })
    }

    /// Create a game from card pools, shuffling both decks with `rng`
    pub fn from_pools<R: Rng + ?Sized>(
        kinds: Vec<SeatKind>,
        red: CardPool<RedCard>,
        green: CardPool<GreenCard>,
        hand_size: usize,
        total_rounds: usize,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let red_deck = Deck::shuffled(DeckKind::Red, red, rng);
        let green_deck = Deck::shuffled(DeckKind::Green, green, rng);
        Self::new(kinds, red_deck, green_deck, hand_size, total_rounds)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, seat: usize) -> Result<&PlayerState, GameError> {
        self.players.get(seat).ok_or(GameError::UnknownSeat(seat))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// Rounds that reached `Done`
    pub fn completed_rounds(&self) -> &[RoundRecord] {
        match self.phase {
            Phase::Done | Phase::GameOver => &self.rounds,
            _ => &self.rounds[..self.rounds.len().saturating_sub(1)],
        }
    }

    /// The round in progress, if any
    pub fn current_round(&self) -> Option<&RoundRecord> {
        match self.phase {
            Phase::Playing | Phase::Judging | Phase::Scoring => self.rounds.last(),
            _ => None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn total_rounds(&self) -> usize {
        self.total_rounds
    }

    pub fn hand_size(&self) -> usize {
        self.hand_size
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn stats(&self) -> &BenchmarkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BenchmarkStats {
        &mut self.stats
    }

    pub fn red_deck(&self) -> &Deck<RedCard> {
        &self.red_deck
    }

    pub fn green_deck(&self) -> &Deck<GreenCard> {
        &self.green_deck
    }

    /// Change the round target, e.g. when continuing a saved game
    pub fn set_total_rounds(&mut self, total_rounds: usize) {
        self.total_rounds = total_rounds;
        match self.phase {
            Phase::Done | Phase::GameOver => {
                self.phase = if self.rounds.len() >= total_rounds {
                    Phase::GameOver
                } else {
                    Phase::Done
                };
            }
            _ => {}
        }
    }

    /// Seats that must still play or forfeit in the current round
    pub fn waiting_seats(&self) -> Vec<usize> {
        match (self.phase, self.rounds.last()) {
            (Phase::Playing, Some(round)) => (0..self.players.len())
                .filter(|&seat| seat != round.judge && !round.has_acted(seat))
                .collect(),
            _ => Vec::new(),
        }
    }

    // ========================================================================
    // STATE MACHINE
    // ========================================================================

    /// Deal a new round: draw the red card, refill hands, rotate the judge
    ///
    /// Both decks are checked before either is touched, so a `DeckExhausted`
    /// error leaves the game at the previous round boundary.
    pub fn start_round(&mut self) -> Result<&RoundRecord, GameError> {
        match self.phase {
            Phase::Done => {}
            Phase::GameOver => return Err(GameError::GameOver(self.total_rounds)),
            actual => {
                return Err(GameError::WrongPhase {
                    expected: Phase::Done,
                    actual,
                })
            }
        }

        let refill: usize = self
            .players
            .iter()
            .map(|p| self.hand_size.saturating_sub(p.hand.len()))
            .sum();
        self.red_deck.ensure(1)?;
        self.green_deck.ensure(refill)?;

        self.phase = Phase::Dealing;
        let red_card = self.red_deck.draw()?;
        for player in &mut self.players {
            let missing = self.hand_size.saturating_sub(player.hand.len());
            let cards = self.green_deck.deal(missing)?;
            player.hand.extend(cards);
        }

        let round_number = self.rounds.len();
        self.rounds.push(RoundRecord {
            round_number,
            red_card,
            judge: round_number % self.players.len(),
            plays: Vec::new(),
            forfeits: Vec::new(),
            decision: None,
        });
        self.phase = Phase::Playing;

        Ok(&self.rounds[round_number])
    }

    /// Play a card from a seat's hand
    pub fn play_card(
        &mut self,
        seat: usize,
        card: &GreenCard,
        reasoning: impl Into<String>,
        fallback: Option<String>,
    ) -> Result<(), GameError> {
        self.check_can_act(seat)?;

        let player = &mut self.players[seat];
        let position = player
            .hand
            .iter()
            .position(|c| c == card)
            .ok_or_else(|| GameError::CardNotInHand {
                seat,
                card: card.to_string(),
            })?;
        let card = player.hand.remove(position);

        if fallback.is_some() {
            self.stats.fallbacks += 1;
        }
        if let Some(round) = self.rounds.last_mut() {
            round.plays.push(Play {
                seat,
                card,
                reasoning: reasoning.into(),
                fallback,
                log_path: None,
            });
        }
        Ok(())
    }

    /// Record that a seat contributed no play this round
    pub fn forfeit(&mut self, seat: usize, reason: impl Into<String>) -> Result<(), GameError> {
        self.check_can_act(seat)?;

        self.stats.forfeits += 1;
        if let Some(round) = self.rounds.last_mut() {
            round.forfeits.push(Forfeit {
                seat,
                reason: reason.into(),
                log_path: None,
            });
        }
        Ok(())
    }

    /// Close the playing phase and anonymize the plays for the judge
    ///
    /// Returns the cards in the order the judge will see them. When every
    /// active seat forfeited the list is empty and the round moves straight to
    /// `Scoring` with no decision.
    pub fn close_plays<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<GreenCard>, GameError> {
        self.expect_phase(Phase::Playing)?;
        let waiting = self.waiting_seats().len();
        if waiting > 0 {
            return Err(GameError::PlaysOutstanding { waiting });
        }

        let round = self.rounds.last_mut().ok_or(GameError::WrongPhase {
            expected: Phase::Playing,
            actual: self.phase,
        })?;
        round.plays.shuffle(rng);

        self.phase = if round.plays.is_empty() {
            Phase::Scoring
        } else {
            Phase::Judging
        };
        Ok(round.anonymized_cards())
    }

    /// Record the judge's pick by index into the anonymized plays
    pub fn judge_round(
        &mut self,
        winning_index: usize,
        reasoning: impl Into<String>,
        error: Option<String>,
    ) -> Result<&JudgeDecision, GameError> {
        self.expect_phase(Phase::Judging)?;

        let round = self.rounds.last_mut().ok_or(GameError::WrongPhase {
            expected: Phase::Judging,
            actual: self.phase,
        })?;
        let play = round
            .plays
            .get(winning_index)
            .ok_or(GameError::WinnerOutOfRange {
                index: winning_index,
                plays: round.plays.len(),
            })?;

        if error.is_some() {
            self.stats.judging_errors += 1;
        }
        let decision = JudgeDecision {
            winning_index,
            winning_seat: play.seat,
            winning_card: play.card.clone(),
            reasoning: reasoning.into(),
            error,
            log_path: None,
        };
        self.phase = Phase::Scoring;
        Ok(round.decision.insert(decision))
    }

    /// Score the round and discard its cards
    ///
    /// Returns the winning seat, or `None` for a forfeited round.
    pub fn finish_round(&mut self) -> Result<Option<usize>, GameError> {
        self.expect_phase(Phase::Scoring)?;

        let Some(round) = self.rounds.last() else {
            return Err(GameError::WrongPhase {
                expected: Phase::Scoring,
                actual: self.phase,
            });
        };
        let winner = round.decision.as_ref().map(|d| d.winning_seat);
        let red_card = round.red_card.clone();
        let played: Vec<GreenCard> = round.plays.iter().map(|p| p.card.clone()).collect();

        if let Some(seat) = winner {
            self.scoreboard.record_win(seat);
        }
        self.red_deck.discard(red_card);
        for card in played {
            self.green_deck.discard(card);
        }

        self.phase = if self.rounds.len() >= self.total_rounds {
            Phase::GameOver
        } else {
            Phase::Done
        };
        Ok(winner)
    }

    /// Link a model transcript to what `seat` did in the round in progress
    ///
    /// The seat's play or forfeit gets the path; for the judge, the decision.
    pub fn attach_log(&mut self, seat: usize, path: impl Into<PathBuf>) -> Result<(), GameError> {
        if !matches!(self.phase, Phase::Playing | Phase::Judging | Phase::Scoring) {
            return Err(GameError::NothingToLink(seat));
        }
        let round = self.rounds.last_mut().ok_or(GameError::NothingToLink(seat))?;
        let is_judge = round.judge == seat;

        let slot = if let Some(play) = round.plays.iter_mut().find(|p| p.seat == seat) {
            &mut play.log_path
        } else if let Some(forfeit) = round.forfeits.iter_mut().find(|f| f.seat == seat) {
            &mut forfeit.log_path
        } else if let Some(decision) = round.decision.as_mut().filter(|_| is_judge) {
            &mut decision.log_path
        } else {
            return Err(GameError::NothingToLink(seat));
        };
        *slot = Some(path.into());
        Ok(())
    }

    /// Hand a seat to a different player kind, renaming it to match
    ///
    /// Used when a saved game is continued with different models.
    pub fn reassign_seat(&mut self, seat: usize, kind: SeatKind) -> Result<(), GameError> {
        let player = self.players.get_mut(seat).ok_or(GameError::UnknownSeat(seat))?;
        player.name = seat_name(seat, &kind);
        player.kind = kind;
        Ok(())
    }

    /// Drop an unfinished round, returning played cards to their hands
    ///
    /// Refilled hands keep their new cards. Returns false if no round was in
    /// progress.
    pub fn abandon_round(&mut self) -> bool {
        if !matches!(self.phase, Phase::Playing | Phase::Judging | Phase::Scoring) {
            return false;
        }
        let Some(round) = self.rounds.pop() else {
            return false;
        };

        for play in round.plays {
            if let Some(player) = self.players.get_mut(play.seat) {
                player.hand.push(play.card);
            }
        }
        self.red_deck.return_to_top(round.red_card);
        self.phase = if self.rounds.len() >= self.total_rounds {
            Phase::GameOver
        } else {
            Phase::Done
        };
        true
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase != expected {
            return Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn check_can_act(&self, seat: usize) -> Result<(), GameError> {
        self.expect_phase(Phase::Playing)?;
        if seat >= self.players.len() {
            return Err(GameError::UnknownSeat(seat));
        }
        let round = self.rounds.last().ok_or(GameError::WrongPhase {
            expected: Phase::Playing,
            actual: self.phase,
        })?;
        if seat == round.judge {
            return Err(GameError::JudgeCannotPlay(seat));
        }
        if round.has_acted(seat) {
            return Err(GameError::AlreadyActed(seat));
        }
        Ok(())
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Save to a pretty-printed JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write game state: {}", path.display()))?;
        Ok(())
    }

    /// Load from a JSON file written by `save`
    ///
    /// A round left unfinished in the file is abandoned on load.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read game state: {}", path.display()))?;
        let mut game: Game = serde_json::from_str(&content)
            .with_context(|| format!("Invalid game state: {}", path.display()))?;

        if game.version != GAME_FORMAT_VERSION {
            return Err(GameError::UnsupportedVersion {
                found: game.version,
                expected: GAME_FORMAT_VERSION.to_string(),
            }
            .into());
        }
        if game.phase == Phase::Dealing {
            game.phase = Phase::Done;
        }
        game.abandon_round();
        Ok(game)
    }
}

fn seat_name(seat: usize, kind: &SeatKind) -> String {
    format!("Player {} ({})", seat + 1, kind)
}

// ============================================================================
// TESTS
// ============================================================================
