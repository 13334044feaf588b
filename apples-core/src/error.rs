//! Error types for game state transitions

use crate::deck::DeckKind;
use crate::game::Phase;

/// Errors raised by the deck and the round state machine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Fatal: the game cannot continue past the current round boundary
    #[error("{deck} deck exhausted: requested {requested} card(s), {remaining} remaining")]
    DeckExhausted {
        deck: DeckKind,
        requested: usize,
        remaining: usize,
    },

    #[error("Game needs at least 2 players, got {0}")]
    NotEnoughPlayers(usize),

    #[error("Hand size must be at least 1")]
    EmptyHandSize,

    #[error("Operation requires phase {expected:?}, game is in {actual:?}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("All {0} rounds have been played")]
    GameOver(usize),

    #[error("Unknown seat {0}")]
    UnknownSeat(usize),

    #[error("Game has {players} players but {seats} seats were configured")]
    SeatCountMismatch { players: usize, seats: usize },

    #[error("Judge (seat {0}) cannot play a card")]
    JudgeCannotPlay(usize),

    #[error("Player has already played a card this round (seat {0})")]
    AlreadyActed(usize),

    #[error("Card '{card}' is not in the hand of seat {seat}")]
    CardNotInHand { seat: usize, card: String },

    #[error("Not all players have played their cards yet ({waiting} waiting)")]
    PlaysOutstanding { waiting: usize },

    #[error("Winner index {index} out of range for {plays} play(s)")]
    WinnerOutOfRange { index: usize, plays: usize },

    #[error("Seat {0} has no play, forfeit or judgment this round to link a log to")]
    NothingToLink(usize),

    #[error("Game format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },
}

impl GameError {
    /// Whether this error ends the game rather than flagging a misuse
    pub fn is_deck_exhausted(&self) -> bool {
        matches!(self, GameError::DeckExhausted { .. })
    }
}
