//! Apples Core - Game engine for the Apples to Models benchmark
//!
//! This crate provides the rules-level state of an Apples to Apples game:
//! - Red (adjective) and green (noun) cards and their pools
//! - Decks that deal without replacement
//! - The round state machine (deal, play, judge, score)
//! - Scoreboard and benchmark statistics
//! - JSON persistence of a game in progress

pub mod cards;
pub mod deck;
pub mod error;
pub mod game;
pub mod scoreboard;
pub mod stats;

// Re-exports for convenient access
pub use cards::{CardPool, GreenCard, RedCard};
pub use deck::{Deck, DeckKind};
pub use error::GameError;
pub use game::{
    Forfeit, Game, JudgeDecision, Phase, Play, PlayerState, RoundRecord, SeatKind,
    GAME_FORMAT_VERSION,
};
pub use scoreboard::{Scoreboard, Standing};
pub use stats::{BenchmarkStats, TokenUsage};
