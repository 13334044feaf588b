//! Apples Arena - Seats and round orchestration
//!
//! This crate provides:
//! - Game configuration
//! - Players and judges (random and model-backed)
//! - Seat construction from seat kinds
//! - The round runner that drives a `Game` to completion

mod config;
mod judge;
mod model_call;
mod player;
mod runner;
mod seats;

pub use config::GameConfig;
pub use judge::{Judge, JudgeChoice, JudgeView, ModelJudge, RandomJudge};
pub use player::{CallStats, ModelPlayer, PlayChoice, PlayView, Player, RandomPlayer, SeatError};
pub use runner::{GameOutcome, GameRunner, Termination};
pub use seats::{build_seats, Seat, SetupError};
