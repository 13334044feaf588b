//! Apples Models - Language model plumbing for the benchmark
//!
//! This crate provides everything between a seat and a chat-completions API:
//! - Chat message lists
//! - The `CompletionClient` seam and an OpenRouter implementation
//! - Bounded retry
//! - Prompt construction with per-seat game history
//! - Parsing model answers back into a card choice
//! - Per-call transcripts written next to the game state

mod client;
mod messages;
mod openrouter;
mod parse;
pub mod prompts;
mod retry;
mod scripted;
mod transcript;

pub use client::{Completion, CompletionClient, CompletionError};
pub use messages::{Message, Messages, Role};
pub use openrouter::{ClientConfig, OpenRouterClient, API_KEY_ENV, DEFAULT_BASE_URL};
pub use parse::{match_option, normalize_card_name, parse_response, select_option, ParsedChoice, SelectionError};
pub use prompts::TableHistory;
pub use retry::{complete_counting, complete_with_retry, RetryOutcome, RetryPolicy};
pub use scripted::ScriptedClient;
pub use transcript::{render_transcript, CallTranscript, TranscriptLog};
