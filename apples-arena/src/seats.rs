//! Seat construction
//!
//! Level 4 - Utilities and configuration

use std::sync::Arc;

use apples_core::SeatKind;
use apples_models::{CompletionClient, TranscriptLog};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::GameConfig;
use crate::judge::{Judge, ModelJudge, RandomJudge};
use crate::player::{ModelPlayer, Player, RandomPlayer};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Seat {seat} uses model '{model}' but no completion client is configured")]
    MissingClient { seat: usize, model: String },
}

/// The player and judge driving one seat
pub struct Seat {
    pub kind: SeatKind,
    pub player: Box<dyn Player>,
    pub judge: Box<dyn Judge>,
}

/// Resolve seat kinds into players and judges
///
/// Random seats get their own RNGs derived from the master seed, so a seat's
/// choices do not depend on what other seats draw. Model seats share one
/// transcript directory when the config names one.
pub fn build_seats(
    kinds: &[SeatKind],
    client: Option<Arc<dyn CompletionClient>>,
    config: &GameConfig,
) -> Result<Vec<Seat>, SetupError> {
    let transcripts = config
        .transcript_dir
        .as_ref()
        .map(|dir| Arc::new(TranscriptLog::new(dir)));
    kinds
        .iter()
        .enumerate()
        .map(|(seat, kind)| build_seat(seat, kind, client.as_ref(), transcripts.as_ref(), config))
        .collect()
}

fn build_seat(
    seat: usize,
    kind: &SeatKind,
    client: Option<&Arc<dyn CompletionClient>>,
    transcripts: Option<&Arc<TranscriptLog>>,
    config: &GameConfig,
) -> Result<Seat, SetupError> {
    let (player, judge): (Box<dyn Player>, Box<dyn Judge>) = match kind {
        SeatKind::Random => {
            let base = config.seed.wrapping_add(1 + 2 * seat as u64);
            (
                Box::new(RandomPlayer::new(ChaCha8Rng::seed_from_u64(base))),
                Box::new(RandomJudge::new(ChaCha8Rng::seed_from_u64(base.wrapping_add(1)))),
            )
        }
        SeatKind::Model(model) => {
            let client = client.ok_or_else(|| SetupError::MissingClient {
                seat,
                model: model.clone(),
            })?;
            let mut player = ModelPlayer::new(Arc::clone(client), model.as_str())
                .with_retry(config.retry)
                .with_history(config.include_history);
            let mut judge = ModelJudge::new(Arc::clone(client), model.as_str())
                .with_retry(config.retry)
                .with_history(config.include_history);
            if let Some(log) = transcripts {
                player = player.with_transcripts(Arc::clone(log));
                judge = judge.with_transcripts(Arc::clone(log));
            }
            (Box::new(player), Box::new(judge))
        }
    };

    Ok(Seat {
        kind: kind.clone(),
        player,
        judge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use apples_models::ScriptedClient;

    #[test]
    fn test_random_seats_need_no_client() {
        let kinds = vec![SeatKind::Random, SeatKind::Random, SeatKind::Random];
        let seats = build_seats(&kinds, None, &GameConfig::default()).unwrap();
        assert_eq!(seats.len(), 3);
        assert_eq!(seats[2].kind, SeatKind::Random);
    }

    #[test]
    fn test_model_seat_requires_client() {
        let kinds = vec![SeatKind::Random, SeatKind::Model("openai/gpt-4o".into())];
        let err = build_seats(&kinds, None, &GameConfig::default()).err().unwrap();
        assert!(matches!(err, SetupError::MissingClient { seat: 1, .. }));

        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::new());
        assert!(build_seats(&kinds, Some(client), &GameConfig::default()).is_ok());
    }
}
