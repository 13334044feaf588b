//! Decks that deal without replacement

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::CardPool;
use crate::error::GameError;

/// Which of the two decks an operation touched
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckKind {
    Red,
    Green,
}

impl fmt::Display for DeckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckKind::Red => f.write_str("Red"),
            DeckKind::Green => f.write_str("Green"),
        }
    }
}

/// A shuffled draw pile plus the discards
///
/// The pile is shuffled once, so popping from it is a uniform draw over the
/// cards that remain. Discards are kept for the record and never reshuffled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deck<C> {
    kind: DeckKind,
    draw_pile: Vec<C>,
    #[serde(default = "Vec::new")]
    discard_pile: Vec<C>,
}

impl<C> Deck<C> {
    /// Build a deck from a pool, shuffled by the injected RNG
    pub fn shuffled<R: Rng + ?Sized>(kind: DeckKind, pool: CardPool<C>, rng: &mut R) -> Self {
        let mut draw_pile = pool.into_cards();
        draw_pile.shuffle(rng);
        Self {
            kind,
            draw_pile,
            discard_pile: Vec::new(),
        }
    }

    /// Build a deck that deals in the given order (first card dealt first)
    pub fn ordered(kind: DeckKind, mut cards: Vec<C>) -> Self {
        cards.reverse();
        Self {
            kind,
            draw_pile: cards,
            discard_pile: Vec::new(),
        }
    }

    pub fn kind(&self) -> DeckKind {
        self.kind
    }

    pub fn remaining(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn discarded(&self) -> &[C] {
        &self.discard_pile
    }

    /// Fail unless `n` cards can be drawn
    pub fn ensure(&self, n: usize) -> Result<(), GameError> {
        if self.draw_pile.len() < n {
            return Err(GameError::DeckExhausted {
                deck: self.kind,
                requested: n,
                remaining: self.draw_pile.len(),
            });
        }
        Ok(())
    }

    /// Draw a single card
    pub fn draw(&mut self) -> Result<C, GameError> {
        self.ensure(1)?;
        self.draw_pile.pop().ok_or(GameError::DeckExhausted {
            deck: self.kind,
            requested: 1,
            remaining: 0,
        })
    }

    /// Draw `n` cards; on failure nothing is removed
    pub fn deal(&mut self, n: usize) -> Result<Vec<C>, GameError> {
        self.ensure(n)?;
        let split = self.draw_pile.len() - n;
        let mut dealt = self.draw_pile.split_off(split);
        dealt.reverse();
        Ok(dealt)
    }

    pub fn discard(&mut self, card: C) {
        self.discard_pile.push(card);
    }

    /// Put a card back on top of the pile (undoing a draw)
    pub(crate) fn return_to_top(&mut self, card: C) {
        self.draw_pile.push(card);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{GreenCard, RedCard};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rustc_hash::FxHashSet;

    fn pool(n: usize) -> CardPool<GreenCard> {
        let text: Vec<String> = (0..n).map(|i| format!("Card {}", i)).collect();
        CardPool::parse(&text.join("\n"))
    }

    #[test]
    fn test_draws_never_repeat() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut deck = Deck::shuffled(DeckKind::Green, pool(40), &mut rng);
        let mut seen = FxHashSet::default();

        for card in deck.deal(15).unwrap() {
            assert!(seen.insert(card));
        }
        while deck.remaining() > 0 {
            assert!(seen.insert(deck.draw().unwrap()));
        }
        assert_eq!(seen.len(), 40);
    }

    #[test]
    fn test_exhausted_deal_removes_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut deck = Deck::shuffled(DeckKind::Green, pool(5), &mut rng);

        let err = deck.deal(6).unwrap_err();
        assert_eq!(
            err,
            GameError::DeckExhausted {
                deck: DeckKind::Green,
                requested: 6,
                remaining: 5
            }
        );
        assert_eq!(deck.remaining(), 5);
        assert_eq!(deck.deal(5).unwrap().len(), 5);
        assert!(deck.draw().unwrap_err().is_deck_exhausted());
    }

    #[test]
    fn test_seeded_shuffle_is_deterministic() {
        let mut a = Deck::shuffled(DeckKind::Green, pool(30), &mut ChaCha8Rng::seed_from_u64(42));
        let mut b = Deck::shuffled(DeckKind::Green, pool(30), &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a.deal(30).unwrap(), b.deal(30).unwrap());
    }

    #[test]
    fn test_ordered_deck_deals_front_first() {
        let mut deck = Deck::ordered(DeckKind::Red, vec!["a", "b", "c"]);
        assert_eq!(deck.draw().unwrap(), "a");
        assert_eq!(deck.deal(2).unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_state_without_discards_loads() {
        let json = r#"{"kind": "Red", "draw_pile": ["Big", "Small"]}"#;
        let mut deck: Deck<RedCard> = serde_json::from_str(json).unwrap();
        assert!(deck.discarded().is_empty());
        assert_eq!(deck.draw().unwrap(), RedCard::new("Small"));
    }
}
