//! Card values and card pools

use std::fmt;
use std::path::Path;

use anyhow::Context;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Built-in adjective list
const DEFAULT_RED_CARDS: &str = include_str!("../cards/red_cards.txt");

/// Built-in noun list
const DEFAULT_GREEN_CARDS: &str = include_str!("../cards/green_cards.txt");

/// Adjective drawn once per round
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedCard(String);

/// Noun held in a hand and played against a red card
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GreenCard(String);

macro_rules! card_impls {
    ($card:ty) => {
        impl $card {
            pub fn new(text: impl Into<String>) -> Self {
                Self(text.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $card {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $card {
            fn from(text: &str) -> Self {
                Self::new(text)
            }
        }
    };
}

card_impls!(RedCard);
card_impls!(GreenCard);

/// The full set of distinct cards a deck is built from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardPool<C> {
    cards: Vec<C>,
}

impl<C> CardPool<C> {
    pub fn cards(&self) -> &[C] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn into_cards(self) -> Vec<C> {
        self.cards
    }
}

impl<C: for<'a> From<&'a str>> CardPool<C> {
    /// Parse newline-delimited card names; blank lines and duplicates are dropped
    pub fn parse(text: &str) -> Self {
        let mut seen = FxHashSet::default();
        let cards = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && seen.insert(line.to_string()))
            .map(C::from)
            .collect();
        Self { cards }
    }

    /// Load a card list from a text file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read card list: {}", path.display()))?;
        let pool = Self::parse(&content);
        if pool.is_empty() {
            anyhow::bail!("Card list is empty: {}", path.display());
        }
        Ok(pool)
    }
}

impl CardPool<RedCard> {
    /// The built-in adjective pool
    pub fn default_red() -> Self {
        Self::parse(DEFAULT_RED_CARDS)
    }
}

impl CardPool<GreenCard> {
    /// The built-in noun pool
    pub fn default_green() -> Self {
        Self::parse(DEFAULT_GREEN_CARDS)
    }
}
