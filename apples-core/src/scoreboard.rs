//! Win tallies and standings

use serde::{Deserialize, Serialize};

/// Standing of one seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// Seat index (0-based)
    pub seat: usize,
    /// Rounds won
    pub wins: u32,
}

/// Wins per seat; counts never decrease
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    wins: Vec<u32>,
}

impl Scoreboard {
    pub fn new(seats: usize) -> Self {
        Self {
            wins: vec![0; seats],
        }
    }

    pub fn seats(&self) -> usize {
        self.wins.len()
    }

    /// Increment a seat's win count
    ///
    /// Seats beyond the current size grow the board.
    pub fn record_win(&mut self, seat: usize) {
        if seat >= self.wins.len() {
            self.wins.resize(seat + 1, 0);
        }
        self.wins[seat] += 1;
    }

    pub fn wins(&self, seat: usize) -> u32 {
        self.wins.get(seat).copied().unwrap_or(0)
    }

    pub fn total_wins(&self) -> u32 {
        self.wins.iter().sum()
    }

    /// Raw counts in seat order
    pub fn counts(&self) -> &[u32] {
        &self.wins
    }

    /// Seats sorted by wins (descending), ties by seat index (ascending)
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .wins
            .iter()
            .enumerate()
            .map(|(seat, &wins)| Standing { seat, wins })
            .collect();
        standings.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.seat.cmp(&b.seat)));
        standings
    }

    /// Top standing, if any seat exists
    pub fn leader(&self) -> Option<Standing> {
        self.standings().first().copied()
    }
}
