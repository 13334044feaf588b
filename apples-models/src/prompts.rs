//! Prompt construction
//!
//! Each seat sees the game as a running conversation: the rules, then every
//! finished round from its own point of view, then the current question.
//! Other players' private reasoning is never shown; the judge's reasoning is.

use apples_core::{GreenCard, RedCard, RoundRecord};
use serde_json::json;

use crate::messages::Messages;

/// Instructions appended to the player's question
pub const PLAYER_PROMPT: &str = "Which card from your hand best matches this red card? \
Respond with a JSON object with two fields: \"reasoning\" (a short explanation) and \"card\" \
(the exact name of the card you play). For example: {\"reasoning\": \"Looking at my options, \
Dinosaurs would be perfect because they represent something truly enormous. While Mountains are \
also big, Dinosaurs have a more impressive and awe-inspiring scale\", \"card\": \"Dinosaurs\"}";

/// Instructions appended to the judge's question
pub const JUDGE_PROMPT: &str = "Which green card best matches the red card? \
Respond with a JSON object with two fields: \"reasoning\" (a short explanation) and \"card\" \
(the exact name of the winning card). For example: {\"reasoning\": \"After comparing all options, \
Dinosaurs stands out the most. While both Mountains and Whales are impressively large, Dinosaurs \
capture the essence of enormity in a way that sparks imagination\", \"card\": \"Dinosaurs\"}";

/// The finished rounds of a game, as visible to the seats
#[derive(Clone, Copy, Debug)]
pub struct TableHistory<'a> {
    pub player_count: usize,
    pub rounds: &'a [RoundRecord],
}

impl<'a> TableHistory<'a> {
    pub fn new(player_count: usize, rounds: &'a [RoundRecord]) -> Self {
        Self {
            player_count,
            rounds,
        }
    }

    /// The same table with the history hidden
    pub fn without_rounds(self) -> Self {
        Self {
            player_count: self.player_count,
            rounds: &[],
        }
    }
}

pub fn system_message(player_count: usize, seat: usize) -> String {
    format!(
        "You are playing Apples to Apples, a word association game. \
There are {} players in the game, and you are Player {}. \
In each round, there is a red card (an adjective) and players play green cards (nouns) \
that they think best match the red card. The judge picks the best match.",
        player_count,
        seat + 1
    )
}

pub fn player_prompt(seat: usize, red_card: &RedCard, hand: &[GreenCard]) -> String {
    format!(
        "You are Player {}. The red card is: {}\nYour hand (green cards) contains: {}\n{}",
        seat + 1,
        red_card,
        join_cards(hand),
        PLAYER_PROMPT
    )
}

pub fn judge_prompt(round_number: usize, red_card: &RedCard, cards: &[GreenCard]) -> String {
    format!(
        "Current Round {}\nYou are the judge. The red card is: {}\nThe played green cards are:\n{}\n{}",
        round_number + 1,
        red_card,
        bullet_list(cards),
        JUDGE_PROMPT
    )
}

/// Conversation asking a player which card to play
pub fn player_messages(
    history: TableHistory<'_>,
    seat: usize,
    red_card: &RedCard,
    hand: &[GreenCard],
) -> Messages {
    let mut messages = game_history(history, seat, false);
    messages.add_user(player_prompt(seat, red_card, hand));
    messages
}

/// Conversation asking the judge to pick among anonymized cards
pub fn judge_messages(
    history: TableHistory<'_>,
    seat: usize,
    round_number: usize,
    red_card: &RedCard,
    cards: &[GreenCard],
) -> Messages {
    let mut messages = game_history(history, seat, true);
    messages.add_user(judge_prompt(round_number, red_card, cards));
    messages
}

/// Rules plus every finished round from `seat`'s perspective
///
/// When the seat is judging now, its own past judgments are replayed as
/// question and answer so the model stays consistent with them.
pub fn game_history(history: TableHistory<'_>, seat: usize, is_judge: bool) -> Messages {
    let mut messages = Messages::new();
    messages.add_system(system_message(history.player_count, seat));

    let mut scores = vec![0u32; history.player_count];

    for round in history.rounds {
        messages.add_user(format!(
            "Round {} - Red Card: {}",
            round.round_number + 1,
            round.red_card
        ));

        if let Some(play) = round.play_for(seat) {
            messages.add_user(format!(
                "You are Player {}. The red card is: {}\n{}",
                seat + 1,
                round.red_card,
                PLAYER_PROMPT
            ));
            match &play.fallback {
                Some(reason) => messages.add_user(format!(
                    "Your answer could not be used ({}), so '{}' was played for you.",
                    reason, play.card
                )),
                None => messages.add_assistant(answer_json(&play.reasoning, &play.card)),
            }
        } else if let Some(forfeit) = round.forfeits.iter().find(|f| f.seat == seat) {
            messages.add_user(format!(
                "You did not play a card this round ({}).",
                forfeit.reason
            ));
        }

        let cards = round.anonymized_cards();
        if seat != round.judge && !cards.is_empty() {
            messages.add_user(format!("The played green cards are:\n{}", bullet_list(&cards)));
        }

        let Some(decision) = &round.decision else {
            messages.add_user("No cards were played this round, so nobody scored.");
            continue;
        };

        if let Some(score) = scores.get_mut(decision.winning_seat) {
            *score += 1;
        }

        if round.judge == seat {
            if let Some(error) = &decision.error {
                messages.add_user(format!(
                    "Your judgment could not be used ({}), so Player {}'s card '{}' won by default.",
                    error,
                    decision.winning_seat + 1,
                    decision.winning_card
                ));
            } else if is_judge {
                messages.add_user(judge_prompt(round.round_number, &round.red_card, &cards));
                messages.add_assistant(answer_json(&decision.reasoning, &decision.winning_card));
            } else {
                messages.add_user(format!(
                    "You (as judge) selected Player {}'s card '{}' as the winner.\nYour reasoning: {}",
                    decision.winning_seat + 1,
                    decision.winning_card,
                    decision.reasoning
                ));
            }
        } else {
            messages.add_user(format!(
                "Player {} (judge) selected '{}' as the winner (played by Player {}).\nTheir reasoning: {}",
                round.judge + 1,
                decision.winning_card,
                decision.winning_seat + 1,
                decision.reasoning
            ));
        }

        messages.add_user(format!("\nCurrent Scores:\n{}\n", format_scores(&scores, seat)));
    }

    messages
}

/// One line per player, marking `seat` with "(you)"
pub fn format_scores(scores: &[u32], seat: usize) -> String {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            if i == seat {
                format!("Player {}: {} (you)", i + 1, score)
            } else {
                format!("Player {}: {}", i + 1, score)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn answer_json(reasoning: &str, card: &GreenCard) -> String {
    json!({ "reasoning": reasoning, "card": card.as_str() }).to_string()
}

fn join_cards(cards: &[GreenCard]) -> String {
    cards.iter().map(GreenCard::as_str).collect::<Vec<_>>().join(", ")
}

fn bullet_list(cards: &[GreenCard]) -> String {
    cards
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n")
}
