//! Turning model answers into card choices
//!
//! Models are asked for `{"reasoning": ..., "card": ...}` but in practice
//! answer in several shapes. Accepted, in order:
//! - a JSON object, optionally wrapped in a markdown code fence
//! - `reasoning | card`
//! - a bare single-line card name

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// A parsed answer, before it is matched against the legal options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedChoice {
    pub reasoning: String,
    pub card: String,
}

/// Why a model's answer could not be turned into a selection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Unparseable response: {0}")]
    Unparseable(String),

    #[error("Model chose card '{card}' which is not in valid cards: {options}")]
    NotAnOption { card: String, options: String },
}

#[derive(Deserialize)]
struct JsonChoice {
    #[serde(default)]
    reasoning: Option<String>,
    card: String,
}

/// Longest bare answer still taken as a card name
const MAX_BARE_ANSWER: usize = 80;

/// Parse a raw model answer
pub fn parse_response(content: &str) -> Result<ParsedChoice, SelectionError> {
    let content = strip_code_fence(content.trim()).trim();
    if content.is_empty() {
        return Err(SelectionError::Unparseable("empty response".to_string()));
    }

    // A brace pair that is not a valid answer may still sit inside pipe-style reasoning
    let mut json_error = None;
    if let Some(json) = json_object_span(content) {
        match serde_json::from_str::<JsonChoice>(json) {
            Ok(choice) => {
                return Ok(ParsedChoice {
                    reasoning: choice.reasoning.unwrap_or_default().trim().to_string(),
                    card: choice.card.trim().to_string(),
                })
            }
            Err(e) => json_error = Some(format!("Invalid JSON response: {}", e)),
        }
    }

    if let Some((reasoning, card)) = content.rsplit_once('|') {
        let card = card.trim().trim_matches(|c| c == '\'' || c == '"');
        if !card.is_empty() {
            return Ok(ParsedChoice {
                reasoning: reasoning.trim().to_string(),
                card: card.to_string(),
            });
        }
    }

    if let Some(error) = json_error {
        return Err(SelectionError::Unparseable(error));
    }

    if !content.contains('\n') && content.chars().count() <= MAX_BARE_ANSWER {
        return Ok(ParsedChoice {
            reasoning: String::new(),
            card: content.to_string(),
        });
    }

    Err(SelectionError::Unparseable(
        "expected a JSON object with 'reasoning' and 'card' fields".to_string(),
    ))
}

/// Lowercase and keep only letters and digits
pub fn normalize_card_name(card: &str) -> String {
    card.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the option a named card refers to
///
/// Only an exact match after normalization counts. When duplicates exist the
/// first one wins.
pub fn match_option<S: AsRef<str>>(card: &str, options: &[S]) -> Option<usize> {
    let wanted = normalize_card_name(card);
    if wanted.is_empty() {
        return None;
    }

    let index: FxHashMap<String, usize> = options
        .iter()
        .enumerate()
        .rev()
        .map(|(i, option)| (normalize_card_name(option.as_ref()), i))
        .collect();
    index.get(&wanted).copied()
}

/// Parse an answer and resolve it to an option index and the reasoning
pub fn select_option<S: AsRef<str>>(
    content: &str,
    options: &[S],
) -> Result<(usize, String), SelectionError> {
    let parsed = parse_response(content)?;
    match match_option(&parsed.card, options) {
        Some(i) => Ok((i, parsed.reasoning)),
        None => Err(SelectionError::NotAnOption {
            card: parsed.card,
            options: options
                .iter()
                .map(|o| o.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn strip_code_fence(content: &str) -> &str {
    if !content.starts_with("```") {
        return content;
    }
    let body = match content.find('\n') {
        Some(i) => &content[i + 1..],
        None => return content.trim_matches('`'),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body)
}

fn json_object_span(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let parsed = parse_response(r#"{"reasoning": "Good thinking", "card": "Test Card"}"#).unwrap();
        assert_eq!(parsed.reasoning, "Good thinking");
        assert_eq!(parsed.card, "Test Card");
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"reasoning\": \"Big and old\", \"card\": \"Dinosaurs\"}\n```";
        assert_eq!(parse_response(content).unwrap().card, "Dinosaurs");
    }

    #[test]
    fn test_parse_json_with_preamble() {
        let content = "Sure! Here is my answer:\n{\"card\": \"Volcanoes\"}";
        let parsed = parse_response(content).unwrap();
        assert_eq!(parsed.card, "Volcanoes");
        assert_eq!(parsed.reasoning, "");
    }

    #[test]
    fn test_parse_pipe_format() {
        let content = "Looking at my options, Dinosaurs would be perfect | Dinosaurs";
        let parsed = parse_response(content).unwrap();
        assert_eq!(parsed.reasoning, "Looking at my options, Dinosaurs would be perfect");
        assert_eq!(parsed.card, "Dinosaurs");
    }

    #[test]
    fn test_parse_pipe_format_with_braces_in_reasoning() {
        let parsed = parse_response("Big things {like dinosaurs} win | Dinosaurs").unwrap();
        assert_eq!(parsed.reasoning, "Big things {like dinosaurs} win");
        assert_eq!(parsed.card, "Dinosaurs");
    }

    #[test]
    fn test_parse_bare_card() {
        assert_eq!(parse_response("Pandas").unwrap().card, "Pandas");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response(""), Err(SelectionError::Unparseable(_))));
        assert!(matches!(
            parse_response("{\"reasoning\": \"no card field\"}"),
            Err(SelectionError::Unparseable(_))
        ));
        let rambling = "I cannot decide.\nThere are too many good options here.";
        assert!(parse_response(rambling).is_err());
    }

    #[test]
    fn test_normalize_card_name() {
        assert_eq!(normalize_card_name("Abraham Lincoln!"), "abrahamlincoln");
        assert_eq!(normalize_card_name("  T-Rex "), "trex");
        assert_eq!(normalize_card_name("Card 12"), "card12");
    }

    #[test]
    fn test_match_option() {
        let options = ["Dinosaurs", "Mountains", "Roller Coasters"];
        assert_eq!(match_option("dinosaurs.", &options), Some(0));
        assert_eq!(match_option("ROLLER-COASTERS", &options), Some(2));
        assert_eq!(match_option("Mountains or Dinosaurs", &options), None);
        assert_eq!(match_option("Whales", &options), None);
        assert_eq!(match_option("!!!", &options), None);
    }

    #[test]
    fn test_match_option_rejects_other_cards_containing_an_option() {
        assert_eq!(match_option("Pineapple", &["Apple", "Dogs"]), None);
        assert_eq!(match_option("Sea Lions", &["Lions", "Tigers"]), None);
        assert_eq!(match_option("I pick Mountains", &["Mountains", "Whales"]), None);
        assert_eq!(match_option("apple", &["Apple", "Dogs"]), Some(0));
    }

    #[test]
    fn test_match_option_duplicates_pick_first() {
        assert_eq!(match_option("Dogs", &["Cats", "Dogs", "Dogs"]), Some(1));
    }

    #[test]
    fn test_select_option() {
        let options = vec!["Cats".to_string(), "Dogs".to_string()];
        let (index, reasoning) =
            select_option(r#"{"reasoning": "loyal", "card": "Dogs"}"#, &options).unwrap();
        assert_eq!(index, 1);
        assert_eq!(reasoning, "loyal");

        let err = select_option(r#"{"reasoning": "big", "card": "Whales"}"#, &options).unwrap_err();
        assert_eq!(
            err,
            SelectionError::NotAnOption {
                card: "Whales".to_string(),
                options: "Cats, Dogs".to_string()
            }
        );
    }

    #[test]
    fn test_select_option_near_miss_is_not_an_option() {
        let err = select_option(r#"{"reasoning": "tropical", "card": "Pineapple"}"#, &["Apple", "Dogs"]).unwrap_err();
        assert!(matches!(err, SelectionError::NotAnOption { ref card, .. } if card == "Pineapple"));
    }
}
