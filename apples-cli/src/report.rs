//! HTML game report
//!
//! A single self-contained page: stats and standings, then every round with
//! the red card, the judge, the winner and each submission. Reasoning is
//! collapsed behind a toggle; model transcripts are linked relative to the
//! report's folder.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use apples_core::{Game, PlayerState, RoundRecord};

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 10px; line-height: 1.4; }
        .header { background-color: #f8f9fa; padding: 10px; border-radius: 8px; margin-bottom: 15px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .round { border: 1px solid #dee2e6; padding: 10px; margin-bottom: 15px; border-radius: 8px; }
        .round-header { background-color: #e9ecef; padding: 8px 10px; margin: -10px -10px 10px -10px; border-radius: 8px 8px 0 0; border-bottom: 1px solid #dee2e6; }
        .winner-section { background-color: #d4edda; border: 1px solid #c3e6cb; padding: 8px 10px; margin-bottom: 10px; border-radius: 6px; }
        .judge-section { background-color: #e2e3e5; border: 1px solid #d6d8db; padding: 8px 10px; margin-bottom: 10px; border-radius: 6px; }
        .submission { background-color: #f8f9fa; border: 1px solid #dee2e6; padding: 8px 10px; margin-bottom: 8px; border-radius: 6px; }
        .submission.winner { background-color: #d4edda; border-color: #c3e6cb; }
        .submission.forfeit { background-color: #fff3cd; border-color: #ffeeba; font-style: italic; }
        .note { color: #856404; font-size: 0.9em; }
        .thinking { display: none; margin-top: 6px; padding: 6px 8px; background-color: #fff; border-left: 3px solid #6c757d; font-style: italic; white-space: pre-wrap; }
        button.toggle { font-size: 0.8em; margin-top: 4px; }
        a.log { font-size: 0.8em; margin-left: 8px; }
"#;

const SCRIPT: &str = r#"
        function toggleThinking(id) {
            var el = document.getElementById(id);
            el.style.display = el.style.display === 'block' ? 'none' : 'block';
        }
"#;

/// Render the full report; transcript links are made relative to `base`
pub fn generate_html_report(game: &Game, base: &Path) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n    <title>Game Report</title>\n    <style>{}</style>\n    <script>{}</script>\n</head>\n<body>\n",
        STYLE, SCRIPT
    );

    write_header(&mut html, game);

    html.push_str("    <h2>Rounds</h2>\n");
    for round in game.completed_rounds() {
        write_round(&mut html, round, game.players(), base);
    }

    html.push_str("</body>\n</html>\n");
    html
}

pub fn save_html_report(game: &Game, path: &Path) -> Result<()> {
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    std::fs::write(path, generate_html_report(game, base))
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

fn write_header(html: &mut String, game: &Game) {
    let stats = game.stats();
    let _ = write!(
        html,
        "    <div class=\"header\">\n        <h1>Game Report</h1>\n        <h2>Stats</h2>\n        <p>Total Rounds: {} of {}</p>\n",
        game.completed_rounds().len(),
        game.total_rounds()
    );
    if stats.model_calls > 0 {
        let _ = write!(
            html,
            "        <p>Model calls: {} ({} failed), tokens: {} prompt / {} completion</p>\n        <p>Fallbacks: {}, forfeits: {}, judging errors: {}</p>\n",
            stats.model_calls,
            stats.failed_calls,
            stats.usage.prompt_tokens,
            stats.usage.completion_tokens,
            stats.fallbacks,
            stats.forfeits,
            stats.judging_errors
        );
    }
    if let Some(secs) = stats.elapsed_secs() {
        let _ = writeln!(html, "        <p>Elapsed: {:.1}s</p>", secs);
    }

    html.push_str("        <h3>Standings:</h3>\n        <ul>\n");
    for standing in game.scoreboard().standings() {
        if let Some(player) = game.players().get(standing.seat) {
            let _ = writeln!(
                html,
                "            <li>{}: {} win{}</li>",
                escape_html(&player.name),
                standing.wins,
                if standing.wins == 1 { "" } else { "s" }
            );
        }
    }
    html.push_str("        </ul>\n    </div>\n");
}

fn write_round(html: &mut String, round: &RoundRecord, players: &[PlayerState], base: &Path) {
    let n = round.round_number + 1;
    let _ = write!(
        html,
        "    <div class=\"round\">\n        <div class=\"round-header\">\n            <h3>Round {}</h3>\n            <p><strong>Red Card:</strong> \"{}\"</p>\n            <p><strong>Judge:</strong> {}</p>\n        </div>\n",
        n,
        escape_html(round.red_card.as_str()),
        escape_html(player_name(players, round.judge))
    );

    match &round.decision {
        Some(decision) => {
            let _ = write!(
                html,
                "        <div class=\"winner-section\">\n            <h4>Winner: {}</h4>\n            <p><strong>Winning Card:</strong> \"{}\"</p>\n            <p><strong>Judge's Reasoning:</strong> {}</p>\n",
                escape_html(player_name(players, decision.winning_seat)),
                escape_html(decision.winning_card.as_str()),
                escape_html(&decision.reasoning)
            );
            if let Some(path) = &decision.log_path {
                let _ = writeln!(html, "            <p>{}</p>", log_link(path, base));
            }
            if let Some(error) = &decision.error {
                let _ = writeln!(
                    html,
                    "            <p class=\"note\">Judging fell back to the first card: {}</p>",
                    escape_html(error)
                );
            }
            html.push_str("        </div>\n");
        }
        None => {
            html.push_str(
                "        <div class=\"judge-section\">\n            <p>No cards were played this round, so nobody scored.</p>\n        </div>\n",
            );
        }
    }

    html.push_str("        <div class=\"submissions\">\n            <h4>Submissions:</h4>\n");
    let winner = round.decision.as_ref().map(|d| d.winning_seat);
    for play in &round.plays {
        let class = if Some(play.seat) == winner {
            "submission winner"
        } else {
            "submission"
        };
        let id = format!("thinking-{}-{}", n, play.seat + 1);
        let _ = write!(
            html,
            "            <div class=\"{}\">\n                <p><strong>{}'s Card:</strong> \"{}\"</p>\n",
            class,
            escape_html(player_name(players, play.seat)),
            escape_html(play.card.as_str())
        );
        if let Some(fallback) = &play.fallback {
            let _ = writeln!(
                html,
                "                <p class=\"note\">Played the first card in hand: {}</p>",
                escape_html(fallback)
            );
        }
        let _ = write!(
            html,
            "                <button class=\"toggle\" onclick=\"toggleThinking('{}')\">Show reasoning</button>",
            id
        );
        if let Some(path) = &play.log_path {
            html.push_str(&log_link(path, base));
        }
        let _ = write!(
            html,
            "\n                <div class=\"thinking\" id=\"{}\">{}</div>\n            </div>\n",
            id,
            escape_html(&play.reasoning)
        );
    }
    for forfeit in &round.forfeits {
        let link = forfeit
            .log_path
            .as_deref()
            .map(|path| log_link(path, base))
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "            <div class=\"submission forfeit\">\n                <p>{} forfeited: {}{}</p>\n            </div>",
            escape_html(player_name(players, forfeit.seat)),
            escape_html(&forfeit.reason),
            link
        );
    }
    html.push_str("        </div>\n    </div>\n");
}

/// Anchor to a transcript, relative to the report when it lies below it
fn log_link(path: &Path, base: &Path) -> String {
    let target = path.strip_prefix(base).unwrap_or(path);
    format!(
        "<a class=\"log\" href=\"{}\">model log</a>",
        escape_html(&target.to_string_lossy())
    )
}

fn player_name(players: &[PlayerState], seat: usize) -> &str {
    players.get(seat).map(|p| p.name.as_str()).unwrap_or("Unknown player")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apples_core::{Deck, DeckKind, GreenCard, RedCard, SeatKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn played_game() -> Game {
        let red = Deck::ordered(DeckKind::Red, vec![RedCard::new("Scary"), RedCard::new("Loud")]);
        let green = Deck::ordered(
            DeckKind::Green,
            ["Ghosts", "Spiders", "Clowns", "Bats", "Sirens", "Thunder", "Drums", "Owls"]
                .iter()
                .map(|c| GreenCard::new(*c))
                .collect(),
        );
        let kinds = vec![SeatKind::Random, SeatKind::Model("test/model".into()), SeatKind::Random];
        let mut game = Game::new(kinds, red, green, 2, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        game.start_round().unwrap();
        let hand1 = game.players()[1].hand[0].clone();
        game.play_card(1, &hand1, "<b>spooky</b>", Some("Model chose 'Bats'".into())).unwrap();
        game.attach_log(1, "/runs/a/model_logs/round_001_player_2.log").unwrap();
        game.forfeit(2, "Timed out after 120s").unwrap();
        game.close_plays(&mut rng).unwrap();
        game.judge_round(0, "Only one choice", None).unwrap();
        game.finish_round().unwrap();
        game
    }

    #[test]
    fn test_report_contents() {
        let game = played_game();
        let html = generate_html_report(&game, Path::new(""));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Total Rounds: 1 of 2"));
        assert!(html.contains("<strong>Red Card:</strong> \"Scary\""));
        assert!(html.contains("<strong>Judge:</strong> Player 1 (random)"));
        assert!(html.contains("Winner: Player 2 (test/model)"));
        assert!(html.contains("Player 2 (test/model): 1 win</li>"));
        assert!(html.contains("function toggleThinking"));
        assert!(html.contains("class=\"thinking\""));
        assert!(html.contains("Played the first card in hand: Model chose &#39;Bats&#39;"));
        assert!(html.contains("Player 3 (random) forfeited: Timed out after 120s"));
    }

    #[test]
    fn test_report_links_transcripts() {
        let game = played_game();
        let relative = generate_html_report(&game, Path::new("/runs/a"));
        assert!(relative.contains("<a class=\"log\" href=\"model_logs/round_001_player_2.log\">model log</a>"));

        let elsewhere = generate_html_report(&game, Path::new("/somewhere/else"));
        assert!(elsewhere.contains("href=\"/runs/a/model_logs/round_001_player_2.log\""));
    }

    #[test]
    fn test_report_escapes_model_text() {
        let html = generate_html_report(&played_game(), Path::new(""));
        assert!(html.contains("&lt;b&gt;spooky&lt;/b&gt;"));
        assert!(!html.contains("<b>spooky</b>"));
    }

    #[test]
    fn test_forfeited_round() {
        let red = Deck::ordered(DeckKind::Red, vec![RedCard::new("Quiet")]);
        let green = Deck::ordered(
            DeckKind::Green,
            ["Mice", "Snow", "Libraries", "Feathers"].iter().map(|c| GreenCard::new(*c)).collect(),
        );
        let mut game = Game::new(vec![SeatKind::Random, SeatKind::Random], red, green, 2, 1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        game.start_round().unwrap();
        game.forfeit(1, "API error").unwrap();
        game.close_plays(&mut rng).unwrap();
        game.finish_round().unwrap();

        let html = generate_html_report(&game, Path::new(""));
        assert!(html.contains("nobody scored"));
        assert!(html.contains("Player 2 (random): 0 wins"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
