//! Integration tests for the apples binary
//!
//! Runs the real executable with random seats only, so no API key is needed.

use std::path::PathBuf;
use std::process::{Command, Output};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn apples(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_apples"))
        .args(args)
        .env_remove("OPEN_ROUTER_KEY")
        .output()
        .expect("failed to run apples binary")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("apples_cli_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// ARGUMENT VALIDATION
// ============================================================================

#[test]
fn test_models_must_match_players() {
    let output = apples(&["--rounds", "3", "--players", "3", "--models", "random", "random"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Number of models (2) must match number of players (3)"));
}

#[test]
fn test_missing_load_file() {
    let output = apples(&[
        "--rounds", "2", "--players", "2", "--models", "random", "random",
        "--load-game", "/nonexistent/apples/state.json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Game file not found"));
}

#[test]
fn test_model_seat_requires_api_key() {
    let dir = scratch_dir("nokey");
    let state = dir.join("state.json");
    let output = apples(&[
        "--rounds", "2", "--players", "2", "--models", "random", "openai/gpt-4o",
        "--save-game", state.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPEN_ROUTER_KEY"));
    assert!(!state.exists());
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// FULL RUNS
// ============================================================================

#[test]
fn test_random_game_runs_to_completion() {
    let dir = scratch_dir("full");
    let state = dir.join("game.json");

    let output = apples(&[
        "--rounds", "5", "--players", "3", "--models", "random", "random", "random",
        "--seed", "7", "--save-game", state.to_str().unwrap(), "--json",
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["rounds_played"], 5);
    let wins: u64 = json["standings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["wins"].as_u64().unwrap())
        .sum();
    assert_eq!(wins, 5);

    assert!(state.exists());
    let report = std::fs::read_to_string(dir.join("game.html")).unwrap();
    assert!(report.contains("<!DOCTYPE html>"));
    assert!(report.contains("Total Rounds: 5 of 5"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_continue_saved_game() {
    let dir = scratch_dir("continue");
    let state = dir.join("game.json");
    let state_arg = state.to_str().unwrap();

    let first = apples(&[
        "--rounds", "2", "--players", "2", "--models", "random", "random",
        "--seed", "3", "--save-game", state_arg,
    ]);
    assert_eq!(first.status.code(), Some(0));

    let second = apples(&[
        "--rounds", "4", "--players", "2", "--models", "random", "random",
        "--load-game", state_arg, "--save-game", state_arg, "--json",
    ]);
    assert_eq!(second.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    assert_eq!(json["rounds_played"], 4);
    assert_eq!(json["total_rounds"], 4);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_deck_exhaustion_exits_with_partial_results() {
    let dir = scratch_dir("exhausted");
    let red = dir.join("red.txt");
    std::fs::write(&red, "Big\nSmall\n").unwrap();
    let state = dir.join("game.json");

    let output = apples(&[
        "--rounds", "4", "--players", "2", "--models", "random", "random",
        "--red-cards", red.to_str().unwrap(), "--save-game", state.to_str().unwrap(), "--json",
    ]);
    assert_eq!(output.status.code(), Some(2));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "deck_exhausted");
    assert_eq!(json["rounds_played"], 2);
    assert!(json["error"].as_str().unwrap().contains("Red deck exhausted"));
    assert!(state.exists());

    std::fs::remove_dir_all(&dir).ok();
}
