//! Run command - play one benchmark game
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: validate_args(), load_or_create_game(), build_client(), play_game(), save_outputs(), report_results()
//! - Level 3: output_paths(), load_game(), new_game(), shutdown_signal()
//! - Level 4: formatting utilities

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use apples_arena::{build_seats, GameConfig, GameOutcome, GameRunner, Termination};
use apples_core::{CardPool, Game, SeatKind};
use apples_models::{
    ClientConfig, CompletionClient, OpenRouterClient, RetryPolicy, API_KEY_ENV, DEFAULT_BASE_URL,
};

use crate::report;

/// Stream of the deck RNG; round shuffles use streams counted from 0
const DECK_STREAM: u64 = u64::MAX;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of rounds to play
    #[arg(long)]
    pub rounds: usize,

    /// Number of players in the game
    #[arg(long)]
    pub players: usize,

    /// Model for each player (an OpenRouter model id, or "random")
    #[arg(long, num_args = 1.., required = true)]
    pub models: Vec<String>,

    /// Cards in each hand
    #[arg(long, default_value = "7")]
    pub hand_size: usize,

    /// Random seed (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Continue a saved game
    #[arg(long, value_name = "FILE")]
    pub load_game: Option<PathBuf>,

    /// Where to save the game state
    #[arg(long, value_name = "FILE")]
    pub save_game: Option<PathBuf>,

    /// Where to write the HTML report
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Red (adjective) card list, one per line
    #[arg(long, value_name = "FILE")]
    pub red_cards: Option<PathBuf>,

    /// Green (noun) card list, one per line
    #[arg(long, value_name = "FILE")]
    pub green_cards: Option<PathBuf>,

    /// Seconds a player has to choose a card
    #[arg(long, default_value = "120")]
    pub play_timeout: u64,

    /// Seconds the judge has to pick a winner
    #[arg(long, default_value = "120")]
    pub judge_timeout: u64,

    /// Wait before retrying a failed model request
    #[arg(long, default_value = "1000")]
    pub retry_backoff_ms: u64,

    /// Do not show previous rounds to the models
    #[arg(long)]
    pub no_history: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Chat-completions API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory for timestamped game folders when --save-game is not given
    #[arg(long, value_name = "DIR", default_value = "games")]
    pub games_dir: PathBuf,
}

/// How the run ended, mapped to the process exit code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    DeckExhausted,
    Interrupted,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::DeckExhausted => 2,
            RunStatus::Interrupted => 130,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::DeckExhausted => "deck_exhausted",
            RunStatus::Interrupted => "interrupted",
        }
    }
}

impl From<&Termination> for RunStatus {
    fn from(termination: &Termination) -> Self {
        match termination {
            Termination::Completed => RunStatus::Completed,
            Termination::DeckExhausted(_) => RunStatus::DeckExhausted,
            Termination::Interrupted => RunStatus::Interrupted,
        }
    }
}

/// Where the game state, report and model transcripts are written
#[derive(Clone, Debug, PartialEq, Eq)]
struct OutputPaths {
    state: PathBuf,
    report: PathBuf,
    model_logs: PathBuf,
}

/// Folder next to the game state holding one transcript per model call
const MODEL_LOGS_DIR: &str = "model_logs";

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run the benchmark
///
/// This function reads like a table of contents:
/// 1. Validate arguments and resolve seats
/// 2. Load or deal the game
/// 3. Connect to the model provider if any seat needs it
/// 4. Play the remaining rounds
/// 5. Save state and report, print standings
pub fn run(args: RunArgs) -> Result<RunStatus> {
    let kinds = validate_args(&args)?;
    let seed = args.seed.unwrap_or_else(rand::random);

    let game = load_or_create_game(&args, &kinds, seed)?;
    let client = build_client(&args, &kinds)?;
    let paths = output_paths(&args)?;

    tracing::info!(
        "Starting game: {} players, {} rounds, seed {}",
        kinds.len(),
        game.total_rounds(),
        seed
    );

    let outcome = play_game(&args, &kinds, client, game, seed, &paths)?;

    save_outputs(&outcome.game, &paths)?;
    let status = RunStatus::from(&outcome.termination);
    report_results(&outcome, status, &paths, &args);

    Ok(status)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Check argument consistency and parse the seat kinds
fn validate_args(args: &RunArgs) -> Result<Vec<SeatKind>> {
    if args.players < 2 {
        bail!("Must have at least 2 players");
    }
    if args.models.len() != args.players {
        bail!(
            "Number of models ({}) must match number of players ({})",
            args.models.len(),
            args.players
        );
    }
    if args.rounds == 0 {
        bail!("Must play at least 1 round");
    }
    if args.hand_size == 0 {
        bail!("Hand size must be at least 1");
    }
    if let Some(path) = &args.load_game {
        if !path.exists() {
            bail!("Game file not found: {}", path.display());
        }
    }

    if args.rounds % args.players != 0 {
        tracing::warn!(
            "The number of rounds ({}) is not divisible by the number of players ({}). \
             Players will not have the same number of opportunities to score.",
            args.rounds,
            args.players
        );
    }

    args.models
        .iter()
        .map(|m| m.parse::<SeatKind>().map_err(anyhow::Error::msg))
        .collect()
}

/// Continue a saved game or deal a new one
fn load_or_create_game(args: &RunArgs, kinds: &[SeatKind], seed: u64) -> Result<Game> {
    match &args.load_game {
        Some(path) => load_game(path, args, kinds),
        None => new_game(args, kinds, seed),
    }
}

/// Connect to the completion API when any seat is model-backed
fn build_client(args: &RunArgs, kinds: &[SeatKind]) -> Result<Option<Arc<dyn CompletionClient>>> {
    if !kinds.iter().any(SeatKind::is_model) {
        return Ok(None);
    }

    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .with_context(|| format!("{} must be set to play with models", API_KEY_ENV))?;

    let config = ClientConfig::new(api_key).with_base_url(&args.base_url);
    let client: Arc<dyn CompletionClient> =
        Arc::new(OpenRouterClient::new(config).context("Failed to create the HTTP client")?);
    Ok(Some(client))
}

/// Play the remaining rounds on a tokio runtime, stopping on Ctrl-C
fn play_game(
    args: &RunArgs,
    kinds: &[SeatKind],
    client: Option<Arc<dyn CompletionClient>>,
    game: Game,
    seed: u64,
    paths: &OutputPaths,
) -> Result<GameOutcome> {
    let config = GameConfig::new(args.rounds)
        .with_hand_size(args.hand_size)
        .with_seed(seed)
        .with_play_timeout(Duration::from_secs(args.play_timeout))
        .with_judge_timeout(Duration::from_secs(args.judge_timeout))
        .with_retry(RetryPolicy::default().with_backoff(Duration::from_millis(args.retry_backoff_ms)))
        .with_history(!args.no_history)
        .with_transcript_dir(&paths.model_logs);
    let seats = build_seats(kinds, client, &config)?;

    let remaining = game.total_rounds().saturating_sub(game.completed_rounds().len());
    let progress = progress_bar(remaining as u64);
    let bar = progress.clone();
    let mut runner = GameRunner::new(seats, config).on_round(move |game| {
        bar.inc(1);
        if let Some(leader) = game.scoreboard().leader() {
            let name = game
                .players()
                .get(leader.seat)
                .map(|p| p.name.as_str())
                .unwrap_or("?");
            bar.set_message(format!("leader: {} ({})", name, format_wins(leader.wins)));
        }
    });

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let outcome = runtime
        .block_on(runner.run_until(game, shutdown_signal()))
        .context("Game engine error")?;
    progress.finish_and_clear();

    Ok(outcome)
}

/// Write the game state and HTML report
fn save_outputs(game: &Game, paths: &OutputPaths) -> Result<()> {
    game.save(&paths.state)?;
    tracing::info!("Game state saved to: {}", paths.state.display());

    report::save_html_report(game, &paths.report)?;
    tracing::info!("Game report saved to: {}", paths.report.display());
    Ok(())
}

/// Print final standings
fn report_results(outcome: &GameOutcome, status: RunStatus, paths: &OutputPaths, args: &RunArgs) {
    if args.json {
        print_json_results(outcome, status, paths);
    } else {
        print_text_results(outcome, status, paths);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// State, report and transcript locations
///
/// With `--save-game` the report sits next to the state file; otherwise both
/// go into a new timestamped folder under `--games-dir`. Model transcripts
/// always go into `model_logs/` beside the state file.
fn output_paths(args: &RunArgs) -> Result<OutputPaths> {
    let paths = match &args.save_game {
        Some(state) => OutputPaths {
            state: state.clone(),
            report: args
                .report
                .clone()
                .unwrap_or_else(|| state.with_extension("html")),
            model_logs: sibling_dir(state, MODEL_LOGS_DIR),
        },
        None => {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            let dir = args.games_dir.join(timestamp);
            OutputPaths {
                state: dir.join("game_state.json"),
                report: args
                    .report
                    .clone()
                    .unwrap_or_else(|| dir.join("game_report.html")),
                model_logs: dir.join(MODEL_LOGS_DIR),
            }
        }
    };

    for path in [&paths.state, &paths.report] {
        ensure_parent_dir(path)?;
    }
    Ok(paths)
}

fn load_game(path: &Path, args: &RunArgs, kinds: &[SeatKind]) -> Result<Game> {
    let mut game = Game::load(path)
        .with_context(|| format!("Failed to load game: {}", path.display()))?;

    if game.player_count() != args.players {
        bail!(
            "Loaded game has {} players, but {} were requested",
            game.player_count(),
            args.players
        );
    }
    for (seat, kind) in kinds.iter().enumerate() {
        let player = game.player(seat)?;
        if &player.kind != kind {
            tracing::warn!("{} is now played by {}", player.name, kind);
            game.reassign_seat(seat, kind.clone())?;
        }
    }
    if args.red_cards.is_some() || args.green_cards.is_some() {
        tracing::warn!("Card lists are ignored when continuing a saved game");
    }

    game.set_total_rounds(args.rounds);
    tracing::info!(
        "Continuing game from {} after {} rounds",
        path.display(),
        game.completed_rounds().len()
    );
    Ok(game)
}

fn new_game(args: &RunArgs, kinds: &[SeatKind], seed: u64) -> Result<Game> {
    let red = match &args.red_cards {
        Some(path) => CardPool::load(path)?,
        None => CardPool::default_red(),
    };
    let green = match &args.green_cards {
        Some(path) => CardPool::load(path)?,
        None => CardPool::default_green(),
    };

    let mut rng = create_rng(seed);
    rng.set_stream(DECK_STREAM);
    Game::from_pools(kinds.to_vec(), red, green, args.hand_size, args.rounds, &mut rng)
        .context("Failed to deal the opening hands")
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::warn!("Game interrupted! Saving progress...");
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn create_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn sibling_dir(file: &Path, name: &str) -> PathBuf {
    match file.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn progress_bar(rounds: u64) -> ProgressBar {
    let bar = ProgressBar::new(rounds);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} rounds {msg}") {
        bar.set_style(style);
    }
    bar
}

fn format_wins(wins: u32) -> String {
    format!("{} win{}", wins, if wins == 1 { "" } else { "s" })
}

/// Print results as JSON
fn print_json_results(outcome: &GameOutcome, status: RunStatus, paths: &OutputPaths) {
    #[derive(serde::Serialize)]
    struct JsonStanding<'a> {
        rank: usize,
        seat: usize,
        name: &'a str,
        model: &'a str,
        wins: u32,
    }

    #[derive(serde::Serialize)]
    struct JsonOutput<'a> {
        status: &'static str,
        error: Option<String>,
        rounds_played: usize,
        total_rounds: usize,
        standings: Vec<JsonStanding<'a>>,
        stats: &'a apples_core::BenchmarkStats,
        state_path: &'a Path,
        report_path: &'a Path,
    }

    let game = &outcome.game;
    let output = JsonOutput {
        status: status.as_str(),
        error: termination_error(&outcome.termination),
        rounds_played: game.completed_rounds().len(),
        total_rounds: game.total_rounds(),
        standings: game
            .scoreboard()
            .standings()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let player = game.players().get(s.seat)?;
                Some(JsonStanding {
                    rank: i + 1,
                    seat: s.seat + 1,
                    name: &player.name,
                    model: player.kind.label(),
                    wins: s.wins,
                })
            })
            .collect(),
        stats: game.stats(),
        state_path: &paths.state,
        report_path: &paths.report,
    };

    if let Ok(json) = serde_json::to_string_pretty(&output) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(outcome: &GameOutcome, status: RunStatus, paths: &OutputPaths) {
    let game = &outcome.game;

    match status {
        RunStatus::Completed => println!("\n=== Game completed! Final scores ==="),
        RunStatus::DeckExhausted => println!("\n=== Game stopped early, partial scores ==="),
        RunStatus::Interrupted => println!("\n=== Game interrupted, scores so far ==="),
    }
    if let Some(error) = termination_error(&outcome.termination) {
        println!("Reason: {}", error);
    }
    println!(
        "Rounds played: {}/{}",
        game.completed_rounds().len(),
        game.total_rounds()
    );

    for (i, standing) in game.scoreboard().standings().iter().enumerate() {
        if let Some(player) = game.players().get(standing.seat) {
            println!("  {}. {}: {}", i + 1, player.name, format_wins(standing.wins));
        }
    }

    let stats = game.stats();
    if stats.model_calls > 0 {
        println!(
            "Model calls: {} ({} failed), tokens: {}",
            stats.model_calls,
            stats.failed_calls,
            stats.usage.total()
        );
        println!(
            "Fallbacks: {}, forfeits: {}, judging errors: {}",
            stats.fallbacks, stats.forfeits, stats.judging_errors
        );
    }
    if let Some(secs) = stats.elapsed_secs() {
        println!("Elapsed: {:.1}s", secs);
    }
    println!("Game state: {}", paths.state.display());
    println!("Report:     {}", paths.report.display());
}

fn termination_error(termination: &Termination) -> Option<String> {
    match termination {
        Termination::DeckExhausted(e) => Some(e.to_string()),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
