//! Apples to Models CLI
//!
//! Runs an Apples to Apples game between language models (and random
//! players), saves the game state and writes an HTML report.
//!
//! Exit codes: 0 when every round was played, 1 on configuration or client
//! errors, 2 when a deck ran out before the last round, 130 when interrupted.

mod report;
mod run;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apples")]
#[command(about = "Apples to Apples benchmark for language models")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: run::RunArgs,
}

fn main() -> ExitCode {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run::run(cli.args) {
        Ok(status) => status.exit_code(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
