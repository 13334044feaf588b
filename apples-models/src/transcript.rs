//! Per-call model transcripts
//!
//! Each model request a seat makes is written to its own text file: model,
//! timing, token counts, the full conversation and the raw answer (or the
//! error). Game records link to these files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{Completion, CompletionError};
use crate::messages::Messages;

const RULE: &str = "--------------------------------------------------------------------------------";

/// One finished model call, ready to be written
pub struct CallTranscript<'a> {
    pub model: &'a str,
    pub messages: &'a Messages,
    pub duration: Duration,
    pub attempts: u32,
    pub result: &'a Result<Completion, CompletionError>,
}

/// Directory that transcripts are written into
#[derive(Clone, Debug)]
pub struct TranscriptLog {
    dir: PathBuf,
}

impl TranscriptLog {
    /// The directory is created on the first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `call` to `<dir>/<name>.log`, replacing an older file of that name
    pub async fn write(&self, name: &str, call: &CallTranscript<'_>) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.log", name));
        tokio::fs::write(&path, render_transcript(call)).await?;
        Ok(path)
    }
}

/// Human-readable transcript text
pub fn render_transcript(call: &CallTranscript<'_>) -> String {
    let mut out = String::new();
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    let _ = writeln!(out, "Timestamp: {}", timestamp);
    let _ = writeln!(out, "Model: {}", call.model);
    let _ = writeln!(out, "Duration: {:.3} seconds", call.duration.as_secs_f64());
    let _ = writeln!(out, "Attempts: {}", call.attempts);
    if let Ok(completion) = call.result {
        let usage = completion.usage;
        let _ = writeln!(
            out,
            "Tokens: {} (prompt: {}, completion: {})",
            usage.total(),
            usage.prompt_tokens,
            usage.completion_tokens
        );
        if let Some(id) = &completion.id {
            let _ = writeln!(out, "Generation: {}", id);
        }
    }
    let _ = writeln!(out, "{}\n", RULE);

    out.push_str("=== Input Messages ===\n");
    for message in call.messages.iter() {
        let _ = write!(out, "\n[{}]\n{}\n", message.role.as_str().to_uppercase(), message.content);
    }
    let _ = writeln!(out, "\n{}", RULE);

    match call.result {
        Ok(completion) => {
            let _ = write!(out, "\n=== Model Response ===\n{}\n", completion.content);
        }
        Err(error) => {
            let _ = write!(out, "\n=== Error ===\n{}\n", error);
        }
    }
    let _ = write!(out, "\n{}", RULE);
    out
}
