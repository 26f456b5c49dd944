//! Line-oriented intent source
//!
//! Each stdin line is the complete set of keys held from now on, e.g.
//! `right light`. An empty line releases everything; `r` asks for a restart.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::game::Intent;

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hold(Intent),
    Restart,
}

/// Map a line of key words to a command
pub fn parse_line(line: &str) -> Result<Command, String> {
    let mut intent = Intent::default();
    for word in line.split_whitespace() {
        match word.to_ascii_lowercase().as_str() {
            "r" | "restart" => return Ok(Command::Restart),
            "left" | "a" => intent.left = true,
            "right" | "d" => intent.right = true,
            "up" | "w" | "jump" => intent.up = true,
            "light" | "z" => intent.light = true,
            "heavy" | "x" => intent.heavy = true,
            "block" | "c" => intent.block = true,
            other => return Err(other.to_string()),
        }
    }
    Ok(Command::Hold(intent))
}

/// Receiving ends handed to a session
pub struct InputChannels {
    pub intents: watch::Receiver<Intent>,
    pub restarts: mpsc::Receiver<()>,
}

/// Spawn the stdin reader. The returned handle is aborted on teardown.
pub fn spawn_stdin_reader() -> (InputChannels, JoinHandle<()>) {
    let (intent_tx, intents) = watch::channel(Intent::default());
    let (restart_tx, restarts) = mpsc::channel(4);

    let handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_line(&line) {
                    Ok(Command::Hold(intent)) => {
                        debug!(?intent, "Intent updated");
                        let _ = intent_tx.send(intent);
                    }
                    Ok(Command::Restart) => {
                        let _ = restart_tx.try_send(());
                    }
                    Err(word) => warn!(%word, "Unknown key, line ignored"),
                },
                Ok(None) => {
                    debug!("stdin closed, holding last intent");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });

    (InputChannels { intents, restarts }, handle)
}
