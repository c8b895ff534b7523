//! One chat turn: run the request in the background and render its events.

use anyhow::Result;
use providers::{ChannelConsumer, MentorClient};
use shared::agent_api::Transcript;
use shared::StreamEvent;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Accept a line of user input; blank input starts no turn.
pub fn accept_input(line: &str) -> Option<&str> {
    if line.trim().is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Applies the events of one turn to the transcript and works out what to
/// print. Fragments carry the full text, so only the unseen suffix is printed.
#[derive(Debug, Default)]
pub struct TurnView {
    printed: usize,
}

impl TurnView {
    pub fn apply(&mut self, transcript: &mut Transcript, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Fragment(full) => {
                transcript.upsert_assistant(full);
                let delta = full.get(self.printed..).unwrap_or_default().to_string();
                self.printed = full.len();
                Some(delta)
            }
            StreamEvent::Completed => {
                transcript.close_turn();
                (self.printed > 0).then(|| "\n".to_string())
            }
            StreamEvent::Cancelled => {
                transcript.close_turn();
                Some("\n[stopped]\n".to_string())
            }
            StreamEvent::Error { kind, .. } => {
                transcript.close_turn();
                let lead = if self.printed > 0 { "\n" } else { "" };
                Some(format!("{}! {}\n", lead, kind.user_notice()))
            }
            StreamEvent::Diagnostic(_) => None,
        }
    }
}

/// Stream one assistant reply for the current transcript. Ctrl+C cancels the
/// turn; text received so far stays in the transcript.
pub async fn run_turn(client: &Arc<MentorClient>, transcript: &mut Transcript) -> Result<()> {
    let messages = transcript.messages().to_vec();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let task = {
        let client = Arc::clone(client);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut consumer = ChannelConsumer::new(tx);
            client.stream_reply(&messages, &mut consumer, &cancel).await
        })
    };

    let mut view = TurnView::default();
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if let Some(out) = view.apply(transcript, &event) {
                    write!(stdout, "{}", out)?;
                    stdout.flush()?;
                }
                if event.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                cancel.cancel();
            }
        }
    }

    let outcome = task.await?;
    tracing::debug!(state = ?outcome.state, chars = outcome.text.len(), "turn finished");
    Ok(())
}
