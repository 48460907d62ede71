//! Event printer
//!
//! Turns [`AnalystEvent`]s into terminal output. Model text streams to stdout
//! as append-only deltas of the turn's buffer; notices go to stderr.

use parecer_core::{AnalystEvent, NoticeLevel, TurnId};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Where a piece of output belongs
#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    /// Transcript text
    Stdout(String),
    /// Notices
    Stderr(String),
}

/// Tracks how much of the streaming turn has been printed
#[derive(Debug, Default)]
pub struct EventPrinter {
    turn: Option<TurnId>,
    printed: usize,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print events until every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<AnalystEvent>) {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = events.recv().await {
            match self.format(&event) {
                Some(Output::Stdout(text)) => {
                    let _ = stdout.write_all(text.as_bytes()).await;
                    let _ = stdout.flush().await;
                }
                Some(Output::Stderr(text)) => eprint!("{text}"),
                None => {}
            }
        }
    }

    /// Output for one event, if any
    pub fn format(&mut self, event: &AnalystEvent) -> Option<Output> {
        match event {
            AnalystEvent::ModelTurnStarted { turn_id } => {
                self.turn = Some(*turn_id);
                self.printed = 0;
                Some(Output::Stdout("\n".to_string()))
            }
            AnalystEvent::ModelTurnRendered { turn_id, text, .. } => {
                if self.turn != Some(*turn_id) {
                    return None;
                }
                let delta = text.get(self.printed..).filter(|d| !d.is_empty())?;
                self.printed = text.len();
                Some(Output::Stdout(delta.to_string()))
            }
            AnalystEvent::ModelTurnCompleted { .. } => {
                self.turn = None;
                Some(Output::Stdout("\n\n".to_string()))
            }
            AnalystEvent::ModelTurnInterrupted { reason, .. } => {
                self.turn = None;
                Some(Output::Stdout(format!(
                    "\n\n[resposta incompleta: {reason}]\n\n"
                )))
            }
            AnalystEvent::UserTurn(turn) => turn
                .attachment
                .as_ref()
                .map(|name| Output::Stderr(format!("(anexo enviado: {name})\n"))),
            AnalystEvent::Notice { level, message } => {
                let tag = match level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Warning => "aviso",
                    NoticeLevel::Error => "erro",
                };
                Some(Output::Stderr(format!("[{tag}] {message}\n")))
            }
            AnalystEvent::BusyChanged { .. } => None,
        }
    }
}
