//! Stream Assembler
//!
//! One explicit loop per turn: pull a fragment, append it, render.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::StreamingTurn;
use crate::backend::ChunkSequence;
use crate::error::StreamInterruptedError;

/// Display target driven by the assembler
#[async_trait]
pub trait TurnRenderer: Send {
    /// Called after every append with the buffer's full content
    async fn render(&mut self, turn: &StreamingTurn);

    /// Called once when the sequence is exhausted
    async fn finalize(&mut self, turn: &StreamingTurn);

    /// Called once when the sequence fails; the partial buffer stays visible
    async fn interrupted(&mut self, turn: &StreamingTurn, error: &StreamInterruptedError);
}

/// Statistics for one assembled turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnSummary {
    /// Fragments consumed
    pub fragments: usize,
    /// Bytes in the final buffer
    pub bytes: usize,
    /// Wall time from first poll to end of sequence
    pub elapsed: Duration,
}

/// Drives a [`TurnRenderer`] from a [`ChunkSequence`]
#[derive(Debug)]
pub struct StreamAssembler<R> {
    renderer: R,
}

impl<R: TurnRenderer> StreamAssembler<R> {
    /// Create an assembler that renders into `renderer`
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    /// The renderer
    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Take the renderer back
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Consume `chunks` into `turn`
    ///
    /// # Errors
    ///
    /// Returns [`StreamInterruptedError`] if the sequence fails part-way.
    /// `turn` then holds every fragment received before the failure and is
    /// marked incomplete.
    pub async fn assemble(
        &mut self,
        turn: &mut StreamingTurn,
        mut chunks: ChunkSequence,
    ) -> Result<TurnSummary, StreamInterruptedError> {
        let start = Instant::now();

        while let Some(next) = chunks.next_fragment().await {
            match next {
                Ok(fragment) => {
                    turn.append(&fragment);
                    self.renderer.render(turn).await;
                }
                Err(error) => {
                    turn.interrupt();
                    tracing::warn!(
                        turn_id = %turn.id(),
                        fragments = turn.fragments(),
                        error = %error,
                        "Response stream interrupted"
                    );
                    self.renderer.interrupted(turn, &error).await;
                    return Err(error);
                }
            }
        }

        turn.complete();
        self.renderer.finalize(turn).await;

        let summary = TurnSummary {
            fragments: turn.fragments(),
            bytes: turn.buffer().len(),
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            turn_id = %turn.id(),
            fragments = summary.fragments,
            bytes = summary.bytes,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Turn assembled"
        );
        Ok(summary)
    }
}
