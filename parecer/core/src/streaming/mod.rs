//! Streaming Response Assembly
//!
//! Consumes a [`ChunkSequence`](crate::backend::ChunkSequence) for one
//! request and turns it into an incrementally rendered turn.
//!
//! # Architecture
//!
//! ```text
//! ChunkSequence ──fragment──▶ StreamAssembler ──append──▶ StreamingTurn.buffer
//!                                   │
//!                                   ├── render(turn)       after every append
//!                                   ├── finalize(turn)     once, on exhaustion
//!                                   └── interrupted(turn)  once, on failure
//!                                   ▼
//!                             TurnRenderer (surface)
//! ```
//!
//! # Invariants
//!
//! - The buffer is append-only for the life of a turn: after fragment *k*
//!   it equals fragments `1..=k` concatenated.
//! - A failure stops consumption and leaves the partial buffer in place.
//! - Fragments are never retried, reordered or dropped.

mod assembler;

pub use assembler::{StreamAssembler, TurnRenderer, TurnSummary};

pub use crate::backend::StreamingToken;
use crate::transcript::TurnId;

/// Where a turn is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Fragments still arriving
    Streaming,
    /// Sequence exhausted normally
    Complete,
    /// Sequence failed part-way; content is partial
    Incomplete,
}

/// Accumulation buffer for one in-flight model turn
///
/// Exclusively owned by the request that created it.
#[derive(Clone, Debug)]
pub struct StreamingTurn {
    id: TurnId,
    buffer: String,
    fragments: usize,
    status: TurnStatus,
}

impl StreamingTurn {
    /// Start an empty turn bound to a transcript entry
    #[must_use]
    pub fn new(id: TurnId) -> Self {
        Self {
            id,
            buffer: String::new(),
            fragments: 0,
            status: TurnStatus::Streaming,
        }
    }

    /// Transcript entry this turn renders into
    #[must_use]
    pub fn id(&self) -> TurnId {
        self.id
    }

    /// Full text received so far
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Fragments received so far
    #[must_use]
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> TurnStatus {
        self.status
    }

    fn append(&mut self, fragment: &str) {
        debug_assert_eq!(self.status, TurnStatus::Streaming);
        self.buffer.push_str(fragment);
        self.fragments += 1;
    }

    fn complete(&mut self) {
        self.status = TurnStatus::Complete;
    }

    fn interrupt(&mut self) {
        self.status = TurnStatus::Incomplete;
    }
}
