//! Analyst Events
//!
//! Messages sent from the [`Analyst`](crate::analyst::Analyst) to whatever
//! surface is attached. Surfaces are renderers: they display what they are
//! told and forward user actions back as method calls.

use serde::{Deserialize, Serialize};

use crate::transcript::{Turn, TurnId};

/// Severity of a [`AnalystEvent::Notice`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Progress information
    Info,
    /// Something the user should act on
    Warning,
    /// An operation failed
    Error,
}

/// Events from the analyst to a surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AnalystEvent {
    /// The in-flight guard was taken or released
    ///
    /// Surfaces disable their send controls while `busy` is true.
    BusyChanged {
        /// Whether a request is in flight
        busy: bool,
    },

    /// A user turn was appended
    UserTurn(Turn),

    /// A model turn was appended and is about to stream
    ModelTurnStarted {
        /// The new turn
        turn_id: TurnId,
    },

    /// The model turn's buffer grew
    ///
    /// Carries the full buffer, not a delta; each `text` extends the
    /// previous one.
    ModelTurnRendered {
        /// Turn being streamed
        turn_id: TurnId,
        /// Full text so far
        text: String,
        /// `text` rendered as markup
        html: String,
    },

    /// The model turn finished; the copy action is now available
    ModelTurnCompleted {
        /// Finished turn
        turn_id: TurnId,
        /// Plain text for the copy action
        copy_text: String,
    },

    /// The model turn's stream failed; the partial text stays
    ModelTurnInterrupted {
        /// Incomplete turn
        turn_id: TurnId,
        /// Why the stream stopped
        reason: String,
    },

    /// User-facing message outside the transcript
    Notice {
        /// Severity
        level: NoticeLevel,
        /// Message text
        message: String,
    },
}
