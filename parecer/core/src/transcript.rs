//! Transcript
//!
//! The user-visible, ordered, append-only log of the conversation. It is a
//! view of what was shown, not the model's context: the chat handle owns
//! context, and nothing here is ever sent back to the model.
//!
//! Turns are only appended. A model turn's content is replaced wholesale
//! while it streams (each update is a longer prefix of the final text) and
//! its status is set once when the stream ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::render;
use crate::streaming::TurnStatus;

/// Label shown under a user turn that carried an attachment
pub const ATTACHMENT_LABEL: &str = "Arquivo anexado";

/// Turn identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Generate a new unique turn ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a turn belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User instruction
    User,
    /// Model response
    Model,
    /// Inline error entry
    Error,
}

/// One entry of the transcript
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: TurnId,
    /// Who the turn belongs to
    pub role: Role,
    /// Text as typed (user) or as received so far (model)
    pub content: String,
    /// Name of the file attached to a user turn
    pub attachment: Option<String>,
    /// Lifecycle status
    pub status: TurnStatus,
    /// When the turn was appended
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String, status: TurnStatus) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content,
            attachment: None,
            status,
            created_at: Utc::now(),
        }
    }

    /// Plain text of the rendered turn, for the copy action
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self.role {
            Role::Model => render::render_plain(&self.content),
            Role::User | Role::Error => self.content.clone(),
        }
    }

    /// Display markup for this turn
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut body = String::new();
        match self.role {
            Role::Model => body.push_str(&render::render_html(&self.content)),
            Role::User | Role::Error => {
                render::html::push_escaped(&mut body, &self.content);
                body = body.replace('\n', "<br>");
            }
        }

        if let Some(name) = &self.attachment {
            if !self.content.is_empty() {
                body.push_str("<br>");
            }
            body.push_str("<small><i>");
            render::html::push_escaped(&mut body, &format!("{ATTACHMENT_LABEL}: {name}"));
            body.push_str("</i></small>");
        }

        let class = match (self.role, self.status) {
            (Role::User, _) => "user",
            (Role::Error, _) => "error",
            (Role::Model, TurnStatus::Incomplete) => "model incomplete",
            (Role::Model, _) => "model",
        };
        format!("<div class=\"{class}\">{body}</div>")
    }
}

/// Ordered, append-only log of turns
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    pub fn push_user(&mut self, instruction: &str, attachment: Option<&str>) -> TurnId {
        let mut turn = Turn::new(Role::User, instruction.to_string(), TurnStatus::Complete);
        turn.attachment = attachment.map(str::to_string);
        self.push(turn)
    }

    /// Append an empty, streaming model turn
    pub fn push_model(&mut self) -> TurnId {
        self.push(Turn::new(Role::Model, String::new(), TurnStatus::Streaming))
    }

    /// Append an error entry
    pub fn push_error(&mut self, message: &str) -> TurnId {
        self.push(Turn::new(Role::Error, message.to_string(), TurnStatus::Complete))
    }

    fn push(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    /// Replace a streaming model turn's content
    ///
    /// Returns `false` if the turn is unknown or no longer streaming.
    pub fn update_model(&mut self, id: TurnId, content: &str) -> bool {
        match self.get_mut(id) {
            Some(turn) if turn.role == Role::Model && turn.status == TurnStatus::Streaming => {
                turn.content.clear();
                turn.content.push_str(content);
                true
            }
            _ => false,
        }
    }

    /// Set a model turn's final content and status
    pub fn finish_model(&mut self, id: TurnId, content: &str, status: TurnStatus) -> bool {
        match self.get_mut(id) {
            Some(turn) if turn.role == Role::Model && turn.status == TurnStatus::Streaming => {
                turn.content.clear();
                turn.content.push_str(content);
                turn.status = status;
                true
            }
            _ => false,
        }
    }

    /// Look up a turn
    #[must_use]
    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.turns.iter_mut().rev().find(|t| t.id == id)
    }

    /// The most recent model turn whose stream completed
    ///
    /// Interrupted turns are skipped: their text is visible but not
    /// offered for copying.
    #[must_use]
    pub fn last_complete_model(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Model && t.status == TurnStatus::Complete)
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Export the whole conversation as a standalone HTML document
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::from(
            "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Análise</title>\n</head>\n<body>\n",
        );
        for turn in &self.turns {
            out.push_str(&turn.to_html());
            out.push('\n');
        }
        out.push_str("</body>\n</html>\n");
        out
    }
}
