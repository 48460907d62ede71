//! Conversation Session
//!
//! Owns the one multi-turn dialogue with the remote model.
//!
//! # Design Philosophy
//!
//! A session is an explicitly owned value, constructed by the orchestrating
//! layer and passed by reference to every request. It has two states:
//!
//! ```text
//!   Unstarted ──start()──▶ Active ──continue_with()──▶ Active ...
//! ```
//!
//! The chat handle is created once, on the first successful `start`, and is
//! never re-created while the session lives: doing so would silently drop
//! every prior turn. The remote side (or the handle) retains context; the
//! session never resends history.
//!
//! The session does not queue requests. Keeping at most one in flight is
//! the caller's job (see [`Analyst`](crate::analyst::Analyst)).

use std::sync::Arc;

use crate::backend::{ChatBackend, ChunkSequence};
use crate::error::{SessionError, SessionNotStartedError};
use crate::prompt::OutgoingMessage;

/// Lifecycle state of a [`ConversationSession`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No chat handle yet
    Unstarted,
    /// Chat handle created; follow-ups allowed
    Active,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// The single long-lived dialogue with the model
pub struct ConversationSession<B: ChatBackend> {
    backend: Arc<B>,
    model: String,
    chat: Option<B::Chat>,
    requests: u64,
}

impl<B: ChatBackend> std::fmt::Debug for ConversationSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("state", &self.state())
            .field("requests", &self.requests)
            .finish()
    }
}

impl<B: ChatBackend> ConversationSession<B> {
    /// Create an unstarted session for a model
    pub fn new(backend: Arc<B>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            chat: None,
            requests: 0,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.chat.is_some() {
            SessionState::Active
        } else {
            SessionState::Unstarted
        }
    }

    /// Model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Backend name
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Number of requests dispatched successfully
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests
    }

    /// Create the chat handle and dispatch the first message
    ///
    /// The session becomes `Active` only if both steps succeed; on failure
    /// it stays `Unstarted` and `start` may be retried.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyStarted`] if the session is `Active`
    /// - [`SessionError::Request`] if the handle cannot be created or the
    ///   message cannot be dispatched
    pub async fn start(&mut self, message: &OutgoingMessage) -> Result<ChunkSequence, SessionError> {
        if self.chat.is_some() {
            return Err(SessionError::AlreadyStarted);
        }

        let chat = self.backend.create_chat(&self.model).await?;
        let chunks = self.backend.send_message(&chat, message.text()).await?;

        self.chat = Some(chat);
        self.requests += 1;
        tracing::info!(
            backend = %self.backend.name(),
            model = %self.model,
            chars = message.text().len(),
            "Session started"
        );
        Ok(chunks)
    }

    /// Dispatch a follow-up on the existing chat handle
    ///
    /// A failure leaves the session `Active` so the user can retry.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotStarted`] from `Unstarted`; nothing is dispatched
    /// - [`SessionError::Request`] if the message cannot be dispatched
    pub async fn continue_with(
        &mut self,
        message: &OutgoingMessage,
    ) -> Result<ChunkSequence, SessionError> {
        let chat = self.chat.as_ref().ok_or(SessionNotStartedError)?;
        let chunks = self.backend.send_message(chat, message.text()).await?;

        self.requests += 1;
        tracing::debug!(
            request = self.requests,
            chars = message.text().len(),
            "Follow-up dispatched"
        );
        Ok(chunks)
    }
}
