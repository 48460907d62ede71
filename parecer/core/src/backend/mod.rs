//! Model Backend Abstraction
//!
//! This module provides the trait-based boundary to the remote language
//! model. The session talks to any [`ChatBackend`]; two concrete providers
//! ship with the crate:
//!
//! - **Gemini**: the hosted default, server-sent events
//! - **Ollama**: a local server, newline-delimited JSON
//!
//! [`ModelBackend`] picks one of them at runtime from [`ModelConfig`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────┐
//! │  ConversationSession   │
//! └──────────┬─────────────┘
//!            │ create_chat / send_message
//!            ▼
//! ┌────────────────────────┐
//! │  ChatBackend (trait)   │
//! └──────────┬─────────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//! ┌────────┐    ┌────────┐
//! │ Gemini │    │ Ollama │
//! └───┬────┘    └───┬────┘
//!     └─────┬───────┘
//!           ▼  mpsc<StreamingToken>
//!     ChunkSequence (pull)
//! ```

mod gemini;
mod lines;
mod ollama;
mod traits;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{BackendKind, ModelConfig};
use crate::error::ModelRequestError;

pub use gemini::{GeminiBackend, GeminiChat, DEFAULT_GEMINI_BASE_URL};
pub use ollama::{OllamaBackend, OllamaChat};
pub use traits::{ChatBackend, ChunkSequence, StreamingToken, CHUNK_CHANNEL_CAPACITY};

// ============================================================================
// Client-side history
// ============================================================================

/// Who said an [`Exchange`] entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speaker {
    /// The user
    User,
    /// The model
    Model,
}

/// One entry of a chat's context
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    /// Who said it
    pub speaker: Speaker,
    /// What was said
    pub text: String,
}

/// Conversation context kept by a chat handle
///
/// Shared between the handle and the task streaming a response, so the
/// task can record the exchange once the response completes.
#[derive(Clone, Debug, Default)]
pub struct ChatHistory {
    entries: Arc<Mutex<Vec<Exchange>>>,
}

impl ChatHistory {
    /// Copy of the entries, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Exchange> {
        self.entries.lock().clone()
    }

    /// Record a completed request/response pair
    pub fn record_exchange(&self, user: String, model: String) {
        let mut entries = self.entries.lock();
        entries.push(Exchange {
            speaker: Speaker::User,
            text: user,
        });
        entries.push(Exchange {
            speaker: Speaker::Model,
            text: model,
        });
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// Runtime-selected backend
// ============================================================================

/// A backend chosen from configuration
#[derive(Clone, Debug)]
pub enum ModelBackend {
    /// Hosted Gemini API
    Gemini(GeminiBackend),
    /// Local Ollama server
    Ollama(OllamaBackend),
}

/// Chat handle of a [`ModelBackend`]
#[derive(Clone, Debug)]
pub enum ModelChat {
    /// Gemini conversation
    Gemini(GeminiChat),
    /// Ollama conversation
    Ollama(OllamaChat),
}

impl ModelBackend {
    /// Build the configured backend
    ///
    /// # Errors
    ///
    /// Returns [`ModelRequestError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelRequestError> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        match config.backend {
            BackendKind::Gemini => Ok(Self::Gemini(GeminiBackend::new(
                config.api_key.clone(),
                config.base_url.clone(),
                connect_timeout,
            )?)),
            BackendKind::Ollama => Ok(Self::Ollama(OllamaBackend::new(
                config.ollama_host.clone(),
                config.ollama_port,
                connect_timeout,
            )?)),
        }
    }

    /// Check if the backend is reachable
    ///
    /// Hosted backends are assumed reachable; failures surface on dispatch.
    pub async fn health_check(&self) -> bool {
        match self {
            Self::Gemini(_) => true,
            Self::Ollama(backend) => backend.health_check().await,
        }
    }
}

#[async_trait]
impl ChatBackend for ModelBackend {
    type Chat = ModelChat;

    fn name(&self) -> &str {
        match self {
            Self::Gemini(backend) => backend.name(),
            Self::Ollama(backend) => backend.name(),
        }
    }

    async fn create_chat(&self, model: &str) -> Result<ModelChat, ModelRequestError> {
        match self {
            Self::Gemini(backend) => backend.create_chat(model).await.map(ModelChat::Gemini),
            Self::Ollama(backend) => backend.create_chat(model).await.map(ModelChat::Ollama),
        }
    }

    async fn send_message(
        &self,
        chat: &ModelChat,
        text: &str,
    ) -> Result<ChunkSequence, ModelRequestError> {
        match (self, chat) {
            (Self::Gemini(backend), ModelChat::Gemini(chat)) => {
                backend.send_message(chat, text).await
            }
            (Self::Ollama(backend), ModelChat::Ollama(chat)) => {
                backend.send_message(chat, text).await
            }
            _ => Err(ModelRequestError::Other(
                "chat handle belongs to a different backend".to_string(),
            )),
        }
    }
}
