//! Chat Backend Traits
//!
//! The remote language model is an opaque capability: it creates a chat
//! handle for a model, and for each message it returns a lazy sequence of
//! text fragments. This module defines that boundary so the session and
//! the assembler never depend on a particular provider.
//!
//! # Design Philosophy
//!
//! - **The handle owns the context.** The session never resends prior turns;
//!   whatever a provider needs to keep context lives inside its `Chat` type.
//! - **Two failure windows.** Anything that goes wrong before the first
//!   fragment is a [`ModelRequestError`] returned from `send_message`.
//!   Anything after is delivered through the [`ChunkSequence`] as a
//!   [`StreamInterruptedError`].
//! - **Pull, not push.** Providers push [`StreamingToken`]s into a channel;
//!   consumers pull fragments out of a fused [`futures::Stream`].

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{ModelRequestError, StreamInterruptedError};

/// Channel capacity between a provider task and its [`ChunkSequence`]
pub const CHUNK_CHANNEL_CAPACITY: usize = 100;

/// Token stream events from chat backends
#[derive(Clone, Debug)]
pub enum StreamingToken {
    /// A fragment of the response (may split mid-word)
    Token(String),
    /// Response completed successfully
    Complete {
        /// The complete message as the provider saw it
        message: String,
    },
    /// Error occurred during streaming
    Error(String),
}

/// Lazy, finite, non-restartable sequence of response fragments
///
/// Yields `Ok(fragment)` in delivery order. The sequence ends with `None`
/// after a [`StreamingToken::Complete`], or with one
/// `Err(StreamInterruptedError)` if the provider reported an error or went
/// away without completing. After either, it yields `None` forever.
#[derive(Debug)]
pub struct ChunkSequence {
    rx: Option<mpsc::Receiver<StreamingToken>>,
}

impl ChunkSequence {
    /// Wrap the receiving end of a provider channel
    #[must_use]
    pub fn new(rx: mpsc::Receiver<StreamingToken>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a channel pair sized for provider tasks
    #[must_use]
    pub fn channel() -> (mpsc::Sender<StreamingToken>, Self) {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        (tx, Self::new(rx))
    }

    /// A sequence that yields the given fragments, then completes
    ///
    /// Used by in-memory backends.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(fragments, None)
    }

    /// A sequence that yields the given fragments, then fails
    pub fn failing_after<I, S>(fragments: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(fragments, Some(reason.into()))
    }

    fn scripted<I, S>(fragments: I, failure: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel(fragments.len() + 1);

        let mut message = String::new();
        for fragment in fragments {
            message.push_str(&fragment);
            // Capacity covers every fragment plus the terminal token
            let _ = tx.try_send(StreamingToken::Token(fragment));
        }
        let terminal = match failure {
            Some(reason) => StreamingToken::Error(reason),
            None => StreamingToken::Complete { message },
        };
        let _ = tx.try_send(terminal);

        Self::new(rx)
    }

    /// Pull the next fragment
    pub async fn next_fragment(&mut self) -> Option<Result<String, StreamInterruptedError>> {
        futures::StreamExt::next(self).await
    }

    /// Whether the sequence has ended
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.rx.is_none()
    }
}

impl Stream for ChunkSequence {
    type Item = Result<String, StreamInterruptedError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(None);
        };

        match rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamingToken::Token(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(StreamingToken::Complete { .. })) => {
                self.rx = None;
                Poll::Ready(None)
            }
            Poll::Ready(Some(StreamingToken::Error(reason))) => {
                self.rx = None;
                Poll::Ready(Some(Err(StreamInterruptedError::new(reason))))
            }
            Poll::Ready(None) => {
                self.rx = None;
                Poll::Ready(Some(Err(StreamInterruptedError::new(
                    "stream closed before the response completed",
                ))))
            }
        }
    }
}

impl futures::stream::FusedStream for ChunkSequence {
    fn is_terminated(&self) -> bool {
        self.rx.is_none()
    }
}

/// Chat backend trait
///
/// Implement this trait to add support for a different model provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opaque multi-turn conversation handle
    type Chat: Send + Sync;

    /// Get the backend name (e.g., "Gemini", "Ollama")
    fn name(&self) -> &str;

    /// Create a conversation handle for a model
    ///
    /// # Errors
    ///
    /// Returns [`ModelRequestError`] if the backend cannot serve the model.
    async fn create_chat(&self, model: &str) -> Result<Self::Chat, ModelRequestError>;

    /// Dispatch one message using the handle's accumulated context
    ///
    /// # Errors
    ///
    /// Returns [`ModelRequestError`] if the request cannot be dispatched or
    /// the service rejects it before any fragment is produced.
    async fn send_message(
        &self,
        chat: &Self::Chat,
        text: &str,
    ) -> Result<ChunkSequence, ModelRequestError>;
}
