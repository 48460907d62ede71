//! Parecer Core - Headless Legal Document Analysis
//!
//! This crate provides the analysis pipeline behind `parecer`, completely
//! independent of any terminal or UI framework: a surface feeds it
//! documents and instructions and renders the events it emits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Surface (CLI, tests)                     │
//! │          analyze / follow_up (down)   AnalystEvent (up)          │
//! └─────────────────────────────┬────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┼────────────────────────────────────┐
//! │                        PARECER CORE                              │
//! │  ┌──────────────────────────┴───────────────────────────────────┐ │
//! │  │                          Analyst                             │ │
//! │  │  ┌───────────┐ ┌──────────┐ ┌─────────────┐ ┌─────────────┐  │ │
//! │  │  │ Document  │ │  Prompt  │ │Conversation │ │   Stream    │  │ │
//! │  │  │ Extractor │ │ Composer │ │  Session    │ │  Assembler  │  │ │
//! │  │  └───────────┘ └──────────┘ └──────┬──────┘ └──────┬──────┘  │ │
//! │  │                                    │               │         │ │
//! │  │                             ChatBackend      Render Adapter  │ │
//! │  └──────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Analyst`]: owns the session, transcript and in-flight guard
//! - [`DocumentExtractor`]: PDF bytes to ordered plain text
//! - [`PromptComposer`]: builds initial and follow-up messages
//! - [`ConversationSession`]: the `Unstarted`/`Active` chat with the model
//! - [`StreamAssembler`]: fragments to an append-only, rendered buffer
//! - [`ChatBackend`]: the model service boundary
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use parecer_core::{load_config, Analyst, DocumentExtractor, ModelBackend};
//!
//! let config = load_config()?;
//! let backend = Arc::new(ModelBackend::from_config(&config.model)?);
//! let analyst = Analyst::new(
//!     backend,
//!     config.model.model.clone(),
//!     config.composer().await?,
//!     DocumentExtractor::default(),
//! );
//!
//! analyst.analyze("Caso X ocorreu em 01/01/2024 ...").await?;
//! analyst.follow_up("Elabore a minuta.", None).await?;
//! ```
//!
//! # Module Overview
//!
//! - [`analyst`]: orchestration and the in-flight guard
//! - [`backend`]: model backend abstraction (Gemini, Ollama)
//! - [`config`]: TOML + environment configuration
//! - [`document`]: PDF text extraction
//! - [`error`]: error taxonomy
//! - [`events`]: events from the analyst to surfaces
//! - [`prompt`]: prompt composition
//! - [`render`]: markdown subset to HTML and plain text
//! - [`session`]: conversation session
//! - [`streaming`]: stream assembly
//! - [`transcript`]: user-visible turn log

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analyst;
pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod prompt;
pub mod render;
pub mod session;
pub mod streaming;
pub mod transcript;

// Re-exports for convenience
pub use analyst::{Analyst, TurnOutcome};
pub use backend::{
    ChatBackend, ChunkSequence, GeminiBackend, ModelBackend, ModelChat, OllamaBackend,
    StreamingToken,
};
pub use document::{Document, DocumentExtractor, ExtractedText, LopdfDecoder, PdfDecoder};
pub use error::{
    AnalystError, ComposeError, ExtractionError, ModelRequestError, SessionError,
    SessionNotStartedError, StreamInterruptedError,
};
pub use events::{AnalystEvent, NoticeLevel};
pub use prompt::{
    Attachment, MessageKind, OutgoingMessage, PromptComposer, DEFAULT_FOLLOW_UP_INSTRUCTION,
    SUBJECT_MARKER,
};
pub use session::{ConversationSession, SessionState};
pub use streaming::{StreamAssembler, StreamingTurn, TurnRenderer, TurnStatus, TurnSummary};
pub use transcript::{Role, Transcript, Turn, TurnId};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, AnalystConfig, BackendKind,
    ConfigError, ConfigOverrides, ConfigSource, ModelConfig,
};
