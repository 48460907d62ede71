//! Analyst - Orchestration Layer
//!
//! The Analyst owns everything one analysis needs and sequences it:
//!
//! ```text
//!            ┌──────────────────── Analyst ─────────────────────┐
//!  analyze ──▶ guard ─▶ PromptComposer ─▶ ConversationSession   │
//! follow_up ─▶ guard ─▶ DocumentExtractor ─┘        │           │
//!            │                                      ▼           │
//!            │                   StreamAssembler ─▶ Transcript  │
//!            └──────────────────────────┬───────────────────────┘
//!                                       ▼
//!                           mpsc<AnalystEvent> (surface)
//! ```
//!
//! # Design Philosophy
//!
//! - **Explicit ownership.** There is no ambient session. A surface creates
//!   one `Analyst` and calls it; every piece of state is a field.
//! - **One request at a time.** A single-permit semaphore is the in-flight
//!   guard. A second dispatch while one is streaming is rejected with
//!   [`AnalystError::RequestInFlight`], never queued.
//! - **Errors are feedback.** Every failure becomes a transcript error entry
//!   and/or a [`AnalystEvent::Notice`], and is also returned to the caller.
//!   Nothing here terminates the process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::backend::ChatBackend;
use crate::document::{Document, DocumentExtractor, ExtractedText};
use crate::error::{AnalystError, ComposeError, SessionNotStartedError};
use crate::events::{AnalystEvent, NoticeLevel};
use crate::prompt::{Attachment, PromptComposer};
use crate::render;
use crate::session::{ConversationSession, SessionState};
use crate::streaming::{StreamAssembler, StreamingTurn, TurnRenderer, TurnStatus, TurnSummary};
use crate::transcript::{Transcript, TurnId};

/// Result of one fully streamed model turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Transcript entry holding the response
    pub turn_id: TurnId,
    /// Assembly statistics
    pub summary: TurnSummary,
}

/// Owns the session, transcript and in-flight guard for one analysis
pub struct Analyst<B: ChatBackend> {
    session: Mutex<ConversationSession<B>>,
    transcript: Arc<parking_lot::Mutex<Transcript>>,
    extractor: DocumentExtractor,
    composer: PromptComposer,
    guard: Semaphore,
    events: Option<mpsc::Sender<AnalystEvent>>,
}

impl<B: ChatBackend> std::fmt::Debug for Analyst<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyst")
            .field("turns", &self.transcript.lock().len())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl<B: ChatBackend> Analyst<B> {
    /// Create an analyst with an unstarted session
    pub fn new(
        backend: Arc<B>,
        model: impl Into<String>,
        composer: PromptComposer,
        extractor: DocumentExtractor,
    ) -> Self {
        Self {
            session: Mutex::new(ConversationSession::new(backend, model)),
            transcript: Arc::new(parking_lot::Mutex::new(Transcript::new())),
            extractor,
            composer,
            guard: Semaphore::new(1),
            events: None,
        }
    }

    /// Send events to a surface
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<AnalystEvent>) -> Self {
        self.events = Some(events);
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether a request is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.guard.available_permits() == 0
    }

    /// Current session state
    pub async fn session_state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    /// Snapshot of the transcript
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        self.transcript.lock().clone()
    }

    /// Plain text of a completed model turn, for the copy action
    ///
    /// With `None`, uses the most recent completed model turn. Returns
    /// `None` for unknown turns, non-model turns, turns still streaming and
    /// interrupted turns.
    #[must_use]
    pub fn copy_text(&self, turn_id: Option<TurnId>) -> Option<String> {
        let transcript = self.transcript.lock();
        let turn = match turn_id {
            Some(id) => transcript.get(id)?,
            None => transcript.last_complete_model()?,
        };
        let complete = turn.role == crate::transcript::Role::Model
            && turn.status == TurnStatus::Complete;
        complete.then(|| turn.plain_text())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Extract text from a document
    ///
    /// # Errors
    ///
    /// Returns [`AnalystError::Extraction`] and emits an error notice.
    pub async fn extract(&self, document: &Document) -> Result<ExtractedText, AnalystError> {
        self.notice(
            NoticeLevel::Info,
            format!("Extraindo texto de {}...", document.file_name()),
        )
        .await;

        match self.extractor.extract(document).await {
            Ok(text) => Ok(text),
            Err(e) => {
                let error = AnalystError::from(e);
                self.notice(NoticeLevel::Error, error.user_message()).await;
                Err(error)
            }
        }
    }

    /// Run the initial analysis of `subject`
    ///
    /// Creates the session on success. No user turn is recorded; the
    /// subject is the input area's content, not a chat message.
    ///
    /// # Errors
    ///
    /// - [`AnalystError::EmptySubject`] if `subject` is blank
    /// - [`AnalystError::AlreadyStarted`] if the session is active
    /// - [`AnalystError::RequestInFlight`] if another request is streaming
    /// - [`AnalystError::ModelRequest`] if dispatch fails
    /// - [`AnalystError::StreamInterrupted`] if the response stops part-way
    pub async fn analyze(&self, subject: &str) -> Result<TurnOutcome, AnalystError> {
        if subject.trim().is_empty() {
            return Err(self.reject(AnalystError::EmptySubject).await);
        }
        if self.session_state().await == SessionState::Active {
            return Err(self.reject(AnalystError::AlreadyStarted).await);
        }
        let Ok(permit) = self.guard.try_acquire() else {
            return Err(self.reject(AnalystError::RequestInFlight).await);
        };

        self.emit(AnalystEvent::BusyChanged { busy: true }).await;
        let message = self.composer.initial(subject);
        tracing::info!(chars = subject.len(), "Starting initial analysis");

        let dispatched = self.session.lock().await.start(&message).await;
        let result = match dispatched {
            Ok(chunks) => self.stream_turn(chunks).await,
            Err(e) => Err(self.record_failure(e.into()).await),
        };

        drop(permit);
        self.emit(AnalystEvent::BusyChanged { busy: false }).await;
        result
    }

    /// Send a follow-up, optionally with one attached document
    ///
    /// # Errors
    ///
    /// - [`AnalystError::NotStarted`] before any successful analysis
    /// - [`AnalystError::Compose`] if there is neither instruction nor attachment
    /// - [`AnalystError::RequestInFlight`] if another request is streaming
    /// - [`AnalystError::Extraction`] if the attachment cannot be read; nothing is sent
    /// - [`AnalystError::ModelRequest`] if dispatch fails; the session stays active
    /// - [`AnalystError::StreamInterrupted`] if the response stops part-way
    pub async fn follow_up(
        &self,
        instruction: &str,
        attachment: Option<Document>,
    ) -> Result<TurnOutcome, AnalystError> {
        if self.session_state().await == SessionState::Unstarted {
            return Err(self.reject(SessionNotStartedError.into()).await);
        }
        if instruction.trim().is_empty() && attachment.is_none() {
            return Err(self.reject(ComposeError::EmptyFollowUp.into()).await);
        }
        let Ok(permit) = self.guard.try_acquire() else {
            return Err(self.reject(AnalystError::RequestInFlight).await);
        };

        self.emit(AnalystEvent::BusyChanged { busy: true }).await;
        let result = self.dispatch_follow_up(instruction, attachment).await;
        drop(permit);
        self.emit(AnalystEvent::BusyChanged { busy: false }).await;
        result
    }

    async fn dispatch_follow_up(
        &self,
        instruction: &str,
        attachment: Option<Document>,
    ) -> Result<TurnOutcome, AnalystError> {
        let user_turn = {
            let mut transcript = self.transcript.lock();
            let id = transcript.push_user(
                instruction.trim(),
                attachment.as_ref().map(Document::file_name),
            );
            transcript.get(id).cloned()
        };
        if let Some(turn) = user_turn {
            self.emit(AnalystEvent::UserTurn(turn)).await;
        }

        let attachment = match attachment {
            Some(document) => match self.extractor.extract(&document).await {
                Ok(text) => Some(Attachment::new(document.file_name(), text)),
                Err(e) => {
                    tracing::warn!(file = %document.file_name(), error = %e, "Attachment extraction failed");
                    return Err(self.record_failure(e.into()).await);
                }
            },
            None => None,
        };

        let message = match self.composer.follow_up(instruction, attachment.as_ref()) {
            Ok(message) => message,
            Err(e) => return Err(self.record_failure(e.into()).await),
        };

        let dispatched = self.session.lock().await.continue_with(&message).await;
        match dispatched {
            Ok(chunks) => self.stream_turn(chunks).await,
            Err(e) => Err(self.record_failure(e.into()).await),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn stream_turn(
        &self,
        chunks: crate::backend::ChunkSequence,
    ) -> Result<TurnOutcome, AnalystError> {
        let turn_id = self.transcript.lock().push_model();
        self.emit(AnalystEvent::ModelTurnStarted { turn_id }).await;

        let mut turn = StreamingTurn::new(turn_id);
        let mut assembler = StreamAssembler::new(EventRenderer {
            transcript: Arc::clone(&self.transcript),
            events: self.events.clone(),
        });

        match assembler.assemble(&mut turn, chunks).await {
            Ok(summary) => Ok(TurnOutcome { turn_id, summary }),
            Err(e) => {
                let error = AnalystError::from(e);
                self.notice(NoticeLevel::Warning, error.user_message()).await;
                Err(error)
            }
        }
    }

    /// Turn a failure after the guard was taken into feedback
    async fn record_failure(&self, error: AnalystError) -> AnalystError {
        tracing::warn!(error = %error, "Request failed");
        let message = error.user_message();
        self.transcript.lock().push_error(&format!(
            "Ocorreu um erro ao processar sua solicitação: {message}"
        ));
        self.notice(NoticeLevel::Error, message).await;
        error
    }

    /// Turn a rejected request into feedback; nothing was dispatched
    async fn reject(&self, error: AnalystError) -> AnalystError {
        tracing::debug!(error = %error, "Request rejected");
        self.notice(NoticeLevel::Warning, error.user_message()).await;
        error
    }

    async fn notice(&self, level: NoticeLevel, message: String) {
        self.emit(AnalystEvent::Notice { level, message }).await;
    }

    async fn emit(&self, event: AnalystEvent) {
        if let Some(events) = &self.events {
            // Surface gone; keep working headless
            let _ = events.send(event).await;
        }
    }
}

/// Mirrors the assembling turn into the transcript and the event channel
struct EventRenderer {
    transcript: Arc<parking_lot::Mutex<Transcript>>,
    events: Option<mpsc::Sender<AnalystEvent>>,
}

impl EventRenderer {
    async fn emit(&self, event: AnalystEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}

#[async_trait]
impl TurnRenderer for EventRenderer {
    async fn render(&mut self, turn: &StreamingTurn) {
        self.transcript.lock().update_model(turn.id(), turn.buffer());
        if self.events.is_some() {
            self.emit(AnalystEvent::ModelTurnRendered {
                turn_id: turn.id(),
                text: turn.buffer().to_string(),
                html: render::render_html(turn.buffer()),
            })
            .await;
        }
    }

    async fn finalize(&mut self, turn: &StreamingTurn) {
        self.transcript
            .lock()
            .finish_model(turn.id(), turn.buffer(), TurnStatus::Complete);
        self.emit(AnalystEvent::ModelTurnCompleted {
            turn_id: turn.id(),
            copy_text: render::render_plain(turn.buffer()),
        })
        .await;
    }

    async fn interrupted(
        &mut self,
        turn: &StreamingTurn,
        error: &crate::error::StreamInterruptedError,
    ) {
        self.transcript
            .lock()
            .finish_model(turn.id(), turn.buffer(), TurnStatus::Incomplete);
        self.emit(AnalystEvent::ModelTurnInterrupted {
            turn_id: turn.id(),
            reason: error.reason.clone(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChunkSequence;
    use crate::error::ModelRequestError;
    use crate::transcript::Role;

    /// Backend that answers every message with the same fragments
    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        type Chat = ();

        fn name(&self) -> &str {
            "Echo"
        }

        async fn create_chat(&self, _model: &str) -> Result<(), ModelRequestError> {
            Ok(())
        }

        async fn send_message(
            &self,
            _chat: &(),
            _text: &str,
        ) -> Result<ChunkSequence, ModelRequestError> {
            Ok(ChunkSequence::from_fragments(["**Con", "clusão:** ok"]))
        }
    }

    fn analyst() -> (Analyst<EchoBackend>, mpsc::Receiver<AnalystEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let analyst = Analyst::new(
            Arc::new(EchoBackend),
            "echo",
            PromptComposer::default(),
            DocumentExtractor::default(),
        )
        .with_events(tx);
        (analyst, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<AnalystEvent>) -> Vec<AnalystEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_analyze_streams_and_completes() {
        let (analyst, mut rx) = analyst();

        let outcome = analyst.analyze("Caso X").await.unwrap();
        assert_eq!(outcome.summary.fragments, 2);
        assert_eq!(analyst.session_state().await, SessionState::Active);
        assert!(!analyst.is_busy());

        let transcript = analyst.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.turns()[0].role, Role::Model);
        assert_eq!(transcript.turns()[0].content, "**Conclusão:** ok");

        let events = drain(&mut rx);
        assert!(matches!(
            events.first(),
            Some(AnalystEvent::BusyChanged { busy: true })
        ));
        assert!(matches!(
            events.last(),
            Some(AnalystEvent::BusyChanged { busy: false })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            AnalystEvent::ModelTurnRendered { html, .. } if html == "<strong>Conclusão:</strong> ok"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            AnalystEvent::ModelTurnCompleted { copy_text, .. } if copy_text == "Conclusão: ok"
        )));
    }

    #[tokio::test]
    async fn test_copy_text_after_completion() {
        let (analyst, _rx) = analyst();
        assert_eq!(analyst.copy_text(None), None);

        let outcome = analyst.analyze("Caso X").await.unwrap();
        assert_eq!(
            analyst.copy_text(Some(outcome.turn_id)).as_deref(),
            Some("Conclusão: ok")
        );
        assert_eq!(analyst.copy_text(None).as_deref(), Some("Conclusão: ok"));
    }

    #[tokio::test]
    async fn test_blank_subject_rejected() {
        let (analyst, mut rx) = analyst();
        let err = analyst.analyze("  \n").await.unwrap_err();
        assert!(matches!(err, AnalystError::EmptySubject));
        assert_eq!(analyst.session_state().await, SessionState::Unstarted);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [AnalystEvent::Notice {
                level: NoticeLevel::Warning,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_rejection_notice_is_portuguese() {
        let (analyst, mut rx) = analyst();
        let err = analyst.follow_up("Reavalie", None).await.unwrap_err();
        assert!(matches!(err, AnalystError::NotStarted(_)));

        let events = drain(&mut rx);
        let [AnalystEvent::Notice { level, message }] = events.as_slice() else {
            panic!("expected one notice, got {events:?}");
        };
        assert_eq!(*level, NoticeLevel::Warning);
        assert_eq!(
            message,
            "Nenhuma análise em andamento. Faça a análise inicial antes de enviar mensagens."
        );
        assert!(analyst.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_follow_up_records_user_turn() {
        let (analyst, _rx) = analyst();
        analyst.analyze("Caso X").await.unwrap();
        analyst.follow_up("Elabore a minuta.", None).await.unwrap();

        let transcript = analyst.transcript();
        let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Model, Role::User, Role::Model]);
        assert_eq!(transcript.turns()[1].content, "Elabore a minuta.");
        assert!(transcript.turns()[1].attachment.is_none());
    }
}
