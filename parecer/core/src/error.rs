//! Error Taxonomy
//!
//! One error type per failure kind the analysis pipeline can hit. Every kind
//! is caught at the boundary of the operation that raised it and turned into
//! user-visible feedback by the [`Analyst`](crate::analyst::Analyst); none of
//! them is allowed to terminate the process.
//!
//! | Kind | Raised by | Recovery |
//! |------|-----------|----------|
//! | [`ExtractionError`] | document extractor | message in place of the text |
//! | [`SessionNotStartedError`] | follow-up without a session | run an initial analysis |
//! | [`ModelRequestError`] | dispatch to the model service | session kept, user retries |
//! | [`StreamInterruptedError`] | mid-stream failure | partial output kept, marked incomplete |

use std::path::PathBuf;

use thiserror::Error;

/// Failure turning a binary document into text
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document has no bytes at all
    #[error("document \"{file_name}\" is empty")]
    EmptyInput {
        /// Name of the offending file
        file_name: String,
    },

    /// The bytes are not a PDF
    #[error("document \"{file_name}\" is not a PDF file")]
    UnsupportedFormat {
        /// Name of the offending file
        file_name: String,
    },

    /// The document exceeds the configured size limit
    #[error("document \"{file_name}\" is {size} bytes, larger than the {limit}-byte limit")]
    TooLarge {
        /// Name of the offending file
        file_name: String,
        /// Payload size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// The PDF structure could not be decoded
    #[error("could not decode PDF: {0}")]
    Malformed(String),

    /// The PDF decoded but contains no pages
    #[error("PDF has no pages")]
    NoPages,

    /// A single page could not be read
    #[error("could not read page {page}: {reason}")]
    PageAccess {
        /// 1-based page number
        page: u32,
        /// Decoder-provided reason
        reason: String,
    },

    /// A page extraction task panicked or was cancelled
    #[error("page extraction task failed: {0}")]
    Task(String),

    /// The file could not be read from disk
    #[error("could not read {path}: {source}")]
    Read {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// A follow-up was attempted before any initial analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("no active session: run an initial analysis first")]
pub struct SessionNotStartedError;

/// Transport or remote-service failure while dispatching a request
#[derive(Debug, Error)]
pub enum ModelRequestError {
    /// The HTTP request could not be sent or its response not read
    #[error("request to model service failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("model service returned {status}: {body}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Response body (best effort)
        body: String,
    },

    /// The backend is not usable as configured (missing API key, bad URL)
    #[error("model backend misconfigured: {0}")]
    Configuration(String),

    /// Any other backend-specific failure
    #[error("{0}")]
    Other(String),
}

/// The fragment sequence failed after dispatch succeeded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response stream interrupted: {reason}")]
pub struct StreamInterruptedError {
    /// What went wrong
    pub reason: String,
}

impl StreamInterruptedError {
    /// Create a new interruption error
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Invalid input to the prompt composer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// A follow-up with neither instruction nor attachment
    #[error("enter a message or attach a file to continue")]
    EmptyFollowUp,

    /// The template does not have exactly one subject insertion point
    #[error("prompt template must contain the marker {marker} exactly once (found {found})")]
    TemplateMarker {
        /// The marker that was looked for
        marker: &'static str,
        /// How many times it was found
        found: usize,
    },
}

/// Errors from the conversation session
#[derive(Debug, Error)]
pub enum SessionError {
    /// `continue` called from `Unstarted`
    #[error(transparent)]
    NotStarted(#[from] SessionNotStartedError),

    /// `start` called while already `Active`
    #[error("session already started; send a follow-up instead")]
    AlreadyStarted,

    /// Dispatch to the model service failed
    #[error(transparent)]
    Request(#[from] ModelRequestError),
}

/// Errors surfaced by the [`Analyst`](crate::analyst::Analyst) operations
#[derive(Debug, Error)]
pub enum AnalystError {
    /// Document extraction failed
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Follow-up attempted without a session
    #[error(transparent)]
    NotStarted(#[from] SessionNotStartedError),

    /// Initial analysis requested on an active session
    #[error("an analysis is already in progress for this session; send a follow-up instead")]
    AlreadyStarted,

    /// Initial analysis requested with no subject text
    #[error("load a PDF or enter the text of the proceeding to analyze")]
    EmptySubject,

    /// Another request is still streaming
    #[error("a request is already in flight; wait for the current response to finish")]
    RequestInFlight,

    /// Invalid follow-up input
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Dispatch failed
    #[error(transparent)]
    ModelRequest(#[from] ModelRequestError),

    /// Response stream failed part-way
    #[error(transparent)]
    StreamInterrupted(#[from] StreamInterruptedError),
}

impl ExtractionError {
    /// Portuguese message for the person using the tool
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyInput { file_name } => format!("O arquivo \"{file_name}\" está vazio."),
            Self::UnsupportedFormat { file_name } => {
                format!("O arquivo \"{file_name}\" não é um PDF.")
            }
            Self::TooLarge {
                file_name, limit, ..
            } => format!(
                "O arquivo \"{file_name}\" excede o limite de {} MB.",
                limit / (1024 * 1024)
            ),
            Self::Malformed(reason) => format!("Não foi possível decodificar o PDF: {reason}"),
            Self::NoPages => "O PDF não contém páginas.".to_string(),
            Self::PageAccess { page, reason } => {
                format!("Não foi possível ler a página {page}: {reason}")
            }
            Self::Task(reason) => format!("Falha interna ao extrair o texto: {reason}"),
            Self::Read { path, source } => {
                format!("Não foi possível abrir {}: {source}", path.display())
            }
        }
    }
}

impl AnalystError {
    /// Portuguese message for notices and transcript error entries
    ///
    /// `Display` stays English for logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Extraction(e) => format!("Erro ao ler o PDF: {}", e.user_message()),
            Self::NotStarted(_) => {
                "Nenhuma análise em andamento. Faça a análise inicial antes de enviar mensagens."
                    .to_string()
            }
            Self::AlreadyStarted => {
                "Já existe uma análise nesta sessão. Envie uma mensagem de acompanhamento."
                    .to_string()
            }
            Self::EmptySubject => {
                "Carregue um PDF ou digite o texto do procedimento a ser analisado.".to_string()
            }
            Self::RequestInFlight => {
                "Aguarde a conclusão da resposta atual antes de enviar outra solicitação."
                    .to_string()
            }
            Self::Compose(ComposeError::EmptyFollowUp) => {
                "Digite uma mensagem ou anexe um arquivo para continuar.".to_string()
            }
            Self::Compose(ComposeError::TemplateMarker { marker, found }) => format!(
                "O modelo de prompt deve conter o marcador {marker} exatamente uma vez (encontrado {found})."
            ),
            Self::ModelRequest(ModelRequestError::Transport(e)) => {
                format!("Não foi possível contatar o serviço de IA: {e}")
            }
            Self::ModelRequest(ModelRequestError::Service { status, body }) => {
                format!("O serviço de IA respondeu com erro {status}: {body}")
            }
            Self::ModelRequest(ModelRequestError::Configuration(reason)) => {
                format!("Serviço de IA mal configurado: {reason}")
            }
            Self::ModelRequest(ModelRequestError::Other(reason)) => {
                format!("Falha na solicitação ao serviço de IA: {reason}")
            }
            Self::StreamInterrupted(e) => {
                format!("A resposta foi interrompida e está incompleta: {}", e.reason)
            }
        }
    }
}

impl From<SessionError> for AnalystError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotStarted(e) => Self::NotStarted(e),
            SessionError::AlreadyStarted => Self::AlreadyStarted,
            SessionError::Request(e) => Self::ModelRequest(e),
        }
    }
}
