//! Prompt Composer
//!
//! Builds the exact outgoing message text for each request:
//!
//! - **Initial**: the subject text placed at the template's single
//!   insertion point, content untouched.
//! - **Follow-up**: the user's instruction as typed, or, when a document is
//!   attached, an introduction naming the file, the extracted text in a
//!   fenced block, and the instruction (or [`DEFAULT_FOLLOW_UP_INSTRUCTION`]
//!   when the user left it blank).

use crate::document::ExtractedText;
use crate::error::ComposeError;

/// Insertion point for the subject text inside a template
pub const SUBJECT_MARKER: &str = "{{PROCEDIMENTO}}";

/// Instruction used when a document is attached without a message
pub const DEFAULT_FOLLOW_UP_INSTRUCTION: &str = "Analise o documento anexo.";

/// Built-in legal analysis template
pub const DEFAULT_TEMPLATE: &str = include_str!("../prompts/analise_inquerito.md");

/// Which kind of request a message is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// First request of a session (template + subject)
    Initial,
    /// Any later request
    FollowUp,
}

/// A composed message ready for dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    kind: MessageKind,
    text: String,
}

impl OutgoingMessage {
    /// Kind of request
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Full message text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A document attached to a follow-up, already extracted
#[derive(Clone, Debug)]
pub struct Attachment {
    /// File name shown to the model
    pub file_name: String,
    /// Extracted text, inlined verbatim
    pub text: ExtractedText,
}

impl Attachment {
    /// Create an attachment
    pub fn new(file_name: impl Into<String>, text: ExtractedText) -> Self {
        Self {
            file_name: file_name.into(),
            text,
        }
    }
}

/// Composes outgoing messages from a template
#[derive(Clone, Debug)]
pub struct PromptComposer {
    head: String,
    tail: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        // DEFAULT_TEMPLATE is checked by test_default_template_has_one_marker
        let (head, tail) = DEFAULT_TEMPLATE
            .split_once(SUBJECT_MARKER)
            .unwrap_or((DEFAULT_TEMPLATE, ""));
        Self {
            head: head.to_string(),
            tail: tail.to_string(),
        }
    }
}

impl PromptComposer {
    /// Create a composer from a custom template
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::TemplateMarker`] unless the template contains
    /// [`SUBJECT_MARKER`] exactly once.
    pub fn new(template: &str) -> Result<Self, ComposeError> {
        let found = template.matches(SUBJECT_MARKER).count();
        match template.split_once(SUBJECT_MARKER) {
            Some((head, tail)) if found == 1 => Ok(Self {
                head: head.to_string(),
                tail: tail.to_string(),
            }),
            _ => Err(ComposeError::TemplateMarker {
                marker: SUBJECT_MARKER,
                found,
            }),
        }
    }

    /// Compose the initial analysis request
    #[must_use]
    pub fn initial(&self, subject: &str) -> OutgoingMessage {
        let mut text = String::with_capacity(self.head.len() + subject.len() + self.tail.len());
        text.push_str(&self.head);
        text.push_str(subject);
        text.push_str(&self.tail);
        OutgoingMessage {
            kind: MessageKind::Initial,
            text,
        }
    }

    /// Compose a follow-up request
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::EmptyFollowUp`] when the instruction is blank
    /// and nothing is attached.
    pub fn follow_up(
        &self,
        instruction: &str,
        attachment: Option<&Attachment>,
    ) -> Result<OutgoingMessage, ComposeError> {
        let instruction = instruction.trim();

        let text = match attachment {
            None if instruction.is_empty() => return Err(ComposeError::EmptyFollowUp),
            None => instruction.to_string(),
            Some(attachment) => {
                let request = if instruction.is_empty() {
                    DEFAULT_FOLLOW_UP_INSTRUCTION
                } else {
                    instruction
                };
                format!(
                    "Considere o seguinte anexo \"{name}\":\n\n```\n{body}\n```\n\n\
                     Com base no anexo e no histórico anterior, responda à seguinte solicitação:\n\n\
                     {request}",
                    name = attachment.file_name,
                    body = attachment.text.as_str(),
                )
            }
        };

        Ok(OutgoingMessage {
            kind: MessageKind::FollowUp,
            text,
        })
    }
}
