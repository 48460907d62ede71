//! Ollama Backend Implementation
//!
//! Chat backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! - `/api/chat` - Chat completions with message history, streamed as
//!   newline-delimited JSON (`message.content` fragments, `done` flag)
//! - `/api/tags` - List available models
//!
//! Like the Gemini backend, history lives in the chat handle and an exchange
//! is recorded only once `done` arrives.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::lines::LineBuffer;
use super::traits::{ChatBackend, ChunkSequence, StreamingToken};
use super::{ChatHistory, Exchange, Speaker};
use crate::error::ModelRequestError;

/// Ollama backend client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// HTTP client
    http_client: reqwest::Client,
}

/// Conversation handle for [`OllamaBackend`]
#[derive(Clone, Debug)]
pub struct OllamaChat {
    model: String,
    history: ChatHistory,
}

impl OllamaChat {
    /// Model this chat talks to
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Completed exchanges so far
    #[must_use]
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }
}

/// One parsed NDJSON line from `/api/chat`
#[derive(Debug, PartialEq, Eq)]
enum ChatLine {
    Fragment { content: String, done: bool },
    Failed(String),
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Errors
    ///
    /// Returns [`ModelRequestError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, ModelRequestError> {
        Ok(Self {
            host: host.into(),
            port,
            http_client: reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()?,
        })
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    /// Check if the server is reachable
    pub async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }
}

/// Build the request body: prior exchanges followed by the new user text
fn request_body(model: &str, history: &[Exchange], text: &str) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = history
        .iter()
        .map(|entry| {
            let role = match entry.speaker {
                Speaker::User => "user",
                Speaker::Model => "assistant",
            };
            serde_json::json!({ "role": role, "content": entry.text })
        })
        .collect();
    messages.push(serde_json::json!({ "role": "user", "content": text }));

    serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": true,
    })
}

fn parse_line(line: &str) -> Option<ChatLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let data: serde_json::Value = match serde_json::from_str(line) {
        Ok(data) => data,
        Err(e) => return Some(ChatLine::Failed(format!("invalid stream line: {e}"))),
    };

    if let Some(error) = data.get("error").and_then(|e| e.as_str()) {
        return Some(ChatLine::Failed(error.to_string()));
    }

    let content = data
        .pointer("/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();
    let done = data
        .get("done")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    Some(ChatLine::Fragment { content, done })
}

/// What the body reader does after one line
#[derive(Debug, PartialEq, Eq)]
enum Step {
    More,
    Done,
    Stop,
}

/// Send one NDJSON line's fragment to the consumer
async fn forward_line(
    line: &str,
    tx: &mpsc::Sender<StreamingToken>,
    full_response: &mut String,
) -> Step {
    match parse_line(line) {
        None => Step::More,
        Some(ChatLine::Failed(message)) => {
            let _ = tx.send(StreamingToken::Error(message)).await;
            Step::Stop
        }
        Some(ChatLine::Fragment { content, done }) => {
            if !content.is_empty() {
                full_response.push_str(&content);
                if tx.send(StreamingToken::Token(content)).await.is_err() {
                    // Receiver dropped, stop streaming
                    return Step::Stop;
                }
            }
            if done {
                Step::Done
            } else {
                Step::More
            }
        }
    }
}

/// Read a `/api/chat` body into `tx`
///
/// The exchange reaches `history` only once a `done` line arrives. A body
/// that ends without one, a body read error, and an error line all end the
/// sequence with [`StreamingToken::Error`].
async fn forward_body<S, B, E>(
    body: S,
    tx: mpsc::Sender<StreamingToken>,
    history: ChatHistory,
    user_text: String,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut lines = LineBuffer::default();
    let mut full_response = String::new();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => lines.push(bytes.as_ref()),
            Err(e) => {
                let _ = tx.send(StreamingToken::Error(e.to_string())).await;
                return;
            }
        }

        while let Some(line) = lines.next_line() {
            match forward_line(&line, &tx, &mut full_response).await {
                Step::More => {}
                Step::Done => return complete(&tx, &history, user_text, full_response).await,
                Step::Stop => return,
            }
        }
    }

    // The final line may arrive without its newline
    if let Some(line) = lines.finish() {
        match forward_line(&line, &tx, &mut full_response).await {
            Step::More => {}
            Step::Done => return complete(&tx, &history, user_text, full_response).await,
            Step::Stop => return,
        }
    }

    let _ = tx
        .send(StreamingToken::Error(
            "Ollama closed the stream before done".to_string(),
        ))
        .await;
}

async fn complete(
    tx: &mpsc::Sender<StreamingToken>,
    history: &ChatHistory,
    user_text: String,
    full_response: String,
) {
    history.record_exchange(user_text, full_response.clone());
    let _ = tx
        .send(StreamingToken::Complete {
            message: full_response,
        })
        .await;
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    type Chat = OllamaChat;

    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn create_chat(&self, model: &str) -> Result<OllamaChat, ModelRequestError> {
        if model.trim().is_empty() {
            return Err(ModelRequestError::Configuration(
                "model identifier is empty".to_string(),
            ));
        }

        tracing::debug!(model = %model, url = %self.base_url(), "Created Ollama chat");
        Ok(OllamaChat {
            model: model.to_string(),
            history: ChatHistory::default(),
        })
    }

    async fn send_message(
        &self,
        chat: &OllamaChat,
        text: &str,
    ) -> Result<ChunkSequence, ModelRequestError> {
        let body = request_body(&chat.model, &chat.history.snapshot(), text);

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelRequestError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, chunks) = ChunkSequence::channel();
        tokio::spawn(forward_body(
            response.bytes_stream(),
            tx,
            chat.history.clone(),
            text.to_string(),
        ));

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamInterruptedError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("localhost", 11434, Duration::from_secs(5)).unwrap();
        assert_eq!(backend.host, "localhost");
        assert_eq!(backend.port, 11434);
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_request_body_roles() {
        let history = vec![
            Exchange {
                speaker: Speaker::User,
                text: "Olá".to_string(),
            },
            Exchange {
                speaker: Speaker::Model,
                text: "Olá!".to_string(),
            },
        ];
        let body = request_body("llama3", &history, "Continue");

        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], true);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "Continue");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   "), None);
        assert_eq!(
            parse_line(r#"{"message":{"role":"assistant","content":"Con"},"done":false}"#),
            Some(ChatLine::Fragment {
                content: "Con".to_string(),
                done: false
            })
        );
        assert_eq!(
            parse_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#),
            Some(ChatLine::Fragment {
                content: String::new(),
                done: true
            })
        );
        assert_eq!(
            parse_line(r#"{"error":"model not found"}"#),
            Some(ChatLine::Failed("model not found".to_string()))
        );
        assert!(matches!(parse_line("{broken"), Some(ChatLine::Failed(_))));
    }

    fn chat_line(content: &str, done: bool) -> String {
        format!(
            "{}\n",
            serde_json::json!({
                "message": { "role": "assistant", "content": content },
                "done": done,
            })
        )
    }

    /// Feed a scripted body through `forward_body`
    async fn forward(
        body: Vec<Result<Vec<u8>, String>>,
    ) -> (Vec<Result<String, StreamInterruptedError>>, ChatHistory) {
        let history = ChatHistory::default();
        let (tx, chunks) = ChunkSequence::channel();
        forward_body(
            futures::stream::iter(body),
            tx,
            history.clone(),
            "pergunta".to_string(),
        )
        .await;
        (chunks.collect().await, history)
    }

    #[tokio::test]
    async fn test_body_completes_and_records_history() {
        let body = [
            chat_line("Con", false),
            chat_line("clusão", false),
            chat_line("", true),
        ]
        .concat()
        .into_bytes();
        // Split inside the second line
        let (head, tail) = body.split_at(body.len() / 2);

        let (items, history) = forward(vec![Ok(head.to_vec()), Ok(tail.to_vec())]).await;
        assert_eq!(items, vec![Ok("Con".to_string()), Ok("clusão".to_string())]);

        let entries = history.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "pergunta");
        assert_eq!(entries[1].text, "Conclusão");
    }

    #[tokio::test]
    async fn test_final_done_line_without_newline() {
        let last = chat_line("", true);
        let body = vec![
            Ok(chat_line("Arquivamento", false).into_bytes()),
            Ok(last.trim_end().as_bytes().to_vec()),
        ];

        let (items, history) = forward(body).await;
        assert_eq!(items, vec![Ok("Arquivamento".to_string())]);
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_body_ends_before_done() {
        let (items, history) = forward(vec![Ok(chat_line("Con", false).into_bytes())]).await;
        assert_eq!(
            items,
            vec![
                Ok("Con".to_string()),
                Err(StreamInterruptedError::new(
                    "Ollama closed the stream before done"
                )),
            ]
        );
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_mid_body() {
        let body = vec![
            Ok(chat_line("Con", false).into_bytes()),
            Err("connection reset".to_string()),
            Ok(chat_line("", true).into_bytes()),
        ];

        let (items, history) = forward(body).await;
        assert_eq!(
            items,
            vec![
                Ok("Con".to_string()),
                Err(StreamInterruptedError::new("connection reset")),
            ]
        );
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_error_line_mid_body() {
        let body = [
            chat_line("Con", false),
            "{\"error\":\"model crashed\"}\n".to_string(),
            chat_line("", true),
        ]
        .concat();

        let (items, history) = forward(vec![Ok(body.into_bytes())]).await;
        assert_eq!(
            items,
            vec![
                Ok("Con".to_string()),
                Err(StreamInterruptedError::new("model crashed")),
            ]
        );
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_create_chat_rejects_empty_model() {
        let backend = OllamaBackend::new("localhost", 11434, Duration::from_secs(5)).unwrap();
        assert!(backend.create_chat(" ").await.is_err());
        let chat = backend.create_chat("llama3").await.unwrap();
        assert_eq!(chat.model(), "llama3");
    }
}
