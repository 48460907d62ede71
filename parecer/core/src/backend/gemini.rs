//! Gemini Backend Implementation
//!
//! Chat backend for Google's Gemini API.
//!
//! # Gemini API
//!
//! - `POST /v1beta/models/{model}:streamGenerateContent?alt=sse` streams a
//!   response as server-sent events, one `data: {json}` line per chunk,
//!   text at `candidates[0].content.parts[*].text`.
//!
//! The API itself is stateless: every request carries the whole
//! conversation in `contents`. [`GeminiChat`] keeps that history on the
//! client side and appends an exchange only once its response completed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::lines::LineBuffer;
use super::traits::{ChatBackend, ChunkSequence, StreamingToken};
use super::{ChatHistory, Exchange, Speaker};
use crate::error::ModelRequestError;

/// Default public endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini backend client
#[derive(Clone)]
pub struct GeminiBackend {
    /// API key, checked when a chat is created
    api_key: Option<String>,
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Conversation handle for [`GeminiBackend`]
#[derive(Clone, Debug)]
pub struct GeminiChat {
    model: String,
    history: ChatHistory,
}

impl GeminiChat {
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

impl GeminiBackend {
    /// Create a new Gemini backend
    ///
    /// # Errors
    ///
    /// Returns [`ModelRequestError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, ModelRequestError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Get the streaming endpoint URL for a model
    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            self.base_url
        )
    }
}

/// Build the request body: prior exchanges followed by the new user text
fn request_body(history: &[Exchange], text: &str) -> serde_json::Value {
    let mut contents: Vec<serde_json::Value> = history
        .iter()
        .map(|entry| {
            let role = match entry.speaker {
                Speaker::User => "user",
                Speaker::Model => "model",
            };
            serde_json::json!({ "role": role, "parts": [{ "text": entry.text }] })
        })
        .collect();
    contents.push(serde_json::json!({ "role": "user", "parts": [{ "text": text }] }));

    serde_json::json!({ "contents": contents })
}

/// Parse one SSE `data:` payload
///
/// Returns the chunk's text (possibly empty), or the service's error message.
fn parse_event(data: &str) -> Result<String, String> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| format!("invalid event payload: {e}"))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(message.to_string());
    }

    let text = value
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(text)
}

/// Extract the payload of an SSE `data:` line
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Send one SSE line's text to the consumer
///
/// Returns `false` once streaming must stop.
async fn forward_line(
    line: &str,
    tx: &mpsc::Sender<StreamingToken>,
    full_response: &mut String,
) -> bool {
    let Some(data) = sse_data(line) else {
        return true;
    };
    match parse_event(data) {
        Ok(fragment) if fragment.is_empty() => true,
        Ok(fragment) => {
            full_response.push_str(&fragment);
            // Receiver dropped, stop streaming
            tx.send(StreamingToken::Token(fragment)).await.is_ok()
        }
        Err(message) => {
            let _ = tx.send(StreamingToken::Error(message)).await;
            false
        }
    }
}

/// Read a `streamGenerateContent` body into `tx`
///
/// SSE has no done marker, so a clean end of body is completion and only
/// then is the exchange recorded in `history`.
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
            if !forward_line(&line, &tx, &mut full_response).await {
                return;
            }
        }
    }

    if let Some(line) = lines.finish() {
        if !forward_line(&line, &tx, &mut full_response).await {
            return;
        }
    }

    history.record_exchange(user_text, full_response.clone());
    let _ = tx
        .send(StreamingToken::Complete {
            message: full_response,
        })
        .await;
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    type Chat = GeminiChat;

    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn create_chat(&self, model: &str) -> Result<GeminiChat, ModelRequestError> {
        if self.api_key.is_none() {
            return Err(ModelRequestError::Configuration(
                "no API key: set GEMINI_API_KEY or model.api_key".to_string(),
            ));
        }
        if model.trim().is_empty() {
            return Err(ModelRequestError::Configuration(
                "model identifier is empty".to_string(),
            ));
        }

        tracing::debug!(model = %model, "Created Gemini chat");
        Ok(GeminiChat {
            model: model.to_string(),
            history: ChatHistory::default(),
        })
    }

    async fn send_message(
        &self,
        chat: &GeminiChat,
        text: &str,
    ) -> Result<ChunkSequence, ModelRequestError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ModelRequestError::Configuration("no API key configured".to_string())
        })?;

        let url = self.stream_url(&chat.model);
        let body = request_body(&chat.history.snapshot(), text);
        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
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

        tracing::debug!(
            model = %chat.model,
            history = chat.history.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Gemini stream opened"
        );

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

    fn backend(api_key: Option<&str>) -> GeminiBackend {
        GeminiBackend::new(
            api_key.map(str::to_string),
            "https://example.test/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_stream_url() {
        assert_eq!(
            backend(Some("k")).stream_url("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_request_body_carries_history() {
        let history = vec![
            Exchange {
                speaker: Speaker::User,
                text: "prompt inicial".to_string(),
            },
            Exchange {
                speaker: Speaker::Model,
                text: "Conclusão: Arquivamento".to_string(),
            },
        ];

        let body = request_body(&history, "Elabore a minuta.");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "Elabore a minuta.");
    }

    #[test]
    fn test_parse_event_text_parts() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Con"},{"text":"clu"}]}}]}"#;
        assert_eq!(parse_event(data).unwrap(), "Conclu");

        let data = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        assert_eq!(parse_event(data).unwrap(), "");
    }

    #[test]
    fn test_parse_event_error_payload() {
        let data = r#"{"error":{"code":429,"message":"Resource exhausted"}}"#;
        assert_eq!(parse_event(data).unwrap_err(), "Resource exhausted");
        assert!(parse_event("not json").is_err());
    }

    #[test]
    fn test_sse_data_prefix() {
        assert_eq!(sse_data("data: {}"), Some("{}"));
        assert_eq!(sse_data("data:{}"), Some("{}"));
        assert_eq!(sse_data(": keep-alive"), None);
        assert_eq!(sse_data(""), None);
    }

    fn event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
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
            "prompt inicial".to_string(),
        )
        .await;
        (chunks.collect().await, history)
    }

    #[tokio::test]
    async fn test_split_event_is_reassembled() {
        let first = event("Con").into_bytes();
        let second = event("clusão").into_bytes();
        // Break the second event inside its JSON payload
        let (head, tail) = second.split_at(20);
        let mut chunk = first;
        chunk.extend_from_slice(head);

        let (items, history) = forward(vec![Ok(chunk), Ok(tail.to_vec())]).await;
        assert_eq!(items, vec![Ok("Con".to_string()), Ok("clusão".to_string())]);

        let entries = history.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "prompt inicial");
        assert_eq!(entries[1].text, "Conclusão");
    }

    #[tokio::test]
    async fn test_last_event_without_newline() {
        let body = vec![
            Ok(event("Relatório ").into_bytes()),
            Ok(event("final").trim_end().as_bytes().to_vec()),
        ];

        let (items, history) = forward(body).await;
        assert_eq!(
            items,
            vec![Ok("Relatório ".to_string()), Ok("final".to_string())]
        );
        assert_eq!(history.snapshot()[1].text, "Relatório final");
    }

    #[tokio::test]
    async fn test_error_event_leaves_history_unchanged() {
        let body = [
            event("Con"),
            "data: {\"error\":{\"code\":429,\"message\":\"Resource exhausted\"}}\n\n".to_string(),
            event("clusão"),
        ]
        .concat();

        let (items, history) = forward(vec![Ok(body.into_bytes())]).await;
        assert_eq!(
            items,
            vec![
                Ok("Con".to_string()),
                Err(StreamInterruptedError::new("Resource exhausted")),
            ]
        );
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_leaves_history_unchanged() {
        let body = vec![
            Ok(event("Con").into_bytes()),
            Err("connection reset".to_string()),
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
    async fn test_create_chat_requires_api_key() {
        let err = backend(None).create_chat("gemini-2.5-flash").await.unwrap_err();
        assert!(matches!(err, ModelRequestError::Configuration(_)));

        let err = backend(Some("  ")).create_chat("gemini-2.5-flash").await.unwrap_err();
        assert!(matches!(err, ModelRequestError::Configuration(_)));

        let chat = backend(Some("k")).create_chat("gemini-2.5-flash").await.unwrap();
        assert_eq!(chat.model(), "gemini-2.5-flash");
        assert!(chat.history().is_empty());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", backend(Some("secret-key")));
        assert!(!debug.contains("secret-key"));
    }
}
