//! Chat session — transcript ownership and the backend round trip.
//!
//! [`ChatSession`] owns the append-only [`Transcript`], the lazily created
//! session identifier, and the opaque context map the backend round-trips
//! to keep conversation continuity.  The wire is behind the [`ChatBackend`]
//! trait so the session logic is tested against a mock; [`ApiChatBackend`]
//! is the production client.
//!
//! Failure policy: nothing here throws at the caller.  Transport errors and
//! non-2xx responses become synthetic bot messages flagged as errors, and
//! the user simply tries again.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::chat::message::{Message, QuickReply, Transcript};
use crate::config::ChatConfig;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Body of `POST /api/v2/chat/message`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub context: serde_json::Map<String, serde_json::Value>,
    /// RFC 3339 send time.
    pub timestamp: String,
}

/// Successful response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default, rename = "quickReplies")]
    pub quick_replies: Vec<QuickReply>,
}

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Errors from the chat backend client.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP transport or connection error.
    #[error("chat request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("chat request timed out")]
    Timeout,

    /// Non-2xx response; `message` is the server's error text when the body
    /// was parseable.
    #[error("chat endpoint returned HTTP {code}")]
    Status { code: u16, message: Option<String> },

    /// A 2xx response whose body was not the expected JSON.
    #[error("failed to parse chat response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout
        } else {
            ChatError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatBackend trait
// ---------------------------------------------------------------------------

/// Async interface to the assistant backend.
///
/// Implementors must be `Send + Sync` so the session task can hold one
/// behind `Arc<dyn ChatBackend>`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError>;
}

// ---------------------------------------------------------------------------
// ApiChatBackend
// ---------------------------------------------------------------------------

/// Production backend client for `{base_url}/api/v2/chat/message`.
pub struct ApiChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ApiChatBackend {
    /// Build a client from the chat config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is the last-resort fallback
    /// if the builder fails (should never happen in practice).
    pub fn from_config(config: &ChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for ApiChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let url = format!("{}/api/v2/chat/message", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            // Best-effort: surface the server's own error text when the
            // body is JSON with a `message` field.
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string));
            return Err(ChatError::Status {
                code: status.as_u16(),
                message,
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

/// Fallback bot text when the backend answered with an error status but no
/// usable message.
const ERROR_FALLBACK: &str = "Sorry, I encountered an error. Please try again.";
/// Fallback bot text for transport-level failures.
const CONNECTION_FALLBACK: &str =
    "I'm having trouble connecting. Please check your internet connection and try again.";

fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}

/// One conversation with the assistant.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    transcript: Transcript,
    /// Stored only after the first successful send, then reused.
    session_id: Option<String>,
    /// Opaque state blob round-tripped with the backend.
    context: serde_json::Map<String, serde_json::Value>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            transcript: Transcript::new(),
            session_id: None,
            context: serde_json::Map::new(),
        }
    }

    /// The full conversation so far, in send/receive order.
    pub fn transcript(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// The session identifier, once a send has succeeded.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Append the user's message to the transcript.
    ///
    /// Returns `None` for empty or whitespace-only input — nothing is
    /// appended and no request may be made for it.
    pub fn push_user_message(&mut self, text: &str) -> Option<Message> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(self.transcript.push(Message::user(trimmed)).clone())
    }

    /// Round-trip `text` through the backend and append the reply.
    ///
    /// A session id candidate is generated per attempt until one send
    /// succeeds; only then is it stored and reused, so a failed first send
    /// leaves the session id unset.  Always appends and returns exactly one
    /// bot message — an error notice when the backend misbehaved.
    pub async fn request_reply(&mut self, text: &str) -> Message {
        let candidate = self.session_id.clone().unwrap_or_else(new_session_id);
        let request = ChatRequest {
            message: text.to_string(),
            session_id: candidate.clone(),
            context: self.context.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };

        let bot = match self.backend.send(&request).await {
            Ok(response) => {
                self.session_id = Some(candidate);
                self.context = response.context;

                let mut message = Message::bot(response.message);
                message.intent = response.intent;
                message.quick_replies = response.quick_replies;
                // The basic API reports neither confidence nor sentiment;
                // the debug projection shows these placeholder values.
                message.confidence = Some(0.8);
                message.sentiment = Some("neutral".into());
                message
            }
            Err(ChatError::Status { code, message }) => {
                log::warn!("session: chat endpoint returned HTTP {code}");
                Message::bot_error(message.unwrap_or_else(|| ERROR_FALLBACK.to_string()))
            }
            Err(e) => {
                log::warn!("session: chat request failed: {e}");
                Message::bot_error(CONNECTION_FALLBACK)
            }
        };

        self.transcript.push(bot).clone()
    }

    /// Send `text` as the user: append it, get a reply, return both in
    /// order.  Empty input is a no-op returning an empty vec.
    pub async fn send_message(&mut self, text: &str) -> Vec<Message> {
        let Some(user) = self.push_user_message(text) else {
            return Vec::new();
        };
        let bot = self.request_reply(&user.text).await;
        vec![user, bot]
    }

    /// Selecting a quick reply is the same as typing and sending its text.
    pub async fn send_quick_reply(&mut self, reply: &QuickReply) -> Vec<Message> {
        self.send_message(&reply.text).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
