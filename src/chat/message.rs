//! Chat message data model and the append-only transcript.

use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

// ---------------------------------------------------------------------------
// QuickReply
// ---------------------------------------------------------------------------

/// A backend-suggested canned response, rendered as a clickable button.
///
/// Selecting one is equivalent to the user typing and sending its text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuickReply {
    pub text: String,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One entry in the conversation transcript.
///
/// Messages are immutable once appended.  The intent / confidence /
/// sentiment / entities fields are a display-only projection the widget can
/// show under bot messages when debug info is enabled; they carry no
/// functional weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub intent: Option<String>,
    pub confidence: Option<f32>,
    pub sentiment: Option<String>,
    pub entities: serde_json::Map<String, serde_json::Value>,
    pub quick_replies: Vec<QuickReply>,
    /// Marks a synthetic failure notice (network trouble, backend error).
    pub is_error: bool,
}

impl Message {
    fn base(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            intent: None,
            confidence: None,
            sentiment: None,
            entities: serde_json::Map::new(),
            quick_replies: Vec::new(),
            is_error: false,
        }
    }

    /// A message typed (or dictated) by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::base(text, Sender::User)
    }

    /// A regular assistant reply.
    pub fn bot(text: impl Into<String>) -> Self {
        Self::base(text, Sender::Bot)
    }

    /// A synthetic assistant message that reports a failure inline instead
    /// of throwing at the caller.
    pub fn bot_error(text: impl Into<String>) -> Self {
        let mut message = Self::base(text, Sender::Bot);
        message.is_error = true;
        message
    }

    /// `HH:MM` in the user's local timezone, for the bubble footer.
    pub fn timestamp_label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Append-only message sequence for the session lifetime.
///
/// The only mutation is [`push`](Transcript::push); reads hand out shared
/// slices, so ordering always matches send/receive order.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a reference to it.
    pub fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        self.messages.last().expect("just pushed")
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
