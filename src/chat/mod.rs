//! Chat session — transcript, wire client, and session/context handling.

pub mod message;
pub mod session;

pub use message::{Message, QuickReply, Sender, Transcript};
pub use session::{ApiChatBackend, ChatBackend, ChatError, ChatRequest, ChatResponse, ChatSession};
