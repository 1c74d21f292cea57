//! Voice transcription — the two paths a recorded clip can take.
//!
//! # Architecture
//!
//! ```text
//!                      ┌────────────────────────────┐
//!        AudioClip ───▶│  TranscriptionBridge       │   local path
//!                      │  initialize / transcribe   │
//!                      │   │ requests    ▲ events   │
//!                      │   ▼             │          │
//!                      │  inference worker thread   │
//!                      │  (whisper + model download)│
//!                      └────────────────────────────┘
//!        AudioClip ───▶ RemoteTranscriber ──▶ POST /api/transcribe-audio
//! ```
//!
//! The bridge (and its [`protocol`]) is the interesting part: single-flight
//! initialization, id-correlated replies, and crash recovery are all
//! specified there.  The remote path is a plain HTTP upload.

pub mod bridge;
pub mod protocol;
pub mod remote;
pub mod worker;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use bridge::{BridgeError, TranscriptionBridge};
pub use protocol::{LoadStatus, WorkerEvent, WorkerRequest};
pub use remote::{RemoteError, RemoteTranscriber};
pub use worker::{EngineLoader, WhisperWorkerFactory, WorkerFactory, WorkerHandle};
