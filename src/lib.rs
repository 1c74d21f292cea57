//! Auto-assist — a desktop chat widget for an automotive-service assistant
//! with optional voice input.
//!
//! # Components
//!
//! * [`chat`] — append-only transcript, chat backend client, session /
//!   context handling.
//! * [`capture`] — microphone recording state machine producing 16 kHz mono
//!   [`capture::AudioClip`]s.
//! * [`transcribe`] — the two transcription paths: an async bridge to a
//!   worker thread hosting a whisper model, and a remote HTTP upload.
//! * [`stt`] — the whisper engine and model registry the worker hosts.
//! * [`app`] — the egui widget tying it all together.
//! * [`config`] — TOML settings and platform paths.

pub mod app;
pub mod capture;
pub mod chat;
pub mod config;
pub mod stt;
pub mod transcribe;
