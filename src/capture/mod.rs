//! Voice capture — microphone acquisition, recording lifecycle, clip encoding.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → VoiceRecorder
//!           → downmix_to_mono → resample → AudioClip (16 kHz mono)
//! ```
//!
//! The recorder is a plain state machine over the [`CaptureBackend`] seam;
//! everything hardware-specific lives in [`device`].

pub mod clip;
pub mod device;
pub mod recorder;
pub mod resample;

pub use clip::AudioClip;
pub use device::{AudioChunk, CaptureBackend, CaptureError, CaptureStream, CpalBackend};
pub use recorder::{RecorderError, RecorderState, VoiceRecorder};
pub use resample::{downmix_to_mono, resample};
