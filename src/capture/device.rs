//! Microphone access via `cpal`, behind the [`CaptureBackend`] seam.
//!
//! [`CpalBackend`] is the production backend.  Opening it builds and starts a
//! cpal input stream that forwards [`AudioChunk`]s over an mpsc channel; the
//! returned [`CaptureStream`] box is a RAII guard — dropping it stops the
//! hardware stream and releases the device.  The recorder state machine in
//! [`crate::capture::recorder`] is written against the trait so it can be
//! exercised with a fake backend and no audio hardware.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the capture callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]` at the device's
/// native rate.  The recorder converts to 16 kHz mono when the recording
/// stops.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or running the microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// CaptureBackend / CaptureStream
// ---------------------------------------------------------------------------

/// Seam between the recorder state machine and the audio hardware.
///
/// `open` acquires the device and starts delivering [`AudioChunk`]s on `tx`.
/// The microphone is held exactly as long as the returned guard is alive.
pub trait CaptureBackend {
    fn open(&self, tx: mpsc::Sender<AudioChunk>) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// Live capture stream guard.  Dropping the value stops the stream and
/// releases the device.
///
/// Not `Send`: `cpal::Stream` is not `Send` on all platforms, so recording
/// stays on the thread that started it (the UI thread).
pub trait CaptureStream {}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// Production capture backend using the system default input device.
///
/// The device and its preferred stream configuration are queried on every
/// `open` call, so a microphone plugged in after startup is picked up on the
/// next recording attempt.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

struct CpalStream {
    _stream: cpal::Stream,
}

impl CaptureStream for CpalStream {}

impl CaptureBackend for CpalBackend {
    fn open(&self, tx: mpsc::Sender<AudioChunk>) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;

        log::info!("capture: stream opened ({sample_rate} Hz, {channels} ch)");
        Ok(Box::new(CpalStream { _stream: stream }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
