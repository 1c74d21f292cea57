//! Voice recorder state machine.
//!
//! [`VoiceRecorder`] drives the capture lifecycle the widget renders:
//!
//! ```text
//! Idle ──start()──▶ Recording ──stop()──▶ Transcribing ──finish()──▶ Idle
//!                       │                      │
//!                    cancel()               fail(msg)
//!                       │                      │
//!                       ▼                      ▼
//!                     Idle                   Error ──acknowledge()──▶ Idle
//! ```
//!
//! Exactly one recording can be active at a time.  The microphone is held via
//! the [`CaptureStream`] guard inside the active recording; `stop` and
//! `cancel` drop the guard *before* doing anything else, so the device is
//! released deterministically on every exit path — including a too-short
//! clip, a transcription failure, or an error acknowledgment.

use std::sync::mpsc;
use std::time::Instant;

use thiserror::Error;

use crate::capture::clip::AudioClip;
use crate::capture::device::{AudioChunk, CaptureBackend, CaptureError, CaptureStream};
use crate::capture::resample::{downmix_to_mono, resample};
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// RecorderState
// ---------------------------------------------------------------------------

/// States of the voice capture component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// No recording active; ready to start.
    Idle,
    /// Microphone is open and samples are being accumulated.
    Recording,
    /// A clip has been produced and handed to a transcription path.
    Transcribing,
    /// Something failed; shown inline until the user acknowledges.
    Error,
}

impl RecorderState {
    /// A short human-readable label suitable for the recorder panel.
    pub fn label(&self) -> &'static str {
        match self {
            RecorderState::Idle => "Ready",
            RecorderState::Recording => "Recording",
            RecorderState::Transcribing => "Transcribing",
            RecorderState::Error => "Error",
        }
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        RecorderState::Idle
    }
}

// ---------------------------------------------------------------------------
// RecorderError
// ---------------------------------------------------------------------------

/// Errors surfaced by the recorder state machine.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// `start` was called while a recording or transcription is active.
    #[error("a recording is already in progress")]
    AlreadyActive,

    /// `stop` was called with no active recording.
    #[error("no recording to stop")]
    NotRecording,

    /// The microphone could not be acquired or streamed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The recording was shorter than the configured minimum.
    #[error("recording too short — hold the button for at least {min_secs:.1} s")]
    ClipTooShort { min_secs: f32 },
}

// ---------------------------------------------------------------------------
// VoiceRecorder
// ---------------------------------------------------------------------------

struct ActiveRecording {
    /// RAII guard; dropping it releases the microphone.
    stream: Box<dyn CaptureStream>,
    /// Receives chunks from the capture callback.
    rx: mpsc::Receiver<AudioChunk>,
    started: Instant,
}

/// Owns the capture backend and the recording lifecycle.
///
/// Lives on the UI thread (the capture guard is not `Send`); transcription of
/// the produced [`AudioClip`] happens elsewhere.
pub struct VoiceRecorder {
    backend: Box<dyn CaptureBackend>,
    config: AudioConfig,
    state: RecorderState,
    error_message: Option<String>,
    active: Option<ActiveRecording>,
}

impl VoiceRecorder {
    pub fn new(backend: Box<dyn CaptureBackend>, config: AudioConfig) -> Self {
        Self {
            backend,
            config,
            state: RecorderState::Idle,
            error_message: None,
            active: None,
        }
    }

    /// Current state, for rendering.
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Error message to display while in [`RecorderState::Error`].
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Seconds elapsed since the active recording started, or `0.0`.
    pub fn elapsed_secs(&self) -> f32 {
        self.active
            .as_ref()
            .map(|a| a.started.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    /// Open the microphone and begin accumulating samples.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::AlreadyActive`] when not idle (state unchanged).
    /// - [`RecorderError::Capture`] when the device cannot be acquired —
    ///   permission denial included.  The recorder enters `Error` with the
    ///   message displayed inline; no device is held.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::AlreadyActive);
        }

        let (tx, rx) = mpsc::channel::<AudioChunk>();
        match self.backend.open(tx) {
            Ok(stream) => {
                log::debug!("recorder: Idle → Recording");
                self.active = Some(ActiveRecording {
                    stream,
                    rx,
                    started: Instant::now(),
                });
                self.state = RecorderState::Recording;
                self.error_message = None;
                Ok(())
            }
            Err(e) => {
                log::warn!("recorder: failed to open microphone: {e}");
                self.state = RecorderState::Error;
                self.error_message = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Stop recording, release the device, and produce a 16 kHz mono clip.
    ///
    /// The stream guard is dropped before the accumulated audio is inspected,
    /// so the microphone is released even when this returns an error.
    /// Recordings longer than `max_recording_secs` are truncated to the
    /// leading samples.
    ///
    /// On success the state is `Transcribing`; the caller reports the outcome
    /// via [`finish`](Self::finish) or [`fail`](Self::fail).
    pub fn stop(&mut self) -> Result<AudioClip, RecorderError> {
        let active = self.active.take().ok_or(RecorderError::NotRecording)?;

        // Release the microphone first.  The callback's sender is dropped
        // with the stream, which terminates the drain loop below.
        drop(active.stream);

        let mut samples = Vec::new();
        let mut source_rate = 0u32;
        let mut channels = 0u16;

        while let Ok(chunk) = active.rx.recv() {
            if source_rate == 0 {
                source_rate = chunk.sample_rate;
                channels = chunk.channels;
            }
            samples.extend_from_slice(&chunk.samples);
        }

        let mono = downmix_to_mono(&samples, channels);
        let mut pcm = resample(&mono, source_rate.max(1), self.config.sample_rate);

        let max_samples =
            (self.config.max_recording_secs * self.config.sample_rate as f32) as usize;
        if pcm.len() > max_samples {
            log::debug!(
                "recorder: truncating clip from {} to {} samples",
                pcm.len(),
                max_samples
            );
            pcm.truncate(max_samples);
        }

        let min_samples =
            (self.config.min_recording_secs * self.config.sample_rate as f32) as usize;
        if pcm.len() < min_samples {
            let err = RecorderError::ClipTooShort {
                min_secs: self.config.min_recording_secs,
            };
            log::warn!("recorder: {err}");
            self.state = RecorderState::Error;
            self.error_message = Some(err.to_string());
            return Err(err);
        }

        log::debug!(
            "recorder: Recording → Transcribing ({:.1} s clip)",
            pcm.len() as f32 / self.config.sample_rate as f32
        );
        self.state = RecorderState::Transcribing;
        Ok(AudioClip::new(pcm, self.config.sample_rate))
    }

    /// Abort the active recording, discarding any captured audio.
    ///
    /// Releases the device and returns to `Idle`.  A no-op when idle.
    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            log::debug!("recorder: recording cancelled");
        }
        self.state = RecorderState::Idle;
        self.error_message = None;
    }

    /// The dispatched transcription completed — back to `Idle`.
    pub fn finish(&mut self) {
        self.state = RecorderState::Idle;
    }

    /// The dispatched transcription failed — enter `Error` with `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = RecorderState::Error;
        self.error_message = Some(message.into());
    }

    /// Acknowledge a displayed error and return to `Idle`.
    pub fn acknowledge(&mut self) {
        self.state = RecorderState::Idle;
        self.error_message = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Capture backend that records whether its stream guard was dropped and
    /// feeds a fixed set of chunks into the channel on open.
    struct FakeBackend {
        released: Arc<AtomicBool>,
        chunks: Vec<AudioChunk>,
        fail_open: bool,
    }

    struct FakeStream {
        released: Arc<AtomicBool>,
    }

    impl CaptureStream for FakeStream {}

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl CaptureBackend for FakeBackend {
        fn open(
            &self,
            tx: mpsc::Sender<AudioChunk>,
        ) -> Result<Box<dyn CaptureStream>, CaptureError> {
            if self.fail_open {
                return Err(CaptureError::NoDevice);
            }
            for chunk in &self.chunks {
                tx.send(chunk.clone()).unwrap();
            }
            // tx is dropped here; the recorder's drain loop sees the fake
            // chunks then a closed channel, like a stopped cpal stream.
            Ok(Box::new(FakeStream {
                released: Arc::clone(&self.released),
            }))
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn chunk_16k_mono(secs: f32) -> AudioChunk {
        AudioChunk {
            samples: vec![0.1_f32; (secs * 16_000.0) as usize],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    fn make_recorder(chunks: Vec<AudioChunk>, fail_open: bool) -> (VoiceRecorder, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let backend = FakeBackend {
            released: Arc::clone(&released),
            chunks,
            fail_open,
        };
        let recorder = VoiceRecorder::new(Box::new(backend), AudioConfig::default());
        (recorder, released)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn starts_idle() {
        let (recorder, _) = make_recorder(Vec::new(), false);
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(recorder.error_message().is_none());
    }

    #[test]
    fn start_transitions_to_recording() {
        let (mut recorder, _) = make_recorder(Vec::new(), false);
        recorder.start().expect("start");
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let (mut recorder, _) = make_recorder(Vec::new(), false);
        recorder.start().expect("start");
        let err = recorder.start().unwrap_err();
        assert!(matches!(err, RecorderError::AlreadyActive));
        // Still recording; the first stream was not disturbed.
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn device_failure_on_start_reports_error_and_holds_no_device() {
        let (mut recorder, released) = make_recorder(Vec::new(), true);
        let err = recorder.start().unwrap_err();
        assert!(matches!(err, RecorderError::Capture(_)));
        assert_eq!(recorder.state(), RecorderState::Error);
        assert!(recorder.error_message().is_some());
        // No guard was ever created.
        assert!(!released.load(Ordering::SeqCst));

        recorder.acknowledge();
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn stop_produces_clip_and_releases_device() {
        let (mut recorder, released) = make_recorder(vec![chunk_16k_mono(1.0)], false);
        recorder.start().expect("start");
        let clip = recorder.stop().expect("stop");

        assert!(released.load(Ordering::SeqCst), "device must be released");
        assert_eq!(recorder.state(), RecorderState::Transcribing);
        assert_eq!(clip.sample_rate(), 16_000);
        assert!((clip.duration_secs() - 1.0).abs() < 0.01);
    }

    #[test]
    fn stop_on_short_clip_errors_but_still_releases_device() {
        // 0.1 s < the 0.5 s default minimum.
        let (mut recorder, released) = make_recorder(vec![chunk_16k_mono(0.1)], false);
        recorder.start().expect("start");
        let err = recorder.stop().unwrap_err();

        assert!(matches!(err, RecorderError::ClipTooShort { .. }));
        assert!(released.load(Ordering::SeqCst), "device must be released");
        assert_eq!(recorder.state(), RecorderState::Error);
    }

    #[test]
    fn stop_without_recording_is_rejected() {
        let (mut recorder, _) = make_recorder(Vec::new(), false);
        assert!(matches!(
            recorder.stop().unwrap_err(),
            RecorderError::NotRecording
        ));
    }

    #[test]
    fn stop_downmixes_and_resamples() {
        // 1 second of stereo 48 kHz must come out as ~1 second of 16 kHz mono.
        let chunk = AudioChunk {
            samples: vec![0.2_f32; 96_000], // 48 000 frames × 2 channels
            sample_rate: 48_000,
            channels: 2,
        };
        let (mut recorder, _) = make_recorder(vec![chunk], false);
        recorder.start().expect("start");
        let clip = recorder.stop().expect("stop");

        assert_eq!(clip.sample_rate(), 16_000);
        assert!((clip.duration_secs() - 1.0).abs() < 0.01);
    }

    #[test]
    fn stop_truncates_overlong_recordings() {
        let mut config = AudioConfig::default();
        config.max_recording_secs = 1.0;

        let released = Arc::new(AtomicBool::new(false));
        let backend = FakeBackend {
            released: Arc::clone(&released),
            chunks: vec![chunk_16k_mono(3.0)],
            fail_open: false,
        };
        let mut recorder = VoiceRecorder::new(Box::new(backend), config);

        recorder.start().expect("start");
        let clip = recorder.stop().expect("stop");
        assert!((clip.duration_secs() - 1.0).abs() < 0.01);
    }

    #[test]
    fn cancel_releases_device_and_returns_to_idle() {
        let (mut recorder, released) = make_recorder(vec![chunk_16k_mono(1.0)], false);
        recorder.start().expect("start");
        recorder.cancel();

        assert!(released.load(Ordering::SeqCst), "device must be released");
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn finish_and_fail_drive_transcribing_outcomes() {
        let (mut recorder, _) = make_recorder(vec![chunk_16k_mono(1.0)], false);
        recorder.start().expect("start");
        recorder.stop().expect("stop");
        assert_eq!(recorder.state(), RecorderState::Transcribing);

        recorder.fail("inference exploded");
        assert_eq!(recorder.state(), RecorderState::Error);
        assert_eq!(recorder.error_message(), Some("inference exploded"));

        recorder.acknowledge();
        assert_eq!(recorder.state(), RecorderState::Idle);

        // A fresh cycle that succeeds.
        recorder.start().expect("restart");
        recorder.stop().expect("stop");
        recorder.finish();
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn state_labels() {
        assert_eq!(RecorderState::Idle.label(), "Ready");
        assert_eq!(RecorderState::Recording.label(), "Recording");
        assert_eq!(RecorderState::Transcribing.label(), "Transcribing");
        assert_eq!(RecorderState::Error.label(), "Error");
    }
}
