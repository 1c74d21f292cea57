//! Message protocol between the bridge and the inference worker.
//!
//! Strictly message-passing: the bridge owns the request sender, the worker
//! owns the event sender, and no memory is shared across the boundary.
//! Every transcription request carries a `request_id` that the worker echoes
//! back on its [`WorkerEvent::Result`] / [`WorkerEvent::Error`], so the
//! bridge can route replies with any number of requests in flight.

use crate::capture::AudioClip;
use crate::stt::DownloadProgress;

// ---------------------------------------------------------------------------
// WorkerRequest  (bridge → worker)
// ---------------------------------------------------------------------------

/// Requests the bridge sends to the worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Run inference on `clip`; the reply echoes `request_id`.
    Transcribe { request_id: u64, clip: AudioClip },
}

// ---------------------------------------------------------------------------
// WorkerEvent  (worker → bridge)
// ---------------------------------------------------------------------------

/// Outcome of the worker's one-time model setup.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// Model is loaded; the worker is serving requests.
    Success,
    /// Model setup failed; the worker has shut down.
    Error(String),
}

/// Events the worker publishes to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Model setup finished — sent exactly once per worker lifetime.
    Loading(LoadStatus),

    /// Model file download progress.  Informational only: never resolves or
    /// rejects a pending operation.
    Downloading(DownloadProgress),

    /// A transcription request completed.
    Result { request_id: u64, text: String },

    /// Something failed.  With a `request_id` the error belongs to that
    /// transcription; without one it belongs to initialization when one is
    /// in flight, otherwise to every pending request.
    Error {
        request_id: Option<u64>,
        message: String,
        trace: Option<String>,
    },
}
