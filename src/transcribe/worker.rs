//! The inference worker — a background thread hosting the STT model.
//!
//! [`WhisperWorkerFactory`] is the production [`WorkerFactory`]: each
//! `spawn` starts a named thread that resolves the configured model
//! (downloading it on first run with progress events), loads a
//! [`WhisperEngine`], reports [`LoadStatus`], then serves
//! [`WorkerRequest::Transcribe`]s until the request channel closes.
//!
//! The engine-producing step is behind the [`EngineLoader`] seam so the
//! worker loop and the bridge can be tested with `MockSttEngine` and no
//! model file.

use std::sync::mpsc;
use std::thread;

use tokio::sync::mpsc as tokio_mpsc;

use crate::config::TranscribeConfig;
use crate::stt::{
    ensure_model, find_model_by_id, DownloadProgress, EngineParams, ModelPaths, SttEngine,
    WhisperEngine,
};
use crate::transcribe::protocol::{LoadStatus, WorkerEvent, WorkerRequest};

// ---------------------------------------------------------------------------
// WorkerHandle
// ---------------------------------------------------------------------------

/// Channel endpoints of a freshly spawned worker, handed to the bridge.
///
/// Requests flow through a `std::sync::mpsc` sender (the worker thread
/// blocks on the receiving end); events come back on an unbounded tokio
/// channel so the worker can publish from its blocking context while the
/// bridge awaits asynchronously.
pub struct WorkerHandle {
    request_tx: mpsc::Sender<WorkerRequest>,
    event_rx: tokio_mpsc::UnboundedReceiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Pair up the endpoints of a worker.  Also the entry point for test
    /// doubles: a fake worker is just a handle whose far ends are driven by
    /// the test.
    pub fn new(
        request_tx: mpsc::Sender<WorkerRequest>,
        event_rx: tokio_mpsc::UnboundedReceiver<WorkerEvent>,
    ) -> Self {
        Self {
            request_tx,
            event_rx,
        }
    }

    /// Split the handle into its endpoints (bridge internals).
    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::Sender<WorkerRequest>,
        tokio_mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        (self.request_tx, self.event_rx)
    }
}

// ---------------------------------------------------------------------------
// WorkerFactory
// ---------------------------------------------------------------------------

/// Creates workers for the bridge.
///
/// Injected into [`crate::transcribe::TranscriptionBridge`] so tests can
/// substitute scripted workers; called at most once per initialization
/// attempt.  Spawning itself is infallible — setup failures travel through
/// the event channel as [`WorkerEvent::Loading`].
pub trait WorkerFactory: Send + Sync {
    fn spawn(&self) -> WorkerHandle;
}

// ---------------------------------------------------------------------------
// EngineLoader
// ---------------------------------------------------------------------------

/// Produces the engine a worker hosts.
///
/// Runs on the worker thread; may block for minutes (model download).
/// Failures are reported as display strings since they cross the worker
/// protocol as message text.
pub trait EngineLoader: Send + 'static {
    fn load(
        &mut self,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<Box<dyn SttEngine>, String>;
}

/// Production loader: registry lookup → download if missing → whisper init.
struct WhisperLoader {
    paths: ModelPaths,
    model_id: String,
    language: String,
}

impl EngineLoader for WhisperLoader {
    fn load(
        &mut self,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<Box<dyn SttEngine>, String> {
        let info = find_model_by_id(&self.model_id)
            .ok_or_else(|| format!("unknown model id: {}", self.model_id))?;

        let model_path = ensure_model(&self.paths, info, on_progress).map_err(|e| e.to_string())?;

        let params = EngineParams {
            language: self.language.clone(),
            ..EngineParams::default()
        };
        let engine = WhisperEngine::load(&model_path, params).map_err(|e| e.to_string())?;
        Ok(Box::new(engine))
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

/// Body of the worker thread.
///
/// Emits `Downloading` progress while the loader runs, then exactly one
/// `Loading` event.  On load failure the function returns immediately — the
/// dropped event sender tells the bridge the worker is gone.  Send errors
/// are ignored throughout: a dropped bridge just retires the worker.
pub(crate) fn run_worker<L: EngineLoader>(
    mut loader: L,
    request_rx: mpsc::Receiver<WorkerRequest>,
    event_tx: tokio_mpsc::UnboundedSender<WorkerEvent>,
) {
    let load_result = loader.load(&mut |progress| {
        let _ = event_tx.send(WorkerEvent::Downloading(progress));
    });

    let engine = match load_result {
        Ok(engine) => {
            let _ = event_tx.send(WorkerEvent::Loading(LoadStatus::Success));
            engine
        }
        Err(message) => {
            log::error!("worker: model setup failed: {message}");
            let _ = event_tx.send(WorkerEvent::Loading(LoadStatus::Error(message)));
            return;
        }
    };

    log::info!("worker: model ready, serving requests");

    while let Ok(request) = request_rx.recv() {
        match request {
            WorkerRequest::Transcribe { request_id, clip } => {
                log::debug!(
                    "worker: transcribing request {request_id} ({:.1} s clip)",
                    clip.duration_secs()
                );
                let event = match engine.transcribe(clip.samples()) {
                    Ok(text) => WorkerEvent::Result { request_id, text },
                    Err(e) => WorkerEvent::Error {
                        request_id: Some(request_id),
                        message: e.to_string(),
                        trace: None,
                    },
                };
                let _ = event_tx.send(event);
            }
        }
    }

    log::debug!("worker: request channel closed, retiring");
}

// ---------------------------------------------------------------------------
// WhisperWorkerFactory
// ---------------------------------------------------------------------------

/// Spawns production inference workers from the transcription config.
pub struct WhisperWorkerFactory {
    paths: ModelPaths,
    config: TranscribeConfig,
}

impl WhisperWorkerFactory {
    pub fn new(paths: ModelPaths, config: TranscribeConfig) -> Self {
        Self { paths, config }
    }
}

impl WorkerFactory for WhisperWorkerFactory {
    fn spawn(&self) -> WorkerHandle {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (event_tx, event_rx) = tokio_mpsc::unbounded_channel::<WorkerEvent>();

        let loader = WhisperLoader {
            paths: self.paths.clone(),
            model_id: self.config.model.clone(),
            language: self.config.language.clone(),
        };

        // Thread-spawn failure is a resource-exhaustion condition we cannot
        // meaningfully recover from here; surface it as a dead worker.
        let spawned = thread::Builder::new()
            .name("stt-worker".into())
            .spawn(move || run_worker(loader, request_rx, event_tx));

        if let Err(e) = spawned {
            log::error!("worker: failed to spawn thread: {e}");
        }

        WorkerHandle::new(request_tx, event_rx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::{MockSttEngine, SttError};

    /// Loader that wraps a pre-built engine and optionally emits scripted
    /// progress events first.
    pub(crate) struct StubLoader {
        pub engine: Option<Box<dyn SttEngine>>,
        pub fail_with: Option<String>,
        pub progress: Vec<DownloadProgress>,
    }

    impl StubLoader {
        pub fn ok(engine: Box<dyn SttEngine>) -> Self {
            Self {
                engine: Some(engine),
                fail_with: None,
                progress: Vec::new(),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                engine: None,
                fail_with: Some(message.into()),
                progress: Vec::new(),
            }
        }
    }

    impl EngineLoader for StubLoader {
        fn load(
            &mut self,
            on_progress: &mut dyn FnMut(DownloadProgress),
        ) -> Result<Box<dyn SttEngine>, String> {
            for p in self.progress.drain(..) {
                on_progress(p);
            }
            if let Some(message) = self.fail_with.take() {
                return Err(message);
            }
            Ok(self.engine.take().expect("engine consumed twice"))
        }
    }

    fn spawn_stub_worker(loader: StubLoader) -> WorkerHandle {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = tokio_mpsc::unbounded_channel();
        thread::spawn(move || run_worker(loader, request_rx, event_tx));
        WorkerHandle::new(request_tx, event_rx)
    }

    fn one_second_clip() -> crate::capture::AudioClip {
        crate::capture::AudioClip::new(vec![0.0f32; 16_000], 16_000)
    }

    #[tokio::test]
    async fn worker_reports_success_then_serves_results() {
        let loader = StubLoader::ok(Box::new(MockSttEngine::ok("oil change please")));
        let handle = spawn_stub_worker(loader);
        let (request_tx, mut event_rx) = handle.into_parts();

        assert_eq!(
            event_rx.recv().await,
            Some(WorkerEvent::Loading(LoadStatus::Success))
        );

        request_tx
            .send(WorkerRequest::Transcribe {
                request_id: 7,
                clip: one_second_clip(),
            })
            .unwrap();

        assert_eq!(
            event_rx.recv().await,
            Some(WorkerEvent::Result {
                request_id: 7,
                text: "oil change please".into()
            })
        );
    }

    #[tokio::test]
    async fn worker_echoes_request_id_on_engine_error() {
        let loader = StubLoader::ok(Box::new(MockSttEngine::err(SttError::Transcription(
            "OOM".into(),
        ))));
        let handle = spawn_stub_worker(loader);
        let (request_tx, mut event_rx) = handle.into_parts();

        assert_eq!(
            event_rx.recv().await,
            Some(WorkerEvent::Loading(LoadStatus::Success))
        );

        request_tx
            .send(WorkerRequest::Transcribe {
                request_id: 3,
                clip: one_second_clip(),
            })
            .unwrap();

        match event_rx.recv().await {
            Some(WorkerEvent::Error {
                request_id,
                message,
                ..
            }) => {
                assert_eq!(request_id, Some(3));
                assert!(message.contains("OOM"), "got: {message}");
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn worker_reports_load_failure_and_retires() {
        let loader = StubLoader::failing("weights corrupted");
        let handle = spawn_stub_worker(loader);
        let (_request_tx, mut event_rx) = handle.into_parts();

        assert_eq!(
            event_rx.recv().await,
            Some(WorkerEvent::Loading(LoadStatus::Error(
                "weights corrupted".into()
            )))
        );
        // The thread returned; its event sender is gone.
        assert_eq!(event_rx.recv().await, None);
    }

    #[tokio::test]
    async fn worker_forwards_download_progress_before_loading() {
        let mut loader = StubLoader::ok(Box::new(MockSttEngine::ok("hi")));
        loader.progress = vec![DownloadProgress {
            file: "ggml-base.en.bin".into(),
            percent: 50.0,
            loaded: 71,
            total: Some(142),
        }];
        let handle = spawn_stub_worker(loader);
        let (_request_tx, mut event_rx) = handle.into_parts();

        match event_rx.recv().await {
            Some(WorkerEvent::Downloading(p)) => {
                assert_eq!(p.file, "ggml-base.en.bin");
                assert_eq!(p.loaded, 71);
            }
            other => panic!("expected downloading event, got {other:?}"),
        }
        assert_eq!(
            event_rx.recv().await,
            Some(WorkerEvent::Loading(LoadStatus::Success))
        );
    }

    #[tokio::test]
    async fn worker_retires_when_request_channel_closes() {
        let loader = StubLoader::ok(Box::new(MockSttEngine::ok("hi")));
        let handle = spawn_stub_worker(loader);
        let (request_tx, mut event_rx) = handle.into_parts();

        assert_eq!(
            event_rx.recv().await,
            Some(WorkerEvent::Loading(LoadStatus::Success))
        );

        drop(request_tx);
        // Worker loop exits; the event channel closes behind it.
        assert_eq!(event_rx.recv().await, None);
    }
}
