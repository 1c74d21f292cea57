//! [`TranscriptionBridge`] — async request/response over the inference worker.
//!
//! The bridge hides the worker protocol behind two operations:
//!
//! * [`initialize`](TranscriptionBridge::initialize) — idempotent,
//!   single-flight.  However many callers race, exactly one worker is
//!   spawned and they all share the outcome of its model load.
//! * [`transcribe`](TranscriptionBridge::transcribe) — initializes first if
//!   needed, then resolves with the transcript for *this* clip.  Every
//!   request carries a fresh `request_id` and replies are routed through a
//!   pending map, so any number of transcriptions may be in flight.
//!
//! Worker events are consumed by a pump task and dispatched through one
//! transition function per event kind on [`BridgeState`], which makes the
//! routing logic testable against a hand-driven fake worker.  If the worker
//! dies outside the protocol (its event channel closes), every pending
//! waiter is rejected exactly once and the lifecycle resets, so the next
//! call spawns a fresh worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc as tokio_mpsc, oneshot, watch};

use crate::capture::AudioClip;
use crate::stt::DownloadProgress;
use crate::transcribe::protocol::{LoadStatus, WorkerEvent, WorkerRequest};
use crate::transcribe::worker::WorkerFactory;

// ---------------------------------------------------------------------------
// BridgeError
// ---------------------------------------------------------------------------

/// Errors surfaced by bridge operations.
///
/// `Clone` because one load failure fans out to every joined
/// `initialize` caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The worker failed to set up its model.
    #[error("speech model initialisation failed: {0}")]
    Init(String),

    /// The worker reported an inference failure.
    #[error("transcription failed: {0}")]
    Inference(String),

    /// The worker stopped outside the protocol while work was pending.
    #[error("transcription worker stopped unexpectedly")]
    WorkerGone,
}

// ---------------------------------------------------------------------------
// BridgeState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
}

type InitWaiter = oneshot::Sender<Result<(), BridgeError>>;
type PendingResolver = oneshot::Sender<Result<String, BridgeError>>;

/// Mutable bridge state behind the mutex.  Lock is only ever held for
/// non-blocking sections — never across an await point.
struct BridgeState {
    lifecycle: Lifecycle,
    /// Request endpoint of the current worker, if one was spawned.
    worker_tx: Option<std::sync::mpsc::Sender<WorkerRequest>>,
    /// Callers waiting on the in-flight initialization.
    init_waiters: Vec<InitWaiter>,
    /// In-flight transcriptions, keyed by request id.
    pending: HashMap<u64, PendingResolver>,
    next_request_id: u64,
    /// Incremented per worker spawn; a pump from a retired worker finds a
    /// mismatched epoch and leaves the newer worker's state alone.
    epoch: u64,
}

impl BridgeState {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            worker_tx: None,
            init_waiters: Vec::new(),
            pending: HashMap::new(),
            next_request_id: 0,
            epoch: 0,
        }
    }

    fn register_init_waiter(&mut self) -> oneshot::Receiver<Result<(), BridgeError>> {
        let (tx, rx) = oneshot::channel();
        self.init_waiters.push(tx);
        rx
    }

    // -- transition functions, one per worker event kind --------------------

    /// `Loading` — resolve or reject the in-flight initialization.
    fn on_loading(&mut self, status: LoadStatus) {
        if self.lifecycle != Lifecycle::Initializing {
            log::warn!("bridge: stray loading event in {:?} state", self.lifecycle);
            return;
        }
        match status {
            LoadStatus::Success => {
                log::info!("bridge: worker ready");
                self.lifecycle = Lifecycle::Ready;
                for waiter in self.init_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            LoadStatus::Error(message) => {
                log::error!("bridge: worker load failed: {message}");
                self.reset();
                for waiter in self.take_init_waiters() {
                    let _ = waiter.send(Err(BridgeError::Init(message.clone())));
                }
            }
        }
    }

    /// `Result` — resolve the matching pending transcription.
    fn on_result(&mut self, request_id: u64, text: String) {
        match self.pending.remove(&request_id) {
            Some(resolver) => {
                let _ = resolver.send(Ok(text));
            }
            None => {
                log::warn!("bridge: result for unknown request {request_id}");
            }
        }
    }

    /// `Error` — route to the matching request, the in-flight
    /// initialization, or everything pending, in that order of specificity.
    fn on_error(&mut self, request_id: Option<u64>, message: String, trace: Option<String>) {
        if let Some(trace) = trace {
            log::debug!("bridge: worker error trace: {trace}");
        }

        if let Some(id) = request_id {
            match self.pending.remove(&id) {
                Some(resolver) => {
                    let _ = resolver.send(Err(BridgeError::Inference(message)));
                }
                None => {
                    log::warn!("bridge: error for unknown request {id}: {message}");
                }
            }
            return;
        }

        if self.lifecycle == Lifecycle::Initializing {
            self.reset();
            for waiter in self.take_init_waiters() {
                let _ = waiter.send(Err(BridgeError::Init(message.clone())));
            }
            return;
        }

        log::error!("bridge: worker error with no request id: {message}");
        for (_, resolver) in self.pending.drain() {
            let _ = resolver.send(Err(BridgeError::Inference(message.clone())));
        }
    }

    /// Event channel closed — the worker is gone.  Reject everything
    /// pending exactly once and reset so the next call respawns.
    fn on_worker_gone(&mut self) {
        let had_work = !self.init_waiters.is_empty() || !self.pending.is_empty();
        if had_work {
            log::error!("bridge: worker stopped with work pending");
        }
        self.reset();
        for waiter in self.take_init_waiters() {
            let _ = waiter.send(Err(BridgeError::WorkerGone));
        }
    }

    /// Drop the worker endpoint and return to `Uninitialized`, failing all
    /// pending transcriptions.  Init waiters are left for the caller to
    /// reject with the appropriate error.
    fn reset(&mut self) {
        self.lifecycle = Lifecycle::Uninitialized;
        self.worker_tx = None;
        for (_, resolver) in self.pending.drain() {
            let _ = resolver.send(Err(BridgeError::WorkerGone));
        }
    }

    fn take_init_waiters(&mut self) -> Vec<InitWaiter> {
        std::mem::take(&mut self.init_waiters)
    }
}

// ---------------------------------------------------------------------------
// TranscriptionBridge
// ---------------------------------------------------------------------------

/// Owned bridge to the speech-to-text worker.
///
/// Explicitly constructed with an injected [`WorkerFactory`]; independent
/// instances (and their workers) can coexist, which the tests rely on.
pub struct TranscriptionBridge {
    factory: Box<dyn WorkerFactory>,
    state: Arc<Mutex<BridgeState>>,
    download_tx: watch::Sender<Option<DownloadProgress>>,
}

impl TranscriptionBridge {
    pub fn new(factory: Box<dyn WorkerFactory>) -> Self {
        let (download_tx, _) = watch::channel(None);
        Self {
            factory,
            state: Arc::new(Mutex::new(BridgeState::new())),
            download_tx,
        }
    }

    /// Observe model download progress (first-run UX).  Yields `None` until
    /// a download starts.
    pub fn download_progress(&self) -> watch::Receiver<Option<DownloadProgress>> {
        self.download_tx.subscribe()
    }

    /// Bring the worker up.  Idempotent and single-flight: a ready bridge
    /// returns immediately, racing callers join the in-flight attempt, and
    /// only the first caller actually spawns a worker.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Init`] — the model failed to load.  State is reset;
    ///   calling again retries with a fresh worker.
    /// - [`BridgeError::WorkerGone`] — the worker died before reporting.
    pub async fn initialize(&self) -> Result<(), BridgeError> {
        let waiter = {
            let mut state = self.state.lock().unwrap();
            match state.lifecycle {
                Lifecycle::Ready => return Ok(()),
                Lifecycle::Initializing => state.register_init_waiter(),
                Lifecycle::Uninitialized => {
                    let handle = self.factory.spawn();
                    let (request_tx, event_rx) = handle.into_parts();

                    state.worker_tx = Some(request_tx);
                    state.lifecycle = Lifecycle::Initializing;
                    state.epoch += 1;

                    log::debug!("bridge: spawned worker (epoch {})", state.epoch);
                    tokio::spawn(pump_events(
                        event_rx,
                        Arc::clone(&self.state),
                        self.download_tx.clone(),
                        state.epoch,
                    ));

                    state.register_init_waiter()
                }
            }
        };

        match waiter.await {
            Ok(outcome) => outcome,
            // Resolver dropped without an answer — only possible if the
            // bridge itself is being torn down mid-flight.
            Err(_) => Err(BridgeError::WorkerGone),
        }
    }

    /// Transcribe `clip`, initializing the worker first when needed.
    ///
    /// Requests are correlated by id, so concurrent callers each get their
    /// own result, and the bridge accepts new requests as soon as this one
    /// is dispatched.
    pub async fn transcribe(&self, clip: AudioClip) -> Result<String, BridgeError> {
        self.initialize().await?;

        let resolver = {
            let mut state = self.state.lock().unwrap();

            let request_id = state.next_request_id;
            state.next_request_id += 1;

            let sender = state.worker_tx.clone().ok_or(BridgeError::WorkerGone)?;
            let (tx, rx) = oneshot::channel();
            state.pending.insert(request_id, tx);

            // A send failure means the worker thread already exited; undo
            // the registration so nothing dangles.
            if sender
                .send(WorkerRequest::Transcribe { request_id, clip })
                .is_err()
            {
                state.pending.remove(&request_id);
                return Err(BridgeError::WorkerGone);
            }

            log::debug!("bridge: dispatched request {request_id}");
            rx
        };

        match resolver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::WorkerGone),
        }
    }
}

// ---------------------------------------------------------------------------
// Event pump
// ---------------------------------------------------------------------------

/// Drains one worker's event stream into the shared state.
///
/// The epoch check keeps a retired worker's tail events (or its channel
/// closure) from disturbing a replacement worker spawned in the meantime.
async fn pump_events(
    mut event_rx: tokio_mpsc::UnboundedReceiver<WorkerEvent>,
    shared: Arc<Mutex<BridgeState>>,
    download_tx: watch::Sender<Option<DownloadProgress>>,
    epoch: u64,
) {
    while let Some(event) = event_rx.recv().await {
        let mut state = shared.lock().unwrap();
        if state.epoch != epoch {
            log::debug!("bridge: dropping event from retired worker");
            continue;
        }
        match event {
            WorkerEvent::Loading(status) => state.on_loading(status),
            WorkerEvent::Downloading(progress) => {
                // Informational only — never touches a pending operation.
                log::debug!(
                    "bridge: downloading {} ({:.0}%)",
                    progress.file,
                    progress.percent
                );
                let _ = download_tx.send(Some(progress));
            }
            WorkerEvent::Result { request_id, text } => state.on_result(request_id, text),
            WorkerEvent::Error {
                request_id,
                message,
                trace,
            } => state.on_error(request_id, message, trace),
        }
    }

    let mut state = shared.lock().unwrap();
    if state.epoch == epoch {
        state.on_worker_gone();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::worker::WorkerHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Scripted worker — the test drives the far ends of a WorkerHandle.
    // -----------------------------------------------------------------------

    struct WorkerEnds {
        request_rx: std_mpsc::Receiver<WorkerRequest>,
        event_tx: tokio_mpsc::UnboundedSender<WorkerEvent>,
    }

    /// Factory that hands each spawned worker's far ends to the test.
    ///
    /// The hand-off channel is a tokio one so tests can await it without
    /// blocking the (single-threaded) test runtime.
    struct ScriptedFactory {
        spawn_count: Arc<AtomicUsize>,
        ends_tx: tokio_mpsc::UnboundedSender<WorkerEnds>,
    }

    impl ScriptedFactory {
        fn new() -> (
            Self,
            tokio_mpsc::UnboundedReceiver<WorkerEnds>,
            Arc<AtomicUsize>,
        ) {
            let (ends_tx, ends_rx) = tokio_mpsc::unbounded_channel();
            let spawn_count = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    spawn_count: Arc::clone(&spawn_count),
                    ends_tx,
                },
                ends_rx,
                spawn_count,
            )
        }
    }

    impl WorkerFactory for ScriptedFactory {
        fn spawn(&self) -> WorkerHandle {
            self.spawn_count.fetch_add(1, Ordering::SeqCst);
            let (request_tx, request_rx) = std_mpsc::channel();
            let (event_tx, event_rx) = tokio_mpsc::unbounded_channel();
            self.ends_tx
                .send(WorkerEnds {
                    request_rx,
                    event_tx,
                })
                .unwrap();
            WorkerHandle::new(request_tx, event_rx)
        }
    }

    fn clip(seconds: f32) -> AudioClip {
        AudioClip::new(vec![0.0f32; (seconds * 16_000.0) as usize], 16_000)
    }

    /// Await a request on the scripted worker's blocking receiver without
    /// stalling the async runtime.
    async fn next_request(ends: &WorkerEnds) -> WorkerRequest {
        loop {
            match ends.request_rx.try_recv() {
                Ok(req) => return req,
                Err(std_mpsc::TryRecvError::Empty) => {
                    tokio::time::sleep(Duration::from_millis(5)).await
                }
                Err(std_mpsc::TryRecvError::Disconnected) => panic!("bridge dropped request end"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // initialize
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn initialize_resolves_on_loading_success() {
        let (factory, mut ends_rx, spawns) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let init = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.initialize().await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();

        init.await.unwrap().expect("initialize should succeed");
        assert_eq!(spawns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_initialize_spawns_one_worker_and_all_join() {
        let (factory, mut ends_rx, spawns) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let mut calls = Vec::new();
        for _ in 0..5 {
            let b = Arc::clone(&bridge);
            calls.push(tokio::spawn(async move { b.initialize().await }));
        }

        let ends = ends_rx.recv().await.unwrap();
        // Give every call a chance to register before the outcome lands.
        tokio::time::sleep(Duration::from_millis(20)).await;
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();

        for call in calls {
            call.await.unwrap().expect("all joined calls succeed");
        }
        assert_eq!(spawns.load(Ordering::SeqCst), 1, "exactly one spawn");

        // Ready now — another call returns immediately, still one spawn.
        bridge.initialize().await.expect("idempotent");
        assert_eq!(spawns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn init_failure_rejects_all_waiters_and_retry_respawns() {
        let (factory, mut ends_rx, spawns) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let mut calls = Vec::new();
        for _ in 0..3 {
            let b = Arc::clone(&bridge);
            calls.push(tokio::spawn(async move { b.initialize().await }));
        }

        let ends = ends_rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Error("no weights".into())))
            .unwrap();

        for call in calls {
            let err = call.await.unwrap().unwrap_err();
            assert_eq!(err, BridgeError::Init("no weights".into()));
        }

        // State was reset — a retry spawns a fresh worker and can succeed.
        let retry = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.initialize().await }
        });
        let ends2 = ends_rx.recv().await.unwrap();
        ends2
            .event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();
        retry.await.unwrap().expect("retry succeeds");
        assert_eq!(spawns.load(Ordering::SeqCst), 2);
    }

    // -----------------------------------------------------------------------
    // transcribe
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transcribe_initializes_then_resolves_result() {
        let (factory, mut ends_rx, _) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let call = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();

        let WorkerRequest::Transcribe { request_id, clip } = next_request(&ends).await;
        assert_eq!(clip.sample_rate(), 16_000);
        ends.event_tx
            .send(WorkerEvent::Result {
                request_id,
                text: "brake pads are worn".into(),
            })
            .unwrap();

        assert_eq!(call.await.unwrap().unwrap(), "brake pads are worn");
    }

    #[tokio::test]
    async fn concurrent_transcriptions_resolve_their_own_callers() {
        let (factory, mut ends_rx, _) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let first = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });
        let second = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(2.0)).await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();

        // Collect both requests, then answer them out of order, keyed by
        // clip length so each caller's text is distinguishable.
        let req_a = next_request(&ends).await;
        let req_b = next_request(&ends).await;

        let mut answers = Vec::new();
        for req in [req_a, req_b] {
            let WorkerRequest::Transcribe { request_id, clip } = req;
            let text = if clip.duration_secs() > 1.5 {
                "two second clip"
            } else {
                "one second clip"
            };
            answers.push((request_id, text));
        }
        // Reply in reverse arrival order.
        for (request_id, text) in answers.into_iter().rev() {
            ends.event_tx
                .send(WorkerEvent::Result {
                    request_id,
                    text: text.into(),
                })
                .unwrap();
        }

        assert_eq!(first.await.unwrap().unwrap(), "one second clip");
        assert_eq!(second.await.unwrap().unwrap(), "two second clip");
    }

    #[tokio::test]
    async fn error_with_id_fails_only_that_request() {
        let (factory, mut ends_rx, _) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let doomed = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });
        let survivor = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(2.0)).await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();

        let req_a = next_request(&ends).await;
        let req_b = next_request(&ends).await;
        let WorkerRequest::Transcribe {
            request_id: id_a,
            clip: clip_a,
        } = &req_a;
        let WorkerRequest::Transcribe {
            request_id: id_b, ..
        } = &req_b;
        // The 1 s clip is the doomed one.
        let (doomed_id, survivor_id) = if clip_a.duration_secs() < 1.5 {
            (*id_a, *id_b)
        } else {
            (*id_b, *id_a)
        };

        ends.event_tx
            .send(WorkerEvent::Error {
                request_id: Some(doomed_id),
                message: "inference failed".into(),
                trace: Some("stack".into()),
            })
            .unwrap();
        ends.event_tx
            .send(WorkerEvent::Result {
                request_id: survivor_id,
                text: "still fine".into(),
            })
            .unwrap();

        assert_eq!(
            doomed.await.unwrap().unwrap_err(),
            BridgeError::Inference("inference failed".into())
        );
        assert_eq!(survivor.await.unwrap().unwrap(), "still fine");
    }

    /// A worker `error` with message "OOM" and no request id, while a
    /// transcription is pending, rejects that call with the message — and a
    /// later call still works because pending state was reset.
    #[tokio::test]
    async fn bare_error_fails_pending_and_bridge_accepts_new_requests() {
        let (factory, mut ends_rx, _) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let doomed = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();
        let _ = next_request(&ends).await;

        ends.event_tx
            .send(WorkerEvent::Error {
                request_id: None,
                message: "OOM".into(),
                trace: None,
            })
            .unwrap();

        let err = doomed.await.unwrap().unwrap_err();
        assert_eq!(err, BridgeError::Inference("OOM".into()));

        // Same worker is still alive — a follow-up request resolves.
        let next = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });
        let WorkerRequest::Transcribe { request_id, .. } = next_request(&ends).await;
        ends.event_tx
            .send(WorkerEvent::Result {
                request_id,
                text: "recovered".into(),
            })
            .unwrap();
        assert_eq!(next.await.unwrap().unwrap(), "recovered");
    }

    // -----------------------------------------------------------------------
    // worker death
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn worker_death_rejects_pending_and_next_call_respawns() {
        let (factory, mut ends_rx, spawns) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let doomed = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();
        let _ = next_request(&ends).await;

        // Worker crashes outside the protocol.
        drop(ends);

        assert_eq!(doomed.await.unwrap().unwrap_err(), BridgeError::WorkerGone);

        // Bridge is usable again: the next call spawns worker #2.
        let revived = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.transcribe(clip(1.0)).await }
        });
        let ends2 = ends_rx.recv().await.unwrap();
        ends2
            .event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();
        let WorkerRequest::Transcribe { request_id, .. } = next_request(&ends2).await;
        ends2
            .event_tx
            .send(WorkerEvent::Result {
                request_id,
                text: "fresh worker".into(),
            })
            .unwrap();

        assert_eq!(revived.await.unwrap().unwrap(), "fresh worker");
        assert_eq!(spawns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn worker_death_during_initialize_rejects_waiters() {
        let (factory, mut ends_rx, _) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));

        let init = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.initialize().await }
        });

        let ends = ends_rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(ends);

        assert_eq!(init.await.unwrap().unwrap_err(), BridgeError::WorkerGone);
    }

    // -----------------------------------------------------------------------
    // download progress
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn downloading_events_feed_watch_and_resolve_nothing() {
        let (factory, mut ends_rx, _) = ScriptedFactory::new();
        let bridge = Arc::new(TranscriptionBridge::new(Box::new(factory)));
        let mut progress_rx = bridge.download_progress();

        let init = tokio::spawn({
            let b = Arc::clone(&bridge);
            async move { b.initialize().await }
        });

        let ends = ends_rx.recv().await.unwrap();
        ends.event_tx
            .send(WorkerEvent::Downloading(DownloadProgress {
                file: "ggml-base.en.bin".into(),
                percent: 25.0,
                loaded: 35,
                total: Some(142),
            }))
            .unwrap();

        progress_rx.changed().await.unwrap();
        let seen = progress_rx.borrow().clone().expect("progress published");
        assert_eq!(seen.file, "ggml-base.en.bin");
        assert_eq!(seen.loaded, 35);

        // Initialization is still pending — only Loading resolves it.
        ends.event_tx
            .send(WorkerEvent::Loading(LoadStatus::Success))
            .unwrap();
        init.await.unwrap().expect("resolved by loading event");
    }
}
