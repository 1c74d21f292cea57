//! Application entry point — Auto Service Assistant widget.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the chat backend client, transcription bridge, and remote
//!    transcription client from config.
//! 5. Create the command / event channels.
//! 6. Spawn the session task on the tokio runtime.
//! 7. Build the voice recorder (capture stays on the UI thread).
//! 8. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use tokio::sync::mpsc;

use auto_assist::{
    app::{AssistApp, SessionCommand, SessionEvent},
    capture::{CpalBackend, VoiceRecorder},
    chat::{ApiChatBackend, ChatSession},
    config::{AppConfig, AppPaths, TranscriptionRoute},
    stt::ModelPaths,
    transcribe::{RemoteTranscriber, TranscriptionBridge, WhisperWorkerFactory},
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Drives the chat session and transcription dispatch.
///
/// Chat sends run in order on this task (one conversation, one transcript);
/// transcriptions are spawned so a slow clip never blocks the conversation
/// — the bridge correlates concurrent requests by id.
async fn run_session(
    mut session: ChatSession,
    bridge: Arc<TranscriptionBridge>,
    remote: Arc<RemoteTranscriber>,
    mut command_rx: mpsc::Receiver<SessionCommand>,
    event_tx: mpsc::Sender<SessionEvent>,
    warm_up_local: bool,
) {
    // First-run warm-up: start the model download/load before the user
    // presses record, so the recorder panel shows progress instead of a
    // long stall on the first clip.  Failures are not fatal here — they
    // resurface on the first real transcription.
    if warm_up_local {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            if let Err(e) = bridge.initialize().await {
                log::warn!("session: model warm-up failed: {e}");
            }
        });
    }

    while let Some(command) = command_rx.recv().await {
        match command {
            SessionCommand::SendText(text) => {
                handle_send(&mut session, &event_tx, &text).await;
            }
            // A quick reply is the user typing that reply's text.
            SessionCommand::QuickReply(reply) => {
                handle_send(&mut session, &event_tx, &reply.text).await;
            }

            SessionCommand::Transcribe { clip, route } => {
                let bridge = Arc::clone(&bridge);
                let remote = Arc::clone(&remote);
                let event_tx = event_tx.clone();

                tokio::spawn(async move {
                    let result = match route {
                        TranscriptionRoute::LocalModel => {
                            bridge.transcribe(clip).await.map_err(|e| e.to_string())
                        }
                        TranscriptionRoute::RemoteBackend => {
                            remote.transcribe(&clip).await.map_err(|e| e.to_string())
                        }
                    };
                    let event = match result {
                        Ok(text) => SessionEvent::TranscriptionComplete { text },
                        Err(message) => SessionEvent::TranscriptionFailed { message },
                    };
                    let _ = event_tx.send(event).await;
                });
            }
        }
    }

    log::info!("session: command channel closed, shutting down");
}

/// Append the user message, round-trip the backend, and stream both
/// messages (plus the typing indicator) to the UI.  Blank text is a no-op.
async fn handle_send(
    session: &mut ChatSession,
    event_tx: &mpsc::Sender<SessionEvent>,
    text: &str,
) {
    let Some(user) = session.push_user_message(text) else {
        return;
    };
    let _ = event_tx
        .send(SessionEvent::MessageAppended(user.clone()))
        .await;
    let _ = event_tx.send(SessionEvent::Typing(true)).await;

    let bot = session.request_reply(&user.text).await;
    let _ = event_tx.send(SessionEvent::MessageAppended(bot)).await;
    let _ = event_tx.send(SessionEvent::Typing(false)).await;
}

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_inner_size([420.0, 640.0])
        .with_min_inner_size([320.0, 400.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Auto Service Assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 workers — chat round trips + transcription dispatch)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Backends
    let chat_backend = Arc::new(ApiChatBackend::from_config(&config.chat));
    let session = ChatSession::new(chat_backend);

    let model_paths = ModelPaths::from_app_paths(&AppPaths::new());
    let bridge = Arc::new(TranscriptionBridge::new(Box::new(
        WhisperWorkerFactory::new(model_paths, config.transcribe.clone()),
    )));
    let remote = Arc::new(RemoteTranscriber::from_config(&config.transcribe));
    let download_rx = bridge.download_progress();

    // 5. Channel setup
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(32);

    // 6. Session task
    let warm_up_local = config.transcribe.route == TranscriptionRoute::LocalModel;
    rt.spawn(run_session(
        session,
        bridge,
        remote,
        command_rx,
        event_tx,
        warm_up_local,
    ));

    // 7. Voice recorder — owned by the UI thread (cpal streams are !Send)
    let recorder = VoiceRecorder::new(Box::new(CpalBackend::new()), config.audio.clone());

    // 8. Run the widget (blocks until the window is closed)
    let app = AssistApp::new(recorder, command_tx, event_rx, download_rx, config.clone());
    let options = native_options(&config);

    eframe::run_native(
        "Auto Service Assistant",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
