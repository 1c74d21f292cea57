//! Auto-service assistant chat widget — egui/eframe application.
//!
//! # Architecture
//!
//! [`AssistApp`] owns the UI state, the [`VoiceRecorder`] (capture streams
//! are not `Send`, so recording lives on the UI thread), and two channel
//! endpoints:
//!
//! * `command_tx` — sends [`SessionCommand`] to the session task.
//! * `event_rx`  — receives [`SessionEvent`] from the session task.
//!
//! Each frame drains the event channel, then renders the transcript,
//! quick-reply buttons, typing indicator, input row, and (when open) the
//! voice recorder panel with inline errors and model-download progress.

use std::time::Duration;

use eframe::egui;
use tokio::sync::{mpsc, watch};

use crate::capture::{AudioClip, VoiceRecorder};
use crate::chat::{Message, QuickReply, Sender};
use crate::config::{AppConfig, TranscriptionRoute};
use crate::stt::DownloadProgress;

// ---------------------------------------------------------------------------
// Session task message types (the session loop in main imports them from
// here, mirroring how the UI and the task pair up).
// ---------------------------------------------------------------------------

/// Commands sent from the UI thread to the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Send text as a user chat message.
    SendText(String),
    /// Send a quick reply exactly as if the user typed it.
    QuickReply(QuickReply),
    /// Transcribe a recorded clip down the given route.
    Transcribe {
        clip: AudioClip,
        route: TranscriptionRoute,
    },
}

/// Events delivered from the session task to the UI.
#[derive(Debug)]
pub enum SessionEvent {
    /// A message (user or bot) was appended to the transcript.
    MessageAppended(Message),
    /// The assistant started / stopped working on a reply.
    Typing(bool),
    /// A dispatched transcription resolved with text.
    TranscriptionComplete { text: String },
    /// A dispatched transcription failed.
    TranscriptionFailed { message: String },
}

// ---------------------------------------------------------------------------
// AssistApp
// ---------------------------------------------------------------------------

/// eframe application — the assistant chat window.
pub struct AssistApp {
    // ── Conversation state ───────────────────────────────────────────────
    /// UI copy of the transcript, appended from `MessageAppended` events.
    transcript: Vec<Message>,
    /// Current contents of the input box.
    input: String,
    /// Whether the assistant is working on a reply.
    typing: bool,

    // ── Voice state ──────────────────────────────────────────────────────
    /// Recording lifecycle + microphone ownership.
    recorder: VoiceRecorder,
    /// Whether the recorder panel is open.
    show_recorder: bool,
    /// Which path recorded clips are sent down (toggleable in the panel).
    route: TranscriptionRoute,
    /// Latest model download progress published by the bridge.
    download_rx: watch::Receiver<Option<DownloadProgress>>,

    // ── Channels ─────────────────────────────────────────────────────────
    command_tx: mpsc::Sender<SessionCommand>,
    event_rx: mpsc::Receiver<SessionEvent>,

    // ── Configuration ────────────────────────────────────────────────────
    config: AppConfig,
}

impl AssistApp {
    pub fn new(
        recorder: VoiceRecorder,
        command_tx: mpsc::Sender<SessionCommand>,
        event_rx: mpsc::Receiver<SessionEvent>,
        download_rx: watch::Receiver<Option<DownloadProgress>>,
        config: AppConfig,
    ) -> Self {
        Self {
            transcript: Vec::new(),
            input: String::new(),
            typing: false,
            recorder,
            show_recorder: false,
            route: config.transcribe.route,
            download_rx,
            command_tx,
            event_rx,
            config,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending session events (non-blocking).
    fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                SessionEvent::MessageAppended(message) => {
                    self.transcript.push(message);
                }
                SessionEvent::Typing(active) => {
                    self.typing = active;
                }
                SessionEvent::TranscriptionComplete { text } => {
                    self.recorder.finish();
                    self.show_recorder = false;
                    if self.config.ui.auto_send_transcripts {
                        let _ = self.command_tx.try_send(SessionCommand::SendText(text));
                    } else {
                        self.input = text;
                    }
                }
                SessionEvent::TranscriptionFailed { message } => {
                    self.recorder.fail(message);
                }
            }
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Send whatever is in the input box (no-op when blank).
    fn send_input(&mut self) {
        let text = std::mem::take(&mut self.input);
        if text.trim().is_empty() {
            return;
        }
        let _ = self.command_tx.try_send(SessionCommand::SendText(text));
    }

    /// Stop the active recording and hand the clip to the session task.
    fn stop_and_transcribe(&mut self) {
        match self.recorder.stop() {
            Ok(clip) => {
                let _ = self.command_tx.try_send(SessionCommand::Transcribe {
                    clip,
                    route: self.route,
                });
            }
            Err(e) => {
                // stop() already parked the recorder in its error state;
                // nothing to dispatch.
                log::debug!("app: stop failed: {e}");
            }
        }
    }

    // ── Rendering ────────────────────────────────────────────────────────

    fn draw_header(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new("Auto Service Assistant")
                    .size(16.0)
                    .strong(),
            );
        });
    }

    /// Render the scrolling transcript.  Returns a clicked quick reply, if
    /// any, so the caller can dispatch it outside the closure.
    fn draw_transcript(&self, ui: &mut egui::Ui) -> Option<QuickReply> {
        let mut clicked = None;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in &self.transcript {
                    self.draw_message(ui, message, &mut clicked);
                    ui.add_space(6.0);
                }

                if self.typing {
                    ui.label(
                        egui::RichText::new("Assistant is typing…")
                            .italics()
                            .size(12.0)
                            .color(egui::Color32::from_rgb(140, 140, 140)),
                    );
                }
            });

        clicked
    }

    fn draw_message(
        &self,
        ui: &mut egui::Ui,
        message: &Message,
        clicked: &mut Option<QuickReply>,
    ) {
        let is_user = message.sender == Sender::User;
        let layout = if is_user {
            egui::Layout::right_to_left(egui::Align::TOP)
        } else {
            egui::Layout::left_to_right(egui::Align::TOP)
        };

        let fill = if is_user {
            egui::Color32::from_rgb(40, 70, 110)
        } else if message.is_error {
            egui::Color32::from_rgb(80, 40, 40)
        } else {
            egui::Color32::from_rgb(45, 45, 48)
        };

        ui.with_layout(layout, |ui| {
            egui::Frame::new()
                .fill(fill)
                .corner_radius(egui::CornerRadius::same(6))
                .inner_margin(egui::Margin::same(8))
                .show(ui, |ui| {
                    ui.set_max_width(ui.available_width() * 0.8);
                    ui.vertical(|ui| {
                        ui.label(egui::RichText::new(&message.text).size(13.0));

                        if !message.quick_replies.is_empty() {
                            ui.add_space(4.0);
                            ui.horizontal_wrapped(|ui| {
                                for reply in &message.quick_replies {
                                    if ui.small_button(&reply.text).clicked() {
                                        *clicked = Some(reply.clone());
                                    }
                                }
                            });
                        }

                        if self.config.chat.show_debug_info && !is_user && !message.is_error {
                            self.draw_debug_line(ui, message);
                        }

                        ui.label(
                            egui::RichText::new(message.timestamp_label())
                                .size(10.0)
                                .color(egui::Color32::from_rgb(130, 130, 130)),
                        );
                    });
                });
        });
    }

    /// Display-only projection of intent / confidence / sentiment.
    fn draw_debug_line(&self, ui: &mut egui::Ui, message: &Message) {
        let mut parts = Vec::new();
        if let Some(intent) = &message.intent {
            parts.push(format!("intent: {intent}"));
        }
        if let Some(confidence) = message.confidence {
            parts.push(format!("confidence: {:.0}%", confidence * 100.0));
        }
        if let Some(sentiment) = &message.sentiment {
            parts.push(format!("sentiment: {sentiment}"));
        }
        if parts.is_empty() {
            return;
        }
        ui.label(
            egui::RichText::new(parts.join("  ·  "))
                .size(10.0)
                .color(egui::Color32::from_rgb(110, 140, 170)),
        );
    }

    /// Render the voice recorder panel: state, controls, inline errors, and
    /// first-run model download progress.
    fn draw_recorder_panel(&mut self, ui: &mut egui::Ui) {
        use crate::capture::RecorderState;

        egui::Frame::new()
            .fill(egui::Color32::from_rgb(35, 35, 38))
            .corner_radius(egui::CornerRadius::same(6))
            .inner_margin(egui::Margin::same(8))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("Voice input").size(12.0).strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✕").clicked() {
                            self.recorder.cancel();
                            self.show_recorder = false;
                        }
                        // Route toggle: local model vs backend service.
                        let local = self.route == TranscriptionRoute::LocalModel;
                        if ui.selectable_label(!local, "Backend").clicked() {
                            self.route = TranscriptionRoute::RemoteBackend;
                        }
                        if ui.selectable_label(local, "On-device").clicked() {
                            self.route = TranscriptionRoute::LocalModel;
                        }
                    });
                });

                ui.add_space(4.0);

                match self.recorder.state() {
                    RecorderState::Idle => {
                        if ui.button("● Start recording").clicked() {
                            if let Err(e) = self.recorder.start() {
                                log::warn!("app: could not start recording: {e}");
                            }
                        }
                    }
                    RecorderState::Recording => {
                        ui.horizontal(|ui| {
                            ui.label(
                                egui::RichText::new(format!(
                                    "Recording… {:.1}s",
                                    self.recorder.elapsed_secs()
                                ))
                                .color(egui::Color32::from_rgb(255, 80, 80))
                                .size(12.0),
                            );
                        });
                        ui.horizontal(|ui| {
                            if ui.button("■ Stop").clicked() {
                                self.stop_and_transcribe();
                            }
                            if ui.button("Cancel").clicked() {
                                self.recorder.cancel();
                            }
                        });
                    }
                    RecorderState::Transcribing => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(
                                egui::RichText::new("Transcribing your audio…").size(12.0),
                            );
                        });
                        self.draw_download_progress(ui);
                    }
                    RecorderState::Error => {
                        let message = self
                            .recorder
                            .error_message()
                            .unwrap_or("Something went wrong.")
                            .to_string();
                        ui.label(
                            egui::RichText::new(message)
                                .color(egui::Color32::from_rgb(255, 136, 68))
                                .size(12.0),
                        );
                        ui.horizontal(|ui| {
                            if ui.button("🔄 Try again").clicked() {
                                self.recorder.acknowledge();
                                if let Err(e) = self.recorder.start() {
                                    log::warn!("app: retry failed: {e}");
                                }
                            }
                            if ui.button("Dismiss").clicked() {
                                self.recorder.acknowledge();
                            }
                        });
                    }
                }
            });
    }

    /// First-run model download progress, shown while a local transcription
    /// waits on the worker.
    fn draw_download_progress(&self, ui: &mut egui::Ui) {
        let progress = self.download_rx.borrow().clone();
        if let Some(p) = progress {
            if p.percent < 100.0 {
                ui.add_space(2.0);
                ui.label(
                    egui::RichText::new(format!("Downloading speech model: {}", p.file))
                        .size(10.0)
                        .color(egui::Color32::from_rgb(140, 140, 140)),
                );
                ui.add(egui::ProgressBar::new(p.percent / 100.0).show_percentage());
            }
        }
    }

    fn draw_input_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let send_enabled = !self.input.trim().is_empty() && !self.typing;

            let response = ui.add_sized(
                egui::vec2(ui.available_width() - 130.0, 24.0),
                egui::TextEdit::singleline(&mut self.input)
                    .hint_text("Type your message here…"),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                self.send_input();
                response.request_focus();
            }

            if ui
                .add_enabled(send_enabled, egui::Button::new("Send"))
                .clicked()
            {
                self.send_input();
            }

            let mic_label = if self.show_recorder { "🎙…" } else { "🎙" };
            if ui
                .add_enabled(!self.typing, egui::Button::new(mic_label))
                .clicked()
            {
                self.show_recorder = !self.show_recorder;
                if !self.show_recorder {
                    self.recorder.cancel();
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for AssistApp {
    /// Called every frame by eframe.  Polls the event channel, then renders.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        // Keep repainting while something is animating or pending.
        use crate::capture::RecorderState;
        match self.recorder.state() {
            RecorderState::Recording => ctx.request_repaint_after(Duration::from_millis(100)),
            RecorderState::Transcribing => ctx.request_repaint_after(Duration::from_millis(150)),
            _ if self.typing => ctx.request_repaint_after(Duration::from_millis(150)),
            _ => ctx.request_repaint_after(Duration::from_millis(500)),
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_header(ui);
            ui.separator();

            // Bottom-up: input row (and recorder panel) first so the
            // transcript gets the remaining height.
            egui::TopBottomPanel::bottom("input_area")
                .frame(egui::Frame::new().inner_margin(egui::Margin::same(4)))
                .show_inside(ui, |ui| {
                    if self.show_recorder {
                        self.draw_recorder_panel(ui);
                        ui.add_space(4.0);
                    }
                    self.draw_input_row(ui);
                });

            if let Some(reply) = self.draw_transcript(ui) {
                let _ = self.command_tx.try_send(SessionCommand::QuickReply(reply));
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.recorder.cancel();
        log::info!("assistant widget closing");
    }
}
