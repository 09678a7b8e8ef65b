// GUI controller: everything between the Slint window and the rest of the
// application. Callbacks validate input and dispatch requests; a
// subscription thread maps StateChange events back onto window properties.
// Native open/save dialogs come from rfd.

use crate::config::ConfigManager;
use crate::models::{
    CompletedConversion, ConversionRequest, PageRange, SourceKind, UserConfig, VoiceCatalog,
    WORKING_FRAME_COUNT,
};
use crate::services::extraction;
use crate::state::{StateChange, StateManager};
use crate::ui::bridge::EventLoopBridge;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// Include the generated Slint code
slint::include_modules!();

/// Interval between frames of the textual working animation.
const WORKING_TICK: Duration = Duration::from_millis(500);

/// Label shown before any source document has been chosen.
const IDLE_SOURCE_LABEL: &str = "Upload a PDF file";

/// Owns the window and wires its callbacks to the rest of the application.
///
/// Everything the controller works with is injected: the state manager, the
/// voice catalog probed at startup, and the sender half of the worker's
/// request channel. The controller never runs a conversion itself; it
/// validates, dispatches, and repaints.
///
/// ```ignore
/// let controller = GuiController::new(
///     state_manager,
///     config_manager,
///     user_config,
///     voice_catalog,
///     worker.sender(),
///     runtime.handle().clone(),
/// )?;
/// controller.run()?; // blocks until the window closes
/// ```
pub struct GuiController {
    ui: MainWindow,

    /// Kept alive for its handler thread; callbacks hold cheap handles.
    _bridge: EventLoopBridge<MainWindow>,

    /// Configuration manager for persisting preferences on exit
    config_manager: Arc<ConfigManager>,

    /// Preferences as loaded at startup; rate and voice are refreshed from
    /// the UI before saving
    config: UserConfig,

    /// Voices offered by the TTS engine, immutable after startup
    catalog: Arc<VoiceCatalog>,
}

impl GuiController {
    /// Build the window, populate it from the preferences and catalog, and
    /// wire every callback. Nothing runs until [`run()`](Self::run).
    pub fn new(
        state_manager: Arc<StateManager>,
        config_manager: Arc<ConfigManager>,
        config: UserConfig,
        catalog: Arc<VoiceCatalog>,
        request_tx: mpsc::Sender<ConversionRequest>,
        tokio_handle: tokio::runtime::Handle,
    ) -> Result<Self> {
        let ui = MainWindow::new().context("Failed to create Slint UI")?;
        let bridge = EventLoopBridge::new(&ui, tokio_handle);

        // Initial UI population from config and catalog
        Self::sync_ui_with_config(&ui, &catalog, &config);

        // Set up Slint callbacks
        Self::setup_callbacks(&ui, &bridge, &state_manager, &catalog, request_tx);

        Self::setup_state_subscription(&bridge, &state_manager);

        tracing::info!("GUI controller initialized");

        Ok(Self {
            ui,
            _bridge: bridge,
            config_manager,
            config,
            catalog,
        })
    }

    /// Run the Slint event loop. Blocks until the window closes, then
    /// persists the current rate and voice selection.
    pub fn run(self) -> Result<(), slint::PlatformError> {
        tracing::info!("Starting GUI event loop");
        let result = self.ui.run();
        self.save_preferences();
        result
    }

    /// Persist the user's last rate and voice selection.
    ///
    /// Called after the event loop has exited. Failures are logged and
    /// swallowed; losing preferences must not turn a clean shutdown into an
    /// error.
    fn save_preferences(&self) {
        let mut config = self.config.clone();
        config.settings.rate_wpm = self.ui.get_rate_wpm().round() as u32;

        let index = self.ui.get_voice_index();
        if index >= 0 {
            if let Some(voice) = self.catalog.by_index(index as usize) {
                config.settings.preferred_voice = voice.name.clone();
            }
        }

        match self.config_manager.save_user_config(&config) {
            Ok(()) => tracing::info!("Preferences saved"),
            Err(e) => tracing::warn!("Failed to save preferences: {:#}", e),
        }
    }

    /// Populate the UI from the loaded preferences and the voice catalog.
    ///
    /// This is called once at startup, before the event loop runs.
    fn sync_ui_with_config(ui: &MainWindow, catalog: &VoiceCatalog, config: &UserConfig) {
        let names: Vec<slint::SharedString> = catalog
            .display_names()
            .iter()
            .map(|name| name.as_str().into())
            .collect();
        ui.set_voice_names(slint::ModelRc::new(slint::VecModel::from(names)));

        if let Some(preferred) = config.preferred_voice() {
            match catalog.position_of(preferred) {
                Some(index) => ui.set_voice_index(index as i32),
                None => tracing::warn!("Preferred voice '{}' is not in the catalog", preferred),
            }
        }

        ui.set_rate_wpm(config.normalized_rate() as f32);
        ui.set_source_label(IDLE_SOURCE_LABEL.into());
        ui.set_status_line("".into());
        ui.set_pages_visible(false);
        ui.set_source_loaded(false);
        ui.set_converting(false);

        tracing::debug!(
            "UI initialized with {} voices, rate {} wpm",
            catalog.len(),
            config.normalized_rate()
        );
    }

    /// Connect every window callback to its handler.
    fn setup_callbacks(
        ui: &MainWindow,
        bridge: &EventLoopBridge<MainWindow>,
        state_manager: &Arc<StateManager>,
        catalog: &Arc<VoiceCatalog>,
        request_tx: mpsc::Sender<ConversionRequest>,
    ) {
        let state = Arc::clone(state_manager);
        let ui_weak = ui.as_weak();

        // Upload callback: pick a source file and load it
        ui.on_browse_source(move || {
            tracing::debug!("Upload clicked");

            let Some(path) = Self::show_file_picker(
                "Select a file",
                vec![("PDF, EPUB file", &["pdf", "epub"]), ("All Files", &["*"])],
            ) else {
                // Cancelled: nothing changes
                return;
            };

            let Some(kind) = SourceKind::from_path(&path) else {
                tracing::warn!("Rejected source with unsupported extension: {}", path);
                if let Some(ui) = ui_weak.upgrade() {
                    ui.set_invalid_format_message("Please select a valid file.".into());
                    ui.set_show_invalid_format(true);
                }
                return;
            };

            // PDFs are probed for their page count up front so the page
            // selectors can be bounded.
            let page_count = match kind {
                SourceKind::Pdf => match extraction::pdf_page_count(&path) {
                    Ok(count) => Some(count),
                    Err(e) => {
                        tracing::error!("Failed to read page count of {}: {:#}", path, e);
                        Self::show_error_dialog(
                            &ui_weak,
                            "Could Not Open File",
                            "The selected file could not be opened as a PDF.",
                            format!("{e:#}"),
                        );
                        return;
                    }
                },
                SourceKind::Epub => None,
            };

            tracing::info!("Source selected: {} ({})", path, kind.label());
            state.load_source(path, kind, page_count);
        });

        let bridge_handle = bridge.clone_handle();
        let state = Arc::clone(state_manager);
        let catalog_clone = Arc::clone(catalog);
        let ui_weak = ui.as_weak();

        // Convert callback: collect the request, ask for a destination,
        // dispatch to the worker
        ui.on_start_conversion(move || {
            tracing::info!("Convert clicked");

            let Some(ui) = ui_weak.upgrade() else {
                return;
            };

            let snapshot = state.snapshot();
            if snapshot.is_converting {
                tracing::warn!("Convert clicked while a conversion is already running");
                return;
            }
            let (Some(source), Some(kind)) = (snapshot.source_path.clone(), snapshot.source_kind)
            else {
                tracing::warn!("Convert clicked with no source loaded");
                return;
            };

            let voice_index = ui.get_voice_index().max(0) as usize;
            let Some(voice) = catalog_clone.by_index(voice_index) else {
                tracing::error!("No voice available at index {}", voice_index);
                Self::show_error_dialog(
                    &ui_weak,
                    "No Voices Available",
                    "The TTS engine reported no voices, so nothing can be synthesized.",
                    "Check that the TTS engine is installed and on PATH, then restart.",
                );
                return;
            };

            let rate_wpm = ui.get_rate_wpm().round() as u32;
            let pages = if snapshot.has_page_selection() {
                let requested = PageRange::new(
                    ui.get_initial_page().max(1) as u32,
                    ui.get_final_page().max(1) as u32,
                );
                Some(snapshot.clamp_page_range(requested))
            } else {
                None
            };

            let Some(destination) = Self::show_save_picker("Save Audio", &source) else {
                tracing::debug!("Save dialog cancelled");
                return;
            };

            let request = ConversionRequest {
                source,
                kind,
                destination,
                voice_id: voice.id.clone(),
                rate_wpm,
                pages,
            };
            tracing::info!(
                "Dispatching conversion: {} -> {} (voice: {}, rate: {} wpm)",
                request.source,
                request.destination,
                request.voice_id,
                request.rate_wpm
            );

            state.start_conversion();
            if let Err(e) = request_tx.try_send(request) {
                tracing::error!("Failed to dispatch conversion request: {}", e);
                state.finish_conversion(CompletedConversion::failed(
                    "The conversion worker is not running",
                ));
                return;
            }

            // Drive the working animation until the conversion finishes.
            let ticker_state = state.clone();
            bridge_handle.spawn_async(move || async move {
                let mut interval = tokio::time::interval(WORKING_TICK);
                // The first tick completes immediately
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if !ticker_state.read(|s| s.is_converting) {
                        break;
                    }
                    ticker_state.advance_working_frame();
                }
            });
        });

        let ui_weak = ui.as_weak();

        ui.on_error_dialog_dismissed(move || {
            tracing::debug!("Error dialog dismissed");

            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_error_dialog(false);
            }
        });

        let ui_weak = ui.as_weak();

        // Invalid format dialog dismissed - the previous source, if any,
        // stays loaded
        ui.on_invalid_format_dismissed(move || {
            tracing::debug!("Invalid format dialog dismissed");

            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_invalid_format(false);
            }
        });

        let ui_weak = ui.as_weak();

        // Close confirmation - user wants to exit despite a running conversion
        ui.on_close_confirmation_proceed(move || {
            tracing::info!("User confirmed exit during conversion");

            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_close_confirmation(false);
                ui.window().hide().ok();
            }
        });

        let ui_weak = ui.as_weak();

        // Close confirmation - user wants to keep the conversion running
        ui.on_close_confirmation_cancelled(move || {
            tracing::info!("User cancelled exit - conversion continues");

            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_close_confirmation(false);
            }
        });

        let state = Arc::clone(state_manager);
        let ui_weak = ui.as_weak();

        ui.window().on_close_requested(move || {
            let is_converting = state.read(|s| s.is_converting);

            if is_converting {
                tracing::info!("Close requested during conversion - showing confirmation dialog");

                if let Some(ui) = ui_weak.upgrade() {
                    ui.set_show_close_confirmation(true);
                }

                // The user must confirm before the window goes away
                slint::CloseRequestResponse::KeepWindowShown
            } else {
                tracing::info!("Close requested - allowing window to close");

                slint::CloseRequestResponse::HideWindow
            }
        });

        tracing::debug!("UI callbacks configured");
    }

    /// Spawn the thread that turns [`StateChange`] events into UI property
    /// updates, routed through the bridge onto the event loop.
    fn setup_state_subscription(
        bridge: &EventLoopBridge<MainWindow>,
        state_manager: &Arc<StateManager>,
    ) {
        let bridge_handle = bridge.clone_handle();
        let mut rx = state_manager.subscribe();

        std::thread::spawn(move || {
            tracing::debug!("State subscription thread started");

            loop {
                match rx.blocking_recv() {
                    Ok(change) => {
                        tracing::trace!("State change received: {:?}", change);

                        match change {
                            StateChange::SourceLoaded {
                                path,
                                kind,
                                page_count,
                            } => {
                                tracing::debug!("Source loaded: {} ({})", path, kind.label());
                                bridge_handle.update_ui(move |ui| {
                                    ui.set_source_label(path.as_str().into());
                                    ui.set_status_line("".into());
                                    ui.set_source_loaded(true);

                                    if kind == SourceKind::Pdf {
                                        let count = page_count.unwrap_or(1).max(1);
                                        ui.set_page_count(count as i32);
                                        ui.set_initial_page(1);
                                        ui.set_final_page(1);
                                        ui.set_pages_visible(true);
                                    } else {
                                        ui.set_pages_visible(false);
                                    }
                                });
                            }

                            StateChange::ConversionStarted => {
                                tracing::info!("Conversion started");
                                bridge_handle.update_ui(|ui| {
                                    ui.set_converting(true);
                                    ui.set_status_line(Self::working_status(0).into());
                                });
                            }

                            StateChange::WorkingFrameAdvanced { frame } => {
                                bridge_handle.update_ui(move |ui| {
                                    ui.set_status_line(Self::working_status(frame).into());
                                });
                            }

                            StateChange::ConversionFinished { completed } => {
                                tracing::info!(
                                    "Conversion finished: success={}, message={}",
                                    completed.success,
                                    completed.message
                                );
                                bridge_handle.update_ui(move |ui| {
                                    ui.set_converting(false);

                                    if completed.success {
                                        ui.set_status_line(completed.message.as_str().into());
                                    } else {
                                        ui.set_status_line("".into());
                                        ui.set_error_title("Conversion Failed".into());
                                        ui.set_error_message(completed.message.as_str().into());
                                        ui.set_error_details(
                                            completed
                                                .destination
                                                .as_ref()
                                                .map(|d| d.to_string())
                                                .unwrap_or_default()
                                                .into(),
                                        );
                                        ui.set_show_error_dialog(true);
                                    }
                                });
                            }

                            StateChange::StateReset => {
                                tracing::info!("State reset");
                                bridge_handle.update_ui(|ui| {
                                    ui.set_source_label(IDLE_SOURCE_LABEL.into());
                                    ui.set_status_line("".into());
                                    ui.set_source_loaded(false);
                                    ui.set_converting(false);
                                    ui.set_pages_visible(false);
                                    ui.set_page_count(1);
                                    ui.set_initial_page(1);
                                    ui.set_final_page(1);
                                });
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        tracing::info!(
                            "State broadcast channel closed - shutting down subscription thread"
                        );
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "State subscription lagged - {} events were skipped. Consider increasing broadcast buffer size.",
                            skipped
                        );
                        // Recoverable; keep receiving
                    }
                }
            }

            tracing::debug!("State subscription thread terminated gracefully");
        });
    }

    /// Status line for a frame of the working animation.
    fn working_status(frame: u8) -> String {
        format!(
            "Converting, please wait{}",
            ".".repeat(usize::from(frame % WORKING_FRAME_COUNT))
        )
    }

    /// Suggested output file name for the save dialog.
    fn default_output_name(source: &Utf8Path) -> String {
        format!("{}.wav", source.file_stem().unwrap_or("audio"))
    }

    /// Raise the modal error dialog. `details` may be empty.
    fn show_error_dialog(
        ui_weak: &slint::Weak<MainWindow>,
        title: impl Into<slint::SharedString>,
        message: impl Into<slint::SharedString>,
        details: impl Into<slint::SharedString>,
    ) {
        if let Some(ui) = ui_weak.upgrade() {
            ui.set_error_title(title.into());
            ui.set_error_message(message.into());
            ui.set_error_details(details.into());
            ui.set_show_error_dialog(true);
        }
    }

    /// Native open dialog. Returns `None` when cancelled or when the chosen
    /// path is not valid UTF-8.
    fn show_file_picker(title: &str, filters: Vec<(&str, &[&str])>) -> Option<Utf8PathBuf> {
        use rfd::FileDialog;

        let mut dialog = FileDialog::new().set_title(title);

        for (name, extensions) in filters {
            dialog = dialog.add_filter(name, extensions);
        }

        dialog.pick_file().and_then(|path| {
            Utf8PathBuf::try_from(path)
                .map_err(|e| {
                    tracing::error!("Failed to convert path to UTF-8: {}", e);
                    e
                })
                .ok()
        })
    }

    /// Native save dialog for the output WAV file, preseeded with a name
    /// derived from the source document. Returns `None` when cancelled.
    fn show_save_picker(title: &str, source: &Utf8Path) -> Option<Utf8PathBuf> {
        use rfd::FileDialog;

        FileDialog::new()
            .set_title(title)
            .add_filter("WAV audio", &["wav"])
            .set_file_name(Self::default_output_name(source))
            .save_file()
            .and_then(|path| {
                Utf8PathBuf::try_from(path)
                    .map_err(|e| {
                        tracing::error!("Failed to convert path to UTF-8: {}", e);
                        e
                    })
                    .ok()
            })
    }
}
