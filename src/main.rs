//! ReadAloud binary entry point.
//!
//! Startup order: preferences from `ReadAloud Data/ReadAloud Settings.yaml`
//! (missing file means defaults; it is written back on exit), then logging,
//! then a tokio runtime, the voice probe, the conversion worker, and finally
//! the Slint window, which owns the main thread until it closes.
//!
//! Three execution contexts run at once:
//! - the main thread, inside the Slint event loop;
//! - tokio workers, running the conversion pipeline and the TTS subprocess;
//! - one plain thread per window, feeding state changes back into the loop.
//!
//! Runs wherever Slint has a backend and the espeak-ng binary is on PATH.

use anyhow::Result;
use readaloud::services::{ConversionService, ConversionWorker, EspeakEngine, TtsEngine};
use readaloud::ui::GuiController;
use readaloud::{ConfigManager, StateManager, VoiceCatalog, APP_NAME, VERSION};
use std::sync::Arc;

/// Fails if the settings file is present but invalid, or if logging, the
/// runtime, or the window cannot be brought up. A dead TTS engine is not
/// fatal; see the catalog probe below.
fn main() -> Result<()> {
    // Preferences decide the log directory and log level, so they load
    // before logging exists. Tracing calls made during this load go nowhere.
    let config_manager = Arc::new(ConfigManager::new("ReadAloud Data")?);
    let user_config = config_manager.load_user_config()?;

    // Setup logging with both file and console output. The guard must stay
    // alive for the whole run or buffered log lines are lost on exit.
    let _guard = readaloud::logging::init(
        camino::Utf8Path::new(&user_config.settings.log_dir),
        readaloud::logging::LogLevel::from_debug_flag(user_config.settings.debug_mode),
        true,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!(
        "Preferences loaded - engine: {}, rate: {} WPM, debug: {}",
        user_config.settings.engine_command,
        user_config.normalized_rate(),
        user_config.settings.debug_mode
    );

    // Subprocess execution and the conversion pipeline live here
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("readaloud-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 4);

    let state_manager = Arc::new(StateManager::new());

    // Ask the engine for its voices before the window opens. A failure here
    // is survivable: the window still opens with an empty voice list and the
    // problem surfaces as a dialog when a conversion is attempted.
    let engine: Arc<dyn TtsEngine> =
        Arc::new(EspeakEngine::new(user_config.settings.engine_command.clone()));
    let catalog = match runtime.block_on(engine.voices()) {
        Ok(voices) => VoiceCatalog::from_voices(voices),
        Err(e) => {
            tracing::error!("Failed to list voices from {}: {:#}", engine.name(), e);
            VoiceCatalog::default()
        }
    };
    tracing::info!("Voice catalog ready with {} voices", catalog.len());

    // Requests flow to the worker over a channel; results come back as
    // state changes
    let service = Arc::new(ConversionService::new(engine));
    let worker = ConversionWorker::spawn(runtime.handle(), service, state_manager.clone());

    let gui_controller = GuiController::new(
        state_manager.clone(),
        config_manager,
        user_config,
        Arc::new(catalog),
        worker.sender(),
        runtime.handle().clone(),
    )?;

    tracing::info!("GUI controller initialized, launching window");

    // Blocks on the event loop; the runtime keeps serving in the background
    let result = gui_controller.run();

    tracing::info!("GUI closed, shutting down");

    // An in-flight conversion cannot finish once the window is gone; the
    // runtime shutdown below drops the worker task and kills the engine process
    if state_manager.read(|s| s.is_converting) {
        tracing::warn!("Window closed during a conversion - abandoning the job");
    }

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    tracing::info!("Application shutdown complete");

    result.map_err(|e| {
        tracing::error!("GUI error: {}", e);
        anyhow::anyhow!("GUI error: {}", e)
    })
}
