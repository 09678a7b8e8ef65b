use camino::Utf8PathBuf;

use crate::models::conversion::{CompletedConversion, PageRange, SourceKind};

/// Maximum number of conversions running at the same time.
///
/// **IMPORTANT:** This is hardcoded to 1. The UI disables both the Upload
/// and Convert buttons while a job is outstanding, and the worker drains its
/// request channel one job at a time, so a second conversion can never start
/// while one is running.
///
/// # See Also
///
/// - [`crate::services::ConversionWorker`] - The single-consumer request loop
/// - [`crate::ui::GuiController`] - Disables the triggering controls
pub const MAX_CONCURRENT_CONVERSIONS: usize = 1;

/// Number of frames in the textual "working" animation (`""`, `"."`,
/// `".."`, `"..."`), advanced every 500ms while a conversion runs.
pub const WORKING_FRAME_COUNT: u8 = 4;

/// Single source of truth for all application state.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by
/// [`crate::state::StateManager`] to provide thread-safe access across the
/// application. Never access `AppState` directly - always use
/// [`StateManager`](crate::state::StateManager) methods:
/// - [`read()`](crate::state::StateManager::read) for read-only access
/// - [`update()`](crate::state::StateManager::update) for mutations with automatic change events
///
/// # Related Types
///
/// - [`crate::state::StateManager`]: Thread-safe wrapper with event emission
/// - [`crate::state::StateChange`]: Event types for state mutations
/// - [`crate::models::UserConfig`]: User preferences loaded from YAML
#[derive(Clone, Debug)]
pub struct AppState {
    // Loaded source document
    pub source_path: Option<Utf8PathBuf>,
    pub source_kind: Option<SourceKind>,
    /// True page count of the loaded PDF; `None` for EPUB sources.
    pub page_count: Option<usize>,

    // Runtime state
    pub is_converting: bool,
    /// Current frame of the working animation, `0..WORKING_FRAME_COUNT`.
    pub working_frame: u8,

    // Result of the most recent conversion
    pub last_completed: Option<CompletedConversion>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            // Loaded source document
            source_path: None,
            source_kind: None,
            page_count: None,

            // Runtime state
            is_converting: false,
            working_frame: 0,

            // Results
            last_completed: None,
        }
    }
}

impl AppState {
    /// Whether a valid source file has been loaded (the `FileLoaded` half of
    /// the Idle -> FileLoaded -> Converting cycle).
    pub fn is_source_loaded(&self) -> bool {
        self.source_path.is_some() && self.source_kind.is_some()
    }

    /// Whether the loaded source supports page-range selection.
    pub fn has_page_selection(&self) -> bool {
        matches!(self.source_kind, Some(SourceKind::Pdf))
    }

    /// Clamp a UI-provided page range into the loaded document's bounds.
    ///
    /// Mirrors the spin-box behaviour: `first` is forced into
    /// `[1, page_count]` and `last` into `[first, page_count]`.
    pub fn clamp_page_range(&self, range: PageRange) -> PageRange {
        let count = self.page_count.unwrap_or(1).max(1) as u32;
        let first = range.first.clamp(1, count);
        let last = range.last.clamp(first, count);
        PageRange { first, last }
    }

    /// The dots suffix for the current working-animation frame.
    pub fn working_dots(&self) -> String {
        ".".repeat(usize::from(self.working_frame % WORKING_FRAME_COUNT))
    }

    /// Advance the working animation by one frame, wrapping around.
    pub fn advance_working_frame(&mut self) {
        self.working_frame = (self.working_frame + 1) % WORKING_FRAME_COUNT;
    }

    /// Reset everything back to the Idle state.
    pub fn reset(&mut self) {
        self.source_path = None;
        self.source_kind = None;
        self.page_count = None;
        self.is_converting = false;
        self.working_frame = 0;
        self.last_completed = None;
    }
}
