// State management module
//
// StateManager wraps AppState in Arc<RwLock<T>> and broadcasts a change
// event for every observable mutation, so the GUI never has to poll.

use crate::models::{AppState, CompletedConversion, SourceKind};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Events broadcast after each state mutation. The GUI subscribes and maps
/// each variant onto property updates.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A valid source document has been loaded
    SourceLoaded {
        path: Utf8PathBuf,
        kind: SourceKind,
        /// True page count for PDFs, `None` for EPUBs
        page_count: Option<usize>,
    },

    /// A conversion request has been dispatched to the worker
    ConversionStarted,

    /// The working animation advanced by one frame
    WorkingFrameAdvanced {
        frame: u8,
    },

    /// The worker finished, successfully or not
    ConversionFinished {
        completed: CompletedConversion,
    },

    /// State has been reset
    StateReset,
}

/// Owner of the shared [`AppState`], with change detection and broadcast.
///
/// All mutations go through [`update()`](Self::update), which diffs the old
/// and new state and sends one [`StateChange`] per observable difference.
/// Reads go through [`read()`](Self::read) or [`snapshot()`](Self::snapshot);
/// nothing outside this module locks the inner `RwLock` directly. The
/// [`GuiController`](crate::ui::controller::GuiController) is the main
/// subscriber.
pub struct StateManager {
    state: Arc<RwLock<AppState>>,

    /// Every subscriber sees every event; send errors (no receivers yet)
    /// are ignored.
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// New manager around a default [`AppState`]. The broadcast channel
    /// buffers 100 events, far beyond what one conversion produces.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Clone of the current state, usable without holding any lock.
    /// Prefer [`read()`](Self::read) for single-field checks.
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Run a closure against the state under the read lock.
    ///
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_converting);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Apply a mutation and broadcast the resulting events.
    ///
    /// The old state is captured before `update_fn` runs; afterwards the two
    /// are diffed and each observable difference is sent to the subscribers.
    /// Returns the emitted events, which the unit tests assert on directly.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();
        update_fn(&mut state);
        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // No receivers yet is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Receiver for all future state changes. Any number of subscribers can
    /// listen at once.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Diff two states into the events [`update()`](Self::update) emits.
    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        // Source document changes
        if (old.source_path != new.source_path
            || old.source_kind != new.source_kind
            || old.page_count != new.page_count)
            && new.is_source_loaded()
        {
            if let (Some(path), Some(kind)) = (new.source_path.clone(), new.source_kind) {
                changes.push(StateChange::SourceLoaded {
                    path,
                    kind,
                    page_count: new.page_count,
                });
            }
        }

        // Conversion lifecycle changes
        if old.is_converting != new.is_converting {
            if new.is_converting {
                changes.push(StateChange::ConversionStarted);
            } else {
                let completed = new.last_completed.clone().unwrap_or_else(|| {
                    CompletedConversion::failed("conversion ended without a result")
                });
                changes.push(StateChange::ConversionFinished { completed });
            }
        }

        // Animation frame changes
        if old.working_frame != new.working_frame {
            changes.push(StateChange::WorkingFrameAdvanced {
                frame: new.working_frame,
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Record a freshly uploaded source document
    ///
    /// Clears the previous completion marker so the label goes back to
    /// showing just the new path. Always emits [`StateChange::SourceLoaded`]:
    /// re-uploading the file that just finished converting changes no source
    /// field, so the diff alone would stay silent and the UI would keep the
    /// stale completion marker.
    pub fn load_source(
        &self,
        path: Utf8PathBuf,
        kind: SourceKind,
        page_count: Option<usize>,
    ) -> Vec<StateChange> {
        let loaded_event = StateChange::SourceLoaded {
            path: path.clone(),
            kind,
            page_count,
        };
        let mut changes = self.update(|state| {
            state.source_path = Some(path);
            state.source_kind = Some(kind);
            state.page_count = page_count;
            state.last_completed = None;
        });

        if !changes
            .iter()
            .any(|c| matches!(c, StateChange::SourceLoaded { .. }))
        {
            let _ = self.state_tx.send(loaded_event.clone());
            changes.push(loaded_event);
        }

        changes
    }

    /// Mark a conversion as dispatched
    pub fn start_conversion(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.is_converting = true;
            state.working_frame = 0;
            state.last_completed = None;
        })
    }

    /// Record the worker's result and leave the Converting state
    pub fn finish_conversion(&self, completed: CompletedConversion) -> Vec<StateChange> {
        self.update(|state| {
            state.is_converting = false;
            state.working_frame = 0;
            state.last_completed = Some(completed);
        })
    }

    /// Advance the working animation by one frame
    ///
    /// A no-op once the conversion has finished, so a late timer tick cannot
    /// overwrite the completion message.
    pub fn advance_working_frame(&self) -> Vec<StateChange> {
        self.update(|state| {
            if state.is_converting {
                state.advance_working_frame();
            }
        })
    }

    /// Reset all state back to Idle
    pub fn reset_state(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.reset();
        });

        // Reset is not derivable from a field diff, so it is sent explicitly
        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }

    /// The shared state itself, for code that needs to hold it across
    /// threads without going through a manager clone.
    pub fn state_arc(&self) -> Arc<RwLock<AppState>> {
        Arc::clone(&self.state)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same state and broadcast channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_converting);
        assert!(!state.is_source_loaded());
        assert_eq!(state.working_frame, 0);
    }

    #[test]
    fn test_load_source_emits_event() {
        let manager = StateManager::new();

        let changes = manager.load_source(
            Utf8PathBuf::from("/books/novel.pdf"),
            SourceKind::Pdf,
            Some(320),
        );

        assert_eq!(changes.len(), 1);
        match &changes[0] {
            StateChange::SourceLoaded {
                path,
                kind,
                page_count,
            } => {
                assert_eq!(path, "/books/novel.pdf");
                assert_eq!(*kind, SourceKind::Pdf);
                assert_eq!(*page_count, Some(320));
            }
            other => panic!("Expected SourceLoaded, got: {:?}", other),
        }

        let state = manager.snapshot();
        assert!(state.is_source_loaded());
        assert!(state.has_page_selection());
    }

    #[test]
    fn test_load_source_clears_previous_completion() {
        let manager = StateManager::new();
        manager.start_conversion();
        manager.finish_conversion(CompletedConversion::succeeded(Utf8PathBuf::from(
            "/tmp/out.wav",
        )));

        manager.load_source(Utf8PathBuf::from("/books/next.epub"), SourceKind::Epub, None);

        let state = manager.snapshot();
        assert!(state.last_completed.is_none());
    }

    #[test]
    fn test_reload_same_source_after_completion_emits_event() {
        let manager = StateManager::new();
        let path = Utf8PathBuf::from("/books/novel.pdf");

        manager.load_source(path.clone(), SourceKind::Pdf, Some(12));
        manager.start_conversion();
        manager.finish_conversion(CompletedConversion::succeeded(Utf8PathBuf::from(
            "/tmp/novel.wav",
        )));

        // Same path, same kind, same page count: no source field differs,
        // but the UI still needs the event to drop the completion marker
        let changes = manager.load_source(path.clone(), SourceKind::Pdf, Some(12));

        assert!(
            changes
                .iter()
                .any(|c| matches!(c, StateChange::SourceLoaded { .. })),
            "Expected SourceLoaded, got: {:?}",
            changes
        );
        let state = manager.snapshot();
        assert!(state.last_completed.is_none());
        assert_eq!(state.source_path, Some(path));
    }

    #[test]
    fn test_conversion_lifecycle_events() {
        let manager = StateManager::new();

        let changes = manager.start_conversion();
        assert!(matches!(changes[0], StateChange::ConversionStarted));
        assert!(manager.read(|s| s.is_converting));

        let changes = manager.finish_conversion(CompletedConversion::succeeded(
            Utf8PathBuf::from("/tmp/out.wav"),
        ));
        match &changes[0] {
            StateChange::ConversionFinished { completed } => {
                assert!(completed.success);
                assert_eq!(completed.message, "Done!");
            }
            other => panic!("Expected ConversionFinished, got: {:?}", other),
        }
        assert!(!manager.read(|s| s.is_converting));
    }

    #[test]
    fn test_failed_conversion_carries_message() {
        let manager = StateManager::new();
        manager.start_conversion();

        let changes =
            manager.finish_conversion(CompletedConversion::failed("engine exited with status 1"));

        match &changes[0] {
            StateChange::ConversionFinished { completed } => {
                assert!(!completed.success);
                assert_eq!(completed.message, "engine exited with status 1");
            }
            other => panic!("Expected ConversionFinished, got: {:?}", other),
        }
    }

    #[test]
    fn test_frame_advance_only_while_converting() {
        let manager = StateManager::new();

        // Not converting: tick is swallowed
        let changes = manager.advance_working_frame();
        assert!(changes.is_empty());

        manager.start_conversion();
        let changes = manager.advance_working_frame();
        assert!(matches!(
            changes[0],
            StateChange::WorkingFrameAdvanced { frame: 1 }
        ));

        // After finishing, late ticks are swallowed again
        manager.finish_conversion(CompletedConversion::succeeded(Utf8PathBuf::from(
            "/tmp/out.wav",
        )));
        let changes = manager.advance_working_frame();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_frame_wraps_around() {
        let manager = StateManager::new();
        manager.start_conversion();

        for _ in 0..3 {
            manager.advance_working_frame();
        }
        assert_eq!(manager.read(|s| s.working_frame), 3);

        let changes = manager.advance_working_frame();
        assert!(matches!(
            changes[0],
            StateChange::WorkingFrameAdvanced { frame: 0 }
        ));
    }

    #[test]
    fn test_reset_state() {
        let manager = StateManager::new();
        manager.load_source(Utf8PathBuf::from("/books/a.pdf"), SourceKind::Pdf, Some(5));

        let changes = manager.reset_state();
        assert!(changes.iter().any(|c| matches!(c, StateChange::StateReset)));

        let state = manager.snapshot();
        assert!(!state.is_source_loaded());
        assert!(state.page_count.is_none());
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.start_conversion();

        let event = rx.try_recv();
        assert!(event.is_ok());
        assert!(matches!(event.unwrap(), StateChange::ConversionStarted));
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.load_source(Utf8PathBuf::from("/books/a.epub"), SourceKind::Epub, None);

        // Both subscribers should receive the event
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_read_with_closure() {
        let manager = StateManager::new();
        manager.update(|state| {
            state.working_frame = 2;
        });

        let frame = manager.read(|state| state.working_frame);
        assert_eq!(frame, 2);
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        // Update through one manager
        manager1.update(|state| {
            state.working_frame = 3;
        });

        // Changes should be visible through the clone
        let state = manager2.snapshot();
        assert_eq!(state.working_frame, 3);
    }

    #[test]
    fn test_state_arc() {
        let manager = StateManager::new();
        let state_arc = manager.state_arc();

        // Modify through the Arc
        {
            let mut state = state_arc.write().unwrap();
            state.working_frame = 1;
        }

        // Changes should be visible through manager
        let state = manager.snapshot();
        assert_eq!(state.working_frame, 1);
    }
}
