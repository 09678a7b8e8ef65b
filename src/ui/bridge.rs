// EventLoopBridge - Coordinates between the tokio runtime and the Slint event loop
//
// The application runs two event loops at once:
// 1. Slint's single-threaded GUI event loop
// 2. Tokio's multi-threaded runtime, where conversions and subprocesses run
//
// The bridge marshals work between them: UI property updates can be queued
// from any tokio task, and Slint callbacks can spawn async work on the
// runtime without blocking the GUI thread.

use slint::{ComponentHandle, Weak};
use std::future::Future;
use tokio::sync::mpsc;

/// Updates queued while the event loop is busy are bounded so a stalled GUI
/// cannot accumulate unbounded memory. Stale updates are dropped with a
/// warning instead.
const UI_UPDATE_CAPACITY: usize = 100;

type UiUpdate<T> = Box<dyn FnOnce(&T) + Send>;

/// Marshals work between the tokio runtime and the Slint event loop.
///
/// Construct one per window. Use [`EventLoopBridge::update_ui`] to mutate UI
/// properties from background tasks and [`EventLoopBridge::spawn_async`] to
/// launch async work from Slint callbacks. [`EventLoopBridge::clone_handle`]
/// produces a cheap [`EventLoopBridgeHandle`] that callbacks can capture by
/// value.
///
/// # Example
/// ```ignore
/// let bridge = EventLoopBridge::new(&ui, runtime.handle().clone());
/// let handle = bridge.clone_handle();
///
/// // From a background task, once a conversion finishes:
/// handle.update_ui(|ui| {
///     ui.set_status_line("Done!".into());
///     ui.set_converting(false);
/// });
/// ```
pub struct EventLoopBridge<T: ComponentHandle> {
    ui_weak: Weak<T>,
    tokio_handle: tokio::runtime::Handle,
    ui_update_tx: mpsc::Sender<UiUpdate<T>>,
}

impl<T: ComponentHandle + 'static> EventLoopBridge<T> {
    /// Create the bridge and start its handler thread.
    ///
    /// The handler thread drains queued updates and re-queues each one onto
    /// the Slint event loop with `Weak::upgrade_in_event_loop`, which is the
    /// only safe way to touch UI properties from another thread. The thread
    /// exits on its own when the event loop shuts down or every sender is
    /// dropped.
    pub fn new(ui: &T, tokio_handle: tokio::runtime::Handle) -> Self {
        let ui_weak = ui.as_weak();
        let (ui_update_tx, mut ui_update_rx) = mpsc::channel::<UiUpdate<T>>(UI_UPDATE_CAPACITY);

        let ui_weak_clone = ui_weak.clone();
        std::thread::spawn(move || {
            tracing::debug!("EventLoopBridge handler thread started");

            while let Some(update_fn) = ui_update_rx.blocking_recv() {
                let queued = ui_weak_clone.upgrade_in_event_loop(move |ui| {
                    update_fn(&ui);
                });

                if let Err(e) = queued {
                    // The event loop has stopped; nothing left to update.
                    tracing::warn!("Failed to queue UI update to event loop: {:?}", e);
                    break;
                }
            }

            tracing::debug!("EventLoopBridge handler thread terminated");
        });

        Self {
            ui_weak,
            tokio_handle,
            ui_update_tx,
        }
    }

    /// Schedule a UI update from any thread.
    ///
    /// The closure runs on the Slint event loop thread during its next
    /// iteration. If the queue is full or the handler thread has stopped the
    /// update is dropped with a warning; state-driven updates are repainted
    /// from the next state change, so a dropped frame is not fatal.
    pub fn update_ui<F>(&self, update: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        send_ui_update(&self.ui_update_tx, update);
    }

    /// Spawn an async task on the tokio runtime from a Slint callback.
    pub fn spawn_async<F, Fut>(&self, future_factory: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tokio_handle.spawn(async move {
            future_factory().await;
        });
    }

    /// Produce a cloneable handle for capture in Slint callbacks.
    pub fn clone_handle(&self) -> EventLoopBridgeHandle<T> {
        EventLoopBridgeHandle {
            ui_weak: self.ui_weak.clone(),
            tokio_handle: self.tokio_handle.clone(),
            ui_update_tx: self.ui_update_tx.clone(),
        }
    }
}

fn send_ui_update<T, F>(tx: &mpsc::Sender<UiUpdate<T>>, update: F)
where
    T: ComponentHandle,
    F: FnOnce(&T) + Send + 'static,
{
    match tx.try_send(Box::new(update)) {
        Ok(_) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("UI update channel full - dropping update");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::warn!("Failed to send UI update - handler thread has stopped");
        }
    }
}

/// Cloneable companion to [`EventLoopBridge`].
///
/// Slint callbacks capture their environment by value, and several callbacks
/// usually need the bridge at once, so this handle carries clones of the
/// channel sender and runtime handle rather than the bridge itself.
pub struct EventLoopBridgeHandle<T: ComponentHandle> {
    ui_weak: Weak<T>,
    tokio_handle: tokio::runtime::Handle,
    ui_update_tx: mpsc::Sender<UiUpdate<T>>,
}

// Manual Clone implementation to avoid requiring T: Clone
impl<T: ComponentHandle> Clone for EventLoopBridgeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            ui_weak: self.ui_weak.clone(),
            tokio_handle: self.tokio_handle.clone(),
            ui_update_tx: self.ui_update_tx.clone(),
        }
    }
}

impl<T: ComponentHandle + 'static> EventLoopBridgeHandle<T> {
    /// Schedule a UI update from any thread.
    ///
    /// See [`EventLoopBridge::update_ui`].
    pub fn update_ui<F>(&self, update: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        send_ui_update(&self.ui_update_tx, update);
    }

    /// Spawn an async task on the tokio runtime.
    ///
    /// See [`EventLoopBridge::spawn_async`].
    pub fn spawn_async<F, Fut>(&self, future_factory: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tokio_handle.spawn(async move {
            future_factory().await;
        });
    }

    /// Weak reference to the UI component, for custom upgrade logic.
    pub fn ui_weak(&self) -> &Weak<T> {
        &self.ui_weak
    }
}
