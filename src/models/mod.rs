//! Data models for the ReadAloud application.
//!
//! This module contains all the core data structures used throughout the application:
//! - [`AppState`]: The central state container holding the loaded source, workflow flags and the last result
//! - [`ConversionRequest`]: One conversion job as assembled by the UI and consumed by the worker
//! - [`VoiceCatalog`]: Ordered display-name to voice-handle mapping, built once at startup
//! - [`UserConfig`]: User preferences loaded from `ReadAloud Settings.yaml`
//! - [`MAX_CONCURRENT_CONVERSIONS`]: Critical concurrency limit constant (always 1, enforced by the UI and the worker loop)
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager) for thread-safe access
//! - **Immutable**: State updates go through StateManager's `update()` method to ensure consistency

pub mod app_state;
pub mod config;
pub mod conversion;

pub use app_state::{AppState, MAX_CONCURRENT_CONVERSIONS, WORKING_FRAME_COUNT};
pub use config::UserConfig;
pub use conversion::{
    CompletedConversion, ConversionRequest, DEFAULT_RATE_WPM, MAX_RATE_WPM, MIN_RATE_WPM,
    PageRange, SourceKind, VoiceCatalog, VoiceInfo,
};
