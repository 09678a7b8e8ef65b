//! Services module - Pure business logic for document-to-speech conversion.
//!
//! This module contains the core pipeline that turns a PDF or EPUB file into
//! a spoken WAV file. The services are **framework-agnostic** and have no
//! dependencies on the UI layer, making them testable and reusable.
//!
//! # Components
//!
//! - [`ConversionService`]: Runs one conversion request end to end:
//!   - Validates the speech rate and page range
//!   - Extracts plain text from the source document
//!   - Hands the text to a [`TtsEngine`] for synthesis
//!
//! - [`ConversionWorker`]: Long-lived background task that consumes requests
//!   from the UI over a channel and publishes each outcome as a state change,
//!   success or failure alike.
//!
//! - [`TtsEngine`] / [`EspeakEngine`]: The synthesizer seam. [`EspeakEngine`]
//!   drives the `espeak-ng` command line tool; tests substitute their own
//!   implementations.
//!
//! - [`extraction`]: PDF page-range extraction via `lopdf` and EPUB spine
//!   traversal via `epub` with markup stripped by `html2text`.
//!
//! # Design Philosophy
//!
//! The services layer is designed to be:
//! - **Pure**: No side effects beyond file I/O and subprocess execution
//! - **Async**: Subprocess handling uses tokio for non-blocking I/O
//! - **Testable**: No hidden dependencies, all inputs are explicit parameters
//! - **Framework-agnostic**: No Slint, no GUI code, only business logic
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use readaloud::services::{ConversionService, ConversionWorker, EspeakEngine};
//!
//! let engine = Arc::new(EspeakEngine::new("espeak-ng"));
//! let service = Arc::new(ConversionService::new(engine));
//!
//! // Spawn the worker and hand its sender to the UI controller.
//! let worker = ConversionWorker::spawn(runtime.handle(), service, state);
//! let request_tx = worker.sender();
//! ```

pub mod conversion;
pub mod extraction;
pub mod synthesis;

pub use conversion::{ConversionError, ConversionOutcome, ConversionService, ConversionWorker};
pub use extraction::{extract_epub, extract_pdf_range, pdf_page_count};
pub use synthesis::{EspeakEngine, SYNTHESIS_TIMEOUT, SynthesisError, TtsEngine};
