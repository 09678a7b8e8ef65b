//! The conversion pipeline and its background worker.
//!
//! [`ConversionService`] runs one request end to end: validate, extract text
//! from the source document, synthesize it to a WAV file. [`ConversionWorker`]
//! owns the long-lived task that consumes requests from the UI and reports
//! every outcome back through the [`StateManager`], success or failure alike.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{
    CompletedConversion, ConversionRequest, MAX_RATE_WPM, MIN_RATE_WPM, SourceKind,
};
use crate::services::extraction;
use crate::services::synthesis::TtsEngine;
use crate::state::StateManager;

/// Capacity of the request channel. The UI allows a single outstanding
/// conversion, so anything beyond a couple of slots is headroom.
const REQUEST_CHANNEL_CAPACITY: usize = 8;

/// Errors raised by the conversion pipeline itself, as opposed to extraction
/// I/O failures or engine errors, which carry their own types.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Speech rate {0} WPM is outside the accepted range 100-500")]
    InvalidRate(u32),

    #[error("A page range is required for PDF sources")]
    MissingPageRange,

    #[error("Pages {first}-{last} do not fit a document with {page_count} pages")]
    PageRangeOutOfBounds {
        first: u32,
        last: u32,
        page_count: usize,
    },

    #[error("No text could be extracted from {0}")]
    EmptyExtraction(Utf8PathBuf),
}

/// Details of a successful conversion, for logging and tests.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub destination: Utf8PathBuf,
    pub characters: usize,
    pub elapsed: Duration,
}

/// Stateless pipeline that turns one [`ConversionRequest`] into a WAV file.
///
/// The TTS engine is injected so tests can substitute a fake and the rest of
/// the pipeline still runs for real.
pub struct ConversionService {
    engine: Arc<dyn TtsEngine>,
}

impl ConversionService {
    pub fn new(engine: Arc<dyn TtsEngine>) -> Self {
        Self { engine }
    }

    /// Run a single conversion to completion.
    ///
    /// Validates the request first: the rate must sit inside the accepted
    /// WPM range and a PDF request must carry a page range that still fits
    /// the document. The range is re-checked here even though the UI bounds
    /// its selectors, because the file can change on disk after loading.
    pub async fn execute(&self, request: &ConversionRequest) -> Result<ConversionOutcome> {
        let start = Instant::now();

        if !(MIN_RATE_WPM..=MAX_RATE_WPM).contains(&request.rate_wpm) {
            return Err(ConversionError::InvalidRate(request.rate_wpm).into());
        }

        let text = match request.kind {
            SourceKind::Pdf => {
                let pages = request.pages.ok_or(ConversionError::MissingPageRange)?;
                extraction::extract_pdf_range(&request.source, pages)?
            }
            SourceKind::Epub => extraction::extract_epub(&request.source)?,
        };

        if text.trim().is_empty() {
            return Err(ConversionError::EmptyExtraction(request.source.clone()).into());
        }

        self.engine
            .synthesize(&text, &request.destination, &request.voice_id, request.rate_wpm)
            .await?;

        let outcome = ConversionOutcome {
            destination: request.destination.clone(),
            characters: text.len(),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            "Converted {} to {} in {:.2}s ({} characters)",
            request.source,
            outcome.destination,
            outcome.elapsed.as_secs_f32(),
            outcome.characters
        );
        Ok(outcome)
    }
}

/// Handle to the background conversion task.
///
/// The worker runs for the lifetime of the application and processes requests
/// one at a time, in arrival order. It never touches the UI directly: each
/// finished request is published as a state change and the controller decides
/// how to present it.
pub struct ConversionWorker {
    request_tx: mpsc::Sender<ConversionRequest>,
}

impl ConversionWorker {
    /// Spawn the worker loop onto the given runtime.
    pub fn spawn(
        runtime: &tokio::runtime::Handle,
        service: Arc<ConversionService>,
        state: Arc<StateManager>,
    ) -> Self {
        let (request_tx, mut request_rx) = mpsc::channel::<ConversionRequest>(REQUEST_CHANNEL_CAPACITY);

        runtime.spawn(async move {
            while let Some(request) = request_rx.recv().await {
                tracing::info!(
                    "Starting conversion: {} ({})",
                    request.source,
                    request.kind.label()
                );
                let destination = request.destination.clone();
                let completed = match service.execute(&request).await {
                    Ok(outcome) => CompletedConversion::succeeded(outcome.destination),
                    Err(err) => {
                        tracing::error!("Conversion of {} failed: {:#}", request.source, err);
                        CompletedConversion {
                            success: false,
                            destination: Some(destination),
                            message: format!("{err:#}"),
                        }
                    }
                };
                state.finish_conversion(completed);
            }
            tracing::debug!("Conversion worker stopped: request channel closed");
        });

        Self { request_tx }
    }

    /// Sender half of the request channel, for the UI controller.
    pub fn sender(&self) -> mpsc::Sender<ConversionRequest> {
        self.request_tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageRange;
    use crate::services::synthesis::MockTtsEngine;

    fn pdf_request(source: &str, pages: Option<PageRange>) -> ConversionRequest {
        ConversionRequest {
            source: Utf8PathBuf::from(source),
            kind: SourceKind::Pdf,
            destination: Utf8PathBuf::from("/tmp/out.wav"),
            voice_id: "gmw/en-US".to_string(),
            rate_wpm: 180,
            pages,
        }
    }

    #[tokio::test]
    async fn test_execute_rejects_rate_below_minimum() {
        let service = ConversionService::new(Arc::new(MockTtsEngine::new()));
        let mut request = pdf_request("/tmp/in.pdf", Some(PageRange::new(1, 1)));
        request.rate_wpm = 99;

        let err = service.execute(&request).await.unwrap_err();
        let conversion_err = err.downcast_ref::<ConversionError>().unwrap();
        assert!(matches!(conversion_err, ConversionError::InvalidRate(99)));
    }

    #[tokio::test]
    async fn test_execute_rejects_rate_above_maximum() {
        let service = ConversionService::new(Arc::new(MockTtsEngine::new()));
        let mut request = pdf_request("/tmp/in.pdf", Some(PageRange::new(1, 1)));
        request.rate_wpm = 501;

        let err = service.execute(&request).await.unwrap_err();
        let conversion_err = err.downcast_ref::<ConversionError>().unwrap();
        assert!(matches!(conversion_err, ConversionError::InvalidRate(501)));
    }

    #[tokio::test]
    async fn test_execute_accepts_boundary_rates() {
        // Boundary rates pass validation and fail later, at extraction,
        // because the source file does not exist.
        for rate in [MIN_RATE_WPM, MAX_RATE_WPM] {
            let service = ConversionService::new(Arc::new(MockTtsEngine::new()));
            let mut request = pdf_request("/nonexistent/in.pdf", Some(PageRange::new(1, 1)));
            request.rate_wpm = rate;

            let err = service.execute(&request).await.unwrap_err();
            assert!(err.downcast_ref::<ConversionError>().is_none());
        }
    }

    #[tokio::test]
    async fn test_execute_requires_page_range_for_pdf() {
        let service = ConversionService::new(Arc::new(MockTtsEngine::new()));
        let request = pdf_request("/tmp/in.pdf", None);

        let err = service.execute(&request).await.unwrap_err();
        let conversion_err = err.downcast_ref::<ConversionError>().unwrap();
        assert!(matches!(conversion_err, ConversionError::MissingPageRange));
    }

    #[tokio::test]
    async fn test_execute_epub_missing_file() {
        let mut engine = MockTtsEngine::new();
        engine.expect_synthesize().never();
        let service = ConversionService::new(Arc::new(engine));

        let request = ConversionRequest {
            source: Utf8PathBuf::from("/nonexistent/book.epub"),
            kind: SourceKind::Epub,
            destination: Utf8PathBuf::from("/tmp/out.wav"),
            voice_id: "gmw/en-US".to_string(),
            rate_wpm: 180,
            pages: None,
        };
        assert!(service.execute(&request).await.is_err());
    }

    #[test]
    fn test_error_messages_are_user_readable() {
        let err = ConversionError::PageRangeOutOfBounds {
            first: 3,
            last: 9,
            page_count: 5,
        };
        assert_eq!(
            err.to_string(),
            "Pages 3-9 do not fit a document with 5 pages"
        );

        let err = ConversionError::EmptyExtraction(Utf8PathBuf::from("/books/a.pdf"));
        assert_eq!(err.to_string(), "No text could be extracted from /books/a.pdf");
    }

    #[test]
    fn test_worker_sender_is_cloneable() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let service = ConversionService::new(Arc::new(MockTtsEngine::new()));
        let worker = ConversionWorker::spawn(
            runtime.handle(),
            Arc::new(service),
            Arc::new(StateManager::new()),
        );

        let a = worker.sender();
        let b = worker.sender();
        drop(a);
        assert!(!b.is_closed());
    }

    #[tokio::test]
    async fn test_execute_surfaces_engine_failure() {
        use std::io;

        let mut engine = MockTtsEngine::new();
        engine
            .expect_synthesize()
            .returning(|_, _, _, _| Err(io::Error::other("no audio device").into()));
        let service = ConversionService::new(Arc::new(engine));

        // A real source document is needed so the pipeline reaches synthesis.
        let file = test_pdf::one_page("engine failure probe");
        let request = ConversionRequest {
            source: Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap(),
            kind: SourceKind::Pdf,
            destination: Utf8PathBuf::from("/tmp/out.wav"),
            voice_id: "gmw/en-US".to_string(),
            rate_wpm: 180,
            pages: Some(PageRange::new(1, 1)),
        };

        let err = service.execute(&request).await.unwrap_err();
        assert!(format!("{err:#}").contains("no audio device"));
    }

    #[tokio::test]
    async fn test_execute_passes_request_fields_to_engine() {
        let mut engine = MockTtsEngine::new();
        engine
            .expect_synthesize()
            .withf(|text, destination, voice_id, rate_wpm| {
                text.contains("spoken words")
                    && destination.as_str() == "/tmp/narration.wav"
                    && voice_id == "gmw/en"
                    && *rate_wpm == 320
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let service = ConversionService::new(Arc::new(engine));

        let file = test_pdf::one_page("spoken words");
        let request = ConversionRequest {
            source: Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap(),
            kind: SourceKind::Pdf,
            destination: Utf8PathBuf::from("/tmp/narration.wav"),
            voice_id: "gmw/en".to_string(),
            rate_wpm: 320,
            pages: Some(PageRange::new(1, 1)),
        };

        let outcome = service.execute(&request).await.unwrap();
        assert_eq!(outcome.destination, Utf8PathBuf::from("/tmp/narration.wav"));
        assert!(outcome.characters > 0);
    }

    /// Minimal PDF construction for pipeline tests.
    mod test_pdf {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};
        use tempfile::NamedTempFile;

        pub fn one_page(text: &str) -> NamedTempFile {
            let mut doc = Document::with_version("1.5");
            let pages_id = doc.new_object_id();

            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            });
            let resources_id = doc.add_object(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            });
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });

            doc.objects.insert(
                pages_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Kids" => vec![page_id.into()],
                    "Count" => 1,
                    "Resources" => resources_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                }),
            );
            let catalog_id = doc.add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            });
            doc.trailer.set("Root", catalog_id);
            doc.compress();

            let file = NamedTempFile::new().unwrap();
            doc.save(file.path()).unwrap();
            file
        }
    }
}
