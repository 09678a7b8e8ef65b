//! Text extraction from PDF and EPUB source files.
//!
//! Both extractors produce a single plain-text string ready for speech
//! synthesis. PDF extraction operates on an explicit page range; EPUB
//! extraction walks every content document in the book's reading order and
//! strips the markup.

use anyhow::{Context, Result};
use camino::Utf8Path;
use epub::doc::EpubDoc;
use lopdf::Document;

use crate::models::PageRange;
use crate::services::conversion::ConversionError;

/// Column width handed to the HTML renderer. The output is fed to a speech
/// engine, so the exact wrap point only affects where line breaks land.
const TEXT_RENDER_WIDTH: usize = 80;

/// Count the pages of a PDF document.
///
/// Used when a source file is loaded so the page selectors can be bounded
/// before any conversion starts.
pub fn pdf_page_count(path: &Utf8Path) -> Result<usize> {
    let document = Document::load(path.as_std_path())
        .with_context(|| format!("Failed to open PDF: {path}"))?;
    Ok(document.get_pages().len())
}

/// Extract the text of an inclusive 1-based page range from a PDF.
///
/// The result is the concatenation of each page's extracted text, in page
/// order. Fails with [`ConversionError::PageRangeOutOfBounds`] when the range
/// does not fit the document, which can happen if the file changed on disk
/// between selection and conversion.
pub fn extract_pdf_range(path: &Utf8Path, pages: PageRange) -> Result<String> {
    let document = Document::load(path.as_std_path())
        .with_context(|| format!("Failed to open PDF: {path}"))?;
    let page_count = document.get_pages().len();

    if !pages.fits(page_count) {
        return Err(ConversionError::PageRangeOutOfBounds {
            first: pages.first,
            last: pages.last,
            page_count,
        }
        .into());
    }

    let mut text = String::new();
    for page_number in pages.first..=pages.last {
        let page_text = document.extract_text(&[page_number]).with_context(|| {
            format!("Failed to extract text from page {page_number} of {path}")
        })?;
        text.push_str(&page_text);
    }

    tracing::debug!(
        "Extracted {} characters from pages {}-{} of {}",
        text.len(),
        pages.first,
        pages.last,
        path
    );
    Ok(text)
}

/// Extract the text of every content document in an EPUB, in spine order.
///
/// Resources that cannot be read as text (cover images in the spine, for
/// example) are skipped rather than treated as errors.
pub fn extract_epub(path: &Utf8Path) -> Result<String> {
    let mut document = EpubDoc::new(path.as_std_path())
        .with_context(|| format!("Failed to open EPUB: {path}"))?;

    let mut text = String::new();
    let mut documents_read = 0usize;
    loop {
        if let Some((html, _mime)) = document.get_current_str() {
            text.push_str(&strip_markup(&html));
            documents_read += 1;
        }
        if !document.go_next() {
            break;
        }
    }

    tracing::debug!(
        "Extracted {} characters from {} content documents of {}",
        text.len(),
        documents_read,
        path
    );
    Ok(text)
}

/// Render an XHTML content document down to plain text.
fn strip_markup(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_RENDER_WIDTH)
}
