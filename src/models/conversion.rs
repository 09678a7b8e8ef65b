use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

/// Minimum accepted speech rate in words per minute.
pub const MIN_RATE_WPM: u32 = 100;

/// Maximum accepted speech rate in words per minute.
pub const MAX_RATE_WPM: u32 = 500;

/// Default speech rate offered by the rate slider.
pub const DEFAULT_RATE_WPM: u32 = 180;

/// The kind of source document, decided solely by the file extension
/// (case-insensitive). Anything else is rejected at upload time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Epub,
}

impl SourceKind {
    /// Classify a path by its extension. Returns `None` for paths without
    /// a `.pdf`/`.epub` extension, including extension-less paths.
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Epub => "EPUB",
        }
    }
}

/// 1-based inclusive page range for PDF sources.
///
/// The UI keeps `first <= last` by clamping the spin boxes, but the worker
/// re-validates against the document on disk before extracting, so a stale
/// range is reported as an error rather than silently clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    /// Number of pages covered by the range.
    pub fn len(&self) -> u32 {
        self.last.saturating_sub(self.first) + 1
    }

    pub fn is_ordered(&self) -> bool {
        self.first >= 1 && self.first <= self.last
    }

    /// Whether the whole range lies inside a document of `page_count` pages.
    pub fn fits(&self, page_count: usize) -> bool {
        self.is_ordered() && (self.last as usize) <= page_count
    }
}

/// Everything the worker needs to run one conversion. Built by the UI
/// controller at convert time, sent over the request channel, consumed once.
#[derive(Clone, Debug)]
pub struct ConversionRequest {
    pub source: Utf8PathBuf,
    pub kind: SourceKind,
    pub destination: Utf8PathBuf,
    /// Engine-side voice handle from the [`VoiceCatalog`], not the display name.
    pub voice_id: String,
    pub rate_wpm: u32,
    /// `Some` only when `kind` is [`SourceKind::Pdf`].
    pub pages: Option<PageRange>,
}

/// Result of a finished conversion, kept in [`crate::models::AppState`] and
/// carried by the completion event so the UI can show either outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedConversion {
    pub success: bool,
    pub destination: Option<Utf8PathBuf>,
    pub message: String,
}

impl CompletedConversion {
    pub fn succeeded(destination: Utf8PathBuf) -> Self {
        Self {
            success: true,
            destination: Some(destination),
            message: String::from("Done!"),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            destination: None,
            message: message.into(),
        }
    }
}

/// One voice as reported by the TTS engine's listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Handle the engine accepts for synthesis (the listing's file column).
    pub id: String,
    /// Human-readable name shown in the combo box.
    pub name: String,
    /// Language tag from the listing, informational only.
    pub language: String,
}

/// Display-name ordered view of the engine's voices.
///
/// Populated once at startup and immutable afterwards; the combo box shows
/// the names in insertion order. Duplicate display names keep the first
/// position but the later entry's handle wins.
#[derive(Clone, Debug, Default)]
pub struct VoiceCatalog {
    voices: IndexMap<String, VoiceInfo>,
}

impl VoiceCatalog {
    pub fn from_voices(voices: Vec<VoiceInfo>) -> Self {
        let mut map = IndexMap::with_capacity(voices.len());
        for voice in voices {
            map.insert(voice.name.clone(), voice);
        }
        Self { voices: map }
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Display names in catalog order, ready for the combo box model.
    pub fn display_names(&self) -> Vec<String> {
        self.voices.keys().cloned().collect()
    }

    pub fn get(&self, display_name: &str) -> Option<&VoiceInfo> {
        self.voices.get(display_name)
    }

    pub fn by_index(&self, index: usize) -> Option<&VoiceInfo> {
        self.voices.get_index(index).map(|(_, voice)| voice)
    }

    /// Position of a display name in catalog order, used to preselect the
    /// preferred voice from the configuration.
    pub fn position_of(&self, display_name: &str) -> Option<usize> {
        self.voices.get_index_of(display_name)
    }
}
