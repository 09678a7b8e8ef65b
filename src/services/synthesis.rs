//! Speech synthesis through an external TTS engine.
//!
//! The [`TtsEngine`] trait is the seam between the conversion pipeline and the
//! actual synthesizer, so the pipeline can be tested without audio hardware or
//! an installed engine. [`EspeakEngine`] is the production implementation and
//! drives the `espeak-ng` command line tool.

use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use camino::Utf8Path;
use regex::Regex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::models::VoiceInfo;

/// Upper bound on a single synthesis run. Long books take a while to render,
/// so this is deliberately generous; it only exists to reap a hung engine.
pub const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Errors from driving the external TTS engine.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("TTS engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("TTS engine exited with status {status}: {stderr}")]
    EngineFailed { status: i32, stderr: String },
}

/// A speech synthesizer that can list its voices and render text to a WAV
/// file.
///
/// Implementations must be `Send + Sync` because the engine is shared between
/// the startup voice probe and the conversion worker task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// List the voices the engine offers, in the engine's own order.
    async fn voices(&self) -> Result<Vec<VoiceInfo>>;

    /// Render `text` as speech into a WAV file at `destination`.
    async fn synthesize(
        &self,
        text: &str,
        destination: &Utf8Path,
        voice_id: &str,
        rate_wpm: u32,
    ) -> Result<()>;

    /// Engine name for logs and error messages.
    fn name(&self) -> &str;
}

/// TTS engine backed by the `espeak-ng` command line tool.
///
/// Voices come from `espeak-ng --voices`; synthesis pipes the text through
/// stdin and writes the waveform with `-w`.
pub struct EspeakEngine {
    command: String,
    voice_line: Regex,
}

impl EspeakEngine {
    /// Create an engine driving the given command (normally `espeak-ng`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            // A voice listing row: index, language, age/gender, voice name,
            // voice file. Spaces inside names are printed as underscores, so
            // whitespace splits columns reliably.
            voice_line: Regex::new(r"^\s*\d+\s+(\S+)\s+\S+\s+(\S+)\s+(\S+)")
                .expect("Invalid voice listing regex"),
        }
    }

    /// Parse the table printed by `espeak-ng --voices`.
    ///
    /// The first line is a column header and is skipped. Rows that do not
    /// match the expected shape are ignored rather than treated as errors, so
    /// a slightly different engine build still yields a usable catalog.
    pub fn parse_voice_listing(&self, listing: &str) -> Vec<VoiceInfo> {
        let mut voices = Vec::new();
        for line in listing.lines().skip(1) {
            if let Some(caps) = self.voice_line.captures(line) {
                voices.push(VoiceInfo {
                    id: caps[3].to_string(),
                    name: caps[2].replace('_', " "),
                    language: caps[1].to_string(),
                });
            }
        }
        voices
    }
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

#[async_trait]
impl TtsEngine for EspeakEngine {
    async fn voices(&self) -> Result<Vec<VoiceInfo>> {
        let output = Command::new(&self.command)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run '{} --voices'", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SynthesisError::EngineFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            }
            .into());
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let voices = self.parse_voice_listing(&listing);
        tracing::info!("'{}' reported {} voices", self.command, voices.len());
        Ok(voices)
    }

    async fn synthesize(
        &self,
        text: &str,
        destination: &Utf8Path,
        voice_id: &str,
        rate_wpm: u32,
    ) -> Result<()> {
        tracing::info!(
            "Synthesizing {} characters to {} (voice: {}, rate: {} wpm)",
            text.len(),
            destination,
            voice_id,
            rate_wpm
        );
        let start = Instant::now();

        let mut child = Command::new(&self.command)
            .arg("-v")
            .arg(voice_id)
            .arg("-s")
            .arg(rate_wpm.to_string())
            .arg("-w")
            .arg(destination.as_str())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // If the application exits mid-conversion the engine must not be
            // left running as an orphan.
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start TTS engine '{}'", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .context("TTS engine stdin was not captured")?;
        stdin
            .write_all(text.as_bytes())
            .await
            .context("Failed to stream text to the TTS engine")?;
        // Close stdin so the engine sees end of input and starts rendering.
        drop(stdin);

        let output = match timeout(SYNTHESIS_TIMEOUT, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for the TTS engine")?,
            Err(_) => {
                tracing::warn!(
                    "TTS engine '{}' timed out after {:?}",
                    self.command,
                    SYNTHESIS_TIMEOUT
                );
                return Err(SynthesisError::Timeout(SYNTHESIS_TIMEOUT).into());
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SynthesisError::EngineFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            }
            .into());
        }

        tracing::info!(
            "Synthesis finished in {:.2}s: {}",
            start.elapsed().as_secs_f32(),
            destination
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  am              --/M      Amharic            sem/am
 5  en-gb           --/M      English_(Great_Britain) gmw/en
 2  en-gb           --/M      english-mb-en1     mb/mb-en1            (en 10)
 5  en-us           --/M      English_(America)  gmw/en-US
";

    #[test]
    fn test_parse_voice_listing_skips_header() {
        let engine = EspeakEngine::default();
        let voices = engine.parse_voice_listing(SAMPLE_LISTING);
        assert_eq!(voices.len(), 5);
        assert_eq!(voices[0].name, "Afrikaans");
        assert_eq!(voices[0].id, "gmw/af");
        assert_eq!(voices[0].language, "af");
    }

    #[test]
    fn test_parse_voice_listing_restores_spaces_in_names() {
        let engine = EspeakEngine::default();
        let voices = engine.parse_voice_listing(SAMPLE_LISTING);
        assert_eq!(voices[2].name, "English (Great Britain)");
        assert_eq!(voices[4].name, "English (America)");
        assert_eq!(voices[4].id, "gmw/en-US");
    }

    #[test]
    fn test_parse_voice_listing_preserves_engine_order() {
        let engine = EspeakEngine::default();
        let voices = engine.parse_voice_listing(SAMPLE_LISTING);
        let names: Vec<&str> = voices.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Afrikaans",
                "Amharic",
                "English (Great Britain)",
                "english-mb-en1",
                "English (America)",
            ]
        );
    }

    #[test]
    fn test_parse_voice_listing_ignores_malformed_rows() {
        let engine = EspeakEngine::default();
        let listing = "Pty Language Age/Gender VoiceName File\nnot a voice row\n";
        assert!(engine.parse_voice_listing(listing).is_empty());
    }

    #[test]
    fn test_parse_voice_listing_empty_input() {
        let engine = EspeakEngine::default();
        assert!(engine.parse_voice_listing("").is_empty());
    }

    #[test]
    fn test_engine_name_matches_command() {
        let engine = EspeakEngine::new("/usr/local/bin/espeak-ng");
        assert_eq!(engine.name(), "/usr/local/bin/espeak-ng");
    }
}
