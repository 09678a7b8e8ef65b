use serde::{Deserialize, Serialize};

use crate::models::conversion::{DEFAULT_RATE_WPM, MAX_RATE_WPM, MIN_RATE_WPM};

/// User preferences from ReadAloud Settings.yaml
///
/// Everything here is optional in the file; missing keys fall back to the
/// defaults below, and a missing file behaves like an all-default config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "ReadAloud_Settings")]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Command used to invoke the TTS engine. Overridable so a packaged
    /// `espeak` or an absolute path can be used instead.
    #[serde(rename = "TTS Engine", default = "default_engine_command")]
    pub engine_command: String,

    /// Display name of the voice to preselect when it exists in the catalog.
    #[serde(rename = "Preferred Voice", default)]
    pub preferred_voice: String,

    #[serde(rename = "Speech Rate WPM", default = "default_rate_wpm")]
    pub rate_wpm: u32,

    #[serde(rename = "Log Directory", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_command: default_engine_command(),
            preferred_voice: String::new(),
            rate_wpm: default_rate_wpm(),
            log_dir: default_log_dir(),
            debug_mode: false,
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
        }
    }
}

fn default_engine_command() -> String {
    "espeak-ng".to_string()
}

fn default_rate_wpm() -> u32 {
    DEFAULT_RATE_WPM
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl UserConfig {
    /// Rate from the file clamped into the slider's accepted range, so a
    /// hand-edited out-of-range value cannot reach the engine.
    pub fn normalized_rate(&self) -> u32 {
        self.settings.rate_wpm.clamp(MIN_RATE_WPM, MAX_RATE_WPM)
    }

    pub fn preferred_voice(&self) -> Option<&str> {
        if self.settings.preferred_voice.is_empty() {
            None
        } else {
            Some(self.settings.preferred_voice.as_str())
        }
    }
}
