use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for loading and saving the YAML preferences file.
///
/// Manages a single file, `ReadAloud Settings.yaml`, inside the configured
/// data directory. A missing file is not an error: loading falls back to
/// defaults and the file is created on the first save.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Manager rooted at `config_dir` (normally "ReadAloud Data"). The
    /// directory is created if it does not exist yet.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join("ReadAloud Settings.yaml"),
            config_dir,
        })
    }

    /// Load the preferences file, or defaults when it does not exist.
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "Preferences file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read preferences: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse preferences: {}", self.user_config_path))?;

        tracing::info!("Loaded preferences from {}", self.user_config_path);
        Ok(config)
    }

    /// Write the preferences file, replacing whatever was there.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize preferences to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write preferences: {}", self.user_config_path))?;

        tracing::info!("Saved preferences to {}", self.user_config_path);
        Ok(())
    }

    /// Directory this manager reads and writes in.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (_manager, _temp_dir) = create_test_config_manager();
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let loaded = manager.load_user_config().unwrap();
        assert_eq!(loaded.settings.engine_command, "espeak-ng");
        assert_eq!(loaded.settings.rate_wpm, 180);
    }

    #[test]
    fn test_load_save_user_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = UserConfig::default();
        config.settings.preferred_voice = "English (America)".to_string();
        config.settings.rate_wpm = 240;
        manager.save_user_config(&config).unwrap();

        let loaded = manager.load_user_config().unwrap();
        assert_eq!(loaded.settings.preferred_voice, "English (America)");
        assert_eq!(loaded.settings.rate_wpm, 240);
    }

    #[test]
    fn test_creates_missing_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let nested = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())
            .unwrap()
            .join("nested")
            .join("ReadAloud Data");

        let manager = ConfigManager::new(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(manager.config_dir(), &nested);
    }

    #[test]
    fn test_corrupt_yaml_is_an_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(
            manager.config_dir().join("ReadAloud Settings.yaml"),
            "ReadAloud_Settings: [not, a, mapping",
        )
        .unwrap();

        assert!(manager.load_user_config().is_err());
    }
}
