//! Persisted emulator configuration.
//!
//! Waveform and alarm settings survive restarts through a small JSON file:
//! loaded once at startup, written back on the console `save` command. A
//! missing or unreadable file falls back to the reference defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File contents were not valid configuration JSON.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Operator-adjustable emulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Waveform amplitude, mmHg.
    pub amplitude: f32,
    /// Waveform frequency, Hz.
    pub frequency: f32,
    /// Waveform baseline, mmHg.
    pub baseline: f32,
    /// Waveform phase offset, radians.
    pub phase: f32,
    /// High alarm threshold, mmHg.
    pub alarm_high: f32,
    /// Low alarm threshold, mmHg.
    pub alarm_low: f32,
    /// Whether the high alarm threshold is enabled.
    pub alarm_high_enabled: bool,
    /// Whether the low alarm threshold is enabled.
    pub alarm_low_enabled: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            amplitude: 38.0,
            frequency: 0.25,
            baseline: 0.0,
            phase: 0.0,
            alarm_high: 50.0,
            alarm_low: 30.0,
            alarm_high_enabled: false,
            alarm_low_enabled: false,
        }
    }
}

/// File-backed configuration store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store at the given path. Nothing is touched until
    /// [`ConfigStore::load`] or [`ConfigStore::save`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(&self) -> EmulatorConfig {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => {
                    tracing::info!(path = %self.path.display(), "configuration loaded");
                    config
                }
                Err(err) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %err,
                        "configuration unreadable, using defaults"
                    );
                    EmulatorConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no configuration file, using defaults");
                EmulatorConfig::default()
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "configuration unreadable, using defaults"
                );
                EmulatorConfig::default()
            }
        }
    }

    /// Write the configuration to disk.
    pub fn save(&self, config: &EmulatorConfig) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, text)?;
        tracing::info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    /// Delete the stored configuration, reverting future loads to defaults.
    pub fn clear(&self) -> Result<(), ConfigError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> ConfigStore {
        let mut path = std::env::temp_dir();
        path.push(format!("capsim-config-{}-{}.json", name, std::process::id()));
        let store = ConfigStore::new(path);
        let _ = store.clear();
        store
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let store = temp_store("missing");
        assert_eq!(store.load(), EmulatorConfig::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = temp_store("roundtrip");
        let config = EmulatorConfig {
            amplitude: 45.0,
            frequency: 0.5,
            alarm_high_enabled: true,
            ..EmulatorConfig::default()
        };
        store.save(&config).expect("save should succeed");
        assert_eq!(store.load(), config);
        store.clear().expect("clear should succeed");
    }

    #[test]
    fn test_clear_reverts_to_defaults() {
        let store = temp_store("clear");
        let mut config = EmulatorConfig::default();
        config.baseline = 5.0;
        store.save(&config).expect("save should succeed");
        store.clear().expect("clear should succeed");
        assert_eq!(store.load(), EmulatorConfig::default());
    }

    #[test]
    fn test_garbage_file_yields_defaults() {
        let store = temp_store("garbage");
        fs::write(store.path(), "not json").expect("write should succeed");
        assert_eq!(store.load(), EmulatorConfig::default());
        store.clear().expect("clear should succeed");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let store = temp_store("partial");
        fs::write(store.path(), r#"{"amplitude": 41.5}"#).expect("write should succeed");
        let config = store.load();
        assert_eq!(config.amplitude, 41.5);
        assert_eq!(config.frequency, EmulatorConfig::default().frequency);
        store.clear().expect("clear should succeed");
    }
}
