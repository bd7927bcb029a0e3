use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::catalog::CustomFallbackConfig;
use crate::distribute::RetryPolicy;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Library location (overrides the XDG data directory). Holds the JSON
    /// documents and the `sheets/` tree.
    pub data_dir: Option<PathBuf>,
    /// Where per-person folders are written by `distribute`.
    pub distribution_dir: Option<PathBuf>,
    /// Number of parallel workers for detection. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Retries for copies and deletes in the distribution folder.
    pub retry: RetryPolicy,
    /// Fallback chains replacing the built-in ones, per instrument.
    #[serde(rename = "fallbacks")]
    pub custom_fallbacks: Vec<CustomFallbackConfig>,
}

impl AppConfig {
    /// Load config from `~/.config/sheetstand/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Configured distribution folder, else `distribution/` in the data dir.
    pub fn resolve_distribution_dir(&self) -> PathBuf {
        self.distribution_dir
            .clone()
            .unwrap_or_else(|| self.resolve_data_dir().join("distribution"))
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default data directory using XDG data directory.
pub fn default_data_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().to_path_buf()
    } else {
        // Fallback: current directory
        PathBuf::from(crate::APP_NAME)
    }
}
