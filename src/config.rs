//! Configuration types.
//!
//! Loads settings from config.json at startup. Provides working folders,
//! Tesseract options, retry timing, and destination store settings. Every
//! field has a default, so a partial or missing file still works.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    /// Screenshots waiting to be read
    pub input_images: PathBuf,
    /// Record JSON waiting to be ingested
    pub pending_json: PathBuf,
    /// Screenshots that have been read
    pub archived_images: PathBuf,
    /// Record JSON that has been ingested
    pub done_json: PathBuf,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            input_images: PathBuf::from("toProcess/images"),
            pending_json: PathBuf::from("toProcess/json"),
            archived_images: PathBuf::from("processed/images"),
            done_json: PathBuf::from("processed/json"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Explicit path to the tesseract binary
    pub executable: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata: Option<PathBuf>,
    /// Trained data language
    pub language: String,
    /// Words below this confidence (0-100) are discarded
    pub min_confidence: f32,
    /// Tesseract page segmentation mode; 7 = single text line
    pub page_seg_mode: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: None,
            tessdata: None,
            language: "eng".to_string(),
            min_confidence: 30.0,
            page_seg_mode: 7,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per append, including the first
    pub max_attempts: u32,
    /// Wait before the first retry; doubles after each one
    pub base_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 8,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Csv,
    Sheets,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory holding the CSV tables (relative to base_dir)
    pub csv_dir: PathBuf,
    /// Spreadsheet id for the sheets store
    pub spreadsheet_id: String,
    /// Environment variable holding the OAuth access token
    pub access_token_env: String,
    pub friendly_table: String,
    pub opponent_table: String,
    pub game_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Csv,
            csv_dir: PathBuf::from("tables"),
            spreadsheet_id: String::new(),
            access_token_env: "BOXSCORE_SHEETS_TOKEN".to_string(),
            friendly_table: "F DB".to_string(),
            opponent_table: "O DB".to_string(),
            game_table: "GAME DB".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root that relative folders are resolved against
    pub base_dir: PathBuf,
    pub folders: FolderConfig,
    pub tesseract: TesseractConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
}

/// Loads configuration from `path`, or from config.json next to the
/// executable, or from the working directory. Falls back to defaults when
/// nothing usable is found.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let beside_exe = crate::paths::get_exe_dir().join("config.json");
            if beside_exe.exists() {
                beside_exe
            } else {
                PathBuf::from("config.json")
            }
        }
    };

    info!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        info!("config.json not found. Using default config.");
        return AppConfig::default();
    }

    match fs::read_to_string(&config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Using defaults.", config_path.display(), e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}. Using defaults.", config_path.display(), e);
            AppConfig::default()
        }
    }
}
