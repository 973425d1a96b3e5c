use crate::index::types::{DEFAULT_MAX_HEADWORD_SIZE, MatchOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "wordex";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Treat "cafe" and "café" as the same headword in exact lookups
    #[serde(default)]
    pub ignore_diacritics: bool,

    /// Ignore leading and trailing punctuation in exact lookups
    #[serde(default)]
    pub ignore_punctuation: bool,

    /// Headwords longer than this (in characters) are skipped when building
    #[serde(default = "default_max_headword_size")]
    pub max_headword_size: usize,

    /// Search worker threads. If 0, uses the number of CPU cores
    #[serde(default)]
    pub worker_threads: usize,

    /// Soft cap on matches per search request
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Trailing characters a stemmed search may chop off
    #[serde(default = "default_max_suffix_variation")]
    pub max_suffix_variation: usize,

    /// Stemmed searches never chop a word below this many characters
    #[serde(default = "default_min_stem_length")]
    pub min_stem_length: usize,
}

fn default_max_headword_size() -> usize {
    DEFAULT_MAX_HEADWORD_SIZE
}

fn default_max_results() -> usize {
    100
}

fn default_max_suffix_variation() -> usize {
    3
}

fn default_min_stem_length() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore_diacritics: false,
            ignore_punctuation: false,
            max_headword_size: default_max_headword_size(),
            worker_threads: 0,
            max_results: default_max_results(),
            max_suffix_variation: default_max_suffix_variation(),
            min_stem_length: default_min_stem_length(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory (or defaults if there is
    /// none), then apply `WORDEX_*` environment overrides
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            serde_json::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Apply overrides looked up by variable name. Unparsable values are
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("WORDEX_IGNORE_DIACRITICS").and_then(|v| parse_flag(&v)) {
            self.ignore_diacritics = v;
        }

        if let Some(v) = lookup("WORDEX_IGNORE_PUNCTUATION").and_then(|v| parse_flag(&v)) {
            self.ignore_punctuation = v;
        }

        if let Some(v) = lookup("WORDEX_MAX_RESULTS").and_then(|v| v.parse().ok()) {
            self.max_results = v;
        }

        if let Some(v) = lookup("WORDEX_WORKERS").and_then(|v| v.parse().ok()) {
            self.worker_threads = v;
        }
    }

    /// Get the effective worker count (resolves 0 to CPU count)
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus()
        } else {
            self.worker_threads
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            ignore_diacritics: self.ignore_diacritics,
            ignore_punctuation: self.ignore_punctuation,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get the number of CPUs available
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}
