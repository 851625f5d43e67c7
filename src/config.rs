//! Configuration for sweet.
//!
//! Settings are read from `~/.sweet/config.toml` (or the path given with
//! `--config`). Every key is optional:
//!
//! ```toml
//! # tracing filter, overridden by the SWEET_LOG environment variable
//! log_level = "info"
//!
//! # How long a read waits for input, in tenths of a second
//! read_timeout = 1
//!
//! # Clear the screen before running a command
//! clear_before_exec = true
//!
//! [prompt]
//! label = "sweet"
//! color = "cyan"
//!
//! [status_bar]
//! visible = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crossterm::style::Color;
use serde::Deserialize;
use tracing::warn;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter directive
    pub log_level: String,
    /// Read timeout in tenths of a second
    pub read_timeout: u8,
    /// Clear the screen before handing a line to a child process
    pub clear_before_exec: bool,
    /// Prompt settings
    pub prompt: PromptConfig,
    /// Status bar settings
    pub status_bar: StatusBarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            read_timeout: 1,
            clear_before_exec: true,
            prompt: PromptConfig::default(),
            status_bar: StatusBarConfig::default(),
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub label: String,
    pub color: String, // crossterm color name, e.g. "cyan", "dark_green"
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            label: "sweet".to_string(),
            color: "cyan".to_string(),
        }
    }
}

impl PromptConfig {
    /// Label color, cyan when the name is unknown
    pub fn color(&self) -> Color {
        Color::try_from(self.color.as_str()).unwrap_or(Color::Cyan)
    }
}

/// Status bar configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::default(),
        }
    }

    /// Load configuration from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_toml(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read timeout, never zero so reads cannot spin
    pub fn read_timeout(&self) -> u8 {
        self.read_timeout.max(1)
    }

    /// Directory holding the config and log files
    pub fn dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".sweet"))
    }

    fn get_config_path() -> Option<PathBuf> {
        Self::dir().map(|dir| dir.join("config.toml"))
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
