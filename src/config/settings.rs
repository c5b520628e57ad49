//! Application settings
//!
//! Stored as pretty JSON under the user's config directory. Missing keys
//! fall back to defaults; out-of-range values are clamped on load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{backup, canvas, config, hyprctl};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Take a backup bundle before every monitors file write
    #[serde(default = "default_true")]
    pub auto_backup: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Refuse to save or apply records that fail validation
    #[serde(default = "default_true")]
    pub strict_validation: bool,
    #[serde(default = "default_monitors_path")]
    pub monitors_path: PathBuf,
    #[serde(default = "default_workspaces_path")]
    pub workspaces_path: PathBuf,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f64,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: f64,
    /// Logical pixels within which a moved display snaps to a neighbour (0 = off)
    #[serde(default)]
    pub snap_threshold: u32,
    #[serde(default = "default_timeout")]
    pub hyprctl_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_max_backups() -> usize {
    backup::DEFAULT_MAX_BACKUPS
}

fn hypr_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(config::HYPR_DIR);
    path
}

fn default_monitors_path() -> PathBuf {
    hypr_dir().join(config::MONITORS_FILE)
}

fn default_workspaces_path() -> PathBuf {
    hypr_dir().join(config::WORKSPACES_FILE)
}

fn default_canvas_width() -> f64 {
    canvas::DEFAULT_WIDTH
}

fn default_canvas_height() -> f64 {
    canvas::DEFAULT_HEIGHT
}

fn default_timeout() -> u64 {
    hyprctl::DEFAULT_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_backup: true,
            max_backups: default_max_backups(),
            strict_validation: true,
            monitors_path: default_monitors_path(),
            workspaces_path: default_workspaces_path(),
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            snap_threshold: canvas::DEFAULT_SNAP_THRESHOLD,
            hyprctl_timeout_secs: default_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// `~/.config/hyprdisplays`
    pub fn app_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path
    }

    pub fn path() -> PathBuf {
        Self::app_dir().join(config::FILENAME)
    }

    pub fn backup_dir() -> PathBuf {
        Self::app_dir().join(config::BACKUP_DIR)
    }

    /// Load settings, writing defaults first if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Settings file not found, creating defaults");
            let settings = Settings::default();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings JSON from {:?}", path))?;
        settings.validate_and_clamp();

        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;

        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Clamp values to usable ranges
    fn validate_and_clamp(&mut self) {
        if self.max_backups == 0 {
            warn!("max_backups is 0, keeping at least one backup");
            self.max_backups = 1;
        }

        let min_canvas = canvas::MARGIN * 2.0 + 1.0;
        if !(self.canvas_width >= min_canvas) {
            warn!(canvas_width = self.canvas_width, using = canvas::DEFAULT_WIDTH, "canvas_width too small, using default");
            self.canvas_width = canvas::DEFAULT_WIDTH;
        }
        if !(self.canvas_height >= min_canvas) {
            warn!(canvas_height = self.canvas_height, using = canvas::DEFAULT_HEIGHT, "canvas_height too small, using default");
            self.canvas_height = canvas::DEFAULT_HEIGHT;
        }

        if self.hyprctl_timeout_secs == 0 {
            warn!(using = hyprctl::DEFAULT_TIMEOUT_SECS, "hyprctl_timeout_secs is 0, using default");
            self.hyprctl_timeout_secs = hyprctl::DEFAULT_TIMEOUT_SECS;
        }
    }
}
