// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use disksim_core::EngineSettings;
use disksim_core::layout::BUILTIN_LAYOUT;

const CONFIG_ENV: &str = "DISKSIM_CONFIG";
const CONFIG_DIR: &str = "disksim";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            3 => Self::Debug,
            4 => Self::Trace,
            _ => Self::Warn,
        }
    }

    pub fn to_index(self) -> usize {
        match self {
            Self::Error => 0,
            Self::Warn => 1,
            Self::Info => 2,
            Self::Debug => 3,
            Self::Trace => 4,
        }
    }

    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// One step more verbose per `-v`, saturating at trace.
    pub fn raised_by(self, steps: u8) -> Self {
        Self::from_index((self.to_index() + steps as usize).min(4))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LoggingLevel,
    pub log_to_disk: bool,
    /// Layout name under `resources/layouts` or a path to a layout file.
    pub layout: String,
    pub engine: EngineSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LoggingLevel::Warn,
            log_to_disk: false,
            layout: BUILTIN_LAYOUT.to_string(),
            engine: EngineSettings::default(),
        }
    }
}

impl Config {
    /// Load from `explicit`, `$DISKSIM_CONFIG` or the XDG config directory.
    /// An explicit path must exist; the implicit locations fall back to
    /// defaults when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let Some(path) = config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join(CONFIG_DIR).join(CONFIG_FILE));
    }

    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE)
    })
}
