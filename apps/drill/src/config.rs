//! Environment configuration.

use crate::error::{DrillError, Result};
use construe_core::{GradingSettings, ModeSettings, PracticeMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const EXCERPT_VAR: &str = "CONSTRUE_EXCERPT";
pub const MASTERY_VAR: &str = "CONSTRUE_MASTERY";
pub const SETTINGS_VAR: &str = "CONSTRUE_SETTINGS";
pub const MODE_VAR: &str = "CONSTRUE_MODE";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub excerpt_path: PathBuf,
    pub mastery_path: PathBuf,
    pub settings_path: Option<PathBuf>,
    pub mode: PracticeMode,
}

/// Settings file: global settings plus optional per-mode overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsFile {
    #[serde(flatten)]
    pub global: GradingSettings,
    #[serde(default)]
    pub modes: Vec<ModeSettings>,
}

pub fn default_mastery_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("construe")
        .join("mastery.json")
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let excerpt_path = present(EXCERPT_VAR)
            .map(PathBuf::from)
            .ok_or_else(|| DrillError::Config(format!("{} must be set", EXCERPT_VAR)))?;
        let mastery_path = present(MASTERY_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(default_mastery_path);
        let settings_path = present(SETTINGS_VAR).map(PathBuf::from);
        let mode = match present(MODE_VAR) {
            Some(value) => value.parse::<PracticeMode>().map_err(DrillError::Config)?,
            None => PracticeMode::default(),
        };

        Ok(Self {
            excerpt_path,
            mastery_path,
            settings_path,
            mode,
        })
    }

    pub fn load_settings(&self) -> Result<SettingsFile> {
        match &self.settings_path {
            Some(path) => read_json(path),
            None => Ok(SettingsFile::default()),
        }
    }
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
