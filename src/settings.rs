//! Persisted settings
//!
//! Credential, model and system instructions live in one JSON document:
//! - $XDG_CONFIG_HOME/story-forge/settings.json (or the platform equivalent)
//!
//! Each value sits under its own key (`apiKey`, `selectedModel`,
//! `systemInstructions`). A missing file or key reads as the default.

use crate::story::GenerationRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Model selected until the user picks another
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1:free";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unable to determine a config directory")]
    NoConfigDir,
}

/// Named settings keys, as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ApiKey,
    SelectedModel,
    SystemInstructions,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::ApiKey => "apiKey",
            SettingKey::SelectedModel => "selectedModel",
            SettingKey::SystemInstructions => "systemInstructions",
        }
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apiKey" | "api-key" | "api_key" => Ok(SettingKey::ApiKey),
            "selectedModel" | "model" | "selected-model" | "selected_model" => {
                Ok(SettingKey::SelectedModel)
            }
            "systemInstructions" | "instructions" | "system-instructions"
            | "system_instructions" => Ok(SettingKey::SystemInstructions),
            other => Err(format!(
                "unknown setting '{}' (expected apiKey, selectedModel or systemInstructions)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Bearer credential for the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub selected_model: String,

    /// Empty means the client's built-in storyteller persona
    #[serde(default)]
    pub system_instructions: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            selected_model: default_model(),
            system_instructions: String::new(),
        }
    }
}

impl Settings {
    pub fn get(&self, key: SettingKey) -> &str {
        match key {
            SettingKey::ApiKey => self.api_key.as_deref().unwrap_or(""),
            SettingKey::SelectedModel => &self.selected_model,
            SettingKey::SystemInstructions => &self.system_instructions,
        }
    }

    /// Set a value. An empty API key removes the credential.
    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        let value = value.into();
        match key {
            SettingKey::ApiKey => {
                self.api_key = if value.trim().is_empty() {
                    None
                } else {
                    Some(value)
                };
            }
            SettingKey::SelectedModel => self.selected_model = value,
            SettingKey::SystemInstructions => self.system_instructions = value,
        }
    }

    /// Pick the credential for a run.
    ///
    /// Priority: explicit flag > settings file > environment variable.
    pub fn resolve_credential(&self, flag: Option<&str>, api_key_env: &str) -> String {
        flag.filter(|k| !k.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
            .or_else(|| std::env::var(api_key_env).ok())
            .unwrap_or_default()
    }

    /// Build a request for `prompt` from these settings
    pub fn to_request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(prompt)
            .with_instructions(self.system_instructions.clone())
            .with_model(self.selected_model.clone())
    }

    /// Credential shown with everything past its prefix masked
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let prefix: String = key.chars().take(6).collect();
            format!("{}{}", prefix, "*".repeat(key.chars().count().saturating_sub(6).min(24)))
        })
    }
}

/// File-backed settings document
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location
    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::open(Self::default_path()?))
    }

    /// Get the default settings file path
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join("story-forge").join("settings.json"))
            .ok_or(SettingsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing or empty file yields defaults
    pub fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Read {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write settings, creating the parent directory if missing
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let content = serde_json::to_string_pretty(settings).map_err(|source| {
            SettingsError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, content).map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Change one value and write the document back
    pub fn set(&self, key: SettingKey, value: impl Into<String>) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        settings.set(key, value);
        self.save(&settings)?;
        Ok(settings)
    }

    /// Remove the stored credential
    pub fn clear_credential(&self) -> Result<Settings, SettingsError> {
        self.set(SettingKey::ApiKey, "")
    }
}
