use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::{env, fs};
use thiserror::Error;

pub const SETTINGS_FILE: &str = ".cloudhealthapi.json";

/// Contents of the settings file: credentials plus a flat key-value cache.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub creds: Creds,
    #[serde(default)]
    pub cache: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Creds {
    pub api_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not locate a home directory for the current user")]
    MissingHomeDir,
    #[error("No API key found. Set it with `chapi configure --key <key>` or export CHAPI_KEY")]
    MissingApiKey,
}

/// Resolved configuration handed to client constructors. Nothing else
/// reads the environment or the settings file.
#[derive(Debug)]
pub struct EffectiveConfig {
    pub api_key: String,
}

/// Reads and writes the JSON settings file. A missing file is treated as
/// an empty settings object and created on first write. Writes are whole-
/// file, last-writer-wins.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(SettingsError::MissingHomeDir)?;
        Ok(home.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {:?}", self.path))?;
        let settings =
            serde_json::from_str(&contents).with_context(|| format!("parsing {:?}", self.path))?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        let serialized = serde_json::to_string(settings).context("serializing settings")?;
        fs::write(&self.path, serialized).with_context(|| format!("writing {:?}", self.path))?;
        debug!("saved settings to {:?}", self.path);
        Ok(())
    }

    pub fn set_api_key(&self, api_key: &str) -> Result<()> {
        let mut settings = self.load()?;
        settings.creds.api_key = Some(api_key.trim().to_string());
        self.save(&settings)
    }

    pub fn cache_get(&self, name: &str) -> Result<Option<Value>> {
        let settings = self.load()?;
        Ok(settings.cache.get(name).cloned())
    }

    pub fn cache_set(&self, name: &str, value: Value) -> Result<()> {
        let mut settings = self.load()?;
        settings.cache.insert(name.to_string(), value);
        self.save(&settings)
    }
}

/// Resolves the API key: explicit override first, then the `CHAPI_KEY`
/// environment variable, then the settings file.
pub fn resolve(store: &SettingsStore, api_key_override: Option<String>) -> Result<EffectiveConfig> {
    if let Some(key) = api_key_override {
        return Ok(EffectiveConfig {
            api_key: key.trim().to_string(),
        });
    }

    if let Ok(key) = env::var("CHAPI_KEY") {
        if !key.trim().is_empty() {
            return Ok(EffectiveConfig {
                api_key: key.trim().to_string(),
            });
        }
    }

    let settings = store.load()?;
    let api_key = settings
        .creds
        .api_key
        .ok_or(SettingsError::MissingApiKey)
        .map(|k| k.trim().to_string())?;

    Ok(EffectiveConfig { api_key })
}
