//! Runtime settings for the generator and image providers.
//!
//! Values come from the environment first, then a TOML config file layered on
//! top (non-empty values win). [`ConfigFile`] re-reads the file on every
//! snapshot so edits made while the process runs are picked up.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Provider;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Read-only configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub image_provider: Provider,
    pub pollinations_api_key: String,
    pub pollinations_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: String::new(),
            openai_model: "gpt-4o".to_string(),
            image_provider: Provider::Dicebear,
            pollinations_api_key: String::new(),
            pollinations_model: "flux".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by any environment variables that are set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(v) = var("OPENAI_API_KEY") {
            settings.openai_api_key = v;
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            settings.openai_base_url = v;
        }
        if let Some(v) = var("DEFAULT_MODEL") {
            settings.openai_model = v;
        }
        if let Some(provider) = var("IMAGE_PROVIDER").and_then(|v| Provider::from_name(&v)) {
            settings.image_provider = provider;
        }
        if let Some(v) = var("POLLINATIONS_API_KEY") {
            settings.pollinations_api_key = v;
        }
        if let Some(v) = var("POLLINATIONS_MODEL") {
            settings.pollinations_model = v;
        }
        settings
    }

    /// Layer non-empty values from a partial config over these settings.
    fn overlay(mut self, partial: PartialSettings) -> Self {
        fn take(target: &mut String, value: Option<String>) {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                *target = v;
            }
        }

        take(&mut self.openai_api_key, partial.openai_api_key);
        take(&mut self.openai_base_url, partial.openai_base_url);
        take(&mut self.openai_model, partial.openai_model);
        take(&mut self.pollinations_api_key, partial.pollinations_api_key);
        take(&mut self.pollinations_model, partial.pollinations_model);
        if let Some(provider) = partial.image_provider {
            self.image_provider = provider;
        }
        self
    }

    pub fn has_pollinations_key(&self) -> bool {
        !self.pollinations_api_key.trim().is_empty()
    }
}

/// On-disk shape: every key optional so a sparse file is valid.
#[derive(Debug, Default, Deserialize)]
struct PartialSettings {
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    openai_model: Option<String>,
    image_provider: Option<Provider>,
    pollinations_api_key: Option<String>,
    pollinations_model: Option<String>,
}

/// Something that can hand out the current settings.
pub trait SettingsSource: Send + Sync {
    fn snapshot(&self) -> Settings;
}

impl SettingsSource for Settings {
    fn snapshot(&self) -> Settings {
        self.clone()
    }
}

/// Settings backed by a TOML file, re-read on every snapshot.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default config location under the user's config directory.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("lexis").join("config.toml"))
            .ok_or(SettingsError::ConfigDirNotFound)
    }

    pub fn load(&self) -> Result<Settings> {
        let base = Settings::from_env();
        if !self.path.exists() {
            return Ok(base);
        }

        let content = fs::read_to_string(&self.path)?;
        let partial: PartialSettings = toml::from_str(&content)?;
        Ok(base.overlay(partial))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(settings)?)?;
        Ok(())
    }

    /// Replace the file with default values (keys in the environment are left alone).
    pub fn reset(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }
}

impl SettingsSource for ConfigFile {
    fn snapshot(&self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Failed to load {}: {}; using environment", self.path.display(), e);
                Settings::from_env()
            }
        }
    }
}
