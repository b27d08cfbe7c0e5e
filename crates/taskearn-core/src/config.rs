//! Application configuration management.
//!
//! This module handles loading and saving the offline-shell configuration:
//! the shell origin, the cache generation version, the shell manifest and the
//! backend host that must never be cached.
//!
//! Configuration is stored at `~/.config/taskearn-offline/config.json`.
//! `TASKEARN_ORIGIN`, `TASKEARN_API_HOST` and `TASKEARN_CACHE_VERSION`
//! override the file when set.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{ApiHostMatcher, GenerationId, ShellManifest};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "taskearn-offline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_ORIGIN: &str = "TASKEARN_ORIGIN";
const ENV_API_HOST: &str = "TASKEARN_API_HOST";
const ENV_CACHE_VERSION: &str = "TASKEARN_CACHE_VERSION";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the application shell is served from
    pub origin: String,
    pub cache_prefix: String,
    /// Bump on every deployment that changes shell resources
    pub version: String,
    pub shell_resources: Vec<String>,
    /// Hostname substring of the backend API
    pub api_host_pattern: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173/".to_string(),
            cache_prefix: "taskearn".to_string(),
            version: "v4".to_string(),
            shell_resources: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
            ],
            api_host_pattern: "supabase.co".to_string(),
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Rewrite the file at `path` with every field spelled out.
    ///
    /// Only what the file already holds (plus defaults) is written back;
    /// environment and command-line overrides never become permanent.
    pub fn normalize_file(path: &Path) -> Result<Self> {
        let config = Self::load_from(path)?;
        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = var(ENV_ORIGIN) {
            self.origin = origin;
        }
        if let Some(host) = var(ENV_API_HOST) {
            self.api_host_pattern = host;
        }
        if let Some(version) = var(ENV_CACHE_VERSION) {
            self.version = version;
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin URL: {}", self.origin))
    }

    pub fn generation_id(&self) -> Result<GenerationId> {
        let id = GenerationId::versioned(&self.cache_prefix, &self.version);
        id.validate().with_context(|| {
            format!(
                "Invalid cache_prefix {:?} or version {:?}",
                self.cache_prefix, self.version
            )
        })?;
        Ok(id)
    }

    pub fn manifest(&self) -> ShellManifest {
        ShellManifest::new(self.shell_resources.iter().cloned())
    }

    pub fn api_hosts(&self) -> ApiHostMatcher {
        ApiHostMatcher::new(self.api_host_pattern.clone())
    }
}
