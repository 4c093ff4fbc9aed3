//! Main application configuration
//!
//! This module defines the configuration structures for the tier ladder,
//! including file and environment variable loading and validation.

use crate::dex::Dex;
use crate::tier::cache::DEFAULT_CACHE_CAPACITY;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub store: StoreSettings,
    pub tiers: TierSettings,
    pub dex: DexSettings,
    pub cache: CacheSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Persistent store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store backend: "memory" or "json"
    pub backend: String,
    /// Directory holding the store's files
    pub data_dir: PathBuf,
    /// Directory searched for legacy `tier_<Name>.txt` ladders
    pub seed_dir: PathBuf,
}

/// Tier definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TierSettings {
    /// File with one tier definition per line
    pub file: Option<PathBuf>,
    /// Inline tier definitions, loaded after those of `file`
    pub definitions: Vec<String>,
}

/// Species and item name lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DexSettings {
    pub species_file: Option<PathBuf>,
    pub items_file: Option<PathBuf>,
}

/// Member cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entries per tier before the whole cache is invalidated
    pub capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "tier-ladder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            data_dir: PathBuf::from("data"),
            seed_dir: PathBuf::from("."),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }

        if let Ok(backend) = env::var("STORE_BACKEND") {
            config.store.backend = backend;
        }
        if let Ok(data_dir) = env::var("STORE_DATA_DIR") {
            config.store.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(seed_dir) = env::var("SEED_DIR") {
            config.store.seed_dir = PathBuf::from(seed_dir);
        }

        if let Ok(file) = env::var("TIERS_FILE") {
            config.tiers.file = Some(PathBuf::from(file));
        }
        if let Ok(file) = env::var("SPECIES_FILE") {
            config.dex.species_file = Some(PathBuf::from(file));
        }
        if let Ok(file) = env::var("ITEMS_FILE") {
            config.dex.items_file = Some(PathBuf::from(file));
        }

        if let Ok(capacity) = env::var("CACHE_CAPACITY") {
            config.cache.capacity = capacity
                .parse()
                .map_err(|_| anyhow!("Invalid CACHE_CAPACITY value: {}", capacity))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// All tier definition lines: those of the tiers file, then inline ones.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn tier_definitions(&self) -> Result<Vec<String>> {
        let mut definitions = Vec::new();

        if let Some(file) = &self.tiers.file {
            let contents = fs::read_to_string(file)
                .with_context(|| format!("Failed to read tiers file {}", file.display()))?;
            definitions.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }

        definitions.extend(self.tiers.definitions.iter().cloned());
        Ok(definitions)
    }

    /// Load the species and item lists; an unconfigured dex is empty
    pub fn load_dex(&self) -> Result<Dex> {
        match (&self.dex.species_file, &self.dex.items_file) {
            (Some(species), Some(items)) => Dex::load(species, items),
            (None, None) => Ok(Dex::default()),
            _ => Err(anyhow!(
                "Both dex.species_file and dex.items_file must be set"
            )),
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate store settings
    match config.store.backend.to_lowercase().as_str() {
        "memory" | "json" => {}
        other => return Err(anyhow!("Unsupported store backend: {}", other)),
    }
    if config.store.data_dir.as_os_str().is_empty() {
        return Err(anyhow!("Store data dir cannot be empty"));
    }

    // Validate cache settings
    if config.cache.capacity == 0 {
        return Err(anyhow!("Cache capacity must be greater than 0"));
    }

    Ok(())
}
