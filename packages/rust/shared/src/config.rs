//! Application configuration for QuestGuide.
//!
//! User config lives at `~/.questguide/questguide.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuestGuideError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "questguide.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".questguide";

// ---------------------------------------------------------------------------
// Config structs (matching questguide.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Content cache sizing.
    #[serde(default)]
    pub cache: CacheSection,

    /// Image collection tuning.
    #[serde(default)]
    pub images: ImagesSection,

    /// Guide generation retry policy.
    #[serde(default)]
    pub generator: GeneratorSection,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Maximum number of cached enrichments.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_cache_capacity() -> usize {
    500
}
fn default_ttl_secs() -> u64 {
    3 * 24 * 60 * 60
}
fn default_sweep_interval() -> u64 {
    60 * 60
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesSection {
    /// Hard timeout for fetching a reference page.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Images with a declared width or height below this are treated as decoration.
    #[serde(default = "default_min_dimension")]
    pub min_dimension: u32,

    /// Scraped images scoring above this are accepted outright.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,

    /// How many scraped images to keep.
    #[serde(default = "default_max_scraped")]
    pub max_scraped: usize,

    /// Minimum per-objective relevance for a scraped image to be matched.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            min_dimension: default_min_dimension(),
            relevance_threshold: default_relevance_threshold(),
            max_scraped: default_max_scraped(),
            match_threshold: default_match_threshold(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    5
}
fn default_min_dimension() -> u32 {
    50
}
fn default_relevance_threshold() -> f64 {
    0.1
}
fn default_max_scraped() -> usize {
    10
}
fn default_match_threshold() -> f64 {
    0.5
}

/// `[generator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSection {
    /// Total model attempts per quest.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    1000
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for guide generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat-completions API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_request_timeout() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    2500
}
fn default_temperature() -> f32 {
    0.7
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime content-cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            capacity: config.cache.capacity,
            default_ttl: Duration::from_secs(config.cache.ttl_secs),
            sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs),
        }
    }
}

/// Runtime image-collection configuration.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub fetch_timeout: Duration,
    pub min_dimension: u32,
    pub relevance_threshold: f64,
    pub max_scraped: usize,
    pub match_threshold: f64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ImageConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.images.fetch_timeout_secs),
            min_dimension: config.images.min_dimension,
            relevance_threshold: config.images.relevance_threshold,
            max_scraped: config.images.max_scraped,
            match_threshold: config.images.match_threshold,
        }
    }
}

/// Runtime guide-generation configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for GeneratorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.generator.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.generator.retry_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.questguide/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| QuestGuideError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.questguide/questguide.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QuestGuideError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        QuestGuideError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QuestGuideError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QuestGuideError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QuestGuideError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(QuestGuideError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
