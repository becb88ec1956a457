//! Application configuration for Postforge.
//!
//! User config lives at `~/.postforge/postforge.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file — only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PostforgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "postforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".postforge";

// ---------------------------------------------------------------------------
// Config structs (matching postforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generative model settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Search provider settings.
    #[serde(default)]
    pub serp: SerpConfig,

    /// Pacing between remote calls.
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the local database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Number of search results requested per discovery call.
    #[serde(default = "default_max_results")]
    pub max_search_results: usize,

    /// The acquisition loop stops after this many successful extractions.
    #[serde(default = "default_target_references")]
    pub target_references: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_search_results: default_max_results(),
            target_references: default_target_references(),
        }
    }
}

fn default_db_path() -> String {
    "~/.postforge/postforge.db".into()
}
fn default_max_results() -> usize {
    crate::types::MAX_SEARCH_RESULTS
}
fn default_target_references() -> usize {
    crate::types::TARGET_REFERENCES
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never the key itself).
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Model used for synthesis and formatting.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (overridable for tests and proxies).
    #[serde(default = "default_openai_base")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_model(),
            base_url: default_openai_base(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini-2024-07-18".into()
}
fn default_openai_base() -> String {
    "https://api.openai.com".into()
}

/// `[serp]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_serp_key_env")]
    pub api_key_env: String,

    /// Search engine passed to the provider.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Provider base URL (overridable for tests).
    #[serde(default = "default_serp_base")]
    pub base_url: String,
}

impl Default for SerpConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_serp_key_env(),
            engine: default_engine(),
            base_url: default_serp_base(),
        }
    }
}

fn default_serp_key_env() -> String {
    "SERP_API_KEY".into()
}
fn default_engine() -> String {
    "google".into()
}
fn default_serp_base() -> String {
    "https://serpapi.com".into()
}

/// `[pacing]` section. Courtesy delays, not a backoff algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay in ms between documents in a run.
    #[serde(default = "default_document_delay")]
    pub document_delay_ms: u64,

    /// Delay in ms between extraction attempts within one document.
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            document_delay_ms: default_document_delay(),
            fetch_delay_ms: default_fetch_delay(),
        }
    }
}

fn default_document_delay() -> u64 {
    1_000
}
fn default_fetch_delay() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.postforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PostforgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.postforge/postforge.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| PostforgeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PostforgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PostforgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PostforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PostforgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required API key from the env var named in the config.
pub fn read_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PostforgeError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Expand a leading `~/` in a configured path.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
