//! Application configuration for prodcat.
//!
//! User config lives at `~/.prodcat/prodcat.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets (the store connection string, API tokens) never live in the file;
//! the file only names the environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ProdcatError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prodcat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prodcat";

// ---------------------------------------------------------------------------
// Config structs (matching prodcat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Product store connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Remote catalog API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Image hosting settings.
    #[serde(default)]
    pub images: ImagesConfig,

    /// Rule table location.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Users allowed through the credential check.
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the env var holding the connection string.
    #[serde(default = "default_url_env")]
    pub url_env: String,

    /// Name of the env var holding the auth token for remote databases.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

fn default_url_env() -> String {
    "DATABASE_URL".into()
}
fn default_auth_token_env() -> String {
    "DATABASE_AUTH_TOKEN".into()
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API, including the `/api` prefix.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:3001/api".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Base URL that relative image filenames are resolved against.
    #[serde(default)]
    pub blob_base_url: Option<String>,

    /// Placeholder filename that must never be rewritten.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            blob_base_url: None,
            placeholder: default_placeholder(),
        }
    }
}

fn default_placeholder() -> String {
    "placeholder-product.svg".into()
}

/// `[rules]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Path to a rule table TOML file; built-in rules when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `[[users]]` entry: a name and the hex SHA-256 digest of its secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub secret_sha256: String,
    #[serde(default)]
    pub admin: bool,
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Store connection settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Local path, `file:` URL, or remote `libsql://` / `https://` URL.
    pub url: String,
    /// Auth token for remote databases.
    pub auth_token: Option<String>,
}

/// Resolve the store connection string from the configured env var.
///
/// A missing or empty value is a configuration error; commands call this
/// before doing any work.
pub fn database_settings(config: &AppConfig) -> Result<DatabaseSettings> {
    let var_name = &config.database.url_env;
    let url = match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => {
            return Err(ProdcatError::config(format!(
                "database connection string not found. Set the {var_name} environment variable."
            )));
        }
    };
    let auth_token = std::env::var(&config.database.auth_token_env)
        .ok()
        .filter(|t| !t.is_empty());
    Ok(DatabaseSettings { url, auth_token })
}

/// Parse and validate the configured API base URL.
pub fn api_base_url(config: &AppConfig) -> Result<Url> {
    let url = Url::parse(&config.api.base_url).map_err(|e| {
        ProdcatError::config(format!("invalid api.base_url '{}': {e}", config.api.base_url))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ProdcatError::config(format!(
            "api.base_url must be http(s), got '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prodcat/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProdcatError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prodcat/prodcat.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ProdcatError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ProdcatError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProdcatError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProdcatError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProdcatError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
