//! Application configuration for enrichkit.
//!
//! Non-secret settings live at `~/.enrichkit/enrichkit.toml` (or a path given
//! with `--config`). Secrets and external endpoints are read from environment
//! variables whose NAMES are configured in the file; they are resolved once at
//! process start into an [`EnvConfig`] and validated per endpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EnrichKitError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "enrichkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".enrichkit";

// ---------------------------------------------------------------------------
// Config structs (matching enrichkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Scraping proxy.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Downstream storage worker.
    #[serde(default)]
    pub forwarder: ForwarderConfig,

    /// Audit log database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Service credentials.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Batch processing.
    #[serde(default)]
    pub batch: BatchConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8787
}

/// `[proxy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Base URL of the rendering proxy API.
    #[serde(default = "default_proxy_base_url")]
    pub base_url: String,

    /// Name of the env var holding the proxy API key (never store the key itself).
    #[serde(default = "default_proxy_api_key_env")]
    pub api_key_env: String,

    /// Exit country for the premium proxy pool.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Execute JavaScript before capturing the page.
    #[serde(default = "default_true")]
    pub render_js: bool,

    /// Route through the premium proxy pool.
    #[serde(default = "default_true")]
    pub premium_proxy: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: default_proxy_base_url(),
            api_key_env: default_proxy_api_key_env(),
            country_code: default_country_code(),
            render_js: true,
            premium_proxy: true,
            timeout_secs: default_proxy_timeout(),
        }
    }
}

fn default_proxy_base_url() -> String {
    "https://app.scrapingbee.com/api/v1/".into()
}
fn default_proxy_api_key_env() -> String {
    "SCRAPINGBEE_API_KEY".into()
}
fn default_country_code() -> String {
    "us".into()
}
fn default_true() -> bool {
    true
}
fn default_proxy_timeout() -> u64 {
    120
}

/// `[forwarder]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Name of the env var holding the storage worker URL.
    #[serde(default = "default_endpoint_env")]
    pub endpoint_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_forwarder_timeout")]
    pub timeout_secs: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            endpoint_env: default_endpoint_env(),
            timeout_secs: default_forwarder_timeout(),
        }
    }
}

fn default_endpoint_env() -> String {
    "STORAGE_WORKER_URL".into()
}
fn default_forwarder_timeout() -> u64 {
    30
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the env var holding the database URL.
    #[serde(default = "default_database_url_env")]
    pub url_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: default_database_url_env(),
        }
    }
}

fn default_database_url_env() -> String {
    "DATABASE_URL".into()
}

/// `[credentials]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Name of the env var holding the service-role key. Used for the storage
    /// worker and as the database auth token.
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            service_key_env: default_service_key_env(),
        }
    }
}

fn default_service_key_env() -> String {
    "SERVICE_ROLE_KEY".into()
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum companies processed at once. `1` keeps the batch strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Environment-resolved values
// ---------------------------------------------------------------------------

/// Raw values of the configured environment variables, captured once.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub proxy_api_key: Option<String>,
    pub storage_endpoint: Option<String>,
    pub service_key: Option<String>,
    pub database_url: Option<String>,
}

impl EnvConfig {
    /// Read every configured variable from the process environment.
    pub fn from_env(config: &AppConfig) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve variables through an arbitrary lookup (used by tests).
    pub fn from_lookup(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            proxy_api_key: get(&config.proxy.api_key_env),
            storage_endpoint: get(&config.forwarder.endpoint_env),
            service_key: get(&config.credentials.service_key_env),
            database_url: get(&config.database.url_env),
        }
    }

    /// Everything `POST /scrape-batch` needs, or one error naming every missing variable.
    pub fn scrape_settings(&self, config: &AppConfig) -> Result<ScrapeSettings> {
        let missing = missing_vars(&[
            (&config.proxy.api_key_env, &self.proxy_api_key),
            (&config.forwarder.endpoint_env, &self.storage_endpoint),
            (&config.credentials.service_key_env, &self.service_key),
        ]);
        if !missing.is_empty() {
            return Err(missing_config_error(&missing));
        }

        let (Some(api_key), Some(endpoint), Some(service_key)) = (
            self.proxy_api_key.clone(),
            self.storage_endpoint.as_deref(),
            self.service_key.clone(),
        ) else {
            return Err(EnrichKitError::config("incomplete scrape configuration"));
        };

        let base_url = Url::parse(&config.proxy.base_url).map_err(|e| {
            EnrichKitError::config(format!(
                "invalid proxy.base_url '{}': {e}",
                config.proxy.base_url
            ))
        })?;
        let endpoint = Url::parse(endpoint).map_err(|e| {
            EnrichKitError::config(format!(
                "invalid {} '{endpoint}': {e}",
                config.forwarder.endpoint_env
            ))
        })?;

        Ok(ScrapeSettings {
            proxy: ProxySettings {
                base_url,
                api_key,
                country_code: config.proxy.country_code.clone(),
                render_js: config.proxy.render_js,
                premium_proxy: config.proxy.premium_proxy,
                timeout: Duration::from_secs(config.proxy.timeout_secs),
            },
            forwarder: ForwarderSettings {
                endpoint,
                service_key,
                timeout: Duration::from_secs(config.forwarder.timeout_secs),
            },
            concurrency: config.batch.concurrency.max(1) as usize,
        })
    }

    /// Everything the result logger needs to open its database.
    pub fn database_settings(&self, config: &AppConfig) -> Result<DatabaseSettings> {
        let missing = missing_vars(&[
            (&config.database.url_env, &self.database_url),
            (&config.credentials.service_key_env, &self.service_key),
        ]);
        if !missing.is_empty() {
            return Err(missing_config_error(&missing));
        }

        match (self.database_url.clone(), self.service_key.clone()) {
            (Some(url), Some(auth_token)) => Ok(DatabaseSettings { url, auth_token }),
            _ => Err(EnrichKitError::config("incomplete database configuration")),
        }
    }
}

fn missing_vars<'a>(vars: &[(&'a String, &Option<String>)]) -> Vec<&'a str> {
    vars.iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name.as_str())
        .collect()
}

fn missing_config_error(missing: &[&str]) -> EnrichKitError {
    EnrichKitError::config(format!(
        "missing required environment variables: {}",
        missing.join(", ")
    ))
}

/// Resolved rendering proxy settings.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub base_url: Url,
    pub api_key: String,
    pub country_code: String,
    pub render_js: bool,
    pub premium_proxy: bool,
    pub timeout: Duration,
}

/// Resolved storage worker settings.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub endpoint: Url,
    pub service_key: String,
    pub timeout: Duration,
}

/// Resolved settings for a batch run.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub proxy: ProxySettings,
    pub forwarder: ForwarderSettings,
    pub concurrency: usize,
}

/// Resolved audit database settings.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub auth_token: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.enrichkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EnrichKitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.enrichkit/enrichkit.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EnrichKitError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EnrichKitError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EnrichKitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EnrichKitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EnrichKitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
