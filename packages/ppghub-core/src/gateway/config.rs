use crate::storage::get_config_dir;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default API URL (local development backend)
const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Environment variable name for API URL override
pub const ENV_API_URL: &str = "PPGHUB_API_URL";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    api: Option<ApiSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiSection {
    /// API endpoint URL (e.g., "https://ppghub.example.edu/api")
    base_url: Option<String>,
    /// Per-request timeout in seconds
    timeout_secs: Option<u64>,
}

/// Runtime API endpoint configuration
#[derive(Debug, Clone)]
pub struct ApiEndpointConfig {
    /// Base URL for API calls, without trailing slash
    pub base_url: String,
    pub timeout: Duration,
    /// Source of the base URL (for logging)
    pub source: ConfigSource,
}

impl Default for ApiEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            source: ConfigSource::Default,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Default,
    Environment,
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    get_config_dir().ok().map(|p| p.join("config.toml"))
}

/// Load configuration from the config file
fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}

/// Resolve the endpoint from already-gathered inputs, with priority:
/// 1. Environment variable
/// 2. Config file
/// 3. Default values
///
/// The timeout always comes from the config file when set there.
pub fn resolve_api_config(env_url: Option<&str>, file: Option<&ConfigFile>) -> ApiEndpointConfig {
    let section = file.and_then(|f| f.api.as_ref());
    let timeout = section
        .and_then(|s| s.timeout_secs)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

    if let Some(url) = env_url.and_then(normalize_url) {
        return ApiEndpointConfig {
            base_url: url,
            timeout,
            source: ConfigSource::Environment,
        };
    }

    if let Some(url) = section
        .and_then(|s| s.base_url.as_deref())
        .and_then(normalize_url)
    {
        return ApiEndpointConfig {
            base_url: url,
            timeout,
            source: ConfigSource::ConfigFile,
        };
    }

    ApiEndpointConfig {
        timeout,
        ..ApiEndpointConfig::default()
    }
}

/// Load API endpoint configuration from `PPGHUB_API_URL`, then
/// `~/.config/ppghub/config.toml`, then defaults.
pub fn load_api_config() -> ApiEndpointConfig {
    let env_url = std::env::var(ENV_API_URL).ok();
    let file = load_config_file();
    let config = resolve_api_config(env_url.as_deref(), file.as_ref());

    match config.source {
        ConfigSource::Default => {
            tracing::debug!("Using default API URL: {}", config.base_url)
        }
        ref source => tracing::info!("Using API URL from {}: {}", source, config.base_url),
    }
    config
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/ppghub/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# PPG Hub Client Configuration
# Place this file at: ~/.config/ppghub/config.toml

[api]
# API endpoint URL
# Default: http://localhost:8080/api
# base_url = "https://ppghub.example.edu/api"

# Request timeout in seconds (default: 10)
# timeout_secs = 10
"#
    .to_string()
}
