use libwhodat::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub resolver: ResolverSettings,
}

impl Config {
    /// Rejects settings that would make every lookup fail immediately.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be at least 1".to_string());
        }
        if self.resolver.lookup_timeout_secs == 0 {
            return Err("resolver.lookup_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Deadline for resolving a whole request's domains.
    pub request_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout_secs: 5,
            log_format: LogFormat::Compact,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub lookup_timeout_secs: u64,
    pub whois_fallback: bool,
    pub max_rate_per_endpoint: u32,
    pub max_concurrent: u32,
    pub partial_results: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            lookup_timeout_secs: defaults.timeout.as_secs(),
            whois_fallback: defaults.whois_fallback,
            max_rate_per_endpoint: defaults.max_rate_per_endpoint,
            max_concurrent: defaults.max_concurrent,
            partial_results: defaults.partial_results,
        }
    }
}

impl From<&ResolverSettings> for ResolverConfig {
    fn from(settings: &ResolverSettings) -> Self {
        ResolverConfig {
            timeout: Duration::from_secs(settings.lookup_timeout_secs),
            whois_fallback: settings.whois_fallback,
            max_rate_per_endpoint: settings.max_rate_per_endpoint,
            max_concurrent: settings.max_concurrent,
            partial_results: settings.partial_results,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("whodat").join("config.toml"))
}

/// Loads `explicit` if given, otherwise the default path. A missing default
/// file yields the built-in defaults; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    config
        .validate()
        .map_err(|reason| ConfigError::Invalid { path, reason })?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

pub fn default_config_toml() -> String {
    r#"# who-dat configuration

[server]
# Address the HTTP API listens on
bind = "127.0.0.1:8080"
# Deadline in seconds for resolving all domains of one request
request_timeout_secs = 5
# "compact" or "json"
log_format = "compact"

[resolver]
# Deadline in seconds for a single RDAP or WHOIS exchange
lookup_timeout_secs = 5
# Query port-43 WHOIS when RDAP has nothing for a TLD
whois_fallback = true
# Requests per second against any one registry server
max_rate_per_endpoint = 20
# Domains resolved in parallel per request
max_concurrent = 10
# Report per-domain failures in the "error" field instead of failing the request
partial_results = false
"#
    .to_string()
}
