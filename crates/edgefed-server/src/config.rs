//! Server configuration loading from file and environment variables.

use edgefed_federation::{GrantRole, OrgKind, StaticPolicy};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Federation protocol settings.
    #[serde(default)]
    pub federation: FederationConfig,

    /// Regions this platform's controllers serve.
    #[serde(default)]
    pub regions: Vec<RegionConfig>,

    /// Organizations known to the static policy.
    #[serde(default)]
    pub organizations: Vec<OrganizationConfig>,

    /// Role grants for the static policy.
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "edgefed_federation=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Federation protocol configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Address partners use to reach this platform's `/operator/*` endpoints.
    /// Stored as the federation address of every self federator.
    #[serde(default = "default_public_addr")]
    pub public_addr: String,

    /// Timeout for outbound peer and controller calls.
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_timeout_secs: u64,
}

/// One region and how to reach its controller.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,

    /// Controller endpoint. Without one, the region is served from
    /// `cloudlets` below.
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub cloudlets: Vec<CloudletConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudletConfig {
    pub organization: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
    pub kind: OrgKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    pub user: String,
    pub org: String,
    pub role: GrantRole,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "edgefed.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    edgefed_db::DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    edgefed_db::DbRuntimeSettings::default().pool_max_size
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_public_addr() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_peer_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            public_addr: default_public_addr(),
            peer_timeout_secs: default_peer_timeout_secs(),
        }
    }
}

impl Config {
    /// Builds the static authorization policy from `organizations` and
    /// `grants`.
    pub fn policy(&self) -> StaticPolicy {
        let policy = self
            .organizations
            .iter()
            .fold(StaticPolicy::new(), |policy, org| {
                policy.with_organization(&org.name, org.kind)
            });
        self.grants.iter().fold(policy, |policy, grant| {
            policy.with_grant(&grant.user, &grant.org, grant.role)
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EDGEFED_HOST` overrides `server.host`
/// - `EDGEFED_PORT` overrides `server.port`
/// - `EDGEFED_DB_PATH` overrides `database.path`
/// - `EDGEFED_LOG_LEVEL` overrides `logging.level`
/// - `EDGEFED_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `EDGEFED_FEDERATION_ADDR` overrides `federation.public_addr`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if it names the same region twice.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("EDGEFED_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("EDGEFED_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("EDGEFED_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("EDGEFED_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("EDGEFED_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(addr) = std::env::var("EDGEFED_FEDERATION_ADDR") {
        if !addr.trim().is_empty() {
            config.federation.public_addr = addr;
        }
    }

    let mut seen = std::collections::HashSet::new();
    for region in &config.regions {
        if !seen.insert(region.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "region {} configured twice",
                region.name
            )));
        }
    }

    Ok(config)
}
