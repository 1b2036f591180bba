//! Configuration loading for freshd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.freshcache/config.toml` (user)
//! 3. `/etc/freshcache/config.toml` (system)
//!
//! The discovery host is deployment-specific; `FRESHCACHE_DISCOVERY_URL`
//! overrides whatever the file says.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::{
    DEFAULT_DISCOVERY_PATH, DEFAULT_DISCOVERY_URL, DecoderKind, DescriptorDecoder, DiscoveryConfig,
};
use crate::retry::RetryConfig;
use crate::{FreshnessError, Result};

/// Environment variable overriding `discovery.base_url`.
pub const DISCOVERY_URL_ENV: &str = "FRESHCACHE_DISCOVERY_URL";

/// Cookie carrying the session identifier.
pub const DEFAULT_SESSION_COOKIE: &str = "_scrumninja_freshness_user";

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:9743).
    #[serde(default = "default_address")]
    pub address: String,
    /// Name of the session cookie.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            session_cookie: default_session_cookie(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9743".to_string()
}

fn default_session_cookie() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

/// Discovery endpoint configuration.
#[derive(Clone, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_discovery_url")]
    pub base_url: String,
    #[serde(default = "default_discovery_path")]
    pub path: String,
    /// Payload decoding: "plain", "base64" or "aes".
    #[serde(default)]
    pub decoder: DecoderKind,
    /// Base64 AES key, required by the "aes" decoder.
    #[serde(default)]
    pub key: Option<String>,
    /// Request timeout in seconds (default: 5).
    #[serde(default = "default_discovery_timeout")]
    pub timeout_secs: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            base_url: default_discovery_url(),
            path: default_discovery_path(),
            decoder: DecoderKind::default(),
            key: None,
            timeout_secs: default_discovery_timeout(),
        }
    }
}

impl DiscoverySection {
    /// Build the configured payload decoder.
    pub fn build_decoder(&self) -> Result<Arc<dyn DescriptorDecoder>> {
        self.decoder.build(self.key.as_deref())
    }
}

impl fmt::Debug for DiscoverySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverySection")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("decoder", &self.decoder)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_discovery_url() -> String {
    DEFAULT_DISCOVERY_URL.to_string()
}

fn default_discovery_path() -> String {
    DEFAULT_DISCOVERY_PATH.to_string()
}

fn default_discovery_timeout() -> u64 {
    5
}

impl From<&DiscoverySection> for DiscoveryConfig {
    fn from(section: &DiscoverySection) -> Self {
        DiscoveryConfig::with_url(&section.base_url)
            .path(&section.path)
            .timeout(Duration::from_secs(section.timeout_secs))
    }
}

/// Cache operation limits.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Bound on a single cache read in milliseconds (default: 3000).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    3_000
}

impl CacheSection {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Reconnect behaviour, see [`RetryConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay() -> u64 {
    50
}

fn default_max_delay() -> u64 {
    1_000
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_retries(section.max_retries)
            .initial_delay(Duration::from_millis(section.initial_delay_ms))
            .max_delay(Duration::from_millis(section.max_delay_ms))
    }
}

impl Config {
    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.freshcache/config.toml`
    /// 3. `/etc/freshcache/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let config = Self::load_from_file(&path)?;
        Ok(config.with_discovery_override(std::env::var(DISCOVERY_URL_ENV).ok()))
    }

    /// Parse a config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FreshnessError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            FreshnessError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Replace the discovery base URL when an override is present and non-empty.
    pub fn with_discovery_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.discovery.base_url = url;
        }
        self
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(FreshnessError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".freshcache").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/freshcache/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(FreshnessError::Configuration(
            "No config file found. Create ~/.freshcache/config.toml or /etc/freshcache/config.toml"
                .to_string(),
        ))
    }
}
