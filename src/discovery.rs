//! Cluster discovery: fetch and decode cache-cluster connection parameters.
//!
//! Cluster membership and credentials are not configured locally. They are
//! served by a deployment-specific discovery endpoint as an opaque payload:
//!
//! ```text
//! GET {base_url}/memcache  →  payload
//! decode(payload)          →  "host1:6379,host2:6379@username@password"
//! ```
//!
//! How the payload is decoded varies per deployment, so it is a pluggable
//! [`DescriptorDecoder`]. Production deployments encrypt it: base64 over
//! AES-CBC with a shared key, see [`AesDecoder`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use aes::{Aes128, Aes192, Aes256};
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{FreshnessError, Result};

/// Default path of the discovery action on the discovery host.
pub const DEFAULT_DISCOVERY_PATH: &str = "/memcache";

/// Default discovery host.
pub const DEFAULT_DISCOVERY_URL: &str = "http://localhost:8080";

/// Configuration for the discovery call.
///
/// ```rust
/// # use freshcache::DiscoveryConfig;
/// # use std::time::Duration;
/// let config = DiscoveryConfig::with_url("https://app.example.com")
///     .timeout(Duration::from_secs(2));
/// assert_eq!(config.endpoint(), "https://app.example.com/memcache");
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Deployment-specific base address of the discovery host.
    pub base_url: String,
    /// Path of the discovery action. Default: `/memcache`.
    pub path: String,
    /// Request timeout. Default: 5s.
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DISCOVERY_URL.to_string(),
            path: DEFAULT_DISCOVERY_PATH.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl DiscoveryConfig {
    /// Create a config for a discovery host with default path and timeout.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the discovery action path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the discovery action.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

// ============================================================================
// Cluster descriptor
// ============================================================================

/// Decoded cluster connection parameters.
///
/// Text form: `servers@username@password`, where `servers` is a
/// comma-separated address list and the credential parts are optional.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    /// Cache node addresses (`host:port`, or full `redis://` URLs).
    pub servers: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClusterDescriptor {
    /// Parse the decoded descriptor text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.trim().splitn(3, '@');
        let servers: Vec<String> = parts
            .next()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if servers.is_empty() {
            return Err(FreshnessError::ConnectionSetup(
                "cluster descriptor lists no servers".to_string(),
            ));
        }
        let mut credential = || {
            parts
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let username = credential();
        let password = credential();
        Ok(Self {
            servers,
            username,
            password,
        })
    }
}

impl FromStr for ClusterDescriptor {
    type Err = FreshnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Credentials never reach logs.
impl fmt::Debug for ClusterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterDescriptor")
            .field("servers", &self.servers)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Payload decoders
// ============================================================================

/// Turns the opaque discovery payload into descriptor text.
///
/// Implement this for deployment-specific schemes (e.g. decryption).
pub trait DescriptorDecoder: Send + Sync {
    /// Decoder name, for logs.
    fn name(&self) -> &str;

    /// Decode `payload` into `servers@username@password` text.
    fn decode(&self, payload: &[u8]) -> Result<String>;
}

/// Payload is the descriptor text itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainDecoder;

impl DescriptorDecoder for PlainDecoder {
    fn name(&self) -> &str {
        "plain"
    }

    fn decode(&self, payload: &[u8]) -> Result<String> {
        String::from_utf8(payload.to_vec()).map_err(|e| {
            FreshnessError::ConnectionSetup(format!("discovery payload is not UTF-8: {e}"))
        })
    }
}

/// Payload is the base64 (standard alphabet) encoding of the descriptor text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Decoder;

impl DescriptorDecoder for Base64Decoder {
    fn name(&self) -> &str {
        "base64"
    }

    fn decode(&self, payload: &[u8]) -> Result<String> {
        let trimmed = payload.trim_ascii();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(trimmed)
            .map_err(|e| {
                FreshnessError::ConnectionSetup(format!("discovery payload is not base64: {e}"))
            })?;
        PlainDecoder.decode(&bytes)
    }
}

/// Payload is base64 over AES-CBC ciphertext (PKCS#7 padding).
///
/// The key length selects AES-128, AES-192 or AES-256. The IV defaults to
/// all zeros, matching deployments that only share a key.
///
/// ```rust
/// # use freshcache::discovery::{AesDecoder, DescriptorDecoder};
/// let decoder = AesDecoder::from_base64("AAECAwQFBgcICQoLDA0ODw==").unwrap();
/// let text = decoder.decode(b"IhX+l3Cebd9RxDSV51TxQQ==").unwrap();
/// assert_eq!(text, "127.0.0.1:1");
/// ```
#[derive(Clone)]
pub struct AesDecoder {
    key: Vec<u8>,
    iv: [u8; 16],
}

impl AesDecoder {
    /// Create a decoder for a raw 16, 24 or 32 byte key.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(FreshnessError::Configuration(format!(
                "AES key must be 16, 24 or 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Self { key, iv: [0; 16] })
    }

    /// Create a decoder for a base64-encoded key, as stored in config files.
    pub fn from_base64(key: &str) -> Result<Self> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(key.trim())
            .map_err(|e| FreshnessError::Configuration(format!("AES key is not base64: {e}")))?;
        Self::new(raw)
    }

    /// Use a non-zero initialization vector.
    pub fn iv(mut self, iv: [u8; 16]) -> Self {
        self.iv = iv;
        self
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let (key, iv) = (self.key.as_slice(), self.iv.as_slice());
        let plain = match key.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
                .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            n => {
                return Err(FreshnessError::Configuration(format!(
                    "AES key must be 16, 24 or 32 bytes, got {n}"
                )));
            }
        };
        plain
            .map_err(|e| FreshnessError::Configuration(format!("invalid AES key: {e}")))?
            .map_err(|_| {
                FreshnessError::ConnectionSetup(
                    "discovery payload did not decrypt (wrong key or corrupt payload)".to_string(),
                )
            })
    }
}

impl DescriptorDecoder for AesDecoder {
    fn name(&self) -> &str {
        "aes"
    }

    fn decode(&self, payload: &[u8]) -> Result<String> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(payload.trim_ascii())
            .map_err(|e| {
                FreshnessError::ConnectionSetup(format!("discovery payload is not base64: {e}"))
            })?;
        PlainDecoder.decode(&self.decrypt(&ciphertext)?)
    }
}

impl fmt::Debug for AesDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesDecoder")
            .field("key", &"<redacted>")
            .field("bits", &(self.key.len() * 8))
            .finish()
    }
}

/// Built-in decoders, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    #[default]
    Plain,
    Base64,
    Aes,
}

impl DecoderKind {
    /// Instantiate the decoder. `key` is the base64 AES key and is required
    /// for [`DecoderKind::Aes`] only.
    pub fn build(self, key: Option<&str>) -> Result<Arc<dyn DescriptorDecoder>> {
        Ok(match self {
            DecoderKind::Plain => Arc::new(PlainDecoder),
            DecoderKind::Base64 => Arc::new(Base64Decoder),
            DecoderKind::Aes => {
                let key = key.ok_or_else(|| {
                    FreshnessError::Configuration("aes decoder requires a key".to_string())
                })?;
                Arc::new(AesDecoder::from_base64(key)?)
            }
        })
    }
}

// ============================================================================
// Remote fetch
// ============================================================================

/// Call the discovery endpoint and decode the cluster descriptor.
///
/// Any failure (network, HTTP status, decode, parse) is a
/// [`FreshnessError::ConnectionSetup`].
pub async fn fetch_descriptor(
    config: &DiscoveryConfig,
    decoder: &dyn DescriptorDecoder,
) -> Result<ClusterDescriptor> {
    let url = config.endpoint();
    info!(%url, decoder = decoder.name(), "requesting cache cluster descriptor");

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| FreshnessError::ConnectionSetup(format!("failed to build HTTP client: {e}")))?;

    let response = client.get(&url).send().await.map_err(|e| {
        FreshnessError::ConnectionSetup(format!("discovery request to {url} failed: {e}"))
    })?;

    if !response.status().is_success() {
        return Err(FreshnessError::ConnectionSetup(format!(
            "discovery returned HTTP {}",
            response.status()
        )));
    }

    let body = response.bytes().await.map_err(|e| {
        FreshnessError::ConnectionSetup(format!("failed to read discovery response body: {e}"))
    })?;

    let descriptor = ClusterDescriptor::parse(&decoder.decode(&body)?)?;
    debug!(?descriptor, "decoded cache cluster descriptor");
    Ok(descriptor)
}
