//! Configuration for signing services.
//!
//! [`SigningConfig`] carries the settings that stay constant across many
//! signatures (which key, which chain, how long to wait for the external
//! signer). Per-signature settings live in
//! [`SignOptions`](crate::signatures::SignOptions).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of bytes reserved for the signature container.
pub const DEFAULT_RESERVATION: usize = 8192;

/// Signing service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Keystore alias of the private key used for signing.
    pub key_alias: String,

    /// Keystore aliases of the certificate chain, signer first.
    pub certificate_aliases: Vec<String>,

    /// Upper bound for a single external signing call, in milliseconds.
    pub signer_timeout_ms: Option<u64>,

    /// Bytes reserved for the signature container.
    pub reservation: usize,

    /// Share parsed certificates across signatures.
    pub cache_certificates: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            key_alias: String::new(),
            certificate_aliases: Vec::new(),
            signer_timeout_ms: None,
            reservation: DEFAULT_RESERVATION,
            cache_certificates: true,
        }
    }

    /// Set the signing key alias.
    pub fn with_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = alias.into();
        self
    }

    /// Set the certificate chain aliases, signer first.
    pub fn with_certificate_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.certificate_aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Bound each external signing call.
    pub fn with_signer_timeout(mut self, timeout: Duration) -> Self {
        self.signer_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the number of bytes reserved for the container.
    pub fn with_reservation(mut self, bytes: usize) -> Self {
        self.reservation = bytes;
        self
    }

    /// Enable or disable the shared certificate cache.
    pub fn with_certificate_cache(mut self, enable: bool) -> Self {
        self.cache_certificates = enable;
        self
    }

    /// Timeout as a [`Duration`], if configured.
    pub fn signer_timeout(&self) -> Option<Duration> {
        self.signer_timeout_ms.map(Duration::from_millis)
    }

    /// Parse configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Check that the configuration can drive a signature.
    pub fn validate(&self) -> Result<()> {
        if self.key_alias.is_empty() {
            return Err(Error::InvalidConfig("key_alias must not be empty".to_string()));
        }
        if self.certificate_aliases.is_empty() {
            return Err(Error::EmptyCertificateChain);
        }
        if self.reservation == 0 {
            return Err(Error::InvalidConfig("reservation must be positive".to_string()));
        }
        Ok(())
    }
}
