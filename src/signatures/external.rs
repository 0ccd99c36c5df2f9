//! External signers.
//!
//! The private key never enters this crate's signing path: an
//! [`ExternalSigner`] receives a DER `DigestInfo` and returns the raw
//! PKCS#1 v1.5 signature over it, the way an HSM, a smart card or a remote
//! signing service would.

use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Errors reported by an [`ExternalSigner`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeystoreError {
    /// No entry under this alias
    #[error("No keystore entry for alias '{alias}'")]
    NotFound {
        /// Requested alias
        alias: String,
    },

    /// Key material could not be loaded
    #[error("Invalid key for alias '{alias}': {reason}")]
    InvalidKey {
        /// Alias being loaded
        alias: String,
        /// Underlying cause
        reason: String,
    },

    /// The signing operation itself failed
    #[error("Signing with '{alias}' failed: {reason}")]
    SigningFailed {
        /// Key alias
        alias: String,
        /// Underlying cause
        reason: String,
    },

    /// The signer did not answer in time
    #[error("Signer did not respond within {0:?}")]
    Timeout(Duration),
}

/// A keystore that signs without exposing private keys.
pub trait ExternalSigner: Send + Sync {
    /// DER certificate stored under `alias`.
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError>;

    /// Raw RSA PKCS#1 v1.5 signature over the DER `digest_info`, which is
    /// already hashed and wrapped: implementations must not hash again.
    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError>;
}

impl<T: ExternalSigner + ?Sized> ExternalSigner for Arc<T> {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        (**self).load_certificate(alias)
    }

    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
        (**self).sign(digest_info, alias)
    }
}

impl<T: ExternalSigner + ?Sized> ExternalSigner for &T {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        (**self).load_certificate(alias)
    }

    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
        (**self).sign(digest_info, alias)
    }
}

/// In-memory software keystore.
#[derive(Clone, Default)]
pub struct LocalKeystore {
    certificates: HashMap<String, Vec<u8>>,
    keys: HashMap<String, RsaPrivateKey>,
}

impl LocalKeystore {
    /// Create an empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a DER certificate.
    pub fn add_certificate(&mut self, alias: impl Into<String>, der: Vec<u8>) -> &mut Self {
        self.certificates.insert(alias.into(), der);
        self
    }

    /// Store an RSA private key.
    pub fn add_key(&mut self, alias: impl Into<String>, key: RsaPrivateKey) -> &mut Self {
        self.keys.insert(alias.into(), key);
        self
    }

    /// Store a PKCS#8 DER private key.
    pub fn add_pkcs8_key(&mut self, alias: impl Into<String>, der: &[u8]) -> Result<&mut Self, KeystoreError> {
        use pkcs8::DecodePrivateKey;

        let alias = alias.into();
        let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| KeystoreError::InvalidKey {
            alias: alias.clone(),
            reason: e.to_string(),
        })?;
        Ok(self.add_key(alias, key))
    }

    /// Store a PKCS#1 DER private key.
    pub fn add_pkcs1_key(&mut self, alias: impl Into<String>, der: &[u8]) -> Result<&mut Self, KeystoreError> {
        use pkcs1::DecodeRsaPrivateKey;

        let alias = alias.into();
        let key = RsaPrivateKey::from_pkcs1_der(der).map_err(|e| KeystoreError::InvalidKey {
            alias: alias.clone(),
            reason: e.to_string(),
        })?;
        Ok(self.add_key(alias, key))
    }
}

impl std::fmt::Debug for LocalKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut certificates: Vec<_> = self.certificates.keys().collect();
        certificates.sort();
        f.debug_struct("LocalKeystore")
            .field("certificates", &certificates)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl ExternalSigner for LocalKeystore {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        self.certificates
            .get(alias)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound {
                alias: alias.to_string(),
            })
    }

    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
        let key = self.keys.get(alias).ok_or_else(|| KeystoreError::NotFound {
            alias: alias.to_string(),
        })?;
        // Unprefixed: the DigestInfo is already in place
        key.sign(Pkcs1v15Sign::new_unprefixed(), digest_info)
            .map_err(|e| KeystoreError::SigningFailed {
                alias: alias.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Bounds every `sign` call of an inner signer by a timeout.
///
/// The call runs on a helper thread; when the timeout fires the session
/// fails and the thread's late answer is discarded. There are no retries.
#[derive(Clone)]
pub struct TimeoutSigner {
    inner: Arc<dyn ExternalSigner>,
    timeout: Duration,
}

impl TimeoutSigner {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn ExternalSigner>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for TimeoutSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutSigner")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ExternalSigner for TimeoutSigner {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        self.inner.load_certificate(alias)
    }

    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let payload = digest_info.to_vec();
        let owned_alias = alias.to_string();

        thread::Builder::new()
            .name("external-signer".to_string())
            .spawn(move || {
                // The receiver is gone after a timeout
                let _ = tx.send(inner.sign(&payload, &owned_alias));
            })
            .map_err(|e| KeystoreError::SigningFailed {
                alias: alias.to_string(),
                reason: format!("could not start signer thread: {}", e),
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::error!("External signer for '{}' timed out after {:?}", alias, self.timeout);
                Err(KeystoreError::Timeout(self.timeout))
            },
            Err(RecvTimeoutError::Disconnected) => Err(KeystoreError::SigningFailed {
                alias: alias.to_string(),
                reason: "signer thread terminated without a result".to_string(),
            }),
        }
    }
}
