//! Certificate chain resolution.
//!
//! Certificates are fetched from the [`ExternalSigner`] by alias, parsed
//! with `x509-parser` and kept in keystore order, signer first. Issuer and
//! subject linkage is not validated; relying parties build paths themselves.

use super::external::ExternalSigner;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// A parsed chain element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCertificate {
    /// Keystore alias the certificate was loaded from
    pub alias: String,
    /// DER encoding, exactly as returned by the keystore
    pub der: Vec<u8>,
    /// Subject distinguished name
    pub subject: String,
    /// RSA modulus size in bits, when the key is RSA
    pub rsa_key_bits: Option<usize>,
}

impl ChainCertificate {
    /// Parse `der`, loaded under `alias`.
    pub fn parse(alias: &str, der: Vec<u8>) -> Result<Self> {
        let (rest, cert) = parse_x509_certificate(&der).map_err(|e| Error::CertificateParse {
            alias: alias.to_string(),
            reason: e.to_string(),
        })?;
        if !rest.is_empty() {
            log::warn!("Certificate '{}' has {} trailing bytes", alias, rest.len());
        }

        let rsa_key_bits = match cert.public_key().parsed() {
            Ok(PublicKey::RSA(key)) => Some(key.key_size()),
            _ => None,
        };
        let subject = cert.subject().to_string();

        Ok(Self {
            alias: alias.to_string(),
            der,
            subject,
            rsa_key_bits,
        })
    }
}

/// An ordered, non-empty certificate chain whose first element is the
/// signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<ChainCertificate>,
}

impl CertificateChain {
    /// Build a chain from parsed certificates.
    ///
    /// The first certificate must carry an RSA key.
    pub fn new(certificates: Vec<ChainCertificate>) -> Result<Self> {
        let signer = certificates.first().ok_or(Error::EmptyCertificateChain)?;
        if signer.rsa_key_bits.is_none() {
            return Err(Error::CertificateParse {
                alias: signer.alias.clone(),
                reason: "signer certificate does not carry an RSA public key".to_string(),
            });
        }
        Ok(Self { certificates })
    }

    /// Parse a chain from DER certificates, signer first. Aliases are
    /// synthesized from positions.
    pub fn from_der(certificates: Vec<Vec<u8>>) -> Result<Self> {
        let parsed = certificates
            .into_iter()
            .enumerate()
            .map(|(i, der)| ChainCertificate::parse(&format!("#{}", i), der))
            .collect::<Result<Vec<_>>>()?;
        Self::new(parsed)
    }

    /// The signer certificate.
    pub fn signer(&self) -> &ChainCertificate {
        // Non-empty by construction
        &self.certificates[0]
    }

    /// Signer RSA modulus size in bytes.
    pub fn signature_len(&self) -> Option<usize> {
        self.signer().rsa_key_bits.map(|bits| bits.div_ceil(8))
    }

    /// All certificates, signer first.
    pub fn certificates(&self) -> &[ChainCertificate] {
        &self.certificates
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always false; chains are non-empty.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

/// Parsed certificates shared across signing sessions.
///
/// Entries are keyed by alias and never invalidated. Sessions only share a
/// cache when the caller hands them the same instance (usually through an
/// `Arc`).
#[derive(Debug, Default)]
pub struct CertificateCache {
    entries: RwLock<HashMap<String, ChainCertificate>>,
}

impl CertificateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached certificate for `alias`.
    pub fn get(&self, alias: &str) -> Option<ChainCertificate> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(alias).cloned()
    }

    /// Store a parsed certificate.
    pub fn insert(&self, certificate: ChainCertificate) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(certificate.alias.clone(), certificate);
    }

    /// Whether `alias` is cached.
    pub fn contains(&self, alias: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(alias)
    }

    /// Number of cached certificates.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads certificate chains from a keystore.
pub struct CertificateChainResolver<'a> {
    signer: &'a dyn ExternalSigner,
    cache: Option<&'a CertificateCache>,
}

impl<'a> CertificateChainResolver<'a> {
    /// Resolve through `signer` without caching.
    pub fn new(signer: &'a dyn ExternalSigner) -> Self {
        Self {
            signer,
            cache: None,
        }
    }

    /// Consult and populate `cache`.
    pub fn with_cache(mut self, cache: &'a CertificateCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve `aliases`, signer first, preserving order.
    pub fn resolve<S: AsRef<str>>(&self, aliases: &[S]) -> Result<CertificateChain> {
        if aliases.is_empty() {
            return Err(Error::EmptyCertificateChain);
        }

        let certificates = aliases
            .iter()
            .map(|alias| self.resolve_one(alias.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let chain = CertificateChain::new(certificates)?;

        log::info!(
            "Resolved certificate chain of {} for signer '{}' ({})",
            chain.len(),
            chain.signer().alias,
            chain.signer().subject
        );
        Ok(chain)
    }

    fn resolve_one(&self, alias: &str) -> Result<ChainCertificate> {
        if let Some(cached) = self.cache.and_then(|cache| cache.get(alias)) {
            log::debug!("Certificate cache hit for '{}'", alias);
            return Ok(cached);
        }

        let der = self
            .signer
            .load_certificate(alias)
            .map_err(|e| Error::CertificateLoad {
                alias: alias.to_string(),
                reason: e.to_string(),
            })?;
        let certificate = ChainCertificate::parse(alias, der)?;

        if let Some(cache) = self.cache {
            cache.insert(certificate.clone());
        }
        Ok(certificate)
    }
}

impl std::fmt::Debug for CertificateChainResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateChainResolver")
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::external::LocalKeystore;

    #[test]
    fn test_empty_alias_list() {
        let keystore = LocalKeystore::new();
        let aliases: [&str; 0] = [];
        let result = CertificateChainResolver::new(&keystore).resolve(&aliases);
        assert!(matches!(result, Err(Error::EmptyCertificateChain)));
    }

    #[test]
    fn test_unknown_alias_is_load_error() {
        let keystore = LocalKeystore::new();
        let result = CertificateChainResolver::new(&keystore).resolve(&["missing"]);
        match result {
            Err(Error::CertificateLoad { alias, .. }) => assert_eq!(alias, "missing"),
            other => panic!("expected CertificateLoad, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let mut keystore = LocalKeystore::new();
        keystore.add_certificate("junk", vec![0x30, 0x03, 0x02, 0x01, 0x00]);
        let cache = CertificateCache::new();
        let result = CertificateChainResolver::new(&keystore)
            .with_cache(&cache)
            .resolve(&["junk"]);
        assert!(matches!(result, Err(Error::CertificateParse { .. })));
        assert!(cache.is_empty(), "failed parses are not cached");
    }

    #[test]
    fn test_empty_chain_constructor() {
        assert!(matches!(CertificateChain::new(Vec::new()), Err(Error::EmptyCertificateChain)));
    }

    #[test]
    fn test_non_rsa_signer_rejected() {
        let cert = ChainCertificate {
            alias: "ec".to_string(),
            der: Vec::new(),
            subject: "CN=ec".to_string(),
            rsa_key_bits: None,
        };
        assert!(matches!(
            CertificateChain::new(vec![cert]),
            Err(Error::CertificateParse { .. })
        ));
    }

    #[test]
    fn test_signature_len_rounds_up() {
        let cert = ChainCertificate {
            alias: "a".to_string(),
            der: Vec::new(),
            subject: String::new(),
            rsa_key_bits: Some(2047),
        };
        let chain = CertificateChain::new(vec![cert]).unwrap();
        assert_eq!(chain.signature_len(), Some(256));
    }
}
