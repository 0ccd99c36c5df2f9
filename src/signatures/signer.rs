//! PDF signing implementation.
//!
//! [`PdfSigner`] drives one [`SigningSession`] per document: permission
//! check, optional certification, placeholder reservation, digest, external
//! signature and fill. Private keys stay behind the [`ExternalSigner`].

use super::chain::{CertificateCache, CertificateChainResolver};
use super::cms::CmsSignatureBuilder;
use super::external::{ExternalSigner, TimeoutSigner};
use super::session::SigningSession;
use super::target::SignableDocument;
use super::types::SignOptions;
use crate::config::SigningConfig;
use crate::document::PdfDocument;
use crate::error::Result;
use chrono::Utc;
use std::sync::Arc;

/// PDF signer that creates detached CMS signatures through an external
/// signer.
///
/// A `PdfSigner` holds no per-document state and can sign many documents,
/// also from several threads at once.
///
/// # Example
///
/// ```no_run
/// use pdf_extsign::document::PdfDocument;
/// use pdf_extsign::signatures::{LocalKeystore, PdfSigner, SignOptions};
/// use std::sync::Arc;
///
/// let mut keystore = LocalKeystore::new();
/// keystore.add_certificate("signer", std::fs::read("signer.der")?);
/// keystore.add_pkcs8_key("signer", &std::fs::read("signer.pk8")?)?;
///
/// let signer = PdfSigner::new(Arc::new(keystore), "signer", ["signer"])
///     .with_options(SignOptions::default().with_reason("Approved"));
///
/// let mut doc = PdfDocument::open("contract.pdf")?;
/// std::fs::write("contract-signed.pdf", signer.sign(&mut doc)?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct PdfSigner {
    signer: Arc<dyn ExternalSigner>,
    key_alias: String,
    certificate_aliases: Vec<String>,
    cache: Option<Arc<CertificateCache>>,
    options: SignOptions,
}

impl PdfSigner {
    /// Create a signer using `key_alias` and the chain `certificate_aliases`
    /// (signer first).
    pub fn new<I, S>(signer: Arc<dyn ExternalSigner>, key_alias: impl Into<String>, certificate_aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            signer,
            key_alias: key_alias.into(),
            certificate_aliases: certificate_aliases.into_iter().map(Into::into).collect(),
            cache: None,
            options: SignOptions::default(),
        }
    }

    /// Create a signer from service configuration.
    ///
    /// A configured timeout wraps `signer` in a [`TimeoutSigner`]; an
    /// enabled certificate cache is created here and shared by clones.
    pub fn from_config(signer: Arc<dyn ExternalSigner>, config: &SigningConfig) -> Result<Self> {
        config.validate()?;

        let signer: Arc<dyn ExternalSigner> = match config.signer_timeout() {
            Some(timeout) => Arc::new(TimeoutSigner::new(signer, timeout)),
            None => signer,
        };
        let mut pdf_signer = Self::new(signer, config.key_alias.clone(), config.certificate_aliases.clone())
            .with_options(SignOptions::default().with_estimated_size(config.reservation));
        if config.cache_certificates {
            pdf_signer = pdf_signer.with_cache(Arc::new(CertificateCache::new()));
        }
        Ok(pdf_signer)
    }

    /// Share `cache` for certificate lookups.
    pub fn with_cache(mut self, cache: Arc<CertificateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the per-signature options.
    pub fn with_options(mut self, options: SignOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Shared certificate cache, if any.
    pub fn cache(&self) -> Option<&Arc<CertificateCache>> {
        self.cache.as_ref()
    }

    /// Sign `document` and return the signed bytes.
    ///
    /// The document is sealed afterwards; a refused document is left
    /// untouched.
    pub fn sign(&self, document: &mut PdfDocument) -> Result<Vec<u8>> {
        self.sign_document(document)
    }

    /// Parse `pdf` and sign it.
    pub fn sign_bytes(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let mut document = PdfDocument::from_bytes(pdf.to_vec())?;
        self.sign_document(&mut document)
    }

    /// Sign any [`SignableDocument`].
    pub fn sign_document<D: SignableDocument + ?Sized>(&self, document: &mut D) -> Result<Vec<u8>> {
        self.options.validate()?;

        let mut resolver = CertificateChainResolver::new(self.signer.as_ref());
        if let Some(cache) = &self.cache {
            resolver = resolver.with_cache(cache);
        }
        let chain = resolver.resolve(&self.certificate_aliases)?;

        let mut session = SigningSession::new(document, self.options.algorithm);
        let current = session.check_permission()?;

        if let Some(level) = self.options.certify {
            if current.is_certified() {
                log::warn!(
                    "Document is already certified ({}), adding an approval signature instead",
                    current
                );
            } else {
                session.certify(level)?;
            }
        }

        let metadata = self.options.metadata(Utc::now());
        session.reserve(&metadata, self.options.estimated_size)?;
        session.digest()?;

        let builder = CmsSignatureBuilder::new(self.options.algorithm)
            .with_mode(self.options.attribute_mode)
            .with_signing_time(metadata.signing_time);
        session.build(&builder, &chain, self.signer.as_ref(), &self.key_alias)?;
        session.fill()
    }
}

impl std::fmt::Debug for PdfSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfSigner")
            .field("key_alias", &self.key_alias)
            .field("certificate_aliases", &self.certificate_aliases)
            .field("cached", &self.cache.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
