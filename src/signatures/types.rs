//! Digital signature types and data structures.

use super::docmdp::DocMdpPermission;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use sha2::Digest;

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    /// SHA-1 (deprecated, but still common in legacy PDFs)
    Sha1,
    /// SHA-256 (recommended)
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha1 => super::oids::SHA1,
            DigestAlgorithm::Sha256 => super::oids::SHA256,
            DigestAlgorithm::Sha384 => super::oids::SHA384,
            DigestAlgorithm::Sha512 => super::oids::SHA512,
        }
    }

    /// Look up an algorithm by OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Signature algorithm: a digest paired with RSA PKCS#1 v1.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    /// sha256WithRSAEncryption
    #[default]
    Sha256WithRsa,
    /// sha1WithRSAEncryption, for legacy verifiers only
    Sha1WithRsa,
}

impl SigningAlgorithm {
    /// Digest half of the algorithm.
    pub fn digest(&self) -> DigestAlgorithm {
        match self {
            SigningAlgorithm::Sha256WithRsa => DigestAlgorithm::Sha256,
            SigningAlgorithm::Sha1WithRsa => DigestAlgorithm::Sha1,
        }
    }

    /// OID of the combined signature algorithm.
    pub fn signature_oid(&self) -> ObjectIdentifier {
        match self {
            SigningAlgorithm::Sha256WithRsa => super::oids::SHA256_WITH_RSA,
            SigningAlgorithm::Sha1WithRsa => super::oids::SHA1_WITH_RSA,
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            SigningAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SigningAlgorithm::Sha1WithRsa => "SHA1withRSA",
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
    /// ETSI.RFC3161 - Timestamp token
    Rfc3161,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }

    /// Whether this crate can produce signatures in this format.
    pub fn is_producible(&self) -> bool {
        matches!(self, SignatureSubFilter::Pkcs7Detached | SignatureSubFilter::CadesDetached)
    }
}

/// How the CMS SignerInfo binds the content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeMode {
    /// content-type, signing-time, message-digest and
    /// signing-certificate-v2 signed attributes; the signer signs their
    /// DER encoding
    #[default]
    SignedAttributes,
    /// No signed attributes; the signer signs the content digest directly
    Direct,
}

/// Options for signing a PDF.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Signature algorithm
    pub algorithm: SigningAlgorithm,
    /// Signature sub-filter (format)
    pub sub_filter: SignatureSubFilter,
    /// Name of the signer (if different from certificate CN)
    pub name: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Location where the document was signed
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signing time; the session start time when unset
    pub signing_time: Option<DateTime<Utc>>,
    /// Certify the document at this DocMDP level
    pub certify: Option<DocMdpPermission>,
    /// Bytes reserved for the signature container
    pub estimated_size: usize,
    /// Signed attribute handling
    pub attribute_mode: AttributeMode,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::Sha256WithRsa,
            sub_filter: SignatureSubFilter::Pkcs7Detached,
            name: None,
            reason: None,
            location: None,
            contact_info: None,
            signing_time: None,
            certify: None,
            estimated_size: crate::config::DEFAULT_RESERVATION,
            attribute_mode: AttributeMode::SignedAttributes,
        }
    }
}

impl SignOptions {
    /// Set the signature algorithm.
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the sub-filter.
    pub fn with_sub_filter(mut self, sub_filter: SignatureSubFilter) -> Self {
        self.sub_filter = sub_filter;
        self
    }

    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    /// Fix the signing time.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Request a certification signature at `level`.
    pub fn with_certification(mut self, level: DocMdpPermission) -> Self {
        self.certify = Some(level);
        self
    }

    /// Set the container reservation in bytes.
    pub fn with_estimated_size(mut self, bytes: usize) -> Self {
        self.estimated_size = bytes;
        self
    }

    /// Set the signed attribute mode.
    pub fn with_attribute_mode(mut self, mode: AttributeMode) -> Self {
        self.attribute_mode = mode;
        self
    }

    /// Reject combinations that cannot produce a valid signature.
    pub fn validate(&self) -> Result<()> {
        if !self.sub_filter.is_producible() {
            return Err(Error::Unsupported(format!(
                "signing with sub-filter {}",
                self.sub_filter.as_pdf_name()
            )));
        }
        if self.sub_filter == SignatureSubFilter::CadesDetached
            && self.attribute_mode == AttributeMode::Direct
        {
            return Err(Error::InvalidConfig(
                "ETSI.CAdES.detached requires signed attributes".to_string(),
            ));
        }
        if self.estimated_size == 0 {
            return Err(Error::InvalidConfig("signature reservation must be positive".to_string()));
        }
        if self.certify == Some(DocMdpPermission::Unset) {
            return Err(Error::InvalidPermissionLevel(0));
        }
        Ok(())
    }

    /// Signature dictionary metadata for a signature made at `now`.
    pub fn metadata(&self, now: DateTime<Utc>) -> SignatureMetadata {
        SignatureMetadata {
            sub_filter: self.sub_filter,
            name: self.name.clone(),
            reason: self.reason.clone(),
            location: self.location.clone(),
            contact_info: self.contact_info.clone(),
            signing_time: self.signing_time.unwrap_or(now),
        }
    }
}

/// Entries of the signature dictionary besides ByteRange and Contents.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMetadata {
    /// `/SubFilter`
    pub sub_filter: SignatureSubFilter,
    /// `/Name`
    pub name: Option<String>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
    /// `/M`
    pub signing_time: DateTime<Utc>,
}

impl Default for SignatureMetadata {
    fn default() -> Self {
        SignOptions::default().metadata(Utc::now())
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Name of the signer
    pub signer_name: Option<String>,
    /// Signing time as written in `/M`
    pub signing_time: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Whether the signature covers the whole document
    pub covers_whole_document: bool,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Signer certificate subject
    pub certificate_subject: Option<String>,
    /// DocMDP level, for certification signatures
    pub certification_level: Option<DocMdpPermission>,
}

/// Result of signature verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Overall verification status
    pub status: VerificationStatus,
    /// Signature information
    pub signature_info: SignatureInfo,
    /// Verification messages (errors, warnings)
    pub messages: Vec<String>,
    /// Digest of the signed bytes recorded in the container
    pub content_digest: Vec<u8>,
    /// Digest algorithm of the SignerInfo
    pub digest_algorithm: Option<DigestAlgorithm>,
    /// Whether signing-certificate-v2 matched the signer certificate
    pub signing_certificate_matches: Option<bool>,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            status: VerificationStatus::Unknown,
            signature_info: SignatureInfo::default(),
            messages: Vec::new(),
            content_digest: Vec::new(),
            digest_algorithm: None,
            signing_certificate_matches: None,
        }
    }
}

/// Verification status of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Signature is valid
    Valid,
    /// Signature is invalid (cryptographically)
    Invalid,
    /// Signature validity could not be established
    Unknown,
    /// Signature is valid but the document was changed afterwards
    ValidWithWarnings,
}

impl VerificationStatus {
    /// Check if the status indicates a valid signature.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationStatus::Valid)
    }

    /// Check if the status indicates any form of validity (including warnings).
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationStatus::Valid | VerificationStatus::ValidWithWarnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_properties() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::Sha256.output_len(), 32);
        assert_eq!(DigestAlgorithm::Sha1.digest(b"abc").len(), 20);
        assert_eq!(DigestAlgorithm::Sha512.digest(b"abc").len(), 64);
        assert_eq!(DigestAlgorithm::Sha256.oid().to_string(), "2.16.840.1.101.3.4.2.1");
    }

    #[test]
    fn test_digest_algorithm_from_oid() {
        for alg in [
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(DigestAlgorithm::from_oid(&alg.oid()), Some(alg));
        }
        assert_eq!(DigestAlgorithm::from_oid(&super::super::oids::ID_DATA), None);
    }

    #[test]
    fn test_sha256_known_answer() {
        let digest = DigestAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            digest[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") starts with ba7816bf"
        );
    }

    #[test]
    fn test_signing_algorithm() {
        assert_eq!(SigningAlgorithm::default().digest(), DigestAlgorithm::Sha256);
        assert_eq!(
            SigningAlgorithm::Sha256WithRsa.signature_oid().to_string(),
            "1.2.840.113549.1.1.11"
        );
        assert_eq!(SigningAlgorithm::Sha1WithRsa.signature_oid().to_string(), "1.2.840.113549.1.1.5");
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("ETSI.CAdES.detached"),
            Some(SignatureSubFilter::CadesDetached)
        );
        assert!(!SignatureSubFilter::Rfc3161.is_producible());
    }

    #[test]
    fn test_sign_options_builder() {
        let opts = SignOptions::default()
            .with_reason("Approval")
            .with_location("Berlin")
            .with_certification(DocMdpPermission::FormFilling);
        assert_eq!(opts.reason.as_deref(), Some("Approval"));
        assert_eq!(opts.certify, Some(DocMdpPermission::FormFilling));
        assert_eq!(opts.estimated_size, 8192);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_sign_options_validation() {
        let opts = SignOptions::default().with_sub_filter(SignatureSubFilter::Pkcs7Sha1);
        assert!(matches!(opts.validate(), Err(Error::Unsupported(_))));

        let opts = SignOptions::default()
            .with_sub_filter(SignatureSubFilter::CadesDetached)
            .with_attribute_mode(AttributeMode::Direct);
        assert!(matches!(opts.validate(), Err(Error::InvalidConfig(_))));

        let opts = SignOptions::default().with_certification(DocMdpPermission::Unset);
        assert!(matches!(opts.validate(), Err(Error::InvalidPermissionLevel(0))));
    }

    #[test]
    fn test_metadata_uses_fixed_time() {
        use chrono::TimeZone;
        let fixed = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let opts = SignOptions::default().with_signing_time(fixed);
        assert_eq!(opts.metadata(Utc::now()).signing_time, fixed);
    }

    #[test]
    fn test_verification_status() {
        assert!(VerificationStatus::Valid.is_valid());
        assert!(!VerificationStatus::Invalid.is_valid());
        assert!(VerificationStatus::ValidWithWarnings.is_ok());
        assert!(!VerificationStatus::Unknown.is_valid());
    }
}
