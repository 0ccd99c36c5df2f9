//! CMS `SignedData` assembly for detached PDF signatures.
//!
//! The builder never sees a private key. It computes the bytes to be signed,
//! wraps their digest in a DER `DigestInfo` and hands that to an
//! [`ExternalSigner`]; the raw RSA value that comes back is embedded
//! unchanged.
//!
//! ```text
//! ContentInfo(id-signedData)
//!   SignedData v1
//!     digestAlgorithms   { alg }
//!     encapContentInfo   id-data, detached
//!     certificates       chain
//!     signerInfos        { issuerAndSerialNumber(chain[0]), signedAttrs, sig }
//! ```

use super::chain::CertificateChain;
use super::external::ExternalSigner;
use super::oids;
use super::types::{AttributeMode, SigningAlgorithm};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cms::cert::x509::attr::{Attribute, AttributeValue};
use cms::cert::x509::Certificate;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use der::asn1::{Any, GeneralizedTime, ObjectIdentifier, OctetString, SetOfVec, UtcTime};
use der::{Decode, Encode, Sequence, Tag};
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;

/// PKCS#1 `DigestInfo`, the value an RSA PKCS#1 v1.5 signature covers.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DigestInfo {
    /// Hash algorithm, with NULL parameters
    pub digest_algorithm: AlgorithmIdentifierOwned,
    /// Hash value
    pub digest: OctetString,
}

impl DigestInfo {
    /// Wrap `digest`, computed with `algorithm`.
    pub fn new(algorithm: SigningAlgorithm, digest: &[u8]) -> Result<Self> {
        Ok(Self {
            digest_algorithm: AlgorithmIdentifierOwned {
                oid: algorithm.digest().oid(),
                parameters: Some(Any::null()),
            },
            digest: OctetString::new(digest)?,
        })
    }
}

/// `ESSCertIDv2` (RFC 5035).
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EssCertIdV2 {
    /// Omitted when SHA-256, the DER default
    #[asn1(optional = "true")]
    pub hash_algorithm: Option<AlgorithmIdentifierOwned>,
    /// Hash of the certificate DER
    pub cert_hash: OctetString,
}

/// `SigningCertificateV2` (RFC 5035), without policies.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SigningCertificateV2 {
    /// Certificate identifiers, signer first
    pub certs: Vec<EssCertIdV2>,
}

/// A finished DER `ContentInfo` and the values it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContainer {
    der: Vec<u8>,
    content_digest: Vec<u8>,
    algorithm: SigningAlgorithm,
    signing_certificate_hash: Option<Vec<u8>>,
    signed_attributes: Option<Vec<u8>>,
    signature: Vec<u8>,
}

impl SignatureContainer {
    /// DER encoding of the `ContentInfo`.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Consume into the DER encoding.
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// Digest of the signed PDF bytes.
    pub fn content_digest(&self) -> &[u8] {
        &self.content_digest
    }

    /// Signature algorithm.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// SHA-256 of the signer certificate, as carried in
    /// signing-certificate-v2.
    pub fn signing_certificate_hash(&self) -> Option<&[u8]> {
        self.signing_certificate_hash.as_deref()
    }

    /// DER `SET OF Attribute` the signer signed, in signed-attribute mode.
    pub fn signed_attributes(&self) -> Option<&[u8]> {
        self.signed_attributes.as_deref()
    }

    /// Raw RSA signature value.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Size of the DER encoding in bytes.
    pub fn len(&self) -> usize {
        self.der.len()
    }

    /// Check if the encoding is empty (never, for a built container).
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
}

/// Assembles detached CMS signatures through an external signer.
#[derive(Debug, Clone)]
pub struct CmsSignatureBuilder {
    algorithm: SigningAlgorithm,
    mode: AttributeMode,
    signing_time: Option<DateTime<Utc>>,
}

impl CmsSignatureBuilder {
    /// Create a builder for `algorithm` in signed-attribute mode.
    pub fn new(algorithm: SigningAlgorithm) -> Self {
        Self {
            algorithm,
            mode: AttributeMode::SignedAttributes,
            signing_time: None,
        }
    }

    /// Set the attribute mode.
    pub fn with_mode(mut self, mode: AttributeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fix the signing-time attribute. Defaults to the build time.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Build a container for `digest`, the hash of the signable region.
    pub fn build(
        &self,
        digest: &[u8],
        chain: &CertificateChain,
        signer: &dyn ExternalSigner,
        key_alias: &str,
    ) -> Result<SignatureContainer> {
        let digest_alg = self.algorithm.digest();
        if digest.len() != digest_alg.output_len() {
            return Err(Error::AlgorithmMismatch {
                expected: format!("{} digest of {} bytes", digest_alg, digest_alg.output_len()),
                actual: format!("digest of {} bytes", digest.len()),
            });
        }

        let signer_cert = Certificate::from_der(&chain.signer().der).map_err(|e| {
            Error::CertificateParse {
                alias: chain.signer().alias.clone(),
                reason: e.to_string(),
            }
        })?;

        let (signed_attrs, cert_hash) = match self.mode {
            AttributeMode::SignedAttributes => {
                let cert_hash = sha256(&chain.signer().der);
                let attrs = self.signed_attributes(digest, &cert_hash)?;
                (Some(attrs), Some(cert_hash))
            },
            AttributeMode::Direct => (None, None),
        };
        let signed_attrs_der = signed_attrs.as_ref().map(|a| a.to_der()).transpose()?;

        // Signed attributes are hashed with their SET OF tag, not the
        // [0] IMPLICIT tag they carry inside SignerInfo
        let to_be_signed = match &signed_attrs_der {
            Some(der) => digest_alg.digest(der),
            None => digest.to_vec(),
        };
        let digest_info = DigestInfo::new(self.algorithm, &to_be_signed)?.to_der()?;

        log::debug!(
            "Requesting {} signature from external signer '{}'",
            self.algorithm,
            key_alias
        );
        let signature = signer
            .sign(&digest_info, key_alias)
            .map_err(|cause| Error::SigningFailed {
                alias: key_alias.to_string(),
                cause,
            })?;
        self.check_signature(&signature, chain, key_alias)?;

        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: signer_cert.tbs_certificate.issuer.clone(),
                serial_number: signer_cert.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: AlgorithmIdentifierOwned {
                oid: digest_alg.oid(),
                parameters: None,
            },
            signed_attrs,
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: self.algorithm.signature_oid(),
                parameters: Some(Any::null()),
            },
            signature: OctetString::new(signature.clone())?,
            unsigned_attrs: None,
        };

        let certificates = chain
            .certificates()
            .iter()
            .map(|c| {
                Certificate::from_der(&c.der)
                    .map(CertificateChoices::Certificate)
                    .map_err(|e| Error::CertificateParse {
                        alias: c.alias.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![signer_info.digest_alg.clone()])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: oids::ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(SetOfVec::try_from(certificates)?)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        let content_info = ContentInfo {
            content_type: oids::ID_SIGNED_DATA,
            content: Any::from_der(&signed_data.to_der()?)?,
        };
        let der = content_info.to_der()?;

        log::info!(
            "Built {} CMS container of {} bytes ({} certificates)",
            self.algorithm,
            der.len(),
            chain.len()
        );

        Ok(SignatureContainer {
            der,
            content_digest: digest.to_vec(),
            algorithm: self.algorithm,
            signing_certificate_hash: cert_hash,
            signed_attributes: signed_attrs_der,
            signature,
        })
    }

    fn signed_attributes(&self, digest: &[u8], cert_hash: &[u8]) -> Result<SignedAttributes> {
        let signing_time = self.signing_time.unwrap_or_else(Utc::now);

        let ess = SigningCertificateV2 {
            certs: vec![EssCertIdV2 {
                hash_algorithm: None,
                cert_hash: OctetString::new(cert_hash)?,
            }],
        };

        let attributes = vec![
            attribute(
                oids::CONTENT_TYPE,
                AttributeValue::new(Tag::ObjectIdentifier, oids::ID_DATA.as_bytes())?,
            )?,
            attribute(oids::SIGNING_TIME, signing_time_value(&signing_time)?)?,
            attribute(oids::MESSAGE_DIGEST, AttributeValue::new(Tag::OctetString, digest)?)?,
            attribute(oids::SIGNING_CERTIFICATE_V2, Any::from_der(&ess.to_der()?)?)?,
        ];
        Ok(SetOfVec::try_from(attributes)?)
    }

    fn check_signature(
        &self,
        signature: &[u8],
        chain: &CertificateChain,
        key_alias: &str,
    ) -> Result<()> {
        if signature.is_empty() {
            return Err(Error::SignerRejected {
                alias: key_alias.to_string(),
                reason: "empty signature".to_string(),
            });
        }
        if let Some(expected) = chain.signature_len() {
            if signature.len() != expected {
                return Err(Error::SignerRejected {
                    alias: key_alias.to_string(),
                    reason: format!(
                        "signature is {} bytes, signer key modulus is {} bytes",
                        signature.len(),
                        expected
                    ),
                });
            }
        }
        Ok(())
    }
}

fn attribute(oid: ObjectIdentifier, value: AttributeValue) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// UTCTime within 1950..2050, GeneralizedTime outside it (RFC 5652 11.3).
fn signing_time_value(time: &DateTime<Utc>) -> Result<Any> {
    let seconds = u64::try_from(time.timestamp())
        .map_err(|_| Error::InvalidConfig(format!("signing time {} precedes 1970", time)))?;
    let since_epoch = Duration::from_secs(seconds);
    let der = match UtcTime::from_unix_duration(since_epoch) {
        Ok(utc) => utc.to_der()?,
        Err(_) => GeneralizedTime::from_unix_duration(since_epoch)?.to_der()?,
    };
    Ok(Any::from_der(&der)?)
}

fn sha256(data: &[u8]) -> Vec<u8> {
    use sha2::Digest;
    sha2::Sha256::digest(data).to_vec()
}
