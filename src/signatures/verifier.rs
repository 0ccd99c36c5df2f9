//! PDF signature verification.
//!
//! Verification is self-contained: the signer certificate is taken from the
//! container itself and no trust path is built. What is checked is that
//! the signature value, the message-digest attribute and the
//! signing-certificate-v2 binding agree with the signed bytes and with the
//! embedded certificate.

use super::byterange::ByteRangeCalculator;
use super::cms::SigningCertificateV2;
use super::docmdp::DocMdpPermission;
use super::oids;
use super::types::{
    DigestAlgorithm, SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus,
};
use crate::error::{Error, Result};
use crate::object::Object;
use cms::cert::x509::Certificate;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{Any, ObjectIdentifier, OctetString};
use der::{Decode, Encode, SliceReader};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::Digest;

/// Verifier for PDF digital signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = match sig_dict {
            Object::Dictionary(d) => d,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };

        let text = |key: &str| match dict.get(key) {
            Some(Object::String(s)) => Some(String::from_utf8_lossy(s).to_string()),
            _ => None,
        };

        let mut info = SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            ..SignatureInfo::default()
        };

        if let Some(Object::Name(sub_filter)) = dict.get("SubFilter") {
            info.sub_filter = SignatureSubFilter::from_pdf_name(sub_filter);
        }

        if let Some(Object::Array(byte_range)) = dict.get("ByteRange") {
            info.byte_range = byte_range.iter().filter_map(Object::as_integer).collect();
        }

        info.certification_level = dict
            .get("Reference")
            .and_then(Object::as_array)
            .and_then(|refs| {
                refs.iter()
                    .find(|r| r.get("TransformMethod").and_then(Object::as_name) == Some("DocMDP"))
            })
            .map(|sig_ref| {
                match sig_ref.get("TransformParams").and_then(|p| p.get("P")) {
                    Some(Object::Integer(p)) => DocMdpPermission::from_p_value(*p),
                    _ => DocMdpPermission::FormFilling,
                }
            });

        // Refined by verify() once the file length is known
        info.covers_whole_document = info.byte_range.len() == 4;

        Ok(info)
    }

    /// Quick check if a signature dictionary is well formed, without any
    /// cryptography.
    pub fn quick_check(&self, sig_dict: &Object) -> Result<bool> {
        let info = self.extract_signature_info(sig_dict)?;
        let has_contents = matches!(sig_dict.get("Contents"), Some(Object::String(_)));
        Ok(info.byte_range.len() == 4 && info.sub_filter.is_some() && has_contents)
    }

    /// Verify the signature described by `sig_dict` over `pdf_data`.
    ///
    /// A signature whose ByteRange ends before the end of the file is
    /// reported as [`VerificationStatus::ValidWithWarnings`]: later
    /// incremental updates are not covered by it.
    pub fn verify(&self, pdf_data: &[u8], sig_dict: &Object) -> Result<VerificationResult> {
        let mut info = self.extract_signature_info(sig_dict)?;

        let invalid = |info: SignatureInfo, message: String| VerificationResult {
            status: VerificationStatus::Invalid,
            signature_info: info,
            messages: vec![message],
            ..VerificationResult::default()
        };

        let byte_range: [i64; 4] = match info.byte_range.as_slice().try_into() {
            Ok(range) => range,
            Err(_) => return Ok(invalid(info, "ByteRange must have 4 elements".to_string())),
        };
        let covered_end = byte_range[2].saturating_add(byte_range[3]);
        if covered_end < 0 || covered_end as u64 > pdf_data.len() as u64 {
            return Ok(invalid(info, format!("ByteRange ends beyond the file at {}", covered_end)));
        }
        if let Err(e) = ByteRangeCalculator::validate_byte_range(&byte_range, covered_end as usize) {
            return Ok(invalid(info, format!("ByteRange validation failed: {}", e)));
        }

        let gap_start = byte_range[1] as usize;
        let gap_end = byte_range[2] as usize;
        if gap_end <= gap_start
            || pdf_data.get(gap_start) != Some(&b'<')
            || pdf_data.get(gap_end - 1) != Some(&b'>')
        {
            return Ok(invalid(info, "ByteRange gap is not the /Contents string".to_string()));
        }
        info.covers_whole_document = covered_end as usize == pdf_data.len();

        let contents = match sig_dict.get("Contents") {
            Some(Object::String(bytes)) => bytes.as_slice(),
            _ => return Ok(invalid(info, "Signature has no /Contents string".to_string())),
        };

        let digest_alg = container_digest_algorithm(contents)?;
        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(pdf_data, &byte_range)?;
        let digest = digest_alg.digest(&signed_bytes);

        let mut result = self.verify_container(contents, &digest)?;
        if let Some(subject) = result.signature_info.certificate_subject.take() {
            info.certificate_subject = Some(subject);
        }
        result.signature_info = info;

        if result.status == VerificationStatus::Valid && !result.signature_info.covers_whole_document {
            result.status = VerificationStatus::ValidWithWarnings;
            result
                .messages
                .push("Document was modified after this signature".to_string());
        }
        log::debug!("Signature verification: {:?}", result.status);
        Ok(result)
    }

    /// Verify a DER `ContentInfo` against `content_digest`.
    ///
    /// Trailing zero padding after the DER value is ignored.
    pub fn verify_container(&self, container: &[u8], content_digest: &[u8]) -> Result<VerificationResult> {
        let signed_data = decode_signed_data(container)?;
        let mut result = VerificationResult::default();

        let Some(signer_info) = signed_data.signer_infos.0.iter().next() else {
            result.status = VerificationStatus::Invalid;
            result.messages.push("Container has no SignerInfo".to_string());
            return Ok(result);
        };

        let Some(digest_alg) = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid) else {
            result.status = VerificationStatus::Invalid;
            result
                .messages
                .push(format!("Unsupported digest algorithm {}", signer_info.digest_alg.oid));
            return Ok(result);
        };
        result.digest_algorithm = Some(digest_alg);

        let Some(certificate) = find_signer_certificate(&signed_data, signer_info) else {
            result.status = VerificationStatus::Invalid;
            result
                .messages
                .push("Signer certificate is not embedded in the container".to_string());
            return Ok(result);
        };
        let cert_der = certificate.to_der()?;
        result.signature_info.certificate_subject = x509_parser::parse_x509_certificate(&cert_der)
            .ok()
            .map(|(_, cert)| cert.subject().to_string());

        let mut failures = Vec::new();

        let signed_payload = match &signer_info.signed_attrs {
            Some(attrs) => {
                match attribute_value(attrs.iter(), oids::MESSAGE_DIGEST)
                    .map(|value| decode_any::<OctetString>(value))
                {
                    Some(Ok(recorded)) => {
                        result.content_digest = recorded.as_bytes().to_vec();
                        if recorded.as_bytes() != content_digest {
                            failures.push("message-digest does not match the signed bytes".to_string());
                        }
                    },
                    _ => failures.push("message-digest attribute missing".to_string()),
                }

                if let Some(value) = attribute_value(attrs.iter(), oids::SIGNING_CERTIFICATE_V2) {
                    let matches = decode_any::<SigningCertificateV2>(value)
                        .ok()
                        .and_then(|ess| ess.certs.into_iter().next())
                        .map(|id| id.cert_hash.as_bytes() == sha2::Sha256::digest(&cert_der).as_slice())
                        .unwrap_or(false);
                    if !matches {
                        failures.push("signing-certificate-v2 does not match the signer".to_string());
                    }
                    result.signing_certificate_matches = Some(matches);
                }

                digest_alg.digest(&attrs.to_der()?)
            },
            None => {
                result.content_digest = content_digest.to_vec();
                content_digest.to_vec()
            },
        };

        match verify_rsa(&certificate, digest_alg, &signed_payload, signer_info.signature.as_bytes()) {
            Ok(()) => {},
            Err(reason) => failures.push(reason),
        }

        if failures.is_empty() {
            result.status = VerificationStatus::Valid;
        } else {
            result.status = VerificationStatus::Invalid;
            result.messages.extend(failures);
        }
        Ok(result)
    }
}

/// Digest algorithm recorded in the first SignerInfo of `container`.
pub fn container_digest_algorithm(container: &[u8]) -> Result<DigestAlgorithm> {
    let signed_data = decode_signed_data(container)?;
    let oid = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .map(|si| si.digest_alg.oid)
        .ok_or_else(|| Error::InvalidPdf("signature container has no SignerInfo".to_string()))?;
    DigestAlgorithm::from_oid(&oid).ok_or_else(|| Error::Unsupported(format!("digest algorithm {}", oid)))
}

fn decode_signed_data(container: &[u8]) -> Result<SignedData> {
    let mut reader = SliceReader::new(container)?;
    let content_info = ContentInfo::decode(&mut reader)?;
    if content_info.content_type != oids::ID_SIGNED_DATA {
        return Err(Error::Unsupported(format!(
            "CMS content type {}",
            content_info.content_type
        )));
    }
    Ok(SignedData::from_der(&content_info.content.to_der()?)?)
}

fn find_signer_certificate<'a>(signed_data: &'a SignedData, signer_info: &SignerInfo) -> Option<&'a Certificate> {
    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer_info.sid else {
        return None;
    };
    signed_data.certificates.as_ref()?.0.iter().find_map(|choice| match choice {
        CertificateChoices::Certificate(cert)
            if cert.tbs_certificate.issuer == sid.issuer
                && cert.tbs_certificate.serial_number == sid.serial_number =>
        {
            Some(cert)
        },
        _ => None,
    })
}

fn attribute_value<'a, I>(attrs: I, oid: ObjectIdentifier) -> Option<&'a Any>
where
    I: IntoIterator<Item = &'a cms::cert::x509::attr::Attribute>,
{
    attrs
        .into_iter()
        .find(|attr| attr.oid == oid)
        .and_then(|attr| attr.values.iter().next())
}

fn decode_any<T: for<'a> Decode<'a>>(value: &Any) -> Result<T> {
    Ok(T::from_der(&value.to_der()?)?)
}

fn verify_rsa(
    certificate: &Certificate,
    digest_alg: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> std::result::Result<(), String> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| format!("signer public key: {}", e))?;
    let key = RsaPublicKey::from_public_key_der(&spki).map_err(|e| format!("signer public key: {}", e))?;

    let scheme = match digest_alg {
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    };
    key.verify(scheme, hashed, signature)
        .map_err(|_| "RSA signature does not verify".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sig_dict() -> Object {
        Object::dict(vec![
            ("Type", Object::name("Sig")),
            ("Filter", Object::name("Adobe.PPKLite")),
            ("SubFilter", Object::name("adbe.pkcs7.detached")),
            ("Name", Object::text("Test Signer")),
            ("Reason", Object::text("Testing")),
            ("Location", Object::text("Test City")),
            ("M", Object::text("D:20240101120000+00'00'")),
            (
                "ByteRange",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(200),
                    Object::Integer(50),
                ]),
            ),
            ("Contents", Object::String(vec![0; 50])),
        ])
    }

    #[test]
    fn test_extract_signature_info() {
        let verifier = SignatureVerifier::new();
        let info = verifier.extract_signature_info(&make_sig_dict()).unwrap();

        assert_eq!(info.signer_name, Some("Test Signer".to_string()));
        assert_eq!(info.reason, Some("Testing".to_string()));
        assert_eq!(info.location, Some("Test City".to_string()));
        assert_eq!(info.sub_filter, Some(SignatureSubFilter::Pkcs7Detached));
        assert_eq!(info.byte_range, vec![0, 100, 200, 50]);
        assert_eq!(info.certification_level, None);
    }

    #[test]
    fn test_extract_certification_level() {
        let mut dict = make_sig_dict();
        if let Object::Dictionary(d) = &mut dict {
            d.insert(
                "Reference".to_string(),
                super::super::docmdp::DocMdpManager::reference_array(DocMdpPermission::NoChanges),
            );
        }
        let info = SignatureVerifier::new().extract_signature_info(&dict).unwrap();
        assert_eq!(info.certification_level, Some(DocMdpPermission::NoChanges));
    }

    #[test]
    fn test_extract_rejects_non_dictionary() {
        let result = SignatureVerifier::new().extract_signature_info(&Object::Integer(1));
        assert!(matches!(result, Err(Error::InvalidObjectType { .. })));
    }

    #[test]
    fn test_quick_check() {
        let verifier = SignatureVerifier::new();
        assert!(verifier.quick_check(&make_sig_dict()).unwrap());

        let bare = Object::dict(vec![("SubFilter", Object::name("adbe.pkcs7.detached"))]);
        assert!(!verifier.quick_check(&bare).unwrap());
    }

    #[test]
    fn test_verify_rejects_range_past_eof() {
        let result = SignatureVerifier::new().verify(&[0u8; 120], &make_sig_dict()).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn test_verify_rejects_gap_without_contents() {
        let data = vec![b'x'; 250];
        let result = SignatureVerifier::new().verify(&data, &make_sig_dict()).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(result.messages[0].contains("gap"));
    }

    #[test]
    fn test_container_garbage_is_error() {
        assert!(SignatureVerifier::new().verify_container(&[0x30, 0x00], &[0; 32]).is_err());
    }
}
