//! End-to-end signing and verification tests.

mod common;

use common::*;
use pdf_extsign::signatures::{
    ByteRangeCalculator, CertificateChainResolver, CmsSignatureBuilder, DocMdpPermission, ExternalSigner,
    PdfSigner, SignOptions, SignableRegion, SignatureMetadata, SignatureSubFilter, SignatureVerifier,
    SigningAlgorithm, SigningSession, VerificationStatus,
};
use pdf_extsign::writer::EmbeddedFile;
use pdf_extsign::{Error, PdfDocument};
use sha2::{Digest, Sha256};
use std::sync::Arc;

fn signer() -> PdfSigner {
    PdfSigner::new(Arc::new(keystore()), SIGNER, chain_aliases())
}

/// Verify every signature of `pdf`, in field order.
fn verify_all(pdf: &[u8]) -> Vec<pdf_extsign::signatures::VerificationResult> {
    let doc = PdfDocument::from_bytes(pdf.to_vec()).unwrap();
    let verifier = SignatureVerifier::new();
    doc.signature_dictionaries()
        .unwrap()
        .iter()
        .map(|sig| verifier.verify(pdf, sig).unwrap())
        .collect()
}

mod approval {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signed = signer()
            .with_options(SignOptions::default().with_reason("Approved").with_location("Berlin"))
            .sign_bytes(&sample_pdf())
            .unwrap();

        assert!(signed.starts_with(&sample_pdf()), "original bytes must be preserved");

        let results = verify_all(&signed);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        assert!(result.signature_info.covers_whole_document);
        assert_eq!(result.signature_info.reason.as_deref(), Some("Approved"));
        assert_eq!(result.signature_info.location.as_deref(), Some("Berlin"));
        assert_eq!(result.signing_certificate_matches, Some(true));
        assert!(result
            .signature_info
            .certificate_subject
            .as_deref()
            .is_some_and(|s| s.contains("Test Signer")));
    }

    #[test]
    fn test_verifier_reports_session_digest() {
        let keystore = keystore();
        let chain = CertificateChainResolver::new(&keystore).resolve(&chain_aliases()).unwrap();
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();

        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);
        session.check_permission().unwrap();
        let region = session
            .reserve(&SignOptions::default().metadata(chrono::Utc::now()), 8192)
            .unwrap();
        let digest = session.digest().unwrap();
        assert_eq!(digest, Sha256::digest(&region.bytes).to_vec());

        let builder = CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa);
        session.build(&builder, &chain, &keystore, SIGNER).unwrap();
        let signed = session.fill().unwrap();

        let result = &verify_all(&signed)[0];
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        assert_eq!(result.content_digest, digest);
        assert_eq!(result.signature_info.byte_range, region.byte_range.to_vec());
    }

    #[test]
    fn test_pades_sub_filter() {
        let signed = signer()
            .with_options(SignOptions::default().with_sub_filter(SignatureSubFilter::CadesDetached))
            .sign_bytes(&sample_pdf())
            .unwrap();

        let result = &verify_all(&signed)[0];
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        assert_eq!(result.signature_info.sub_filter, Some(SignatureSubFilter::CadesDetached));
    }

    #[test]
    fn test_tampering_is_detected() {
        let mut signed = signer().sign_bytes(&sample_pdf()).unwrap();
        let pos = signed.windows(16).position(|w| w == b"Quarterly report").unwrap();
        signed[pos] = b'q';

        let result = &verify_all(&signed)[0];
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(result.messages.iter().any(|m| m.contains("message-digest")));
    }

    #[test]
    fn test_second_signature_keeps_first_valid() {
        let first = signer().sign_bytes(&sample_pdf()).unwrap();
        let second = signer()
            .with_options(SignOptions::default().with_reason("Countersigned"))
            .sign_bytes(&first)
            .unwrap();

        let results = verify_all(&second);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, VerificationStatus::ValidWithWarnings);
        assert!(!results[0].signature_info.covers_whole_document);
        assert_eq!(results[1].status, VerificationStatus::Valid, "{:?}", results[1].messages);
        assert_eq!(results[1].signature_info.reason.as_deref(), Some("Countersigned"));
    }
}

mod cross_reference {
    use super::*;

    fn sign_twice(pdf: &[u8]) -> Vec<u8> {
        let first = signer().sign_bytes(pdf).unwrap();
        let reopened = PdfDocument::from_bytes(first.clone()).unwrap();
        assert!(reopened.first_page_ref().is_ok());

        signer()
            .with_options(SignOptions::default().with_reason("Countersigned"))
            .sign_bytes(&first)
            .unwrap()
    }

    #[test]
    fn test_reconstructed_file_signed_twice() {
        let second = sign_twice(&damaged_xref_pdf());

        let results = verify_all(&second);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, VerificationStatus::ValidWithWarnings, "{:?}", results[0].messages);
        assert_eq!(results[1].status, VerificationStatus::Valid, "{:?}", results[1].messages);
        let doc = PdfDocument::from_bytes(second).unwrap();
        assert!(doc.first_page_ref().is_ok());
    }

    #[test]
    fn test_object_stream_file_signed_twice() {
        let second = sign_twice(&object_stream_pdf());

        let results = verify_all(&second);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, VerificationStatus::ValidWithWarnings, "{:?}", results[0].messages);
        assert_eq!(results[1].status, VerificationStatus::Valid, "{:?}", results[1].messages);
        assert!(!second.windows(5).any(|w| w == b"\nxref"));
    }
}

mod placeholder {
    use super::*;

    #[test]
    fn test_small_reservation_overflows() {
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let result = signer()
            .with_options(SignOptions::default().with_estimated_size(256))
            .sign(&mut doc);

        match result {
            Err(Error::PlaceholderOverflow { required, reserved }) => {
                assert_eq!(reserved, 256);
                assert!(required > 256, "chain of two 2048-bit certificates needs more");
            },
            other => panic!("expected PlaceholderOverflow, got {:?}", other.map(|b| b.len())),
        }
    }

    fn reserve(doc: &mut PdfDocument, metadata: &SignatureMetadata) -> SignableRegion {
        let mut session = SigningSession::new(doc, SigningAlgorithm::Sha256WithRsa);
        session.check_permission().unwrap();
        session.reserve(metadata, 4096).unwrap()
    }

    #[test]
    fn test_reservation_is_deterministic() {
        let doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let metadata = SignOptions::default().with_reason("Twice").metadata(chrono::Utc::now());

        let mut first = doc.clone();
        let mut second = doc.clone();
        assert_eq!(reserve(&mut first, &metadata), reserve(&mut second, &metadata));
        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    }

    #[test]
    fn test_contents_is_zero_padded() {
        let signed = signer().sign_bytes(&sample_pdf()).unwrap();
        let doc = PdfDocument::from_bytes(signed.clone()).unwrap();
        let sig = &doc.signature_dictionaries().unwrap()[0];
        let byte_range = pdf_extsign::signatures::SignatureVerifier::new()
            .extract_signature_info(sig)
            .unwrap()
            .byte_range;

        let gap = &signed[byte_range[1] as usize..byte_range[2] as usize];
        assert_eq!(gap.len(), ByteRangeCalculator::default().placeholder_size());
        assert!(gap.ends_with(b"000>"));
    }
}

mod certification {
    use super::*;

    #[test]
    fn test_no_changes_document_is_refused() {
        let certified = signer()
            .with_options(SignOptions::default().with_certification(DocMdpPermission::NoChanges))
            .sign_bytes(&sample_pdf())
            .unwrap();

        let mut doc = PdfDocument::from_bytes(certified.clone()).unwrap();
        let result = signer().sign(&mut doc);

        assert!(matches!(result, Err(Error::PermissionDenied { level: 1 })));
        assert!(!doc.is_sealed());
        assert_eq!(doc.to_bytes().unwrap(), certified);
    }

    #[test]
    fn test_certified_document_accepts_approval() {
        let certified = signer()
            .with_options(SignOptions::default().with_certification(DocMdpPermission::FormFilling))
            .sign_bytes(&sample_pdf())
            .unwrap();
        let approved = signer().sign_bytes(&certified).unwrap();

        let results = verify_all(&approved);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].signature_info.certification_level,
            Some(DocMdpPermission::FormFilling)
        );
        assert_eq!(results[0].status, VerificationStatus::ValidWithWarnings);
        assert_eq!(results[1].signature_info.certification_level, None);
        assert_eq!(results[1].status, VerificationStatus::Valid);
    }

    #[test]
    fn test_certify_request_on_certified_document_signs_as_approval() {
        let certified = signer()
            .with_options(SignOptions::default().with_certification(DocMdpPermission::FormFillingAndAnnotations))
            .sign_bytes(&sample_pdf())
            .unwrap();
        let resigned = signer()
            .with_options(SignOptions::default().with_certification(DocMdpPermission::FormFilling))
            .sign_bytes(&certified)
            .unwrap();

        let results = verify_all(&resigned);
        assert_eq!(results[1].signature_info.certification_level, None);
        let doc = PdfDocument::from_bytes(resigned).unwrap();
        assert_eq!(
            pdf_extsign::signatures::DocMdpManager::read_permission(&doc).unwrap(),
            DocMdpPermission::FormFillingAndAnnotations
        );
    }
}

mod embedded_files {
    use super::*;

    #[test]
    fn test_embedded_file_is_signed() {
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        doc.embed_file(EmbeddedFile::new("invoice.xml", b"<invoice total=\"42\"/>".to_vec()))
            .unwrap();
        let signed = signer().sign(&mut doc).unwrap();

        let result = &verify_all(&signed)[0];
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        assert!(result.signature_info.covers_whole_document);

        // The attachment lives inside the first ByteRange segment
        let attachment = signed.windows(21).position(|w| w == b"<invoice total=\"42\"/>").unwrap();
        assert!((attachment as i64) < result.signature_info.byte_range[1]);
    }

    #[test]
    fn test_embedding_after_reserve_is_refused() {
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);
        session.check_permission().unwrap();
        session
            .reserve(&SignOptions::default().metadata(chrono::Utc::now()), 4096)
            .unwrap();
        drop(session);

        let result = doc.embed_file(EmbeddedFile::new("late.txt", b"late".to_vec()));
        assert!(matches!(result, Err(Error::DocumentSealed)));
    }
}

mod concurrency {
    use super::*;
    use pdf_extsign::signatures::CertificateCache;
    use std::thread;

    #[test]
    fn test_parallel_sessions_share_signer_and_cache() {
        let counting = CountingSigner::new();
        let keystore: Arc<dyn ExternalSigner> = counting.clone();
        let signer = PdfSigner::new(keystore, SIGNER, chain_aliases()).with_cache(Arc::new(CertificateCache::new()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let signer = signer.clone();
                thread::spawn(move || {
                    let options = SignOptions::default().with_reason(format!("worker {}", i));
                    signer.with_options(options).sign_bytes(&sample_pdf()).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let signed = handle.join().unwrap();
            let result = &verify_all(&signed)[0];
            assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        }
        assert_eq!(counting.signs(), 4);
        // Racing first lookups may load twice; the cache bounds the rest
        assert!(counting.loads() <= 2 * 4);
        assert_eq!(signer.cache().map(|c| c.len()), Some(2));
    }
}

mod files {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sign_saved_document() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        let output = dir.path().join("signed.pdf");
        std::fs::write(&input, sample_pdf()).unwrap();

        let mut doc = PdfDocument::open(&input).unwrap();
        let signed = signer().sign(&mut doc).unwrap();
        doc.save(&output).unwrap();

        let saved = std::fs::read(&output).unwrap();
        assert_eq!(saved, signed);
        assert_eq!(doc.to_bytes().unwrap(), signed);

        let reopened = PdfDocument::open(&output).unwrap();
        assert_eq!(reopened.signature_dictionaries().unwrap().len(), 1);
        let result = &verify_all(&saved)[0];
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
    }
}
