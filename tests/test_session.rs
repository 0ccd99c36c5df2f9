//! Signing session phase tests and external signer doubles.

mod common;

use common::*;
use pdf_extsign::signatures::{
    AttributeMode, CertificateChain, CertificateChainResolver, CmsSignatureBuilder, DigestInfo, DocMdpPermission,
    ExternalSigner, KeystoreError, PdfSigner, SessionPhase, SignOptions, SignatureMetadata, SignatureVerifier,
    SigningAlgorithm, SigningSession, TimeoutSigner,
};
use pdf_extsign::{Error, PdfDocument, SigningConfig};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

fn metadata() -> SignatureMetadata {
    SignOptions::default().metadata(chrono::Utc::now())
}

fn chain() -> CertificateChain {
    CertificateChainResolver::new(&keystore()).resolve(&chain_aliases()).unwrap()
}

mod phases {
    use super::*;

    #[test]
    fn test_reserve_before_check_is_violation() {
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);

        match session.reserve(&metadata(), 4096) {
            Err(Error::PhaseViolation { expected, actual }) => {
                assert_eq!(expected, "Checked");
                assert_eq!(actual, "Open");
            },
            other => panic!("expected PhaseViolation, got {:?}", other),
        }
        assert_eq!(session.phase(), SessionPhase::Open);
        drop(session);
        assert!(!doc.is_sealed());
    }

    #[test]
    fn test_out_of_order_calls() {
        let keystore = keystore();
        let chain = chain();
        let builder = CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa);
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);

        assert!(matches!(session.digest(), Err(Error::PhaseViolation { .. })));
        assert!(matches!(session.fill(), Err(Error::PhaseViolation { .. })));

        session.check_permission().unwrap();
        assert!(matches!(session.check_permission(), Err(Error::PhaseViolation { .. })));
        assert!(matches!(
            session.build(&builder, &chain, &keystore, SIGNER),
            Err(Error::PhaseViolation { .. })
        ));

        session.reserve(&metadata(), 8192).unwrap();
        assert!(matches!(session.reserve(&metadata(), 8192), Err(Error::PhaseViolation { .. })));
        assert!(matches!(
            session.certify(DocMdpPermission::FormFilling),
            Err(Error::PhaseViolation { .. })
        ));
        assert_eq!(session.phase(), SessionPhase::Reserved);
        assert!(session.region().is_some());

        session.digest().unwrap();
        session.build(&builder, &chain, &keystore, SIGNER).unwrap();
        assert_eq!(session.phase(), SessionPhase::Built);
        session.fill().unwrap();
        assert_eq!(session.phase(), SessionPhase::Finalized);
        assert!(matches!(session.fill(), Err(Error::PhaseViolation { .. })));
    }

    #[test]
    fn test_certify_twice_in_one_session() {
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);
        session.check_permission().unwrap();

        session.certify(DocMdpPermission::FormFilling).unwrap();
        assert!(matches!(
            session.certify(DocMdpPermission::FormFillingAndAnnotations),
            Err(Error::AlreadyCertified { level: 2 })
        ));
        assert_eq!(session.phase(), SessionPhase::Checked);
        assert_eq!(session.permission(), Some(DocMdpPermission::Unset));

        // The session is still usable
        session.reserve(&metadata(), 8192).unwrap();
    }

    #[test]
    fn test_permission_denied_aborts() {
        let certified = PdfSigner::new(Arc::new(keystore()), SIGNER, chain_aliases())
            .with_options(SignOptions::default().with_certification(DocMdpPermission::NoChanges))
            .sign_bytes(&sample_pdf())
            .unwrap();
        let mut doc = PdfDocument::from_bytes(certified).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);

        assert!(matches!(session.check_permission(), Err(Error::PermissionDenied { level: 1 })));
        assert_eq!(session.phase(), SessionPhase::Aborted);
        assert!(matches!(session.reserve(&metadata(), 8192), Err(Error::PhaseViolation { .. })));
    }

    #[test]
    fn test_builder_algorithm_must_match_session() {
        let keystore = keystore();
        let chain = chain();
        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);
        session.check_permission().unwrap();
        session.reserve(&metadata(), 8192).unwrap();
        session.digest().unwrap();

        let sha1 = CmsSignatureBuilder::new(SigningAlgorithm::Sha1WithRsa);
        assert!(matches!(
            session.build(&sha1, &chain, &keystore, SIGNER),
            Err(Error::AlgorithmMismatch { .. })
        ));
        assert_eq!(session.phase(), SessionPhase::Digested);
    }
}

mod container {
    use super::*;

    #[test]
    fn test_signing_certificate_hash_with_stub_signer() {
        let stub = StubSigner::new();
        let chain = chain();
        assert_eq!(chain.len(), 2);

        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        let mut session = SigningSession::new(&mut doc, SigningAlgorithm::Sha256WithRsa);
        session.check_permission().unwrap();
        session.reserve(&metadata(), 8192).unwrap();
        let digest = session.digest().unwrap();

        let container = session
            .build(&CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa), &chain, &stub, SIGNER)
            .unwrap();

        let expected = Sha256::digest(&fixture().signer_cert).to_vec();
        assert_eq!(container.signing_certificate_hash(), Some(expected.as_slice()));
        assert_eq!(container.content_digest(), digest.as_slice());
        assert_eq!(container.signature(), &[0x5A; 256][..]);

        // The stub value is no valid RSA signature, but everything else binds
        let result = SignatureVerifier::new().verify_container(container.der(), &digest).unwrap();
        assert_eq!(result.signing_certificate_matches, Some(true));
        assert_eq!(result.content_digest, digest);
        assert!(!result.status.is_valid());
    }

    #[test]
    fn test_digest_length_must_match_algorithm() {
        let counting = CountingSigner::new();
        let sha1_sized = [0u8; 20];
        let result = CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa).build(
            &sha1_sized,
            &chain(),
            counting.as_ref(),
            SIGNER,
        );
        assert!(matches!(result, Err(Error::AlgorithmMismatch { .. })));
        assert_eq!(counting.signs(), 0);
    }

    #[test]
    fn test_direct_mode_signs_content_digest() {
        let keystore = keystore();
        let digest = Sha256::digest(b"region").to_vec();
        let container = CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa)
            .with_mode(AttributeMode::Direct)
            .build(&digest, &chain(), &keystore, SIGNER)
            .unwrap();

        assert!(container.signed_attributes().is_none());
        assert!(container.signing_certificate_hash().is_none());
        let result = SignatureVerifier::new().verify_container(container.der(), &digest).unwrap();
        assert!(result.status.is_valid(), "{:?}", result.messages);
    }

    #[test]
    fn test_signer_receives_digest_info() {
        struct Capture(std::sync::Mutex<Vec<u8>>, StubSigner);
        impl ExternalSigner for Capture {
            fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
                self.1.load_certificate(alias)
            }
            fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
                *self.0.lock().unwrap() = digest_info.to_vec();
                self.1.sign(digest_info, alias)
            }
        }

        let capture = Capture(Default::default(), StubSigner::new());
        let digest = Sha256::digest(b"region").to_vec();
        CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa)
            .with_mode(AttributeMode::Direct)
            .build(&digest, &chain(), &capture, SIGNER)
            .unwrap();

        use der::Encode;
        let expected = DigestInfo::new(SigningAlgorithm::Sha256WithRsa, &digest)
            .unwrap()
            .to_der()
            .unwrap();
        assert_eq!(*capture.0.lock().unwrap(), expected);
        assert_eq!(expected.len(), 19 + 32);
    }

    #[test]
    fn test_short_signature_is_rejected() {
        struct Short(StubSigner);
        impl ExternalSigner for Short {
            fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
                self.0.load_certificate(alias)
            }
            fn sign(&self, _: &[u8], _: &str) -> Result<Vec<u8>, KeystoreError> {
                Ok(vec![1; 128])
            }
        }

        let digest = Sha256::digest(b"region").to_vec();
        let result = CmsSignatureBuilder::new(SigningAlgorithm::Sha256WithRsa).build(
            &digest,
            &chain(),
            &Short(StubSigner::new()),
            SIGNER,
        );
        assert!(matches!(result, Err(Error::SignerRejected { .. })));
    }
}

mod external_signer {
    use super::*;

    #[test]
    fn test_timeout_signer_fails_on_stall() {
        let slow: Arc<dyn ExternalSigner> = Arc::new(SlowSigner::new(Duration::from_secs(2)));
        let signer = PdfSigner::new(
            Arc::new(TimeoutSigner::new(slow, Duration::from_millis(50))),
            SIGNER,
            chain_aliases(),
        );

        let mut doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        match signer.sign(&mut doc) {
            Err(Error::SigningFailed { alias, cause }) => {
                assert_eq!(alias, SIGNER);
                assert_eq!(cause, KeystoreError::Timeout(Duration::from_millis(50)));
            },
            other => panic!("expected SigningFailed, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_timeout_from_config_allows_prompt_signer() {
        let config = SigningConfig::new()
            .with_key_alias(SIGNER)
            .with_certificate_aliases(chain_aliases())
            .with_signer_timeout(Duration::from_secs(30));
        let signer = PdfSigner::from_config(Arc::new(keystore()), &config).unwrap();
        let signed = signer.sign_bytes(&sample_pdf()).unwrap();
        assert!(signed.len() > sample_pdf().len());
    }

    #[test]
    fn test_unknown_key_alias() {
        let signer = PdfSigner::new(Arc::new(keystore()), "nobody", chain_aliases());
        let result = signer.sign_bytes(&sample_pdf());
        match result {
            Err(Error::SigningFailed { alias, cause }) => {
                assert_eq!(alias, "nobody");
                assert!(matches!(cause, KeystoreError::NotFound { .. }));
            },
            other => panic!("expected SigningFailed, got {:?}", other.map(|b| b.len())),
        }
    }
}
