//! Certificate chain resolution and cache tests.

mod common;

use common::*;
use pdf_extsign::signatures::{
    CertificateCache, CertificateChainResolver, ExternalSigner, LocalKeystore, PdfSigner,
};
use pdf_extsign::Error;
use std::sync::Arc;
use std::thread;

mod resolution {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let keystore = keystore();
        let chain = CertificateChainResolver::new(&keystore).resolve(&[CA, SIGNER]).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.signer().alias, CA);
        assert_eq!(chain.certificates()[1].alias, SIGNER);
        assert!(chain.signer().subject.contains("Test Root CA"));
    }

    #[test]
    fn test_signer_first_chain() {
        let keystore = keystore();
        let chain = CertificateChainResolver::new(&keystore).resolve(&chain_aliases()).unwrap();
        assert_eq!(chain.signer().der, fixture().signer_cert);
        assert_eq!(chain.signer().rsa_key_bits, Some(2048));
        assert_eq!(chain.signature_len(), Some(256));
    }

    #[test]
    fn test_missing_alias_names_alias() {
        let keystore = keystore();
        match CertificateChainResolver::new(&keystore).resolve(&[SIGNER, "intermediate"]) {
            Err(Error::CertificateLoad { alias, .. }) => assert_eq!(alias, "intermediate"),
            other => panic!("expected CertificateLoad, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_certificate_names_alias() {
        let mut keystore = keystore();
        keystore.add_certificate("broken", fixture().signer_cert[..100].to_vec());
        match CertificateChainResolver::new(&keystore).resolve(&[SIGNER, "broken"]) {
            Err(Error::CertificateParse { alias, .. }) => assert_eq!(alias, "broken"),
            other => panic!("expected CertificateParse, got {:?}", other),
        }
    }
}

mod cache {
    use super::*;

    #[test]
    fn test_cache_hits_skip_keystore() {
        let counting = CountingSigner::new();
        let cache = CertificateCache::new();
        let resolver = CertificateChainResolver::new(counting.as_ref()).with_cache(&cache);

        let first = resolver.resolve(&chain_aliases()).unwrap();
        assert_eq!(counting.loads(), 2);
        let second = resolver.resolve(&chain_aliases()).unwrap();
        assert_eq!(counting.loads(), 2);
        assert_eq!(first, second);
        assert!(cache.contains(SIGNER) && cache.contains(CA));
    }

    #[test]
    fn test_without_cache_every_resolve_loads() {
        let counting = CountingSigner::new();
        let resolver = CertificateChainResolver::new(counting.as_ref());
        resolver.resolve(&chain_aliases()).unwrap();
        resolver.resolve(&chain_aliases()).unwrap();
        assert_eq!(counting.loads(), 4);
    }

    #[test]
    fn test_cache_is_shared_between_signers() {
        let counting = CountingSigner::new();
        let keystore: Arc<dyn ExternalSigner> = counting.clone();
        let cache = Arc::new(CertificateCache::new());

        let a = PdfSigner::new(keystore.clone(), SIGNER, chain_aliases()).with_cache(cache.clone());
        let b = PdfSigner::new(keystore, SIGNER, chain_aliases()).with_cache(cache.clone());
        a.sign_bytes(&sample_pdf()).unwrap();
        b.sign_bytes(&sample_pdf()).unwrap();

        assert_eq!(counting.loads(), 2);
        assert_eq!(counting.signs(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_cache_access() {
        let keystore = Arc::new(keystore());
        let cache = Arc::new(CertificateCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let keystore = Arc::clone(&keystore);
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let keystore: &LocalKeystore = &keystore;
                    CertificateChainResolver::new(keystore)
                        .with_cache(&cache)
                        .resolve(&chain_aliases())
                        .unwrap()
                })
            })
            .collect();

        let chains: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(chains.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 2);
    }
}
