//! Shared fixtures: RSA keys, a two-certificate chain and keystore
//! doubles.

#![allow(dead_code)]

use cms::cert::x509::name::Name;
use cms::cert::x509::serial_number::SerialNumber;
use cms::cert::x509::time::{Time, Validity};
use cms::cert::x509::{Certificate, TbsCertificate, Version};
use der::asn1::{Any, BitString, UtcTime};
use der::{Decode, Encode};
use pdf_extsign::signatures::{oids, ExternalSigner, KeystoreError, LocalKeystore};
use pdf_extsign::writer::PdfWriter;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const SIGNER: &str = "signer";
pub const CA: &str = "ca";

/// 2020-01-01T00:00:00Z
const NOT_BEFORE: u64 = 1_577_836_800;
/// 2045-01-01T00:00:00Z
const NOT_AFTER: u64 = 2_366_755_200;

pub struct Fixture {
    pub ca_key: RsaPrivateKey,
    pub signer_key: RsaPrivateKey,
    pub ca_cert: Vec<u8>,
    pub signer_cert: Vec<u8>,
}

/// Keys and certificates, generated once per test binary.
pub fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let ca_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let signer_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();

        let ca_cert = certificate(1, "CN=Test Root CA,O=Example", "CN=Test Root CA,O=Example", &ca_key, &ca_key);
        let signer_cert = certificate(2, "CN=Test Signer,O=Example", "CN=Test Root CA,O=Example", &signer_key, &ca_key);

        Fixture {
            ca_key,
            signer_key,
            ca_cert,
            signer_cert,
        }
    })
}

/// DER certificate for `subject_key`, issued (signed) by `issuer_key`.
pub fn certificate(
    serial: u8,
    subject: &str,
    issuer: &str,
    subject_key: &RsaPrivateKey,
    issuer_key: &RsaPrivateKey,
) -> Vec<u8> {
    let algorithm = AlgorithmIdentifierOwned {
        oid: oids::SHA256_WITH_RSA,
        parameters: Some(Any::null()),
    };
    let spki_der = subject_key.to_public_key().to_public_key_der().unwrap();
    let time = |secs| Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap());

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[serial]).unwrap(),
        signature: algorithm.clone(),
        issuer: Name::from_str(issuer).unwrap(),
        validity: Validity {
            not_before: time(NOT_BEFORE),
            not_after: time(NOT_AFTER),
        },
        subject: Name::from_str(subject).unwrap(),
        subject_public_key_info: SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).unwrap(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    let signing_key = SigningKey::<Sha256>::new(issuer_key.clone());
    let signature = signing_key.sign(&tbs.to_der().unwrap()).to_vec();

    Certificate {
        tbs_certificate: tbs,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&signature).unwrap(),
    }
    .to_der()
    .unwrap()
}

/// Keystore holding the signer key and the two-certificate chain.
pub fn keystore() -> LocalKeystore {
    let fixture = fixture();
    let mut keystore = LocalKeystore::new();
    keystore
        .add_certificate(SIGNER, fixture.signer_cert.clone())
        .add_certificate(CA, fixture.ca_cert.clone())
        .add_key(SIGNER, fixture.signer_key.clone());
    keystore
}

pub fn chain_aliases() -> [&'static str; 2] {
    [SIGNER, CA]
}

/// A small two-page document.
pub fn sample_pdf() -> Vec<u8> {
    let mut writer = PdfWriter::new();
    writer.add_text_page("Quarterly report").add_text_page("Appendix");
    writer.finish().unwrap()
}

/// [`sample_pdf`] with a `startxref` pointing nowhere, so readers have to
/// rebuild the cross-reference table from the object headers.
pub fn damaged_xref_pdf() -> Vec<u8> {
    let mut bytes = sample_pdf();
    let start = bytes.windows(9).rposition(|w| w == b"startxref").unwrap();
    bytes.truncate(start);
    bytes.extend_from_slice(b"startxref\n999999\n%%EOF\n");
    bytes
}

/// Two pages with the catalog and page tree packed in an object stream
/// and a cross-reference stream.
pub fn object_stream_pdf() -> Vec<u8> {
    let mut writer = PdfWriter::new();
    writer
        .use_object_streams(true)
        .add_text_page("Quarterly report")
        .add_text_page("Appendix");
    writer.finish().unwrap()
}

/// Returns a fixed 256-byte "signature" without any key.
pub struct StubSigner {
    pub keystore: LocalKeystore,
}

impl StubSigner {
    pub fn new() -> Self {
        Self { keystore: keystore() }
    }
}

impl ExternalSigner for StubSigner {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        self.keystore.load_certificate(alias)
    }

    fn sign(&self, _digest_info: &[u8], _alias: &str) -> Result<Vec<u8>, KeystoreError> {
        Ok(vec![0x5A; 256])
    }
}

/// Counts keystore calls made through it.
pub struct CountingSigner {
    inner: LocalKeystore,
    pub loads: AtomicUsize,
    pub signs: AtomicUsize,
}

impl CountingSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: keystore(),
            loads: AtomicUsize::new(0),
            signs: AtomicUsize::new(0),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn signs(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

impl ExternalSigner for CountingSigner {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_certificate(alias)
    }

    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(digest_info, alias)
    }
}

/// Signs correctly, but only after `delay`.
pub struct SlowSigner {
    inner: LocalKeystore,
    delay: Duration,
}

impl SlowSigner {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: keystore(),
            delay,
        }
    }
}

impl ExternalSigner for SlowSigner {
    fn load_certificate(&self, alias: &str) -> Result<Vec<u8>, KeystoreError> {
        self.inner.load_certificate(alias)
    }

    fn sign(&self, digest_info: &[u8], alias: &str) -> Result<Vec<u8>, KeystoreError> {
        std::thread::sleep(self.delay);
        self.inner.sign(digest_info, alias)
    }
}
