//! PDF digital signatures with external signers.
//!
//! Signing is split so that private keys never enter this crate:
//!
//! ```text
//! aliases ──[CertificateChainResolver]──▶ CertificateChain
//!                                              │
//! PdfDocument ──[SigningSession]──────────────────────────────────────┐
//!   check_permission ─▶ certify? ─▶ reserve ─▶ digest ─▶ build ─▶ fill │
//!                                                    │                │
//!                               [CmsSignatureBuilder]┘                │
//!                                      │ DigestInfo                   │
//!                                      ▼                              │
//!                               [ExternalSigner] (HSM, KMS, ...)      │
//! ```
//!
//! [`PdfSigner`] runs the whole pipeline for the common case;
//! [`SigningSession`] exposes each phase for callers that need to hold the
//! digest across a longer external approval.
//!
//! ## Signature Types Supported
//!
//! - PKCS#7 detached signatures (adbe.pkcs7.detached)
//! - PAdES baseline signatures (ETSI.CAdES.detached)
//! - Verification of PKCS#7 SHA-1 signatures (adbe.pkcs7.sha1)
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ISO 32000-1:2008 Section 12.8.2.2 - DocMDP
//! - RFC 5652 - Cryptographic Message Syntax
//! - RFC 5035 - ESS signing-certificate-v2

mod byterange;
mod chain;
mod cms;
mod docmdp;
mod external;
pub mod oids;
mod session;
mod signer;
mod target;
mod types;
mod verifier;

pub use byterange::ByteRangeCalculator;
pub use chain::{CertificateCache, CertificateChain, CertificateChainResolver, ChainCertificate};
pub use cms::{CmsSignatureBuilder, DigestInfo, EssCertIdV2, SignatureContainer, SigningCertificateV2};
pub use docmdp::{DocMdpManager, DocMdpPermission};
pub use external::{ExternalSigner, KeystoreError, LocalKeystore, TimeoutSigner};
pub use session::{SessionPhase, SigningSession};
pub use signer::PdfSigner;
pub use target::{PlaceholderHandle, PreparedSignature, SignableDocument, SignableRegion};
pub use types::{
    AttributeMode, DigestAlgorithm, SignOptions, SignatureInfo, SignatureMetadata, SignatureSubFilter,
    SigningAlgorithm, VerificationResult, VerificationStatus,
};
pub use verifier::{container_digest_algorithm, SignatureVerifier};
