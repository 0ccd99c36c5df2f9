// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]

//! # pdf_extsign
//!
//! Detached CMS signatures for PDF documents whose private keys live in an
//! external signer (HSM, cloud KMS, smart card).
//!
//! ## Core Features
//!
//! - **External signing**: only a DER `DigestInfo` crosses the
//!   [`ExternalSigner`](signatures::ExternalSigner) boundary
//! - **Incremental updates**: the original bytes are never rewritten, so
//!   earlier signatures stay valid
//! - **DocMDP**: certification signatures (ISO 32000-1 §12.8.2.2), and
//!   refusal to sign documents certified with "no changes"
//! - **CMS**: SignedData with signed attributes and ESS
//!   signing-certificate-v2 (RFC 5652, RFC 5035)
//! - **Verification**: ByteRange, message digest, certificate binding and
//!   RSA signature checks
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_extsign::signatures::{DocMdpPermission, LocalKeystore, PdfSigner, SignOptions};
//! use pdf_extsign::PdfDocument;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut keystore = LocalKeystore::new();
//! keystore.add_certificate("signer", std::fs::read("signer.der")?);
//! keystore.add_certificate("ca", std::fs::read("ca.der")?);
//! keystore.add_pkcs8_key("signer", &std::fs::read("signer.pk8")?)?;
//!
//! let signer = PdfSigner::new(Arc::new(keystore), "signer", ["signer", "ca"]).with_options(
//!     SignOptions::default()
//!         .with_reason("Release approval")
//!         .with_certification(DocMdpPermission::FormFilling),
//! );
//!
//! let mut doc = PdfDocument::open("release.pdf")?;
//! std::fs::write("release-signed.pdf", signer.sign(&mut doc)?)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod decoders;
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;
pub mod xref_reconstruction;

// Incremental updates and document creation
pub mod writer;

// Digital signatures
pub mod signatures;

// Configuration
pub mod config;

// Re-exports
pub use config::SigningConfig;
pub use document::PdfDocument;
pub use error::{Error, Result};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
