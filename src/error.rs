//! Error types for the signing library.
//!
//! A single error enum covers both the document layer (parsing, object
//! lookup, incremental writing) and the signing protocol. Every variant is
//! `Send + Sync` so sessions can run on worker threads.

use crate::signatures::KeystoreError;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while preparing, signing or verifying a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Stream decoding error
    #[error("Stream decode error: {0}")]
    Decode(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Recursion depth limit exceeded while resolving references
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// The document was modified after its signable bytes were fixed
    #[error("Document is sealed for signing; no further modifications allowed")]
    DocumentSealed,

    /// The reserved placeholder already holds a signature container
    #[error("Signature placeholder has already been filled")]
    PlaceholderFilled,

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// DocMDP level forbids any further signature
    #[error("Document certification level {level} forbids further signatures")]
    PermissionDenied {
        /// The DocMDP P value read from the document
        level: u8,
    },

    /// A permission level that cannot be written was requested
    #[error("DocMDP level {0} cannot be written")]
    InvalidPermissionLevel(u8),

    /// A certification entry is already present
    #[error("Document is already certified at level {level}")]
    AlreadyCertified {
        /// The level already in effect
        level: u8,
    },

    /// Keystore could not provide a certificate
    #[error("Failed to load certificate '{alias}': {reason}")]
    CertificateLoad {
        /// Keystore alias
        alias: String,
        /// Underlying cause
        reason: String,
    },

    /// Certificate bytes are not a usable X.509 certificate
    #[error("Failed to parse certificate '{alias}': {reason}")]
    CertificateParse {
        /// Keystore alias
        alias: String,
        /// Underlying cause
        reason: String,
    },

    /// No certificate aliases were supplied
    #[error("Certificate chain is empty")]
    EmptyCertificateChain,

    /// The container does not fit the reserved placeholder
    #[error("Signature container needs {required} bytes but only {reserved} were reserved")]
    PlaceholderOverflow {
        /// Container size in bytes
        required: usize,
        /// Reserved size in bytes
        reserved: usize,
    },

    /// The external signer returned an unusable signature
    #[error("Signer '{alias}' returned an unusable signature: {reason}")]
    SignerRejected {
        /// Key alias
        alias: String,
        /// What was wrong with the returned value
        reason: String,
    },

    /// The external signer failed
    #[error("External signing with '{alias}' failed")]
    SigningFailed {
        /// Key alias
        alias: String,
        /// Keystore-side error
        #[source]
        cause: KeystoreError,
    },

    /// Digest or signature algorithm disagreement
    #[error("Algorithm mismatch: expected {expected}, found {actual}")]
    AlgorithmMismatch {
        /// Algorithm the session was configured with
        expected: String,
        /// Algorithm actually observed
        actual: String,
    },

    /// A session operation was called in the wrong phase
    #[error("Operation requires phase {expected}, session is {actual}")]
    PhaseViolation {
        /// Phase the operation requires
        expected: &'static str,
        /// Phase the session is in
        actual: &'static str,
    },

    /// DER encoding or decoding failure
    #[error("DER error: {0}")]
    Der(#[from] der::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(err.to_string().contains("10 0 R"));
    }

    #[test]
    fn test_placeholder_overflow_message() {
        let err = Error::PlaceholderOverflow {
            required: 4096,
            reserved: 256,
        };
        let msg = err.to_string();
        assert!(msg.contains("4096"));
        assert!(msg.contains("256"));
    }

    #[test]
    fn test_signing_failed_keeps_source() {
        use std::error::Error as _;

        let err = Error::SigningFailed {
            alias: "hsm-key".to_string(),
            cause: KeystoreError::NotFound {
                alias: "hsm-key".to_string(),
            },
        };
        assert!(err.to_string().contains("hsm-key"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_phase_violation_message() {
        let err = Error::PhaseViolation {
            expected: "Reserved",
            actual: "Open",
        };
        assert_eq!(err.to_string(), "Operation requires phase Reserved, session is Open");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
