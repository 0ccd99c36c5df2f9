//! The signing session state machine.
//!
//! ```text
//! Open ──check_permission──▶ Checked ──reserve──▶ Reserved ──digest──▶ Digested
//!                              │ certify (0..1)                           │ build
//!                              ▼                                          ▼
//!                            Checked                  Finalized ◀──fill── Built
//! ```
//!
//! Each operation requires exactly one phase and fails with
//! [`Error::PhaseViolation`] otherwise, leaving the session untouched. Any
//! failure after the document starts changing moves the session to
//! `Aborted`, from which nothing can proceed.

use super::chain::CertificateChain;
use super::cms::{CmsSignatureBuilder, SignatureContainer};
use super::docmdp::{DocMdpManager, DocMdpPermission};
use super::external::ExternalSigner;
use super::target::{PlaceholderHandle, PreparedSignature, SignableDocument, SignableRegion};
use super::types::{SignatureMetadata, SigningAlgorithm};
use crate::error::{Error, Result};
use std::fmt;

/// Externally visible session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Nothing has happened yet
    Open,
    /// The document permits signing
    Checked,
    /// The placeholder is written and the document sealed
    Reserved,
    /// The signable region is hashed
    Digested,
    /// The CMS container exists
    Built,
    /// The signed document was produced
    Finalized,
    /// A fatal error ended the session
    Aborted,
}

impl SessionPhase {
    /// Phase name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Open => "Open",
            SessionPhase::Checked => "Checked",
            SessionPhase::Reserved => "Reserved",
            SessionPhase::Digested => "Digested",
            SessionPhase::Built => "Built",
            SessionPhase::Finalized => "Finalized",
            SessionPhase::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Phase together with the data it owns.
#[derive(Debug)]
enum Phase {
    Open,
    Checked {
        level: DocMdpPermission,
        certified: Option<DocMdpPermission>,
    },
    Reserved {
        prepared: PreparedSignature,
    },
    Digested {
        handle: PlaceholderHandle,
        digest: Vec<u8>,
    },
    Built {
        handle: PlaceholderHandle,
        container: SignatureContainer,
    },
    Finalized,
    Aborted,
}

impl Phase {
    fn kind(&self) -> SessionPhase {
        match self {
            Phase::Open => SessionPhase::Open,
            Phase::Checked { .. } => SessionPhase::Checked,
            Phase::Reserved { .. } => SessionPhase::Reserved,
            Phase::Digested { .. } => SessionPhase::Digested,
            Phase::Built { .. } => SessionPhase::Built,
            Phase::Finalized => SessionPhase::Finalized,
            Phase::Aborted => SessionPhase::Aborted,
        }
    }
}

/// Drives one signature over one document.
pub struct SigningSession<'d, D: SignableDocument + ?Sized> {
    document: &'d mut D,
    algorithm: SigningAlgorithm,
    phase: Phase,
}

impl<'d, D: SignableDocument + ?Sized> SigningSession<'d, D> {
    /// Start a session that hashes with `algorithm`.
    pub fn new(document: &'d mut D, algorithm: SigningAlgorithm) -> Self {
        Self {
            document,
            algorithm,
            phase: Phase::Open,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase.kind()
    }

    /// Session algorithm.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// DocMDP level read by [`check_permission`](Self::check_permission).
    pub fn permission(&self) -> Option<DocMdpPermission> {
        match &self.phase {
            Phase::Checked { level, .. } => Some(*level),
            _ => None,
        }
    }

    /// Signable region fixed by [`reserve`](Self::reserve), until it is
    /// hashed.
    pub fn region(&self) -> Option<&SignableRegion> {
        match &self.phase {
            Phase::Reserved { prepared } => Some(&prepared.region),
            _ => None,
        }
    }

    /// Read the document's DocMDP level and refuse level 1.
    ///
    /// A refused document is never touched.
    pub fn check_permission(&mut self) -> Result<DocMdpPermission> {
        self.take(SessionPhase::Open)?;

        let level = DocMdpManager::read_permission(&*self.document)?;
        DocMdpManager::assert_signable(level)?;

        log::debug!("Session checked: DocMDP {}", level);
        self.phase = Phase::Checked {
            level,
            certified: None,
        };
        Ok(level)
    }

    /// Make this signature a certification signature at `level`.
    ///
    /// Only an uncertified document can be certified, and only once per
    /// session. Rejections leave the session in `Checked`.
    pub fn certify(&mut self, level: DocMdpPermission) -> Result<()> {
        let Phase::Checked {
            level: current,
            certified,
        } = self.take(SessionPhase::Checked)?
        else {
            return Err(self.violation(SessionPhase::Checked));
        };

        let rejection = if let Some(previous) = certified {
            Some(Error::AlreadyCertified {
                level: previous.level(),
            })
        } else if current.is_certified() {
            Some(Error::AlreadyCertified {
                level: current.level(),
            })
        } else if !level.is_certified() {
            Some(Error::InvalidPermissionLevel(level.level()))
        } else {
            None
        };
        if let Some(err) = rejection {
            self.phase = Phase::Checked {
                level: current,
                certified,
            };
            return Err(err);
        }

        DocMdpManager::write_permission(&mut *self.document, level)?;
        self.phase = Phase::Checked {
            level: current,
            certified: Some(level),
        };
        Ok(())
    }

    /// Serialize the update with a `max_size` byte placeholder and fix the
    /// signable region.
    pub fn reserve(&mut self, metadata: &SignatureMetadata, max_size: usize) -> Result<SignableRegion> {
        self.take(SessionPhase::Checked)?;

        let prepared = self.document.reserve_signature_placeholder(metadata, max_size)?;
        log::debug!(
            "Session reserved {} bytes, ByteRange {:?}",
            prepared.handle.reserved,
            prepared.region.byte_range
        );
        let region = prepared.region.clone();
        self.phase = Phase::Reserved { prepared };
        Ok(region)
    }

    /// Hash exactly the signable region.
    pub fn digest(&mut self) -> Result<Vec<u8>> {
        let Phase::Reserved { prepared } = self.take(SessionPhase::Reserved)? else {
            return Err(self.violation(SessionPhase::Reserved));
        };

        let digest = self.algorithm.digest().digest(&prepared.region.bytes);
        log::debug!(
            "Session digested {} bytes with {}",
            prepared.region.bytes.len(),
            self.algorithm.digest()
        );
        self.phase = Phase::Digested {
            handle: prepared.handle,
            digest: digest.clone(),
        };
        Ok(digest)
    }

    /// Build the CMS container through `signer`.
    pub fn build(
        &mut self,
        builder: &CmsSignatureBuilder,
        chain: &CertificateChain,
        signer: &dyn ExternalSigner,
        key_alias: &str,
    ) -> Result<SignatureContainer> {
        let Phase::Digested { handle, digest } = self.take(SessionPhase::Digested)? else {
            return Err(self.violation(SessionPhase::Digested));
        };

        if builder.algorithm() != self.algorithm {
            let err = Error::AlgorithmMismatch {
                expected: self.algorithm.to_string(),
                actual: builder.algorithm().to_string(),
            };
            self.phase = Phase::Digested { handle, digest };
            return Err(err);
        }

        let container = builder.build(&digest, chain, signer, key_alias)?;
        self.phase = Phase::Built {
            handle,
            container: container.clone(),
        };
        Ok(container)
    }

    /// Write the container into the placeholder and return the signed
    /// document.
    pub fn fill(&mut self) -> Result<Vec<u8>> {
        let Phase::Built { handle, container } = self.take(SessionPhase::Built)? else {
            return Err(self.violation(SessionPhase::Built));
        };

        let signed = self.document.fill_placeholder(&handle, container.der())?;
        log::info!(
            "Signature written: {} byte container in {} byte document",
            container.len(),
            signed.len()
        );
        self.phase = Phase::Finalized;
        Ok(signed)
    }

    /// Move out of `expected`, leaving `Aborted` behind until the caller
    /// installs the next phase. A phase mismatch changes nothing.
    fn take(&mut self, expected: SessionPhase) -> Result<Phase> {
        if self.phase.kind() != expected {
            return Err(self.violation(expected));
        }
        Ok(std::mem::replace(&mut self.phase, Phase::Aborted))
    }

    fn violation(&self, expected: SessionPhase) -> Error {
        let actual = self.phase.kind();
        log::warn!("Session operation requires {}, session is {}", expected, actual);
        Error::PhaseViolation {
            expected: expected.name(),
            actual: actual.name(),
        }
    }
}

impl<D: SignableDocument + ?Sized> fmt::Debug for SigningSession<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSession")
            .field("algorithm", &self.algorithm)
            .field("phase", &self.phase.kind())
            .finish_non_exhaustive()
    }
}
