//! DocMDP (modification detection and prevention) permissions.
//!
//! A certification signature records which changes later revisions may
//! make (ISO 32000-1, 12.8.2.2):
//!
//! ```text
//! Catalog /Perms << /DocMDP sig >>
//!   sig /Reference [ << /Type /SigRef /TransformMethod /DocMDP
//!                       /TransformParams << /P level /V /1.2 >> >> ]
//! ```
//!
//! The level only ever moves from [`DocMdpPermission::Unset`] to one of the
//! three certified levels, once. [`DocMdpPermission::NoChanges`] is
//! terminal: nothing may sign the document afterwards.

use super::target::SignableDocument;
use crate::error::{Error, Result};
use crate::object::Object;
use std::fmt;

/// DocMDP access permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DocMdpPermission {
    /// The document carries no certification
    #[default]
    Unset = 0,
    /// No changes permitted; further signatures are rejected
    NoChanges = 1,
    /// Form filling and signing permitted
    FormFilling = 2,
    /// Form filling, signing and annotations permitted
    FormFillingAndAnnotations = 3,
}

impl DocMdpPermission {
    /// Numeric `/P` value, 0 for unset.
    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Strict conversion for caller-supplied levels.
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(DocMdpPermission::Unset),
            1 => Ok(DocMdpPermission::NoChanges),
            2 => Ok(DocMdpPermission::FormFilling),
            3 => Ok(DocMdpPermission::FormFillingAndAnnotations),
            other => Err(Error::InvalidPermissionLevel(other)),
        }
    }

    /// Lenient conversion for stored `/P` values: anything outside 1..=3
    /// is treated as 2, the default of ISO 32000-1 Table 254.
    pub fn from_p_value(p: i64) -> Self {
        match p {
            1 => DocMdpPermission::NoChanges,
            2 => DocMdpPermission::FormFilling,
            3 => DocMdpPermission::FormFillingAndAnnotations,
            other => {
                log::warn!("DocMDP /P {} is out of range, treating as 2", other);
                DocMdpPermission::FormFilling
            },
        }
    }

    /// Whether a certification signature is in effect.
    pub fn is_certified(&self) -> bool {
        *self != DocMdpPermission::Unset
    }
}

impl fmt::Display for DocMdpPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DocMdpPermission::Unset => "unset",
            DocMdpPermission::NoChanges => "no changes",
            DocMdpPermission::FormFilling => "form filling",
            DocMdpPermission::FormFillingAndAnnotations => "form filling and annotations",
        };
        write!(f, "{} ({})", self.level(), text)
    }
}

/// Reads, checks and writes DocMDP permissions on a [`SignableDocument`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocMdpManager;

impl DocMdpManager {
    /// Current permission level of `document`.
    pub fn read_permission<D: SignableDocument + ?Sized>(document: &D) -> Result<DocMdpPermission> {
        let level = match document.permission_dictionary()? {
            Some(perms) => Self::permission_from_perms(&perms),
            None => DocMdpPermission::Unset,
        };
        log::debug!("DocMDP permission: {}", level);
        Ok(level)
    }

    /// Interpret a resolved catalog `/Perms` dictionary.
    pub fn permission_from_perms(perms: &Object) -> DocMdpPermission {
        let Some(references) = perms
            .get("DocMDP")
            .and_then(|sig| sig.get("Reference"))
            .and_then(Object::as_array)
        else {
            return DocMdpPermission::Unset;
        };

        let Some(params) = references
            .iter()
            .find(|r| r.get("TransformMethod").and_then(Object::as_name) == Some("DocMDP"))
            .and_then(|r| r.get("TransformParams"))
        else {
            return DocMdpPermission::Unset;
        };

        match params.get("P") {
            Some(Object::Integer(p)) => DocMdpPermission::from_p_value(*p),
            Some(other) => {
                log::warn!("DocMDP /P has type {}, treating as 2", other.type_name());
                DocMdpPermission::FormFilling
            },
            None => DocMdpPermission::FormFilling,
        }
    }

    /// Fail with [`Error::PermissionDenied`] when `level` forbids signing.
    pub fn assert_signable(level: DocMdpPermission) -> Result<()> {
        if level == DocMdpPermission::NoChanges {
            log::warn!("Refusing to sign: document is certified with no changes allowed");
            return Err(Error::PermissionDenied {
                level: level.level(),
            });
        }
        Ok(())
    }

    /// Certify `document` at `level`.
    ///
    /// Fails with [`Error::InvalidPermissionLevel`] for
    /// [`DocMdpPermission::Unset`] and with [`Error::AlreadyCertified`] when
    /// the document already carries a DocMDP entry.
    pub fn write_permission<D: SignableDocument + ?Sized>(
        document: &mut D,
        level: DocMdpPermission,
    ) -> Result<()> {
        if !level.is_certified() {
            return Err(Error::InvalidPermissionLevel(level.level()));
        }
        let current = Self::read_permission(document)?;
        if current.is_certified() {
            return Err(Error::AlreadyCertified {
                level: current.level(),
            });
        }
        document.write_permission_dictionary(level)?;
        log::info!("Certifying document at DocMDP level {}", level);
        Ok(())
    }

    /// `/Reference` array for a certification signature at `level`.
    pub fn reference_array(level: DocMdpPermission) -> Object {
        let params = Object::dict(vec![
            ("Type", Object::name("TransformParams")),
            ("P", Object::Integer(level.level() as i64)),
            ("V", Object::name("1.2")),
        ]);
        let sig_ref = Object::dict(vec![
            ("Type", Object::name("SigRef")),
            ("TransformMethod", Object::name("DocMDP")),
            ("DigestMethod", Object::name("SHA256")),
            ("TransformParams", params),
        ]);
        Object::Array(vec![sig_ref])
    }
}
