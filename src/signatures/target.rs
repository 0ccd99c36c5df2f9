//! The document side of the signing protocol.
//!
//! [`SignableDocument`] is everything a signing session needs from a PDF
//! backend. [`PdfDocument`](crate::document::PdfDocument) is the bundled
//! implementation; tests plug in their own.

use super::docmdp::DocMdpPermission;
use super::types::SignatureMetadata;
use crate::error::Result;
use crate::object::Object;

/// The bytes covered by a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableRegion {
    /// `[0, a, b, c]` as written into `/ByteRange`
    pub byte_range: [i64; 4],
    /// The concatenation of both ranges
    pub bytes: Vec<u8>,
}

/// Location of the reserved `/Contents` value in the serialized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderHandle {
    /// Offset of the opening `<`
    pub contents_offset: usize,
    /// Bytes reserved for the DER container
    pub reserved: usize,
}

/// Output of a successful reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSignature {
    /// What gets hashed
    pub region: SignableRegion,
    /// Where the container goes
    pub handle: PlaceholderHandle,
}

/// A PDF that can carry a detached signature.
pub trait SignableDocument {
    /// Catalog `/Perms` dictionary with indirect references resolved, or
    /// `None` when the document has none.
    fn permission_dictionary(&self) -> Result<Option<Object>>;

    /// Make the pending signature a certification signature at `level`.
    ///
    /// Must be called before
    /// [`reserve_signature_placeholder`](Self::reserve_signature_placeholder).
    fn write_permission_dictionary(&mut self, level: DocMdpPermission) -> Result<()>;

    /// Serialize the document with a signature dictionary whose
    /// `/Contents` holds `reservation` zero bytes, and return the signable
    /// region. The document accepts no further changes afterwards.
    fn reserve_signature_placeholder(
        &mut self,
        metadata: &SignatureMetadata,
        reservation: usize,
    ) -> Result<PreparedSignature>;

    /// Splice `container` into the reserved placeholder and return the
    /// final document bytes.
    fn fill_placeholder(&mut self, handle: &PlaceholderHandle, container: &[u8]) -> Result<Vec<u8>>;
}

impl<T: SignableDocument + ?Sized> SignableDocument for &mut T {
    fn permission_dictionary(&self) -> Result<Option<Object>> {
        (**self).permission_dictionary()
    }

    fn write_permission_dictionary(&mut self, level: DocMdpPermission) -> Result<()> {
        (**self).write_permission_dictionary(level)
    }

    fn reserve_signature_placeholder(
        &mut self,
        metadata: &SignatureMetadata,
        reservation: usize,
    ) -> Result<PreparedSignature> {
        (**self).reserve_signature_placeholder(metadata, reservation)
    }

    fn fill_placeholder(&mut self, handle: &PlaceholderHandle, container: &[u8]) -> Result<Vec<u8>> {
        (**self).fill_placeholder(handle, container)
    }
}
