//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! Object graph changes (PdfDocument)
//!     ↓
//! [IncrementalWriter] (appends objects, xref section, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects, sorted keys)
//!     ↓
//! PDF bytes
//! ```
//!
//! [`PdfWriter`] builds fresh documents with the same serializer, with a
//! classic table or with object and cross-reference streams.
//!
//! ```
//! use pdf_extsign::writer::PdfWriter;
//!
//! let mut writer = PdfWriter::new();
//! writer.add_text_page("Hello, World!");
//! let bytes = writer.finish()?;
//! assert!(bytes.starts_with(b"%PDF-1.7"));
//! # Ok::<(), pdf_extsign::Error>(())
//! ```

mod embedded_files;
mod incremental;
mod object_serializer;
mod pdf_writer;

pub use embedded_files::{insert_into_names_array, AFRelationship, EmbeddedFile};
pub use incremental::{IncrementalUpdate, IncrementalWriter};
pub(crate) use object_serializer::hex_upper;
pub use object_serializer::ObjectSerializer;
pub use pdf_writer::PdfWriter;
