//! Embedded file support.
//!
//! Attachments live in the catalog `/Names` dictionary under
//! `/EmbeddedFiles`, and for PDF/A-3 also in the catalog `/AF` array. Each
//! attachment is an EmbeddedFile stream plus a Filespec dictionary pointing
//! at it.
//!
//! Attachments must be added before a signature's byte range is fixed;
//! [`PdfDocument::embed_file`](crate::document::PdfDocument::embed_file)
//! enforces that.
//!
//! ```
//! use pdf_extsign::writer::{AFRelationship, EmbeddedFile};
//!
//! let file = EmbeddedFile::new("invoice.xml", b"<Invoice/>".to_vec())
//!     .with_description("Structured invoice data")
//!     .with_mime_type("text/xml")
//!     .with_af_relationship(AFRelationship::Data);
//! assert_eq!(file.size(), 10);
//! ```

use super::object_serializer::ObjectSerializer;
use crate::object::{Dict, Object, ObjectRef};
use chrono::{DateTime, Utc};

/// A file to be attached to a PDF.
#[derive(Debug, Clone)]
pub struct EmbeddedFile {
    /// The file name (key in the EmbeddedFiles name tree)
    pub name: String,
    /// The file data
    pub data: Vec<u8>,
    /// Optional description of the file
    pub description: Option<String>,
    /// MIME type of the file (e.g., "application/pdf", "text/plain")
    pub mime_type: Option<String>,
    /// Creation date
    pub creation_date: Option<DateTime<Utc>>,
    /// Modification date
    pub modification_date: Option<DateTime<Utc>>,
    /// Associated file relationship
    pub af_relationship: Option<AFRelationship>,
}

/// Associated File Relationship (PDF 2.0, PDF/A-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AFRelationship {
    /// The file is the original source
    Source,
    /// The file contains data referenced by the document
    Data,
    /// An alternative representation
    Alternative,
    /// Supplementary data
    Supplement,
    /// Unspecified relationship
    Unspecified,
}

impl AFRelationship {
    /// Get the PDF name for this relationship.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            AFRelationship::Source => "Source",
            AFRelationship::Data => "Data",
            AFRelationship::Alternative => "Alternative",
            AFRelationship::Supplement => "Supplement",
            AFRelationship::Unspecified => "Unspecified",
        }
    }
}

impl EmbeddedFile {
    /// Create a new embedded file.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            description: None,
            mime_type: None,
            creation_date: None,
            modification_date: None,
            af_relationship: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the creation date.
    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    /// Set the modification date.
    pub fn with_modification_date(mut self, date: DateTime<Utc>) -> Self {
        self.modification_date = Some(date);
        self
    }

    /// Set the AF relationship.
    pub fn with_af_relationship(mut self, relationship: AFRelationship) -> Self {
        self.af_relationship = Some(relationship);
        self
    }

    /// Get the size of the embedded file data.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// EmbeddedFile stream object, with `/Params` carrying size, dates and
    /// an MD5 checksum.
    pub fn build_stream(&self) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), ObjectSerializer::name("EmbeddedFile"));

        // The serializer escapes the slash as #2F
        if let Some(ref mime) = self.mime_type {
            dict.insert("Subtype".to_string(), ObjectSerializer::name(mime));
        }

        let mut params = Dict::new();
        params.insert("Size".to_string(), Object::Integer(self.data.len() as i64));
        if let Some(ref creation) = self.creation_date {
            params.insert("CreationDate".to_string(), ObjectSerializer::date(creation));
        }
        if let Some(ref modification) = self.modification_date {
            params.insert("ModDate".to_string(), ObjectSerializer::date(modification));
        }
        params.insert("CheckSum".to_string(), Object::String(md5_hash(&self.data)));
        dict.insert("Params".to_string(), Object::Dictionary(params));

        Object::Stream {
            dict,
            data: bytes::Bytes::from(self.data.clone()),
        }
    }

    /// Filespec dictionary referencing the embedded stream.
    pub fn build_filespec(&self, embedded_stream_ref: ObjectRef) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), ObjectSerializer::name("Filespec"));
        dict.insert("F".to_string(), ObjectSerializer::string(&self.name));
        dict.insert("UF".to_string(), Object::String(encode_utf16_be(&self.name)));

        if let Some(ref desc) = self.description {
            dict.insert("Desc".to_string(), ObjectSerializer::string(desc));
        }

        dict.insert(
            "EF".to_string(),
            Object::dict(vec![
                ("F", Object::Reference(embedded_stream_ref)),
                ("UF", Object::Reference(embedded_stream_ref)),
            ]),
        );

        if let Some(relationship) = self.af_relationship {
            dict.insert("AFRelationship".to_string(), ObjectSerializer::name(relationship.pdf_name()));
        }

        Object::Dictionary(dict)
    }
}

/// Insert `(name, filespec)` into a flat name-tree `/Names` array, keeping
/// keys sorted. An existing entry with the same name is replaced.
pub fn insert_into_names_array(existing: &[Object], name: &str, filespec: ObjectRef) -> Object {
    let mut pairs: Vec<(Vec<u8>, Object)> = existing
        .chunks(2)
        .filter_map(|pair| match pair {
            [Object::String(key), value] => Some((key.clone(), value.clone())),
            _ => None,
        })
        .filter(|(key, _)| key.as_slice() != name.as_bytes())
        .collect();
    pairs.push((name.as_bytes().to_vec(), Object::Reference(filespec)));
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    Object::Array(
        pairs
            .into_iter()
            .flat_map(|(key, value)| [Object::String(key), value])
            .collect(),
    )
}

fn md5_hash(data: &[u8]) -> Vec<u8> {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// UTF-16BE with BOM, the PDF text string encoding for non-ASCII names.
fn encode_utf16_be(s: &str) -> Vec<u8> {
    let mut result = vec![0xFE, 0xFF];
    for c in s.encode_utf16() {
        result.extend_from_slice(&c.to_be_bytes());
    }
    result
}
