//! PDF document model.
//!
//! [`PdfDocument`] holds the original file bytes, the merged cross-reference
//! table and every object changed since loading. Nothing is ever rewritten
//! in place: [`PdfDocument::to_bytes`] appends one incremental update, and
//! reserving a signature placeholder seals the document so the signed
//! bytes cannot drift.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::parser::parse_indirect_object;
use crate::signatures::{
    ByteRangeCalculator, DocMdpManager, DocMdpPermission, PlaceholderHandle, PreparedSignature,
    SignableDocument, SignableRegion, SignatureMetadata,
};
use crate::writer::{insert_into_names_array, EmbeddedFile, IncrementalWriter, ObjectSerializer};
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntryType};
use crate::xref_reconstruction::reconstruct_xref;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Maximum recursion depth for object resolution
const MAX_RECURSION_DEPTH: u32 = 100;

/// Depth to which `/Perms` is resolved: Perms, DocMDP, Reference, SigRef,
/// TransformParams.
const PERMS_RESOLVE_DEPTH: u32 = 8;

/// Invisible-widget annotation flags: Print | Locked.
const SIGNATURE_WIDGET_FLAGS: i64 = 132;

/// AcroForm `/SigFlags`: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// PDF document.
///
/// # Example
///
/// ```no_run
/// use pdf_extsign::document::PdfDocument;
///
/// let doc = PdfDocument::open("sample.pdf")?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// println!("Signatures: {}", doc.signature_dictionaries()?.len());
/// # Ok::<(), pdf_extsign::Error>(())
/// ```
#[derive(Clone)]
pub struct PdfDocument {
    /// Original file bytes
    data: Vec<u8>,
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Cross-reference table mapping object IDs to byte offsets
    xref: CrossRefTable,
    /// Newest trailer dictionary
    trailer: Dict,
    /// Offset of the newest xref section; `None` after reconstruction
    xref_offset: Option<u64>,
    /// New and changed objects, written by the next update
    modified: BTreeMap<u32, Object>,
    /// Next free object number
    next_id: u32,
    /// Certification requested for the pending signature
    certification: Option<DocMdpPermission>,
    /// Serialized bytes with the signature placeholder, once reserved
    prepared: Option<Vec<u8>>,
    /// Whether `prepared` carries the signature container
    signed: bool,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("modified_objects", &self.modified.len())
            .field("sealed", &self.is_sealed())
            .field("signed", &self.signed)
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF document from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The PDF header is invalid
    /// - Neither the cross-reference table nor a reconstruction yields a
    ///   trailer with `/Root`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Load a PDF document from memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;

        let (xref, xref_offset) = match Self::try_open_regular(&data) {
            Ok((xref, offset)) => (xref, Some(offset)),
            Err(e) => {
                log::warn!("Regular xref parsing failed: {}, attempting reconstruction", e);
                match reconstruct_xref(&data) {
                    Ok(xref) => {
                        log::info!("Reconstructed xref table with {} entries", xref.len());
                        (xref, None)
                    },
                    Err(recon_err) => {
                        log::error!("XRef reconstruction also failed: {}", recon_err);
                        return Err(e);
                    },
                }
            },
        };

        let trailer = xref.trailer().cloned().ok_or(Error::InvalidXref)?;
        if trailer.get("Encrypt").is_some() {
            return Err(Error::Unsupported("encrypted documents".to_string()));
        }

        let declared_size = trailer
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        let next_id = declared_size.max(xref.max_object_number() + 1);

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            xref_offset,
            modified: BTreeMap::new(),
            next_id,
            certification: None,
            prepared: None,
            signed: false,
        })
    }

    /// Try to open the PDF using regular xref parsing.
    fn try_open_regular(data: &[u8]) -> Result<(CrossRefTable, u64)> {
        let offset = find_xref_offset(data)?;
        let xref = parse_xref(data, offset)?;
        match xref.trailer() {
            Some(trailer) if trailer.contains_key("Root") && !xref.is_empty() => Ok((xref, offset)),
            _ => Err(Error::InvalidPdf("trailer without /Root".to_string())),
        }
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Newest trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Original bytes as loaded.
    pub fn original_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether a signature placeholder has been reserved.
    pub fn is_sealed(&self) -> bool {
        self.prepared.is_some()
    }

    /// Whether objects were changed since loading.
    pub fn has_pending_changes(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Load an indirect object, preferring pending changes.
    pub fn load_object(&self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(obj) = self.modified.get(&obj_ref.id) {
            return Ok(obj.clone());
        }

        let entry = self
            .xref
            .get(obj_ref.id)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
        if !entry.in_use {
            // A reference to a free object is the null object
            return Ok(Object::Null);
        }

        if entry.entry_type == XRefEntryType::Compressed {
            return self.load_compressed(obj_ref.id, entry.offset, entry.generation);
        }
        self.parse_at(obj_ref.id, entry.offset)
    }

    /// Parse the indirect object `id` written at `offset`.
    fn parse_at(&self, id: u32, offset: u64) -> Result<Object> {
        let offset = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
        let (found, object) = parse_indirect_object(&self.data, offset)?;
        if found.id != id {
            return Err(Error::ParseError {
                offset,
                reason: format!("expected object {} 0 R, found {}", id, found),
            });
        }
        Ok(object)
    }

    /// Object `id` stored at `index` in object stream `stream_id`. The
    /// stream itself must be an uncompressed object.
    fn load_compressed(&self, id: u32, stream_id: u64, index: u16) -> Result<Object> {
        let stream_id = u32::try_from(stream_id).map_err(|_| Error::InvalidXref)?;
        let stream_entry = self
            .xref
            .get(stream_id)
            .filter(|e| e.entry_type == XRefEntryType::Uncompressed)
            .ok_or_else(|| Error::InvalidPdf(format!("object stream {} is not a plain object", stream_id)))?;
        let stream = self.parse_at(stream_id, stream_entry.offset)?;
        ObjectStream::parse(&stream)?.object_at(index as usize, id)
    }

    /// Follow a chain of references to a direct object.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..MAX_RECURSION_DEPTH {
            match current {
                Object::Reference(r) => current = self.load_object(r)?,
                other => return Ok(other),
            }
        }
        Err(Error::RecursionLimitExceeded(MAX_RECURSION_DEPTH))
    }

    /// Resolve references inside `obj` down to `max_depth` levels.
    ///
    /// References deeper than `max_depth`, or back to an object already on
    /// the resolution path, are left in place.
    pub fn resolve_references(&self, obj: &Object, max_depth: u32) -> Result<Object> {
        let mut path = HashSet::new();
        self.resolve_nested(obj, max_depth, &mut path)
    }

    fn resolve_nested(&self, obj: &Object, depth: u32, path: &mut HashSet<ObjectRef>) -> Result<Object> {
        if depth == 0 {
            return Ok(obj.clone());
        }
        match obj {
            Object::Reference(r) => {
                if !path.insert(*r) {
                    return Ok(obj.clone());
                }
                let loaded = self.load_object(*r)?;
                let resolved = self.resolve_nested(&loaded, depth - 1, path);
                path.remove(r);
                resolved
            },
            Object::Array(items) => Ok(Object::Array(
                items
                    .iter()
                    .map(|item| self.resolve_nested(item, depth - 1, path))
                    .collect::<Result<_>>()?,
            )),
            Object::Dictionary(dict) => {
                let mut resolved = Dict::with_capacity(dict.len());
                for (key, value) in dict {
                    resolved.insert(key.clone(), self.resolve_nested(value, depth - 1, path)?);
                }
                Ok(Object::Dictionary(resolved))
            },
            other => Ok(other.clone()),
        }
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .ok_or_else(|| Error::InvalidPdf("Trailer missing /Root entry".to_string()))?
            .as_reference()
            .ok_or_else(|| Error::InvalidPdf("/Root is not a reference".to_string()))
    }

    /// Get the document catalog.
    pub fn catalog(&self) -> Result<Object> {
        let catalog = self.load_object(self.catalog_ref()?)?;
        if catalog.as_dict().is_none() {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: catalog.type_name().to_string(),
            });
        }
        Ok(catalog)
    }

    /// Reference to the first leaf of the page tree.
    pub fn first_page_ref(&self) -> Result<ObjectRef> {
        let mut node_ref = self
            .catalog()?
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("Catalog missing /Pages reference".to_string()))?;

        for _ in 0..MAX_RECURSION_DEPTH {
            let node = self.load_object(node_ref)?;
            let kids = match node.get("Kids") {
                Some(kids) => self.resolve(kids)?,
                None => return Ok(node_ref),
            };
            if node.get("Type").and_then(Object::as_name) == Some("Page") {
                return Ok(node_ref);
            }
            node_ref = kids
                .as_array()
                .and_then(|k| k.first())
                .and_then(Object::as_reference)
                .ok_or_else(|| Error::InvalidPdf("Document has no pages".to_string()))?;
        }
        Err(Error::RecursionLimitExceeded(MAX_RECURSION_DEPTH))
    }

    /// Signature dictionaries (`/V` of signature fields) in AcroForm order.
    pub fn signature_dictionaries(&self) -> Result<Vec<Object>> {
        let catalog = self.catalog()?;
        let Some(acro_form) = catalog.get("AcroForm") else {
            return Ok(Vec::new());
        };
        let acro_form = self.resolve(acro_form)?;
        let fields = match acro_form.get("Fields") {
            Some(fields) => self.resolve(fields)?,
            None => return Ok(Vec::new()),
        };

        let mut signatures = Vec::new();
        let mut stack: Vec<(Object, u32)> = fields
            .as_array()
            .map(|f| f.iter().rev().map(|o| (o.clone(), 0)).collect())
            .unwrap_or_default();
        while let Some((field, depth)) = stack.pop() {
            if depth > MAX_RECURSION_DEPTH {
                return Err(Error::RecursionLimitExceeded(MAX_RECURSION_DEPTH));
            }
            let field = self.resolve(&field)?;
            if field.get("FT").and_then(Object::as_name) == Some("Sig") {
                if let Some(value) = field.get("V") {
                    let value = self.resolve(value)?;
                    if value.as_dict().is_some() {
                        signatures.push(value);
                    }
                }
            }
            if let Some(kids) = field.get("Kids") {
                if let Some(kids) = self.resolve(kids)?.as_array() {
                    stack.extend(kids.iter().rev().map(|k| (k.clone(), depth + 1)));
                }
            }
        }
        Ok(signatures)
    }

    /// Attach `file` to the document (catalog `/Names /EmbeddedFiles` and
    /// `/AF`). Only possible before a signature is reserved.
    pub fn embed_file(&mut self, file: EmbeddedFile) -> Result<ObjectRef> {
        self.ensure_unsealed()?;

        let catalog_ref = self.catalog_ref()?;
        let mut catalog = self.catalog()?;

        let names = match catalog.get("Names") {
            Some(names) => self.resolve(names)?,
            None => Object::Dictionary(Dict::new()),
        };
        let tree = match names.get("EmbeddedFiles") {
            Some(tree) => self.resolve(tree)?,
            None => Object::Dictionary(Dict::new()),
        };
        if tree.get("Kids").is_some() {
            return Err(Error::Unsupported("EmbeddedFiles name tree with /Kids".to_string()));
        }
        let existing = match tree.get("Names") {
            Some(array) => self.resolve(array)?.as_array().cloned().unwrap_or_default(),
            None => Vec::new(),
        };

        let stream_ref = self.allocate();
        let filespec_ref = self.allocate();
        let tree = Object::dict(vec![("Names", insert_into_names_array(&existing, &file.name, filespec_ref))]);
        let mut names = names;
        dict_mut(&mut names)?.insert("EmbeddedFiles".to_string(), tree);

        let mut af = match catalog.get("AF") {
            Some(af) => self.resolve(af)?.as_array().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        af.push(Object::Reference(filespec_ref));

        let catalog_dict = dict_mut(&mut catalog)?;
        catalog_dict.insert("Names".to_string(), names);
        catalog_dict.insert("AF".to_string(), Object::Array(af));

        self.modified.insert(stream_ref.id, file.build_stream());
        self.modified.insert(filespec_ref.id, file.build_filespec(stream_ref));
        self.modified.insert(catalog_ref.id, catalog);

        log::info!("Embedded '{}' ({} bytes) as {}", file.name, file.size(), filespec_ref);
        Ok(filespec_ref)
    }

    /// Current serialization: the original bytes, followed by one
    /// incremental update when objects changed. After a reservation this is
    /// the document with its placeholder, zero-filled until the signature
    /// container is inserted and the signed document afterwards.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Some(prepared) = &self.prepared {
            return Ok(prepared.clone());
        }
        if self.modified.is_empty() {
            return Ok(self.data.clone());
        }
        Ok(self.incremental_writer().write(&self.modified)?.bytes)
    }

    /// Write [`to_bytes`](Self::to_bytes) to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)?;
        Ok(())
    }

    /// Updates use the syntax of the newest section. A reconstructed
    /// table has no section to chain to, so the update repeats all of it.
    fn incremental_writer(&self) -> IncrementalWriter<'_> {
        let writer = IncrementalWriter::new(&self.data, &self.trailer, self.xref_offset.unwrap_or(0))
            .with_size(self.next_id)
            .with_format(self.xref.format());
        match self.xref_offset {
            Some(_) => writer,
            None => writer.with_complete_table(&self.xref),
        }
    }

    fn allocate(&mut self) -> ObjectRef {
        let id = self.next_id;
        self.next_id += 1;
        ObjectRef::new(id, 0)
    }

    fn ensure_unsealed(&self) -> Result<()> {
        if self.is_sealed() {
            return Err(Error::DocumentSealed);
        }
        Ok(())
    }

    /// Take a dictionary that lives either inline in `owner[key]` or in an
    /// indirect object. Returns the dictionary and, when indirect, its
    /// reference.
    fn take_dict(&self, owner: &Object, key: &str) -> Result<(Object, Option<ObjectRef>)> {
        match owner.get(key) {
            Some(Object::Reference(r)) => Ok((self.resolve(&Object::Reference(*r))?, Some(*r))),
            Some(inline @ Object::Dictionary(_)) => Ok((inline.clone(), None)),
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
            None => Ok((Object::Dictionary(Dict::new()), None)),
        }
    }

    fn field_names(&self, fields: &[Object]) -> HashSet<Vec<u8>> {
        fields
            .iter()
            .filter_map(|f| self.resolve(f).ok())
            .filter_map(|f| f.get("T").and_then(Object::as_string).map(<[u8]>::to_vec))
            .collect()
    }
}

impl SignableDocument for PdfDocument {
    fn permission_dictionary(&self) -> Result<Option<Object>> {
        match self.catalog()?.get("Perms") {
            Some(perms) => Ok(Some(self.resolve_references(perms, PERMS_RESOLVE_DEPTH)?)),
            None => Ok(None),
        }
    }

    fn write_permission_dictionary(&mut self, level: DocMdpPermission) -> Result<()> {
        self.ensure_unsealed()?;
        if let Some(existing) = self.certification {
            return Err(Error::AlreadyCertified {
                level: existing.level(),
            });
        }
        if !level.is_certified() {
            return Err(Error::InvalidPermissionLevel(level.level()));
        }
        self.certification = Some(level);
        Ok(())
    }

    fn reserve_signature_placeholder(
        &mut self,
        metadata: &SignatureMetadata,
        reservation: usize,
    ) -> Result<PreparedSignature> {
        self.ensure_unsealed()?;
        if reservation == 0 {
            return Err(Error::InvalidConfig("signature reservation must be positive".to_string()));
        }

        let catalog_ref = self.catalog_ref()?;
        let mut catalog = self.catalog()?;
        let page_ref = self.first_page_ref()?;
        let mut page = self.load_object(page_ref)?;

        let sig_ref = self.allocate();
        let widget_ref = self.allocate();
        let calculator = ByteRangeCalculator::new(reservation);

        // Signature dictionary
        let mut sig = Dict::new();
        sig.insert("Type".to_string(), Object::name("Sig"));
        sig.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
        sig.insert("SubFilter".to_string(), Object::name(metadata.sub_filter.as_pdf_name()));
        sig.insert("M".to_string(), ObjectSerializer::date(&metadata.signing_time));
        for (key, value) in [
            ("Name", &metadata.name),
            ("Reason", &metadata.reason),
            ("Location", &metadata.location),
            ("ContactInfo", &metadata.contact_info),
        ] {
            if let Some(value) = value {
                sig.insert(key.to_string(), Object::text(value));
            }
        }
        sig.insert("ByteRange".to_string(), ByteRangeCalculator::byte_range_placeholder());
        sig.insert("Contents".to_string(), calculator.contents_placeholder());
        if let Some(level) = self.certification {
            sig.insert("Reference".to_string(), DocMdpManager::reference_array(level));
        }

        // AcroForm and the field list
        let (mut acro_form, acro_form_ref) = self.take_dict(&catalog, "AcroForm")?;
        let fields = match acro_form.get("Fields") {
            Some(fields) => self.resolve(fields)?.as_array().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        let taken = self.field_names(&fields);
        let field_name = (1..)
            .map(|n| format!("Signature{}", n))
            .find(|name| !taken.contains(name.as_bytes()))
            .unwrap_or_else(|| format!("Signature{}", sig_ref.id));

        // Invisible merged field/widget
        let widget = Object::dict(vec![
            ("Type", Object::name("Annot")),
            ("Subtype", Object::name("Widget")),
            ("FT", Object::name("Sig")),
            ("T", Object::text(&field_name)),
            ("V", Object::Reference(sig_ref)),
            ("Rect", ObjectSerializer::rect(0.0, 0.0, 0.0, 0.0)),
            ("F", Object::Integer(SIGNATURE_WIDGET_FLAGS)),
            ("P", Object::Reference(page_ref)),
        ]);

        let mut fields = fields;
        fields.push(Object::Reference(widget_ref));
        let form = dict_mut(&mut acro_form)?;
        form.insert("Fields".to_string(), Object::Array(fields));
        form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));

        let mut annots = match page.get("Annots") {
            Some(annots) => self.resolve(annots)?.as_array().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        annots.push(Object::Reference(widget_ref));
        dict_mut(&mut page)?.insert("Annots".to_string(), Object::Array(annots));

        if let Some(form_ref) = acro_form_ref {
            self.modified.insert(form_ref.id, acro_form);
        } else {
            dict_mut(&mut catalog)?.insert("AcroForm".to_string(), acro_form);
        }

        if self.certification.is_some() {
            let (mut perms, perms_ref) = self.take_dict(&catalog, "Perms")?;
            dict_mut(&mut perms)?.insert("DocMDP".to_string(), Object::Reference(sig_ref));
            match perms_ref {
                Some(r) => {
                    self.modified.insert(r.id, perms);
                },
                None => {
                    dict_mut(&mut catalog)?.insert("Perms".to_string(), perms);
                },
            }
        }

        self.modified.insert(sig_ref.id, Object::Dictionary(sig));
        self.modified.insert(widget_ref.id, widget);
        self.modified.insert(page_ref.id, page);
        self.modified.insert(catalog_ref.id, catalog);

        let update = self.incremental_writer().write(&self.modified)?;
        let mut bytes = update.bytes;

        let sig_start = update
            .offsets
            .get(&sig_ref.id)
            .copied()
            .ok_or_else(|| Error::InvalidPdf("signature object was not written".to_string()))?;
        let sig_end = bytes[sig_start..]
            .windows(b"endobj".len())
            .position(|w| w == b"endobj")
            .map(|p| sig_start + p)
            .ok_or_else(|| Error::InvalidPdf("signature object is not terminated".to_string()))?;

        let contents_offset = ByteRangeCalculator::find_contents_offset(&bytes, sig_start, sig_end)
            .ok_or_else(|| Error::InvalidPdf("/Contents placeholder not found".to_string()))?;
        let byte_range_offset = ByteRangeCalculator::find_byte_range_offset(&bytes, sig_start, sig_end)
            .ok_or_else(|| Error::InvalidPdf("/ByteRange placeholder not found".to_string()))?;

        let byte_range = calculator.calculate_byte_range(bytes.len(), contents_offset);
        ByteRangeCalculator::patch_byte_range(&mut bytes, byte_range_offset, &byte_range)?;
        let signed = ByteRangeCalculator::extract_signed_bytes(&bytes, &byte_range)?;

        log::info!(
            "Reserved {} byte signature placeholder in field '{}' ({}), ByteRange {}",
            reservation,
            field_name,
            sig_ref,
            ByteRangeCalculator::format_byte_range(&byte_range)
        );

        self.prepared = Some(bytes);
        Ok(PreparedSignature {
            region: SignableRegion {
                byte_range,
                bytes: signed,
            },
            handle: PlaceholderHandle {
                contents_offset,
                reserved: reservation,
            },
        })
    }

    fn fill_placeholder(&mut self, handle: &PlaceholderHandle, container: &[u8]) -> Result<Vec<u8>> {
        if self.signed {
            return Err(Error::PlaceholderFilled);
        }
        let bytes = self
            .prepared
            .as_mut()
            .ok_or_else(|| Error::InvalidPdf("no signature placeholder reserved".to_string()))?;
        ByteRangeCalculator::new(handle.reserved).insert_signature(bytes, handle.contents_offset, container)?;
        self.signed = true;
        Ok(bytes.clone())
    }
}

fn dict_mut(obj: &mut Object) -> Result<&mut Dict> {
    let found = obj.type_name();
    obj.as_dict_mut().ok_or_else(|| Error::InvalidObjectType {
        expected: "Dictionary".to_string(),
        found: found.to_string(),
    })
}

/// Parse the `%PDF-M.m` header at the start of `data`.
///
/// # Example
///
/// ```
/// use pdf_extsign::document::parse_header;
///
/// assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (1, 7));
/// ```
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let header = data
        .get(..8)
        .ok_or_else(|| Error::InvalidHeader("File too short to contain PDF header".to_string()))?;

    if &header[0..5] != b"%PDF-" {
        return Err(Error::InvalidHeader(String::from_utf8_lossy(&header[0..5]).to_string()));
    }

    let (major, minor) = (header[5], header[7]);
    if header[6] != b'.' || !major.is_ascii_digit() || !minor.is_ascii_digit() {
        return Err(Error::InvalidHeader(String::from_utf8_lossy(header).to_string()));
    }

    Ok((major - b'0', minor - b'0'))
}
