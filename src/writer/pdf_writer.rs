//! Fresh PDF document writer.
//!
//! Assembles a complete single-revision PDF: header, body, cross-reference
//! section and trailer. Used to produce documents for signing. The body is
//! written either as plain indirect objects with a classic `xref` table,
//! or PDF 1.5 style with dictionaries packed into a compressed object
//! stream and located through a cross-reference stream.

use super::incremental::xref_stream;
use super::object_serializer::ObjectSerializer;
use crate::error::Result;
use crate::object::{Dict, Object, ObjectRef};
use crate::xref::XRefEntry;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::Write;

/// Header version of generated files.
const PDF_VERSION: &str = "1.7";

struct PageData {
    width: f64,
    height: f64,
    content: Vec<u8>,
}

/// PDF document writer.
#[derive(Default)]
pub struct PdfWriter {
    pages: Vec<PageData>,
    object_streams: bool,
}

impl PdfWriter {
    /// Create a new PDF writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack every non-stream object into one object stream and write a
    /// cross-reference stream instead of a classic table.
    pub fn use_object_streams(&mut self, enable: bool) -> &mut Self {
        self.object_streams = enable;
        self
    }

    /// Add a page with the given dimensions and a raw content stream.
    pub fn add_page(&mut self, width: f64, height: f64, content: impl Into<Vec<u8>>) -> &mut Self {
        self.pages.push(PageData {
            width,
            height,
            content: content.into(),
        });
        self
    }

    /// Add a US Letter page showing one line of Helvetica text.
    pub fn add_text_page(&mut self, text: &str) -> &mut Self {
        let escaped = text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escaped);
        self.add_page(612.0, 792.0, content)
    }

    /// Build the complete PDF document.
    pub fn finish(&self) -> Result<Vec<u8>> {
        let (objects, next_id) = self.build_objects();

        let mut output = Vec::new();
        writeln!(output, "%PDF-{}", PDF_VERSION)?;
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        if self.object_streams {
            self.write_packed(&mut output, objects, next_id)?;
        } else {
            self.write_plain(&mut output, objects, next_id)?;
        }
        Ok(output)
    }

    /// Catalog is 1, page tree 2, font 3, then page/content pairs and the
    /// info dictionary. Returns the objects and the next free number.
    fn build_objects(&self) -> (Vec<(u32, Object)>, u32) {
        let pages_id = 2;
        let font_id = 3;
        let mut next_id = 4;
        let mut objects: Vec<(u32, Object)> = Vec::new();

        objects.push((
            font_id,
            Object::dict(vec![
                ("Type", ObjectSerializer::name("Font")),
                ("Subtype", ObjectSerializer::name("Type1")),
                ("BaseFont", ObjectSerializer::name("Helvetica")),
                ("Encoding", ObjectSerializer::name("WinAnsiEncoding")),
            ]),
        ));

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let page_id = next_id;
            let content_id = next_id + 1;
            next_id += 2;

            objects.push((
                page_id,
                Object::dict(vec![
                    ("Type", ObjectSerializer::name("Page")),
                    ("Parent", ObjectSerializer::reference(pages_id, 0)),
                    ("MediaBox", ObjectSerializer::rect(0.0, 0.0, page.width, page.height)),
                    ("Contents", ObjectSerializer::reference(content_id, 0)),
                    (
                        "Resources",
                        Object::dict(vec![(
                            "Font",
                            Object::dict(vec![("F1", ObjectSerializer::reference(font_id, 0))]),
                        )]),
                    ),
                ]),
            ));
            objects.push((
                content_id,
                Object::Stream {
                    dict: Default::default(),
                    data: bytes::Bytes::from(page.content.clone()),
                },
            ));
            kids.push(Object::Reference(ObjectRef::new(page_id, 0)));
        }

        objects.push((
            pages_id,
            Object::dict(vec![
                ("Type", ObjectSerializer::name("Pages")),
                ("Count", ObjectSerializer::integer(self.pages.len() as i64)),
                ("Kids", Object::Array(kids)),
            ]),
        ));
        objects.push((
            1,
            Object::dict(vec![
                ("Type", ObjectSerializer::name("Catalog")),
                ("Pages", ObjectSerializer::reference(pages_id, 0)),
            ]),
        ));
        objects.push((
            next_id,
            Object::dict(vec![("Creator", ObjectSerializer::string(crate::NAME))]),
        ));
        next_id += 1;

        objects.sort_by_key(|(id, _)| *id);
        (objects, next_id)
    }

    /// Trailer entries shared by both layouts.
    fn trailer(&self, size: u32, info_id: u32, body: &[u8]) -> Dict {
        // File identifier: hash of the body written so far
        let id = {
            use md5::{Digest, Md5};
            Md5::digest(body).to_vec()
        };
        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), ObjectSerializer::integer(size as i64));
        trailer.insert("Root".to_string(), ObjectSerializer::reference(1, 0));
        trailer.insert("Info".to_string(), ObjectSerializer::reference(info_id, 0));
        trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(id.clone()), Object::String(id)]),
        );
        trailer
    }

    fn write_plain(&self, output: &mut Vec<u8>, objects: Vec<(u32, Object)>, next_id: u32) -> Result<()> {
        let serializer = ObjectSerializer::compact();
        let mut offsets = Vec::with_capacity(objects.len());
        for (id, object) in &objects {
            offsets.push(output.len());
            output.extend_from_slice(&serializer.serialize_indirect(*id, 0, object));
        }
        let trailer = self.trailer(next_id, next_id - 1, output);

        let xref_start = output.len();
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", next_id)?;
        output.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            writeln!(output, "{:010} 00000 n ", offset)?;
        }

        writeln!(output, "trailer")?;
        output.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
        writeln!(output)?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;
        Ok(())
    }

    fn write_packed(&self, output: &mut Vec<u8>, objects: Vec<(u32, Object)>, next_id: u32) -> Result<()> {
        let serializer = ObjectSerializer::compact();
        let info_id = next_id - 1;
        let objstm_id = next_id;
        let xref_id = next_id + 1;
        let size = next_id + 2;

        let mut rows = BTreeMap::new();
        rows.insert(0, XRefEntry::free(0, 65535));

        // Streams cannot live in object streams
        let (streams, packed): (Vec<_>, Vec<_>) =
            objects.into_iter().partition(|(_, obj)| matches!(obj, Object::Stream { .. }));
        for (id, object) in &streams {
            rows.insert(*id, XRefEntry::uncompressed(output.len() as u64, 0));
            output.extend_from_slice(&serializer.serialize_indirect(*id, 0, object));
        }

        let mut header = Vec::new();
        let mut body = Vec::new();
        for (index, (id, object)) in packed.iter().enumerate() {
            write!(header, "{} {} ", id, body.len())?;
            body.extend_from_slice(&serializer.serialize(object));
            body.push(b'\n');
            rows.insert(*id, XRefEntry::compressed(objstm_id as u64, index as u16));
        }
        let first = header.len();
        header.extend_from_slice(&body);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&header)?;
        let objstm = Object::Stream {
            dict: [
                ("Type".to_string(), ObjectSerializer::name("ObjStm")),
                ("N".to_string(), ObjectSerializer::integer(packed.len() as i64)),
                ("First".to_string(), ObjectSerializer::integer(first as i64)),
                ("Filter".to_string(), ObjectSerializer::name("FlateDecode")),
            ]
            .into_iter()
            .collect(),
            data: encoder.finish()?.into(),
        };
        rows.insert(objstm_id, XRefEntry::uncompressed(output.len() as u64, 0));
        output.extend_from_slice(&serializer.serialize_indirect(objstm_id, 0, &objstm));

        let trailer = self.trailer(size, info_id, output);
        let xref_start = output.len();
        rows.insert(xref_id, XRefEntry::uncompressed(xref_start as u64, 0));
        output.extend_from_slice(&serializer.serialize_indirect(xref_id, 0, &xref_stream(&rows, trailer)));

        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;
        Ok(())
    }
}
