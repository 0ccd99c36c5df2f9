//! Incremental update writer.
//!
//! Appends new and modified objects after the original bytes, followed by
//! a cross-reference section and trailer. The original bytes are never
//! touched, so earlier signatures stay valid.
//!
//! A chained update lists only the written objects and points `/Prev` at
//! the previous section. When the original table had to be reconstructed
//! there is nothing trustworthy to chain to, so the update carries a
//! complete table instead. The section is written as a classic `xref`
//! table, or as a cross-reference stream when the file already uses them
//! or when objects live in object streams.

use super::object_serializer::ObjectSerializer;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::xref::{CrossRefTable, XRefEntry, XRefEntryType, XRefFormat};
use std::collections::BTreeMap;
use std::io::Write;

/// Width of the third field of written xref stream rows.
const XREF_STREAM_FIELD3_WIDTH: usize = 2;

/// Result of an incremental save.
#[derive(Debug, Clone)]
pub struct IncrementalUpdate {
    /// Original bytes followed by the update section
    pub bytes: Vec<u8>,
    /// Absolute byte offset of each written object
    pub offsets: BTreeMap<u32, usize>,
}

/// Writer for one incremental update section.
#[derive(Debug)]
pub struct IncrementalWriter<'a> {
    original: &'a [u8],
    trailer: &'a Dict,
    prev_xref: Option<u64>,
    base: Option<&'a CrossRefTable>,
    format: XRefFormat,
    size: u32,
}

impl<'a> IncrementalWriter<'a> {
    /// Create a writer appending to `original`, whose newest trailer is
    /// `trailer` and whose newest xref section starts at `prev_xref`.
    pub fn new(original: &'a [u8], trailer: &'a Dict, prev_xref: u64) -> Self {
        let size = trailer
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        Self {
            original,
            trailer,
            prev_xref: Some(prev_xref),
            base: None,
            format: XRefFormat::Table,
            size,
        }
    }

    /// Write a complete table built from `table` plus the written objects,
    /// without `/Prev`. Used for files whose table was reconstructed.
    pub fn with_complete_table(mut self, table: &'a CrossRefTable) -> Self {
        self.prev_xref = None;
        self.base = Some(table);
        self.size = self.size.max(table.max_object_number() + 1);
        self
    }

    /// Syntax of the written section. Object stream entries force
    /// [`XRefFormat::Stream`] regardless.
    pub fn with_format(mut self, format: XRefFormat) -> Self {
        self.format = format;
        self
    }

    /// Override the trailer `/Size` (one past the highest object number).
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = self.size.max(size);
        self
    }

    /// Write `objects` (generation 0) as one update section.
    pub fn write(&self, objects: &BTreeMap<u32, Object>) -> Result<IncrementalUpdate> {
        if objects.is_empty() {
            return Err(Error::InvalidPdf("incremental update without objects".to_string()));
        }

        let serializer = ObjectSerializer::compact();
        let mut output = Vec::with_capacity(self.original.len() + 4096);
        output.extend_from_slice(self.original);
        if !output.ends_with(b"\n") && !output.ends_with(b"\r") {
            output.push(b'\n');
        }
        let update_start = output.len();

        let mut offsets = BTreeMap::new();
        for (&id, object) in objects {
            offsets.insert(id, output.len());
            output.extend_from_slice(&serializer.serialize_indirect(id, 0, object));
        }
        let file_id = self.file_id(&output[update_start..]);

        let max_id = objects.keys().next_back().copied().unwrap_or(0);
        let mut size = self.size.max(max_id + 1);
        let mut rows: BTreeMap<u32, XRefEntry> = offsets
            .iter()
            .map(|(&id, &offset)| (id, XRefEntry::uncompressed(offset as u64, 0)))
            .collect();
        if let Some(base) = self.base {
            for (num, entry) in base.iter() {
                if entry.in_use && num != 0 {
                    rows.entry(num).or_insert(*entry);
                }
            }
        }

        let use_stream = self.format == XRefFormat::Stream
            || rows.values().any(|e| e.entry_type == XRefEntryType::Compressed);

        let mut trailer = Dict::new();
        if let Some(prev) = self.prev_xref {
            trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        }
        for key in ["Root", "Info"] {
            if let Some(value) = self.trailer.get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        trailer.insert("ID".to_string(), file_id);

        let xref_offset = output.len();
        if use_stream {
            // The stream is an object too and takes the next free number
            let stream_id = size;
            size += 1;
            rows.insert(stream_id, XRefEntry::uncompressed(xref_offset as u64, 0));
            if self.base.is_some() {
                self.add_free_list(&mut rows, size);
            }
            trailer.insert("Size".to_string(), Object::Integer(size as i64));
            let stream = xref_stream(&rows, trailer);
            output.extend_from_slice(&serializer.serialize_indirect(stream_id, 0, &stream));
        } else {
            if self.base.is_some() {
                self.add_free_list(&mut rows, size);
            }
            trailer.insert("Size".to_string(), Object::Integer(size as i64));
            writeln!(output, "xref")?;
            for (first, run) in runs(&rows) {
                writeln!(output, "{} {}", first, run.len())?;
                for entry in run {
                    let kind = if entry.in_use { 'n' } else { 'f' };
                    writeln!(output, "{:010} {:05} {} ", entry.offset, entry.generation, kind)?;
                }
            }
            writeln!(output, "trailer")?;
            output.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
            writeln!(output)?;
        }

        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_offset)?;
        writeln!(output, "%%EOF")?;

        log::debug!(
            "Wrote incremental update: {} objects, {} xref rows ({}), {} bytes appended",
            offsets.len(),
            rows.len(),
            if use_stream { "stream" } else { "table" },
            output.len() - self.original.len()
        );

        Ok(IncrementalUpdate {
            bytes: output,
            offsets,
        })
    }

    /// Fill every unused number below `size` with a free entry, linked
    /// from object 0 in ascending order.
    fn add_free_list(&self, rows: &mut BTreeMap<u32, XRefEntry>, size: u32) {
        let free: Vec<u32> = (0..size).filter(|n| !rows.contains_key(n)).collect();
        for (i, &num) in free.iter().enumerate() {
            let next = free.get(i + 1).copied().unwrap_or(0);
            let generation = match num {
                0 => 65535,
                _ => self
                    .base
                    .and_then(|b| b.get(num))
                    .filter(|e| !e.in_use)
                    .map_or(0, |e| e.generation),
            };
            rows.insert(num, XRefEntry::free(next as u64, generation));
        }
    }

    /// Keep the permanent first identifier; the second one changes with
    /// every revision.
    fn file_id(&self, update: &[u8]) -> Object {
        use md5::{Digest, Md5};

        let changing = Object::String(Md5::digest(update).to_vec());
        let permanent = self
            .trailer
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first())
            .filter(|id| id.as_string().is_some())
            .cloned()
            .unwrap_or_else(|| changing.clone());
        Object::Array(vec![permanent, changing])
    }
}

/// Consecutive object numbers grouped into subsections.
fn runs(rows: &BTreeMap<u32, XRefEntry>) -> Vec<(u32, Vec<&XRefEntry>)> {
    let mut runs: Vec<(u32, Vec<&XRefEntry>)> = Vec::new();
    for (&num, entry) in rows {
        match runs.last_mut() {
            Some((first, run)) if *first + run.len() as u32 == num => run.push(entry),
            _ => runs.push((num, vec![entry])),
        }
    }
    runs
}

/// Uncompressed `/Type /XRef` stream with `/W [1 n 2]`.
pub(super) fn xref_stream(rows: &BTreeMap<u32, XRefEntry>, mut dict: Dict) -> Object {
    let max_field2 = rows.values().map(|e| e.offset).max().unwrap_or(0);
    let width = (1..=8).find(|&w| w == 8 || max_field2 >> (8 * w) == 0).unwrap_or(8);

    let mut data = Vec::with_capacity(rows.len() * (1 + width + XREF_STREAM_FIELD3_WIDTH));
    let mut index = Vec::new();
    for (first, run) in runs(rows) {
        index.push(Object::Integer(first as i64));
        index.push(Object::Integer(run.len() as i64));
        for entry in run {
            let kind: u8 = match entry.entry_type {
                XRefEntryType::Free => 0,
                XRefEntryType::Uncompressed => 1,
                XRefEntryType::Compressed => 2,
            };
            data.push(kind);
            data.extend_from_slice(&entry.offset.to_be_bytes()[8 - width..]);
            data.extend_from_slice(&entry.generation.to_be_bytes());
        }
    }

    dict.insert("Type".to_string(), Object::name("XRef"));
    dict.insert(
        "W".to_string(),
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(width as i64),
            Object::Integer(XREF_STREAM_FIELD3_WIDTH as i64),
        ]),
    );
    dict.insert("Index".to_string(), Object::Array(index));
    Object::Stream {
        dict,
        data: data.into(),
    }
}
