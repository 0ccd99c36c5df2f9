//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the file, or to a
//! slot in an object stream. Sections are parsed newest first following
//! `/Prev` links, so the newest entry for an object always wins. Both
//! classic `xref` tables (PDF 1.0-1.4) and cross-reference streams
//! (PDF 1.5+) are supported, including hybrid files whose classic trailer
//! points at a stream through `/XRefStm`.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::HashMap;

/// Maximum number of `/Prev` hops followed.
const MAX_PREV_CHAIN: u32 = 100;

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Object stored at a byte offset
    Uncompressed,
    /// Object stored inside an object stream
    Compressed,
}

/// Cross-reference table entry.
///
/// For compressed entries `offset` is the object number of the containing
/// object stream and `generation` the index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset, object stream number, or next free object number
    pub offset: u64,
    /// Generation number, or index within the object stream
    pub generation: u16,
    /// Whether the object is in use
    pub in_use: bool,
}

impl XRefEntry {
    /// Create a new in-use entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
            in_use: true,
        }
    }

    /// Create an entry for an object inside an object stream.
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
            in_use: true,
        }
    }

    /// Create a new free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
            in_use: false,
        }
    }
}

/// Syntax of the newest cross-reference section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum XRefFormat {
    /// Classic `xref` keyword table
    #[default]
    Table,
    /// `/Type /XRef` stream
    Stream,
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<Dict>,
    format: XRefFormat,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&Dict> {
        self.trailer.as_ref()
    }

    /// Syntax of the newest section.
    pub fn format(&self) -> XRefFormat {
        self.format
    }

    /// Add an entry to the cross-reference table.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// All entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(&num, entry)| (num, entry))
    }

    /// Highest object number present in the table.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Merge an older section: entries already present are kept.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (num, entry) in older.entries {
            self.entries.entry(num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }

    /// Merge the `/XRefStm` section of a hybrid file: its entries replace
    /// the free placeholders the classic table keeps for compressed objects.
    fn merge_hybrid(&mut self, stream: CrossRefTable) {
        for (num, entry) in stream.entries {
            match self.entries.get(&num) {
                Some(existing) if existing.in_use => {},
                _ => {
                    self.entries.insert(num, entry);
                },
            }
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the offset recorded after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let window_start = data.len().saturating_sub(2048);
    let tail = &data[window_start..];
    let keyword = b"startxref";

    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    match token(&tail[pos + keyword.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as u64),
        _ => Err(Error::InvalidXref),
    }
}

/// Parse the cross-reference chain starting at `offset`.
pub fn parse_xref(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut next = Some(offset);
    let mut hops = 0;

    while let Some(offset) = next {
        if hops > MAX_PREV_CHAIN {
            return Err(Error::InvalidPdf(format!(
                "xref /Prev chain longer than {}",
                MAX_PREV_CHAIN
            )));
        }

        let (section, format) = parse_section(data, offset)?;
        if hops == 0 {
            table.format = format;
        }
        hops += 1;

        next = section
            .trailer()
            .and_then(|t| t.get("Prev"))
            .and_then(Object::as_integer)
            .filter(|&prev| prev >= 0 && (prev as u64) != offset)
            .map(|prev| prev as u64);
        log::debug!(
            "Parsed {:?} xref section at {} with {} entries (prev: {:?})",
            format,
            offset,
            section.len(),
            next
        );
        table.merge_from(section);
    }

    Ok(table)
}

fn parse_section(data: &[u8], offset: u64) -> Result<(CrossRefTable, XRefFormat)> {
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    let section = data.get(start..).ok_or(Error::InvalidXref)?;
    let trimmed = crate::lexer::skip_ws(section);

    if !trimmed.starts_with(b"xref") {
        if trimmed.first().is_some_and(u8::is_ascii_digit) {
            let stream_start = start + (section.len() - trimmed.len());
            return Ok((parse_xref_stream(data, stream_start)?, XRefFormat::Stream));
        }
        return Err(Error::InvalidXref);
    }

    let body = &trimmed[4..];
    let trailer_pos = body
        .windows(7)
        .position(|w| w == b"trailer")
        .ok_or(Error::InvalidXref)?;

    let mut table = parse_entries(&body[..trailer_pos])?;

    let trailer = match parse_object(&body[trailer_pos + 7..]) {
        Ok((_, Object::Dictionary(trailer))) => trailer,
        _ => return Err(Error::InvalidXref),
    };

    let hybrid = trailer
        .get("XRefStm")
        .and_then(Object::as_integer)
        .and_then(|o| usize::try_from(o).ok());
    if let Some(stream_offset) = hybrid {
        match parse_xref_stream(data, stream_offset) {
            Ok(stream) => table.merge_hybrid(stream),
            Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stream_offset, e),
        }
    }

    table.set_trailer(trailer);
    Ok((table, XRefFormat::Table))
}

/// Subsections: a `first count` header followed by `count` 20-byte lines.
fn parse_entries(text: &[u8]) -> Result<CrossRefTable> {
    let text = String::from_utf8_lossy(text);
    let mut lines = text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('%'));
    let mut table = CrossRefTable::new();

    while let Some(header) = lines.next() {
        let mut parts = header.split_whitespace();
        let (first, count) = match (parts.next(), parts.next(), parts.next()) {
            (Some(first), Some(count), None) => (
                first.parse::<u32>().map_err(|_| Error::InvalidXref)?,
                count.parse::<u32>().map_err(|_| Error::InvalidXref)?,
            ),
            _ => return Err(Error::InvalidXref),
        };
        if count > 1_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }

        for i in 0..count {
            let line = lines.next().ok_or(Error::InvalidXref)?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                log::warn!("Malformed xref entry {:?}, treating as free", line);
                table.add_entry(first + i, XRefEntry::free(0, 65535));
                continue;
            }
            let offset: u64 = fields[0].parse().map_err(|_| Error::InvalidXref)?;
            let generation: u16 = fields[1].parse().map_err(|_| Error::InvalidXref)?;
            let entry = if fields[2].eq_ignore_ascii_case("n") {
                XRefEntry::uncompressed(offset, generation)
            } else {
                XRefEntry::free(offset, generation)
            };
            table.add_entry(first + i, entry);
        }
    }

    Ok(table)
}

/// Parse a cross-reference stream (ISO 32000-1, 7.5.8).
///
/// The stream dictionary contains:
/// - `/W [w1 w2 w3]` - field widths in bytes
/// - `/Size` - one past the highest object number
/// - `/Index [start1 count1 ...]` - subsection ranges, default `[0 Size]`
///
/// Field 1 is the type (0 free, 1 uncompressed, 2 compressed; 1 when
/// `w1` is 0), field 2 the offset or object stream number, field 3 the
/// generation or index within the object stream.
fn parse_xref_stream(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let (_, object) = parse_indirect_object(data, offset)?;
    let dict = match &object {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("xref stream is not a stream object".to_string())),
    };

    if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
        if kind != "XRef" {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got /Type /{}", kind)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| Error::InvalidPdf("missing /W array in xref stream".to_string()))?
        .iter()
        .map(|w| w.as_integer().and_then(|w| usize::try_from(w).ok()).filter(|&w| w <= 8))
        .collect::<Option<_>>()
        .ok_or_else(|| Error::InvalidPdf("invalid /W entry in xref stream".to_string()))?;
    let [w1, w2, w3] = widths[..] else {
        return Err(Error::InvalidPdf("invalid /W array length".to_string()));
    };
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(Error::InvalidPdf("xref stream /W is all zero".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => {
            if index.len() % 2 != 0 {
                return Err(Error::InvalidPdf("odd /Index length in xref stream".to_string()));
            }
            index
                .chunks(2)
                .map(|pair| {
                    let start = pair[0].as_integer().and_then(|v| u32::try_from(v).ok());
                    let count = pair[1].as_integer().and_then(|v| u32::try_from(v).ok());
                    start.zip(count)
                })
                .collect::<Option<_>>()
                .ok_or_else(|| Error::InvalidPdf("invalid /Index in xref stream".to_string()))?
        },
        None => vec![(0, size)],
    };

    let decoded = object.decode_stream_data()?;
    let mut table = CrossRefTable::new();
    let mut rows = decoded.chunks_exact(entry_size);

    for (start, count) in ranges {
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let entry_type = if w1 > 0 { read_int(&row[..w1]) } else { 1 };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = read_int(&row[w1 + w2..]);

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3 as u16),
                1 => XRefEntry::uncompressed(field2, if w3 > 0 { field3 as u16 } else { 0 }),
                2 => XRefEntry::compressed(field2, field3 as u16),
                other => {
                    // Reserved types are references to the null object
                    log::debug!("Treating xref stream entry type {} as free", other);
                    XRefEntry::free(0, 0)
                },
            };
            table.add_entry(start.saturating_add(i), entry);
        }
    }

    let mut trailer = dict.clone();
    for key in ["Type", "W", "Index", "Filter", "DecodeParms", "Length"] {
        trailer.remove(key);
    }
    table.set_trailer(trailer);
    Ok(table)
}

/// Big-endian unsigned integer.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64)
}
