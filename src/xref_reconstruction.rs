//! Cross-reference table reconstruction.
//!
//! Used when the xref chain is damaged: the whole file is scanned for
//! `N G obj` headers, object streams found that way are indexed, and the
//! trailer is taken from the last `trailer` keyword or rebuilt around the
//! catalog.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::parser::{parse_indirect_object, parse_object};
use crate::xref::{CrossRefTable, XRefEntry, XRefEntryType};
use lazy_static::lazy_static;

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_PATTERN: regex::bytes::Regex = regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj").unwrap();

    /// "trailer <<"
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Rebuild the cross-reference table by scanning `data`.
///
/// Later definitions of the same object number replace earlier ones, which
/// matches the semantics of incremental updates.
///
/// # Errors
///
/// Returns an error if no objects are found or no catalog can be located.
pub fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut xref = CrossRefTable::new();
    let mut objects_found = 0;

    for capture in RE_OBJ_PATTERN.captures_iter(data) {
        let (Some(full), Some(num), Some(gen)) = (capture.get(0), capture.get(1), capture.get(2))
        else {
            continue;
        };
        let offset = full.start();

        if offset > 0 && !crate::lexer::is_whitespace(data[offset - 1]) {
            continue;
        }

        let (Some(obj_num), Some(gen_num)) = (parse_decimal::<u32>(num.as_bytes()), parse_decimal::<u16>(gen.as_bytes()))
        else {
            log::warn!("Unparseable object header at offset {}", offset);
            continue;
        };

        // Only accept headers followed by something that can start an object
        let after = crate::lexer::skip_ws(&data[full.end()..]);
        if let Some(&next) = after.first() {
            let plausible = matches!(next, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
                || next.is_ascii_digit();
            if !plausible {
                log::debug!("Skipping false object header at offset {}", offset);
                continue;
            }
        }

        xref.add_entry(obj_num, XRefEntry::uncompressed(offset as u64, gen_num));
        objects_found += 1;
    }

    log::info!("Reconstructed xref with {} objects", objects_found);

    if objects_found == 0 {
        return Err(Error::InvalidPdf("No objects found during xref reconstruction".to_string()));
    }

    index_object_streams(data, &mut xref);

    let trailer = find_trailer(data, &xref)?;
    xref.set_trailer(trailer);
    Ok(xref)
}

/// Add compressed entries for objects that only live in object streams.
fn index_object_streams(data: &[u8], xref: &mut CrossRefTable) {
    let candidates: Vec<(u32, u64)> = xref
        .iter()
        .filter(|(_, e)| e.entry_type == XRefEntryType::Uncompressed)
        .map(|(num, e)| (num, e.offset))
        .filter(|&(_, offset)| {
            let start = offset as usize;
            let head = &data[start..data.len().min(start + 256)];
            head.windows(7).any(|w| w == b"/ObjStm")
        })
        .collect();

    for (stream_num, offset) in candidates {
        let stream = match parse_indirect_object(data, offset as usize).and_then(|(_, obj)| ObjectStream::parse(&obj)) {
            Ok(stream) => stream,
            Err(e) => {
                log::debug!("Object {} is not a readable object stream: {}", stream_num, e);
                continue;
            },
        };
        let mut added = 0;
        for (index, id) in stream.object_numbers().enumerate() {
            // Top-level definitions win over stream copies
            if xref.get(id).is_none() {
                xref.add_entry(id, XRefEntry::compressed(stream_num as u64, index as u16));
                added += 1;
            }
        }
        log::debug!("Indexed {} objects from object stream {}", added, stream_num);
    }
}

/// Load the object behind a reconstructed entry.
fn load_entry(data: &[u8], xref: &CrossRefTable, num: u32) -> Result<Object> {
    let entry = xref.get(num).ok_or(Error::ObjectNotFound(num, 0))?;
    match entry.entry_type {
        XRefEntryType::Uncompressed => Ok(parse_indirect_object(data, entry.offset as usize)?.1),
        XRefEntryType::Compressed => {
            let stream_num = u32::try_from(entry.offset).map_err(|_| Error::InvalidXref)?;
            let stream_entry = xref
                .get(stream_num)
                .filter(|e| e.entry_type == XRefEntryType::Uncompressed)
                .ok_or(Error::ObjectNotFound(stream_num, 0))?;
            let (_, stream) = parse_indirect_object(data, stream_entry.offset as usize)?;
            ObjectStream::parse(&stream)?.object_at(entry.generation as usize, num)
        },
        XRefEntryType::Free => Ok(Object::Null),
    }
}

fn parse_decimal<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Last parseable `trailer` dictionary, else a minimal one.
fn find_trailer(data: &[u8], xref: &CrossRefTable) -> Result<Dict> {
    let starts: Vec<usize> = RE_TRAILER.find_iter(data).map(|m| m.start()).collect();
    for start in starts.into_iter().rev() {
        match parse_object(&data[start + "trailer".len()..]) {
            Ok((_, Object::Dictionary(dict))) if dict.contains_key("Root") => {
                log::debug!("Using trailer at offset {}", start);
                return Ok(dict);
            },
            Ok(_) => log::debug!("Trailer at offset {} has no /Root", start),
            Err(e) => log::warn!("Failed to parse trailer at offset {}: {}", start, e),
        }
    }

    reconstruct_minimal_trailer(data, xref)
}

/// Build `<< /Root .. /Size .. >>` around the object with `/Type /Catalog`.
///
/// A cross-reference stream dictionary carrying `/Root` is preferred, since
/// it also knows `/Info` and `/ID`.
fn reconstruct_minimal_trailer(data: &[u8], xref: &CrossRefTable) -> Result<Dict> {
    log::info!("Reconstructing minimal trailer dictionary");

    let mut numbers: Vec<u32> = (0..=xref.max_object_number())
        .filter(|n| xref.get(*n).is_some_and(|e| e.in_use))
        .collect();
    numbers.sort_unstable_by(|a, b| b.cmp(a));

    let mut catalog = None;
    for num in numbers {
        let Some(entry) = xref.get(num) else { continue };
        let object = match load_entry(data, xref, num) {
            Ok(object) => object,
            Err(e) => {
                log::debug!("Failed to load object {}: {}", num, e);
                continue;
            },
        };
        let generation = match entry.entry_type {
            XRefEntryType::Compressed => 0,
            _ => entry.generation,
        };

        match object.get("Type").and_then(Object::as_name) {
            Some("XRef") if object.get("Root").is_some() => {
                let mut trailer = object.as_dict().cloned().unwrap_or_default();
                trailer.retain(|k, _| matches!(k.as_str(), "Root" | "Info" | "ID"));
                trailer.insert("Size".to_string(), Object::Integer(xref.max_object_number() as i64 + 1));
                log::info!("Using cross-reference stream {} as trailer", num);
                return Ok(trailer);
            },
            Some("Catalog") if catalog.is_none() => {
                catalog = Some(ObjectRef::new(num, generation));
            },
            _ => {},
        }
    }

    let root = catalog
        .ok_or_else(|| Error::InvalidPdf("Could not find catalog in reconstructed xref".to_string()))?;
    log::info!("Found catalog: {}", root);

    let mut trailer = Dict::new();
    trailer.insert("Root".to_string(), Object::Reference(root));
    trailer.insert("Size".to_string(), Object::Integer(xref.max_object_number() as i64 + 1));
    Ok(trailer)
}
