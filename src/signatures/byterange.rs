//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of file
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.
//!
//! Both placeholders are written before the offsets are known: the
//! `/ByteRange` array with ten-digit dummies wide enough for any real value,
//! and `/Contents` with zero bytes. Patching keeps every byte position
//! stable.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::writer::hex_upper;

/// Dummy ByteRange value; ten digits cover files up to 9.3 GiB.
const BYTE_RANGE_DUMMY: i64 = 9_999_999_999;

/// Calculator for PDF signature byte ranges.
#[derive(Debug, Clone, Copy)]
pub struct ByteRangeCalculator {
    /// Bytes reserved for the DER container
    reserved: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator for a container of at most `reserved` bytes.
    ///
    /// The placeholder occupies `reserved * 2 + 2` bytes in the file:
    /// each byte becomes two hex digits, plus the angle brackets.
    pub fn new(reserved: usize) -> Self {
        Self { reserved }
    }

    /// Bytes reserved for the container.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Size of the `/Contents` value in the file, brackets included.
    pub fn placeholder_size(&self) -> usize {
        self.reserved * 2 + 2
    }

    /// Generate the `/Contents` placeholder value: `reserved` zero bytes,
    /// which the serializer writes as hex.
    pub fn contents_placeholder(&self) -> Object {
        Object::String(vec![0; self.reserved])
    }

    /// Generate the `/ByteRange` placeholder value.
    pub fn byte_range_placeholder() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(BYTE_RANGE_DUMMY),
            Object::Integer(BYTE_RANGE_DUMMY),
            Object::Integer(BYTE_RANGE_DUMMY),
        ])
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// `contents_offset` is the offset of the opening `<`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size()) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Overwrite the ByteRange placeholder array that starts at `offset`
    /// (its `[`), padding with spaces before the closing `]`.
    pub fn patch_byte_range(pdf_data: &mut [u8], offset: usize, byte_range: &[i64; 4]) -> Result<()> {
        let rest = pdf_data
            .get(offset..)
            .filter(|rest| rest.first() == Some(&b'['))
            .ok_or_else(|| Error::InvalidPdf("ByteRange placeholder not found".to_string()))?;
        let close = rest
            .iter()
            .position(|&b| b == b']')
            .ok_or_else(|| Error::InvalidPdf("ByteRange placeholder is not terminated".to_string()))?;
        let width = close + 1;

        let formatted = Self::format_byte_range(byte_range);
        if formatted.len() > width {
            return Err(Error::InvalidPdf(format!(
                "ByteRange {} does not fit its {}-byte placeholder",
                formatted, width
            )));
        }

        let mut padded = formatted.into_bytes();
        padded.pop();
        padded.resize(width - 1, b' ');
        padded.push(b']');
        pdf_data[offset..offset + width].copy_from_slice(&padded);
        Ok(())
    }

    /// Extract the bytes to be signed from a PDF file.
    ///
    /// This returns the concatenation of the two ranges specified by ByteRange.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let [offset1, length1, offset2, length2] = byte_range.map(|v| usize::try_from(v).ok());
        let (Some(offset1), Some(length1), Some(offset2), Some(length2)) =
            (offset1, length1, offset2, length2)
        else {
            return Err(Error::InvalidPdf(format!("ByteRange has negative values: {:?}", byte_range)));
        };

        let first = offset1
            .checked_add(length1)
            .and_then(|end| pdf_data.get(offset1..end))
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange first range exceeds file size: {} + {} > {}",
                    offset1,
                    length1,
                    pdf_data.len()
                ))
            })?;
        let second = offset2
            .checked_add(length2)
            .and_then(|end| pdf_data.get(offset2..end))
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange second range exceeds file size: {} + {} > {}",
                    offset2,
                    length2,
                    pdf_data.len()
                ))
            })?;

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(first);
        signed_bytes.extend_from_slice(second);
        Ok(signed_bytes)
    }

    /// Check that a ByteRange covers the entire document except one gap.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }
        if length1 < 0 || length2 < 0 {
            return Err(Error::InvalidPdf(format!("ByteRange has negative lengths: {:?}", byte_range)));
        }

        let expected_end = file_size as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 > offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Find the offset of the `<` opening the `/Contents` value within
    /// `pdf_data[start..end]`.
    pub fn find_contents_offset(pdf_data: &[u8], start: usize, end: usize) -> Option<usize> {
        find_value_after_key(pdf_data, start, end, b"/Contents", b'<')
    }

    /// Find the offset of the `[` opening the `/ByteRange` value within
    /// `pdf_data[start..end]`.
    pub fn find_byte_range_offset(pdf_data: &[u8], start: usize, end: usize) -> Option<usize> {
        find_value_after_key(pdf_data, start, end, b"/ByteRange", b'[')
    }

    /// Write `container` into the placeholder at `contents_offset`, zero
    /// padded to the reserved size.
    pub fn insert_signature(
        &self,
        pdf_data: &mut [u8],
        contents_offset: usize,
        container: &[u8],
    ) -> Result<()> {
        if container.len() > self.reserved {
            return Err(Error::PlaceholderOverflow {
                required: container.len(),
                reserved: self.reserved,
            });
        }

        let end = contents_offset + self.placeholder_size();
        let region = pdf_data
            .get_mut(contents_offset..end)
            .filter(|r| r.first() == Some(&b'<') && r.last() == Some(&b'>'))
            .ok_or_else(|| Error::InvalidPdf("Signature placeholder not found".to_string()))?;

        let hex = hex_upper(container);
        region[1..1 + hex.len()].copy_from_slice(hex.as_bytes());
        region[1 + hex.len()..self.placeholder_size() - 1].fill(b'0');
        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RESERVATION)
    }
}

fn find_value_after_key(pdf_data: &[u8], start: usize, end: usize, key: &[u8], open: u8) -> Option<usize> {
    let end = end.min(pdf_data.len());
    let window = pdf_data.get(start..end)?;
    let key_pos = window.windows(key.len()).position(|w| w == key)?;
    let after = key_pos + key.len();
    let value_pos = after + window[after..].iter().position(|&b| !crate::lexer::is_whitespace(b))?;
    (window[value_pos] == open).then_some(start + value_pos)
}
