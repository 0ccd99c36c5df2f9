//! Stream filters needed to read cross-reference and object streams.
//!
//! Only `FlateDecode` (with PNG or TIFF predictors) is implemented; it is
//! what writers use for both stream kinds in practice.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Upper bound on a single decoded stream.
const MAX_DECODED_SIZE: u64 = 100 * 1024 * 1024;

/// Decode parameters for predictor functions (ISO 32000-1, Table 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read `/DecodeParms` (a dictionary, or the first one of an array).
    pub fn from_object(obj: Option<&Object>) -> Self {
        let dict = match obj {
            Some(Object::Dictionary(d)) => d,
            Some(Object::Array(arr)) => match arr.first() {
                Some(Object::Dictionary(d)) => d,
                _ => return Self::default(),
            },
            _ => return Self::default(),
        };
        let get = |key: &str, default: i64| dict.get(key).and_then(Object::as_integer).unwrap_or(default);

        Self {
            predictor: get("Predictor", 1),
            columns: get("Columns", 1).max(1) as usize,
            colors: get("Colors", 1).max(1) as usize,
            bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
        }
    }

    fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Decode the payload of a stream according to its `/Filter` and
/// `/DecodeParms` entries.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> Result<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => Vec::new(),
        Some(Object::Name(name)) => vec![name.as_str()],
        Some(Object::Array(arr)) => arr.iter().filter_map(Object::as_name).collect(),
        Some(other) => {
            return Err(Error::Decode(format!("invalid /Filter of type {}", other.type_name())));
        },
    };

    let mut current = data.to_vec();
    for filter in filters {
        current = match filter {
            "FlateDecode" | "Fl" => flate_decode(&current)?,
            other => return Err(Error::Unsupported(format!("stream filter /{}", other))),
        };
    }

    let params = DecodeParams::from_object(dict.get("DecodeParms").or_else(|| dict.get("DP")));
    decode_predictor(&current, &params)
}

/// zlib first, then raw deflate for streams with a broken header.
fn flate_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let zlib = ZlibDecoder::new(input).take(MAX_DECODED_SIZE).read_to_end(&mut output);
    match zlib {
        Ok(_) => Ok(output),
        Err(e) if !output.is_empty() => {
            log::warn!("FlateDecode partial recovery: {} bytes before error: {}", output.len(), e);
            Ok(output)
        },
        Err(e) => {
            log::info!("Zlib decode failed ({}), trying raw deflate", e);
            output.clear();
            DeflateDecoder::new(input)
                .take(MAX_DECODED_SIZE)
                .read_to_end(&mut output)
                .map_err(|e| Error::Decode(format!("FlateDecode: {}", e)))?;
            Ok(output)
        },
    }
}

/// Reverse the predictor applied before compression.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("unsupported predictor {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Unsupported(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.pixel_bytes_per_row();
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in params.colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - params.colors]);
        }
    }
    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&tag, encoded) = chunk
            .split_first()
            .ok_or_else(|| Error::Decode("empty predictor row".to_string()))?;
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match tag {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => return Err(Error::Decode(format!("invalid PNG row filter {}", other))),
            };
        }

        output.extend_from_slice(&row[..encoded.len().min(row_len)]);
        previous = row;
    }
    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
