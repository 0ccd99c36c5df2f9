//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several objects into one
//! compressed stream:
//!
//! ```text
//! << /Type /ObjStm /N 3 /First 14 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15 12 28      % N pairs: object number, offset after /First
//! <<...>> [...] ...     % object data
//! endstream
//! ```
//!
//! Cross-reference streams address an object in an object stream by the
//! stream's object number and the object's index within it.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;

/// Upper bound on `/N`.
const MAX_OBJECTS: i64 = 1_000_000;

/// Decoded object stream: the pair table and the object data section.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    pairs: Vec<(u32, usize)>,
    objects: Vec<u8>,
}

impl ObjectStream {
    /// Decode `stream_obj` and read its pair table.
    pub fn parse(stream_obj: &Object) -> Result<Self> {
        let dict = match stream_obj {
            Object::Stream { dict, .. } => dict,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Stream".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };
        if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
            if kind != "ObjStm" {
                return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", kind)));
            }
        }

        let n = dict
            .get("N")
            .and_then(Object::as_integer)
            .filter(|n| (0..=MAX_OBJECTS).contains(n))
            .ok_or_else(|| Error::InvalidPdf("object stream has no valid /N".to_string()))?;
        let first = dict
            .get("First")
            .and_then(Object::as_integer)
            .and_then(|f| usize::try_from(f).ok())
            .ok_or_else(|| Error::InvalidPdf("object stream has no valid /First".to_string()))?;

        let decoded = stream_obj.decode_stream_data()?;
        if decoded.len() < first {
            return Err(Error::InvalidPdf(format!(
                "object stream data too short: {} bytes, /First is {}",
                decoded.len(),
                first
            )));
        }

        let pairs = parse_pairs(&decoded[..first], n as usize)?;
        Ok(Self {
            pairs,
            objects: decoded[first..].to_vec(),
        })
    }

    /// Number of objects in the stream.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Object at `index`, which must carry object number `id`.
    pub fn object_at(&self, index: usize, id: u32) -> Result<Object> {
        let &(found, offset) = self.pairs.get(index).ok_or(Error::ObjectNotFound(id, 0))?;
        if found != id {
            return Err(Error::InvalidPdf(format!(
                "object stream index {} holds object {}, expected {}",
                index, found, id
            )));
        }
        self.parse_at(offset, id)
    }

    /// Object numbers in stream order; the position is the index used by
    /// cross-reference streams.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pairs.iter().map(|&(id, _)| id)
    }

    fn parse_at(&self, offset: usize, id: u32) -> Result<Object> {
        let data = self.objects.get(offset..).ok_or_else(|| Error::ParseError {
            offset,
            reason: format!("object {} lies beyond the object stream data", id),
        })?;
        parse_object(data).map(|(_, obj)| obj).map_err(|e| Error::ParseError {
            offset,
            reason: format!("object {} in object stream: {:?}", id, e),
        })
    }
}

/// Parse `count` pairs of integers: object number, offset.
fn parse_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(4096));
    let mut rest = data;
    let mut next_integer = |i: usize| -> Result<i64> {
        match token(rest) {
            Ok((remaining, Token::Integer(value))) if value >= 0 => {
                rest = remaining;
                Ok(value)
            },
            _ => Err(Error::ParseError {
                offset: data.len() - rest.len(),
                reason: format!("malformed object stream pair {}", i),
            }),
        }
    };

    for i in 0..count {
        let id = next_integer(i)?;
        let offset = next_integer(i)?;
        let id = u32::try_from(id).map_err(|_| Error::InvalidPdf(format!("object number {} out of range", id)))?;
        pairs.push((id, offset as usize));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn stream(n: i64, first: i64, body: &'static [u8]) -> Object {
        let mut dict = crate::object::Dict::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        Object::Stream {
            dict,
            data: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_object_at_index() {
        let stm = ObjectStream::parse(&stream(2, 10, b"10 0 11 9 <</A 1>> [1 2]")).unwrap();
        assert_eq!(stm.len(), 2);
        assert_eq!(stm.object_at(0, 10).unwrap().get("A").and_then(Object::as_integer), Some(1));
        assert_eq!(
            stm.object_at(1, 11).unwrap(),
            Object::Array(vec![Object::Integer(1), Object::Integer(2)])
        );
    }

    #[test]
    fn test_index_must_match_object_number() {
        let stm = ObjectStream::parse(&stream(1, 5, b"7 0  true")).unwrap();
        assert!(stm.object_at(0, 8).is_err());
        assert!(matches!(stm.object_at(3, 7), Err(Error::ObjectNotFound(7, 0))));
        assert_eq!(stm.object_at(0, 7).unwrap(), Object::Boolean(true));
        assert_eq!(stm.object_numbers().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut obj = stream(0, 0, b"");
        obj.as_dict_mut()
            .unwrap()
            .insert("Type".to_string(), Object::name("XRef"));
        assert!(ObjectStream::parse(&obj).is_err());
    }

    #[test]
    fn test_truncated_pairs() {
        assert!(ObjectStream::parse(&stream(2, 4, b"1 0 ")).is_err());
    }
}
