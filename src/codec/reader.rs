//! Payload reader: a consuming cursor over protobuf-encoded bytes.
//!
//! Message decoders iterate [`PayloadReader::next_field`] and pull each
//! value with the typed accessor matching the schema, skipping fields they
//! do not know. All accessors take the field number so decode errors can
//! name the offending field.

use crate::error::DecodeError;

use super::WireType;

/// Longest legal varint encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

/// Cursor over a single message payload.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    /// Create a reader over a payload slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// True once the whole payload has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Read the next field key, or `None` at end of payload.
    pub fn next_field(&mut self) -> Result<Option<(u32, WireType)>, DecodeError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let key = self.raw_varint()?;
        let field = (key >> 3) as u32;
        let wire = WireType::from_key(key, field)?;
        Ok(Some((field, wire)))
    }

    /// Read a varint value, checking the wire type.
    pub fn varint_value(&mut self, field: u32, wire: WireType) -> Result<u64, DecodeError> {
        if wire != WireType::Varint {
            return Err(DecodeError::WireType(field));
        }
        self.raw_varint()
    }

    /// Read a zigzag-encoded signed varint (`sint64`).
    pub fn sint64_value(&mut self, field: u32, wire: WireType) -> Result<i64, DecodeError> {
        let v = self.varint_value(field, wire)?;
        Ok(((v >> 1) as i64) ^ -((v & 1) as i64))
    }

    /// Read a bool field (varint 0 or 1; any nonzero value reads true).
    pub fn bool_value(&mut self, field: u32, wire: WireType) -> Result<bool, DecodeError> {
        Ok(self.varint_value(field, wire)? != 0)
    }

    /// Read a length-delimited field as a byte slice.
    pub fn bytes_value(&mut self, field: u32, wire: WireType) -> Result<&'a [u8], DecodeError> {
        if wire != WireType::LengthDelimited {
            return Err(DecodeError::WireType(field));
        }
        let len = self.raw_varint()? as usize;
        if len > self.buf.len() {
            return Err(DecodeError::Length);
        }
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(value)
    }

    /// Read a length-delimited field as UTF-8 text.
    pub fn string_value(&mut self, field: u32, wire: WireType) -> Result<&'a str, DecodeError> {
        let raw = self.bytes_value(field, wire)?;
        std::str::from_utf8(raw).map_err(|_| DecodeError::Utf8(field))
    }

    /// Read a `double` (fixed64) field.
    pub fn double_value(&mut self, field: u32, wire: WireType) -> Result<f64, DecodeError> {
        if wire != WireType::Fixed64 {
            return Err(DecodeError::WireType(field));
        }
        let raw = self.take(8)?;
        Ok(f64::from_le_bytes(raw.try_into().expect("eight bytes")))
    }

    /// Read a `float` (fixed32) field.
    pub fn float_value(&mut self, field: u32, wire: WireType) -> Result<f32, DecodeError> {
        if wire != WireType::Fixed32 {
            return Err(DecodeError::WireType(field));
        }
        let raw = self.take(4)?;
        Ok(f32::from_le_bytes(raw.try_into().expect("four bytes")))
    }

    /// Skip over one value of the given wire type (unknown fields).
    pub fn skip(&mut self, wire: WireType) -> Result<(), DecodeError> {
        match wire {
            WireType::Varint => {
                self.raw_varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
            WireType::LengthDelimited => {
                let len = self.raw_varint()? as usize;
                if len > self.buf.len() {
                    return Err(DecodeError::Length);
                }
                self.buf = &self.buf[len..];
            }
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() < n {
            return Err(DecodeError::Truncated);
        }
        let (value, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(value)
    }

    fn raw_varint(&mut self) -> Result<u64, DecodeError> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = *self.buf.get(i).ok_or(DecodeError::Truncated)?;
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                self.buf = &self.buf[i + 1..];
                return Ok(value);
            }
        }
        Err(DecodeError::Varint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_single_byte() {
        let mut r = PayloadReader::new(&[0x08, 0x2A]); // field 1, varint 42
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(field, 1);
        assert_eq!(r.varint_value(field, wire).unwrap(), 42);
        assert!(r.is_empty());
    }

    #[test]
    fn test_varint_multi_byte() {
        // 300 = 0xAC 0x02
        let mut r = PayloadReader::new(&[0x08, 0xAC, 0x02]);
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(r.varint_value(field, wire).unwrap(), 300);
    }

    #[test]
    fn test_varint_max_u64() {
        let mut r = PayloadReader::new(&[
            0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01,
        ]);
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(r.varint_value(field, wire).unwrap(), u64::MAX);
    }

    #[test]
    fn test_varint_overlong_rejected() {
        let mut r = PayloadReader::new(&[0xFF; 11]);
        assert_eq!(r.next_field().unwrap_err(), DecodeError::Varint);
    }

    #[test]
    fn test_varint_truncated() {
        let mut r = PayloadReader::new(&[0x08, 0x80]);
        let (_, _) = r.next_field().unwrap().unwrap();
        assert_eq!(r.raw_varint().unwrap_err(), DecodeError::Truncated);
    }

    #[test]
    fn test_sint64_zigzag() {
        // zigzag(-1) = 1, zigzag(1) = 2
        let mut r = PayloadReader::new(&[0x10, 0x01, 0x10, 0x02]);
        let (f, w) = r.next_field().unwrap().unwrap();
        assert_eq!(r.sint64_value(f, w).unwrap(), -1);
        let (f, w) = r.next_field().unwrap().unwrap();
        assert_eq!(r.sint64_value(f, w).unwrap(), 1);
    }

    #[test]
    fn test_bytes_and_string() {
        // field 2, length 5, "hello"
        let mut r = PayloadReader::new(&[0x12, 0x05, b'h', b'e', b'l', b'l', b'o']);
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(field, 2);
        assert_eq!(wire, WireType::LengthDelimited);
        assert_eq!(r.string_value(field, wire).unwrap(), "hello");
    }

    #[test]
    fn test_bytes_length_overrun() {
        let mut r = PayloadReader::new(&[0x12, 0x10, b'x']);
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(r.bytes_value(field, wire).unwrap_err(), DecodeError::Length);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut r = PayloadReader::new(&[0x12, 0x02, 0xC0, 0x00]);
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(r.string_value(field, wire).unwrap_err(), DecodeError::Utf8(2));
    }

    #[test]
    fn test_fixed_fields() {
        let mut buf = vec![0x19]; // field 3, fixed64
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        buf.push(0x25); // field 4, fixed32
        buf.extend_from_slice(&2.5f32.to_le_bytes());

        let mut r = PayloadReader::new(&buf);
        let (f, w) = r.next_field().unwrap().unwrap();
        assert_eq!(r.double_value(f, w).unwrap(), 1.5);
        let (f, w) = r.next_field().unwrap().unwrap();
        assert_eq!(r.float_value(f, w).unwrap(), 2.5);
    }

    #[test]
    fn test_wire_type_mismatch() {
        let mut r = PayloadReader::new(&[0x08, 0x01]); // varint field
        let (field, wire) = r.next_field().unwrap().unwrap();
        assert_eq!(
            r.bytes_value(field, wire).unwrap_err(),
            DecodeError::WireType(1)
        );
    }

    #[test]
    fn test_skip_unknown_fields() {
        let mut buf = vec![0x08, 0x2A]; // field 1 varint
        buf.extend_from_slice(&[0x12, 0x03, 1, 2, 3]); // field 2 bytes
        buf.push(0x19); // field 3 fixed64
        buf.extend_from_slice(&[0u8; 8]);
        buf.push(0x25); // field 4 fixed32
        buf.extend_from_slice(&[0u8; 4]);

        let mut r = PayloadReader::new(&buf);
        while let Some((_, wire)) = r.next_field().unwrap() {
            r.skip(wire).unwrap();
        }
        assert!(r.is_empty());
    }

    #[test]
    fn test_group_wire_type_rejected() {
        // key 0x0B = field 1, wire type 3 (group start)
        let mut r = PayloadReader::new(&[0x0B]);
        assert_eq!(r.next_field().unwrap_err(), DecodeError::WireType(1));
    }

    #[test]
    fn test_empty_payload_yields_no_fields() {
        let mut r = PayloadReader::new(&[]);
        assert!(r.next_field().unwrap().is_none());
    }
}
