//! Payload writer: appends protobuf-encoded fields to a `BytesMut`.
//!
//! Encoding never fails; size policy (the frame limit) is enforced one
//! layer up when the finished payload is framed.

use bytes::{BufMut, BytesMut};

use super::WireType;

/// Append-only encoder for one message payload.
pub struct PayloadWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> PayloadWriter<'a> {
    /// Create a writer appending to `buf`.
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Write a varint field.
    pub fn uint(&mut self, field: u32, value: u64) {
        self.key(field, WireType::Varint);
        self.raw_varint(value);
    }

    /// Write a zigzag-encoded `sint64` field.
    pub fn sint(&mut self, field: u32, value: i64) {
        self.uint(field, ((value << 1) ^ (value >> 63)) as u64);
    }

    /// Write a bool field.
    pub fn boolean(&mut self, field: u32, value: bool) {
        self.uint(field, u64::from(value));
    }

    /// Write a length-delimited bytes field.
    pub fn bytes(&mut self, field: u32, value: &[u8]) {
        self.key(field, WireType::LengthDelimited);
        self.raw_varint(value.len() as u64);
        self.buf.put_slice(value);
    }

    /// Write a length-delimited UTF-8 string field.
    pub fn str(&mut self, field: u32, value: &str) {
        self.bytes(field, value.as_bytes());
    }

    /// Write a `double` (fixed64) field.
    pub fn double(&mut self, field: u32, value: f64) {
        self.key(field, WireType::Fixed64);
        self.buf.put_slice(&value.to_le_bytes());
    }

    /// Write a `float` (fixed32) field.
    pub fn float(&mut self, field: u32, value: f32) {
        self.key(field, WireType::Fixed32);
        self.buf.put_slice(&value.to_le_bytes());
    }

    /// Write a nested message field.
    ///
    /// The closure encodes the submessage; its output is emitted
    /// length-prefixed under the given field number.
    pub fn nested(&mut self, field: u32, encode: impl FnOnce(&mut PayloadWriter<'_>)) {
        let mut scratch = BytesMut::new();
        encode(&mut PayloadWriter::new(&mut scratch));
        self.bytes(field, &scratch);
    }

    fn key(&mut self, field: u32, wire: WireType) {
        self.raw_varint((u64::from(field) << 3) | wire.to_bits());
    }

    fn raw_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.put_u8(byte);
                return;
            }
            self.buf.put_u8(byte | 0x80);
        }
    }
}
