//! Codec module - payload serialization primitives.
//!
//! X Protocol payloads use the Protocol Buffers wire format: each field is
//! a varint key `(field_number << 3) | wire_type` followed by a value whose
//! shape the wire type determines. This module provides the reader and
//! writer primitives the message codecs in [`crate::msg`] are built from:
//!
//! - [`PayloadReader`] - cursor over a payload slice, with typed accessors
//!   and unknown-field skipping
//! - [`PayloadWriter`] - appends fields to a `BytesMut`, with support for
//!   length-prefixed nested messages
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use xwire::codec::{PayloadReader, PayloadWriter, WireType};
//!
//! let mut buf = BytesMut::new();
//! let mut w = PayloadWriter::new(&mut buf);
//! w.uint(1, 1045);
//! w.str(3, "Access denied");
//!
//! let mut r = PayloadReader::new(&buf);
//! let (field, wire) = r.next_field().unwrap().unwrap();
//! assert_eq!((field, wire), (1, WireType::Varint));
//! assert_eq!(r.varint_value(1, wire).unwrap(), 1045);
//! ```

mod reader;
mod writer;

pub use reader::PayloadReader;
pub use writer::PayloadWriter;

use crate::error::DecodeError;

/// Wire type carried in the low three bits of a field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// Base-128 varint value.
    Varint,
    /// Eight bytes, little endian (`double`, `fixed64`).
    Fixed64,
    /// Varint length followed by that many bytes (strings, bytes, messages).
    LengthDelimited,
    /// Four bytes, little endian (`float`, `fixed32`).
    Fixed32,
}

impl WireType {
    /// Decode the low three bits of a field key. Group markers (3, 4) are
    /// long-deprecated and never appear in the X Protocol schema.
    pub fn from_key(key: u64, field: u32) -> Result<Self, DecodeError> {
        match key & 0x7 {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            _ => Err(DecodeError::WireType(field)),
        }
    }

    /// Wire-type bits for a field key.
    pub fn to_bits(self) -> u64 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        }
    }
}
