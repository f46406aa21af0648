//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with type tag and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use xwire::protocol::{build_frame, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(13, Bytes::from_static(b"hello"));
//! assert_eq!(frame.msg_type(), 13);
//! assert_eq!(frame.payload(), b"hello");
//! assert_eq!(build_frame(13, b"hello").len(), 5 + 5);
//! ```

use bytes::Bytes;

use super::wire_format::{FrameHeader, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Message type tag.
    pub msg_type: u8,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from type tag and payload.
    pub fn new(msg_type: u8, payload: Bytes) -> Self {
        Self { msg_type, payload }
    }

    /// Create a frame from type tag and raw bytes (copies data).
    pub fn from_parts(msg_type: u8, payload: &[u8]) -> Self {
        Self {
            msg_type,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get the message type tag.
    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Header describing this frame on the wire.
    pub fn header(&self) -> FrameHeader {
        FrameHeader::for_payload(self.msg_type, self.payload.len() as u32)
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the 5-byte header and appends the payload into a contiguous
/// buffer, the exact byte sequence the wire carries.
pub fn build_frame(msg_type: u8, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader::for_payload(msg_type, payload.len() as u32);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
