//! Protocol module - wire framing.
//!
//! This module implements the outermost layer of the X Protocol:
//! - 5-byte header encoding/decoding (Little Endian length + type tag)
//! - Frame struct with typed accessors
//! - Frame size limits and validation

mod frame;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use wire_format::{FrameHeader, HEADER_SIZE, INITIAL_BUF_CAPACITY, MAX_FRAME_SIZE};
