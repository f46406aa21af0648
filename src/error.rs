//! Error types for xwire.

use thiserror::Error;

/// Severity attached to a server-reported error.
///
/// The wire carries 0 = error, 1 = fatal. Both terminate the current
/// receive operation; `Fatal` additionally means the session is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Statement-level error.
    Error,
    /// Session-level error, connection should be torn down.
    Fatal,
}

impl Severity {
    /// Decode the wire value, treating unknown values as `Error`.
    pub fn from_wire(value: u64) -> Self {
        match value {
            1 => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Wire value for this severity.
    pub fn to_wire(self) -> u64 {
        match self {
            Severity::Error => 0,
            Severity::Fatal => 1,
        }
    }
}

/// An error reported by the server in an Error frame.
///
/// Delivered through [`Processor::error`](crate::processor::Processor::error),
/// never returned from the receive pump directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {code} ({sql_state}): {msg}")]
pub struct ServerError {
    /// MySQL error code (e.g. 1045).
    pub code: u32,
    /// Error severity.
    pub severity: Severity,
    /// Five-character SQLSTATE (e.g. "28000").
    pub sql_state: String,
    /// Human-readable message.
    pub msg: String,
}

/// Main error type for all xwire operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Stream ended in the middle of a frame.
    #[error("stream ended mid-frame")]
    Eos,

    /// Underlying stream reported an I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame (declared length of zero).
    #[error("malformed frame: {0}")]
    Frame(&'static str),

    /// Frame length exceeds the configured maximum.
    #[error("frame of {length} bytes exceeds maximum {max}")]
    Oversize { length: u64, max: u64 },

    /// No decoder registered for this (direction, type tag).
    #[error("unknown message type {msg_type}")]
    UnknownMessage { msg_type: u8 },

    /// A decoder exists but the receive variant rejected this type here.
    #[error("unexpected message type {msg_type}")]
    UnexpectedMessage { msg_type: u8 },

    /// Payload failed to parse against the message schema.
    #[error("cannot decode message type {msg_type}: {reason}")]
    Decode { msg_type: u8, reason: DecodeError },

    /// Error frame delivered through the error callback.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Attempted to start a send while one is already in flight.
    #[error("send already in flight")]
    Busy,
}

/// Reason a payload failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload ended inside a field.
    #[error("truncated payload")]
    Truncated,
    /// Varint ran past 10 bytes without terminating.
    #[error("malformed varint")]
    Varint,
    /// Field carried a wire type the schema does not allow.
    #[error("wire type mismatch for field {0}")]
    WireType(u32),
    /// A required field was absent.
    #[error("missing required field {0}")]
    MissingField(u32),
    /// A string field held invalid UTF-8.
    #[error("invalid UTF-8 in field {0}")]
    Utf8(u32),
    /// An enum field held a value outside its closed set.
    #[error("invalid enum value in field {0}")]
    Enum(u32),
    /// A declared length ran past the end of the payload.
    #[error("length prefix overruns payload")]
    Length,
}

/// Result type alias using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_wire_roundtrip() {
        assert_eq!(Severity::from_wire(0), Severity::Error);
        assert_eq!(Severity::from_wire(1), Severity::Fatal);
        // Unknown severities degrade to plain errors.
        assert_eq!(Severity::from_wire(7), Severity::Error);
        assert_eq!(Severity::Error.to_wire(), 0);
        assert_eq!(Severity::Fatal.to_wire(), 1);
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError {
            code: 1045,
            severity: Severity::Error,
            sql_state: "28000".to_string(),
            msg: "Access denied".to_string(),
        };
        assert_eq!(err.to_string(), "server error 1045 (28000): Access denied");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: ProtocolError = io.into();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
