//! Notice frames and their payload decoders.
//!
//! A Notice is an out-of-band frame the server may interleave anywhere in
//! a reply. The engine hands the frame to the processor's `notice`
//! callback without interpreting the inner payload; the decoders here
//! ([`Warning`], [`SessionVariableChanged`], [`SessionStateChanged`]) are
//! for upper layers that want the contents.

use bytes::Bytes;

use crate::codec::{PayloadReader, PayloadWriter};
use crate::error::DecodeError;
use crate::expr::Any;

use super::PayloadCodec;

/// Notice frame types carried in [`NoticeFrame::ty`].
pub const NOTICE_WARNING: u32 = 1;
pub const NOTICE_SESSION_VARIABLE_CHANGED: u32 = 2;
pub const NOTICE_SESSION_STATE_CHANGED: u32 = 3;

/// Scope of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeScope {
    /// Concerns the connection as a whole.
    Global,
    /// Concerns the current statement/operation.
    Local,
}

impl NoticeScope {
    /// Decode the wire value, defaulting unknown scopes to global.
    pub fn from_wire(value: u64) -> Self {
        match value {
            2 => NoticeScope::Local,
            _ => NoticeScope::Global,
        }
    }

    /// Wire value for this scope.
    pub fn to_wire(self) -> u64 {
        match self {
            NoticeScope::Global => 1,
            NoticeScope::Local => 2,
        }
    }
}

/// The outer notice envelope: a numeric notice type, a scope, and the
/// type-specific payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeFrame {
    pub ty: u32,
    pub scope: NoticeScope,
    pub payload: Bytes,
}

impl NoticeFrame {
    /// Build a warning notice (convenience for tests and server roles).
    pub fn warning(scope: NoticeScope, warning: &Warning) -> Self {
        let mut buf = bytes::BytesMut::new();
        warning.encode_fields(&mut PayloadWriter::new(&mut buf));
        Self {
            ty: NOTICE_WARNING,
            scope,
            payload: buf.freeze(),
        }
    }
}

impl PayloadCodec for NoticeFrame {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut ty = None;
        let mut scope = NoticeScope::Global;
        let mut inner = Bytes::new();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => ty = Some(r.varint_value(1, wire)? as u32),
                2 => scope = NoticeScope::from_wire(r.varint_value(2, wire)?),
                3 => inner = Bytes::copy_from_slice(r.bytes_value(3, wire)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            ty: ty.ok_or(DecodeError::MissingField(1))?,
            scope,
            payload: inner,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, u64::from(self.ty));
        w.uint(2, self.scope.to_wire());
        if !self.payload.is_empty() {
            w.bytes(3, &self.payload);
        }
    }
}

/// Warning level inside a [`Warning`] notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningLevel {
    Note,
    Warning,
    Error,
}

impl WarningLevel {
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            1 => WarningLevel::Note,
            2 => WarningLevel::Warning,
            3 => WarningLevel::Error,
            _ => return Err(DecodeError::Enum(1)),
        })
    }

    pub fn to_wire(self) -> u64 {
        match self {
            WarningLevel::Note => 1,
            WarningLevel::Warning => 2,
            WarningLevel::Error => 3,
        }
    }
}

/// Payload of a warning notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: WarningLevel,
    pub code: u32,
    pub msg: String,
}

impl PayloadCodec for Warning {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut level = WarningLevel::Warning;
        let mut code = None;
        let mut msg = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => level = WarningLevel::from_wire(r.varint_value(1, wire)?)?,
                2 => code = Some(r.varint_value(2, wire)? as u32),
                3 => msg = Some(r.string_value(3, wire)?.to_string()),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            level,
            code: code.ok_or(DecodeError::MissingField(2))?,
            msg: msg.ok_or(DecodeError::MissingField(3))?,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, self.level.to_wire());
        w.uint(2, u64::from(self.code));
        w.str(3, &self.msg);
    }
}

/// Payload of a session-variable-changed notice.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionVariableChanged {
    pub param: String,
    pub value: Option<Any>,
}

impl PayloadCodec for SessionVariableChanged {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut param = None;
        let mut value = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => param = Some(r.string_value(1, wire)?.to_string()),
                2 => value = Some(Any::decode(r.bytes_value(2, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            param: param.ok_or(DecodeError::MissingField(1))?,
            value,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.str(1, &self.param);
        if let Some(value) = &self.value {
            w.nested(2, |v| value.encode_fields(v));
        }
    }
}

/// Session state parameters reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStateParam {
    CurrentSchema,
    AccountExpired,
    GeneratedInsertId,
    RowsAffected,
    RowsFound,
    RowsMatched,
    TrxCommitted,
    TrxRolledback,
    ProducedMessage,
    ClientIdAssigned,
}

impl SessionStateParam {
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            1 => SessionStateParam::CurrentSchema,
            2 => SessionStateParam::AccountExpired,
            3 => SessionStateParam::GeneratedInsertId,
            4 => SessionStateParam::RowsAffected,
            5 => SessionStateParam::RowsFound,
            6 => SessionStateParam::RowsMatched,
            7 => SessionStateParam::TrxCommitted,
            9 => SessionStateParam::TrxRolledback,
            10 => SessionStateParam::ProducedMessage,
            11 => SessionStateParam::ClientIdAssigned,
            _ => return Err(DecodeError::Enum(1)),
        })
    }

    pub fn to_wire(self) -> u64 {
        match self {
            SessionStateParam::CurrentSchema => 1,
            SessionStateParam::AccountExpired => 2,
            SessionStateParam::GeneratedInsertId => 3,
            SessionStateParam::RowsAffected => 4,
            SessionStateParam::RowsFound => 5,
            SessionStateParam::RowsMatched => 6,
            SessionStateParam::TrxCommitted => 7,
            SessionStateParam::TrxRolledback => 9,
            SessionStateParam::ProducedMessage => 10,
            SessionStateParam::ClientIdAssigned => 11,
        }
    }
}

/// Payload of a session-state-changed notice.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStateChanged {
    pub param: SessionStateParam,
    pub value: Option<Any>,
}

impl PayloadCodec for SessionStateChanged {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut param = None;
        let mut value = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => param = Some(SessionStateParam::from_wire(r.varint_value(1, wire)?)?),
                2 => value = Some(Any::decode(r.bytes_value(2, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            param: param.ok_or(DecodeError::MissingField(1))?,
            value,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, self.param.to_wire());
        if let Some(value) = &self.value {
            w.nested(2, |v| value.encode_fields(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Scalar;
    use bytes::BytesMut;

    fn roundtrip<T: PayloadCodec + PartialEq + std::fmt::Debug>(value: &T) {
        let mut buf = BytesMut::new();
        value.encode_fields(&mut PayloadWriter::new(&mut buf));
        assert_eq!(&T::decode(&buf).unwrap(), value);
    }

    #[test]
    fn test_notice_frame_roundtrip() {
        roundtrip(&NoticeFrame {
            ty: NOTICE_WARNING,
            scope: NoticeScope::Local,
            payload: Bytes::from_static(b"inner"),
        });
        roundtrip(&NoticeFrame {
            ty: NOTICE_SESSION_STATE_CHANGED,
            scope: NoticeScope::Global,
            payload: Bytes::new(),
        });
    }

    #[test]
    fn test_scope_default_is_global() {
        // Frame with only the type field.
        let mut buf = BytesMut::new();
        PayloadWriter::new(&mut buf).uint(1, 2);
        let frame = NoticeFrame::decode(&buf).unwrap();
        assert_eq!(frame.scope, NoticeScope::Global);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_warning_roundtrip_via_frame() {
        let warning = Warning {
            level: WarningLevel::Warning,
            code: 1287,
            msg: "deprecated".into(),
        };
        let frame = NoticeFrame::warning(NoticeScope::Local, &warning);
        assert_eq!(frame.ty, NOTICE_WARNING);
        assert_eq!(Warning::decode(&frame.payload).unwrap(), warning);
    }

    #[test]
    fn test_warning_level_wire_values() {
        for level in [WarningLevel::Note, WarningLevel::Warning, WarningLevel::Error] {
            assert_eq!(WarningLevel::from_wire(level.to_wire()).unwrap(), level);
        }
        assert!(WarningLevel::from_wire(0).is_err());
    }

    #[test]
    fn test_session_variable_changed_roundtrip() {
        roundtrip(&SessionVariableChanged {
            param: "sql_mode".into(),
            value: Some(Any::Scalar(Scalar::Str("STRICT_TRANS_TABLES".into()))),
        });
        roundtrip(&SessionVariableChanged {
            param: "wait_timeout".into(),
            value: None,
        });
    }

    #[test]
    fn test_session_state_changed_roundtrip() {
        roundtrip(&SessionStateChanged {
            param: SessionStateParam::RowsAffected,
            value: Some(Any::Scalar(Scalar::Uint(3))),
        });
        roundtrip(&SessionStateChanged {
            param: SessionStateParam::TrxCommitted,
            value: None,
        });
    }

    #[test]
    fn test_session_state_param_wire_values() {
        for param in [
            SessionStateParam::CurrentSchema,
            SessionStateParam::GeneratedInsertId,
            SessionStateParam::RowsAffected,
            SessionStateParam::ClientIdAssigned,
        ] {
            assert_eq!(
                SessionStateParam::from_wire(param.to_wire()).unwrap(),
                param
            );
        }
        assert!(SessionStateParam::from_wire(8).is_err());
    }
}
