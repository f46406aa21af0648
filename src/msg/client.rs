//! Client-to-server payload structs and codecs.

use bytes::Bytes;

use crate::codec::{PayloadReader, PayloadWriter};
use crate::error::DecodeError;
use crate::expr::Any;

use super::server::Capabilities;
use super::PayloadCodec;

/// Request the server's capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitiesGet;

/// Change capabilities on the connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CapabilitiesSet {
    pub capabilities: Capabilities,
}

impl PayloadCodec for CapabilitiesSet {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut capabilities = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => capabilities = Some(Capabilities::decode(r.bytes_value(1, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            capabilities: capabilities.ok_or(DecodeError::MissingField(1))?,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.nested(1, |c| self.capabilities.encode_fields(c));
    }
}

/// Close the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConClose;

/// Begin authentication with the named SASL mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateStart {
    pub mech_name: String,
    pub auth_data: Option<Bytes>,
    pub initial_response: Option<Bytes>,
}

impl AuthenticateStart {
    /// Start with a mechanism and no initial data.
    pub fn new(mech_name: impl Into<String>) -> Self {
        Self {
            mech_name: mech_name.into(),
            auth_data: None,
            initial_response: None,
        }
    }
}

impl PayloadCodec for AuthenticateStart {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut mech_name = None;
        let mut auth_data = None;
        let mut initial_response = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => mech_name = Some(r.string_value(1, wire)?.to_string()),
                2 => auth_data = Some(Bytes::copy_from_slice(r.bytes_value(2, wire)?)),
                3 => initial_response = Some(Bytes::copy_from_slice(r.bytes_value(3, wire)?)),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            mech_name: mech_name.ok_or(DecodeError::MissingField(1))?,
            auth_data,
            initial_response,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.str(1, &self.mech_name);
        if let Some(data) = &self.auth_data {
            w.bytes(2, data);
        }
        if let Some(data) = &self.initial_response {
            w.bytes(3, data);
        }
    }
}

/// Client half of an authentication exchange round.
///
/// Same payload shape as the server's continuation, but a distinct type
/// tag and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAuthenticateContinue {
    pub auth_data: Bytes,
}

impl PayloadCodec for SessionAuthenticateContinue {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut auth_data = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => auth_data = Some(Bytes::copy_from_slice(r.bytes_value(1, wire)?)),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            auth_data: auth_data.ok_or(DecodeError::MissingField(1))?,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.bytes(1, &self.auth_data);
    }
}

/// Reset session state, optionally keeping the connection authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionReset {
    pub keep_open: bool,
}

impl PayloadCodec for SessionReset {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut keep_open = false;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => keep_open = r.bool_value(1, wire)?,
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { keep_open })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        if self.keep_open {
            w.boolean(1, true);
        }
    }
}

/// Close the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionClose;

/// Execute a statement in a namespace (default `sql`).
#[derive(Debug, Clone, PartialEq)]
pub struct StmtExecute {
    pub stmt: Bytes,
    pub args: Vec<Any>,
    pub namespace: Option<String>,
    pub compact_metadata: bool,
}

impl StmtExecute {
    /// SQL statement with no arguments.
    pub fn sql(stmt: impl AsRef<[u8]>) -> Self {
        Self {
            stmt: Bytes::copy_from_slice(stmt.as_ref()),
            args: Vec::new(),
            namespace: None,
            compact_metadata: false,
        }
    }
}

impl PayloadCodec for StmtExecute {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut stmt = None;
        let mut args = Vec::new();
        let mut namespace = None;
        let mut compact_metadata = false;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => stmt = Some(Bytes::copy_from_slice(r.bytes_value(1, wire)?)),
                2 => args.push(Any::decode(r.bytes_value(2, wire)?)?),
                3 => namespace = Some(r.string_value(3, wire)?.to_string()),
                4 => compact_metadata = r.bool_value(4, wire)?,
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            stmt: stmt.ok_or(DecodeError::MissingField(1))?,
            args,
            namespace,
            compact_metadata,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.bytes(1, &self.stmt);
        for arg in &self.args {
            w.nested(2, |a| arg.encode_fields(a));
        }
        if let Some(ns) = &self.namespace {
            w.str(3, ns);
        }
        if self.compact_metadata {
            w.boolean(4, true);
        }
    }
}

/// How an expectation block inherits conditions from the enclosing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectCtxOp {
    /// Copy the conditions of the enclosing block.
    #[default]
    CopyPrev,
    /// Start with no conditions.
    Empty,
}

impl ExpectCtxOp {
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            0 => ExpectCtxOp::CopyPrev,
            1 => ExpectCtxOp::Empty,
            _ => return Err(DecodeError::Enum(1)),
        })
    }

    pub fn to_wire(self) -> u64 {
        match self {
            ExpectCtxOp::CopyPrev => 0,
            ExpectCtxOp::Empty => 1,
        }
    }
}

/// One condition inside an expectation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectCondition {
    pub key: u32,
    pub value: Option<Bytes>,
    /// true = unset the condition, false = set it.
    pub unset: bool,
}

impl ExpectCondition {
    /// The `no_error` condition key.
    pub const NO_ERROR: u32 = 1;

    /// Set a condition with no value.
    pub fn set(key: u32) -> Self {
        Self {
            key,
            value: None,
            unset: false,
        }
    }
}

impl PayloadCodec for ExpectCondition {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut key = None;
        let mut value = None;
        let mut unset = false;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => key = Some(r.varint_value(1, wire)? as u32),
                2 => value = Some(Bytes::copy_from_slice(r.bytes_value(2, wire)?)),
                3 => unset = r.varint_value(3, wire)? == 1,
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            key: key.ok_or(DecodeError::MissingField(1))?,
            value,
            unset,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, u64::from(self.key));
        if let Some(value) = &self.value {
            w.bytes(2, value);
        }
        if self.unset {
            w.uint(3, 1);
        }
    }
}

/// Open an expectation block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpectOpen {
    pub op: ExpectCtxOp,
    pub conditions: Vec<ExpectCondition>,
}

impl PayloadCodec for ExpectOpen {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut op = ExpectCtxOp::CopyPrev;
        let mut conditions = Vec::new();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => op = ExpectCtxOp::from_wire(r.varint_value(1, wire)?)?,
                2 => conditions.push(ExpectCondition::decode(r.bytes_value(2, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { op, conditions })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        if self.op != ExpectCtxOp::CopyPrev {
            w.uint(1, self.op.to_wire());
        }
        for cond in &self.conditions {
            w.nested(2, |c| cond.encode_fields(c));
        }
    }
}

/// Close the innermost expectation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpectClose;

macro_rules! empty_payload {
    ($($name:ident),+) => {
        $(
            impl PayloadCodec for $name {
                fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
                    let mut r = PayloadReader::new(payload);
                    while let Some((_, wire)) = r.next_field()? {
                        r.skip(wire)?;
                    }
                    Ok(Self)
                }

                fn encode_fields(&self, _w: &mut PayloadWriter<'_>) {}
            }
        )+
    };
}

empty_payload!(CapabilitiesGet, ConClose, SessionClose, ExpectClose);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Scalar;
    use crate::msg::server::Capability;
    use bytes::BytesMut;

    fn roundtrip<T: PayloadCodec + PartialEq + std::fmt::Debug>(value: &T) {
        let mut buf = BytesMut::new();
        value.encode_fields(&mut PayloadWriter::new(&mut buf));
        assert_eq!(&T::decode(&buf).unwrap(), value);
    }

    #[test]
    fn test_capabilities_set_roundtrip() {
        roundtrip(&CapabilitiesSet {
            capabilities: Capabilities {
                capabilities: vec![Capability {
                    name: "tls".into(),
                    value: Any::Scalar(Scalar::Bool(true)),
                }],
            },
        });
    }

    #[test]
    fn test_capabilities_set_requires_capabilities() {
        assert_eq!(
            CapabilitiesSet::decode(&[]).unwrap_err(),
            DecodeError::MissingField(1)
        );
    }

    #[test]
    fn test_authenticate_start_roundtrip() {
        roundtrip(&AuthenticateStart::new("MYSQL41"));
        roundtrip(&AuthenticateStart {
            mech_name: "PLAIN".into(),
            auth_data: Some(Bytes::from_static(b"\0user\0pass")),
            initial_response: Some(Bytes::from_static(b"ir")),
        });
    }

    #[test]
    fn test_authenticate_continue_roundtrip() {
        roundtrip(&SessionAuthenticateContinue {
            auth_data: Bytes::from_static(b"scramble-response"),
        });
    }

    #[test]
    fn test_session_reset_roundtrip() {
        roundtrip(&SessionReset { keep_open: false });
        roundtrip(&SessionReset { keep_open: true });
        // Default encoding omits the field entirely.
        let mut buf = BytesMut::new();
        SessionReset { keep_open: false }.encode_fields(&mut PayloadWriter::new(&mut buf));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_stmt_execute_roundtrip() {
        roundtrip(&StmtExecute::sql("SELECT 1"));
        roundtrip(&StmtExecute {
            stmt: Bytes::from_static(b"SELECT * FROM t WHERE id = ?"),
            args: vec![Any::Scalar(Scalar::Sint(42))],
            namespace: Some("sql".into()),
            compact_metadata: true,
        });
    }

    #[test]
    fn test_stmt_execute_requires_stmt() {
        assert_eq!(
            StmtExecute::decode(&[]).unwrap_err(),
            DecodeError::MissingField(1)
        );
    }

    #[test]
    fn test_expect_open_roundtrip() {
        roundtrip(&ExpectOpen::default());
        roundtrip(&ExpectOpen {
            op: ExpectCtxOp::Empty,
            conditions: vec![
                ExpectCondition::set(ExpectCondition::NO_ERROR),
                ExpectCondition {
                    key: 2,
                    value: Some(Bytes::from_static(b"42")),
                    unset: true,
                },
            ],
        });
    }

    #[test]
    fn test_empty_client_messages() {
        roundtrip(&CapabilitiesGet);
        roundtrip(&ConClose);
        roundtrip(&SessionClose);
        roundtrip(&ExpectClose);
    }
}
