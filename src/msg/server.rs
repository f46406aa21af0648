//! Server-to-client payload structs and codecs.

use bytes::Bytes;

use crate::codec::{PayloadReader, PayloadWriter};
use crate::error::{DecodeError, ServerError, Severity};
use crate::expr::Any;

use super::PayloadCodec;

/// Generic success reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OkMsg {
    /// Optional informational text.
    pub msg: Option<String>,
}

impl PayloadCodec for OkMsg {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut msg = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => msg = Some(r.string_value(1, wire)?.to_string()),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { msg })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        if let Some(msg) = &self.msg {
            w.str(1, msg);
        }
    }
}

// The Error frame decodes straight into ServerError; the engine hands it
// to the error callback rather than surfacing it as a foreground message.
impl PayloadCodec for ServerError {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut severity = Severity::Error;
        let mut code = None;
        let mut msg = None;
        let mut sql_state = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => severity = Severity::from_wire(r.varint_value(1, wire)?),
                2 => code = Some(r.varint_value(2, wire)? as u32),
                3 => msg = Some(r.string_value(3, wire)?.to_string()),
                4 => sql_state = Some(r.string_value(4, wire)?.to_string()),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            code: code.ok_or(DecodeError::MissingField(2))?,
            severity,
            sql_state: sql_state.ok_or(DecodeError::MissingField(4))?,
            msg: msg.ok_or(DecodeError::MissingField(3))?,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, self.severity.to_wire());
        w.uint(2, u64::from(self.code));
        w.str(3, &self.msg);
        w.str(4, &self.sql_state);
    }
}

/// One named capability and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub name: String,
    pub value: Any,
}

impl PayloadCodec for Capability {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut name = None;
        let mut value = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => name = Some(r.string_value(1, wire)?.to_string()),
                2 => value = Some(Any::decode(r.bytes_value(2, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self {
            name: name.ok_or(DecodeError::MissingField(1))?,
            value: value.ok_or(DecodeError::MissingField(2))?,
        })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.str(1, &self.name);
        w.nested(2, |v| self.value.encode_fields(v));
    }
}

/// Capability set reported by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Capabilities {
    pub capabilities: Vec<Capability>,
}

impl Capabilities {
    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<&Any> {
        self.capabilities
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }
}

impl PayloadCodec for Capabilities {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut capabilities = Vec::new();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => capabilities.push(Capability::decode(r.bytes_value(1, wire)?)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { capabilities })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        for cap in &self.capabilities {
            w.nested(1, |c| cap.encode_fields(c));
        }
    }
}

/// Authentication challenge continuation from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateContinue {
    pub auth_data: Bytes,
}

impl PayloadCodec for AuthenticateContinue {
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

/// Authentication success, optionally with final mechanism data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticateOk {
    pub auth_data: Option<Bytes>,
}

impl PayloadCodec for AuthenticateOk {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut auth_data = None;
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => auth_data = Some(Bytes::copy_from_slice(r.bytes_value(1, wire)?)),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { auth_data })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        if let Some(data) = &self.auth_data {
            w.bytes(1, data);
        }
    }
}

/// Column base type reported in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Sint,
    Uint,
    Double,
    Float,
    Bytes,
    Time,
    Datetime,
    Set,
    Enum,
    Bit,
    Decimal,
}

impl FieldType {
    /// Decode the wire value.
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        Ok(match value {
            1 => FieldType::Sint,
            2 => FieldType::Uint,
            5 => FieldType::Double,
            6 => FieldType::Float,
            7 => FieldType::Bytes,
            10 => FieldType::Time,
            12 => FieldType::Datetime,
            15 => FieldType::Set,
            16 => FieldType::Enum,
            17 => FieldType::Bit,
            18 => FieldType::Decimal,
            _ => return Err(DecodeError::Enum(1)),
        })
    }

    /// Wire value for this type.
    pub fn to_wire(self) -> u64 {
        match self {
            FieldType::Sint => 1,
            FieldType::Uint => 2,
            FieldType::Double => 5,
            FieldType::Float => 6,
            FieldType::Bytes => 7,
            FieldType::Time => 10,
            FieldType::Datetime => 12,
            FieldType::Set => 15,
            FieldType::Enum => 16,
            FieldType::Bit => 17,
            FieldType::Decimal => 18,
        }
    }
}

/// Metadata for one result-set column.
///
/// Name-like fields are byte strings on the wire; interpretation is up to
/// the result layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetaData {
    pub field_type: FieldType,
    pub name: Bytes,
    pub original_name: Bytes,
    pub table: Bytes,
    pub original_table: Bytes,
    pub schema: Bytes,
    pub catalog: Bytes,
    pub collation: u64,
    pub fractional_digits: u32,
    pub length: u32,
    pub flags: u32,
    pub content_type: u32,
}

impl ColumnMetaData {
    /// Minimal metadata for a column of the given type and name.
    pub fn new(field_type: FieldType, name: impl AsRef<[u8]>) -> Self {
        Self {
            field_type,
            name: Bytes::copy_from_slice(name.as_ref()),
            original_name: Bytes::new(),
            table: Bytes::new(),
            original_table: Bytes::new(),
            schema: Bytes::new(),
            catalog: Bytes::new(),
            collation: 0,
            fractional_digits: 0,
            length: 0,
            flags: 0,
            content_type: 0,
        }
    }
}

impl PayloadCodec for ColumnMetaData {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut field_type = None;
        let mut meta = ColumnMetaData::new(FieldType::Bytes, b"");
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => field_type = Some(FieldType::from_wire(r.varint_value(1, wire)?)?),
                2 => meta.name = Bytes::copy_from_slice(r.bytes_value(2, wire)?),
                3 => meta.original_name = Bytes::copy_from_slice(r.bytes_value(3, wire)?),
                4 => meta.table = Bytes::copy_from_slice(r.bytes_value(4, wire)?),
                5 => meta.original_table = Bytes::copy_from_slice(r.bytes_value(5, wire)?),
                6 => meta.schema = Bytes::copy_from_slice(r.bytes_value(6, wire)?),
                7 => meta.catalog = Bytes::copy_from_slice(r.bytes_value(7, wire)?),
                8 => meta.collation = r.varint_value(8, wire)?,
                9 => meta.fractional_digits = r.varint_value(9, wire)? as u32,
                10 => meta.length = r.varint_value(10, wire)? as u32,
                11 => meta.flags = r.varint_value(11, wire)? as u32,
                12 => meta.content_type = r.varint_value(12, wire)? as u32,
                _ => r.skip(wire)?,
            }
        }
        meta.field_type = field_type.ok_or(DecodeError::MissingField(1))?;
        Ok(meta)
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        w.uint(1, self.field_type.to_wire());
        if !self.name.is_empty() {
            w.bytes(2, &self.name);
        }
        if !self.original_name.is_empty() {
            w.bytes(3, &self.original_name);
        }
        if !self.table.is_empty() {
            w.bytes(4, &self.table);
        }
        if !self.original_table.is_empty() {
            w.bytes(5, &self.original_table);
        }
        if !self.schema.is_empty() {
            w.bytes(6, &self.schema);
        }
        if !self.catalog.is_empty() {
            w.bytes(7, &self.catalog);
        }
        if self.collation != 0 {
            w.uint(8, self.collation);
        }
        if self.fractional_digits != 0 {
            w.uint(9, u64::from(self.fractional_digits));
        }
        if self.length != 0 {
            w.uint(10, u64::from(self.length));
        }
        if self.flags != 0 {
            w.uint(11, u64::from(self.flags));
        }
        if self.content_type != 0 {
            w.uint(12, u64::from(self.content_type));
        }
    }
}

/// One result-set row: each field is an opaque byte string whose encoding
/// the column metadata determines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub fields: Vec<Bytes>,
}

impl Row {
    /// Row from field byte strings.
    pub fn new(fields: impl IntoIterator<Item = impl AsRef<[u8]>>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|f| Bytes::copy_from_slice(f.as_ref()))
                .collect(),
        }
    }
}

impl PayloadCodec for Row {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut fields = Vec::new();
        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => fields.push(Bytes::copy_from_slice(r.bytes_value(1, wire)?)),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { fields })
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        for field in &self.fields {
            w.bytes(1, field);
        }
    }
}

/// All rows of the current result set have been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchDone;

/// Current result set done, another one follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchDoneMoreResultsets;

/// Statement finished executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StmtExecuteOk;

macro_rules! empty_payload {
    ($($name:ident),+) => {
        $(
            impl PayloadCodec for $name {
                fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
                    // Tolerate unknown fields from newer servers.
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

empty_payload!(FetchDone, FetchDoneMoreResultsets, StmtExecuteOk);

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
    fn test_ok_roundtrip() {
        roundtrip(&OkMsg { msg: None });
        roundtrip(&OkMsg {
            msg: Some("bye!".into()),
        });
    }

    #[test]
    fn test_ok_empty_payload_decodes() {
        assert_eq!(OkMsg::decode(&[]).unwrap(), OkMsg { msg: None });
    }

    #[test]
    fn test_error_roundtrip() {
        roundtrip(&ServerError {
            code: 1045,
            severity: Severity::Fatal,
            sql_state: "28000".into(),
            msg: "Access denied for user".into(),
        });
    }

    #[test]
    fn test_error_requires_code() {
        let mut buf = BytesMut::new();
        {
            let mut w = PayloadWriter::new(&mut buf);
            w.str(3, "oops");
            w.str(4, "HY000");
        }
        assert_eq!(
            ServerError::decode(&buf).unwrap_err(),
            DecodeError::MissingField(2)
        );
    }

    #[test]
    fn test_capabilities_roundtrip_and_lookup() {
        let caps = Capabilities {
            capabilities: vec![
                Capability {
                    name: "tls".into(),
                    value: Any::Scalar(Scalar::Bool(false)),
                },
                Capability {
                    name: "authentication.mechanisms".into(),
                    value: Any::List(vec![
                        Any::Scalar(Scalar::Str("MYSQL41".into())),
                        Any::Scalar(Scalar::Str("PLAIN".into())),
                    ]),
                },
            ],
        };
        roundtrip(&caps);
        assert_eq!(caps.get("tls"), Some(&Any::Scalar(Scalar::Bool(false))));
        assert_eq!(caps.get("nope"), None);
    }

    #[test]
    fn test_auth_roundtrips() {
        roundtrip(&AuthenticateContinue {
            auth_data: Bytes::from_static(b"salt-and-scramble"),
        });
        roundtrip(&AuthenticateOk { auth_data: None });
        roundtrip(&AuthenticateOk {
            auth_data: Some(Bytes::from_static(b"welcome")),
        });
    }

    #[test]
    fn test_column_meta_roundtrip() {
        let mut meta = ColumnMetaData::new(FieldType::Sint, b"id");
        meta.table = Bytes::from_static(b"users");
        meta.schema = Bytes::from_static(b"app");
        meta.collation = 33;
        meta.length = 11;
        meta.flags = 0x10;
        roundtrip(&meta);
    }

    #[test]
    fn test_column_meta_requires_type() {
        let mut buf = BytesMut::new();
        PayloadWriter::new(&mut buf).bytes(2, b"name");
        assert_eq!(
            ColumnMetaData::decode(&buf).unwrap_err(),
            DecodeError::MissingField(1)
        );
    }

    #[test]
    fn test_field_type_wire_values() {
        for ft in [
            FieldType::Sint,
            FieldType::Uint,
            FieldType::Double,
            FieldType::Float,
            FieldType::Bytes,
            FieldType::Time,
            FieldType::Datetime,
            FieldType::Set,
            FieldType::Enum,
            FieldType::Bit,
            FieldType::Decimal,
        ] {
            assert_eq!(FieldType::from_wire(ft.to_wire()).unwrap(), ft);
        }
        assert_eq!(FieldType::from_wire(3).unwrap_err(), DecodeError::Enum(1));
    }

    #[test]
    fn test_row_roundtrip() {
        roundtrip(&Row::new([b"a".as_slice(), b"".as_slice(), b"ccc".as_slice()]));
        roundtrip(&Row::default());
    }

    #[test]
    fn test_empty_messages_tolerate_unknown_fields() {
        let mut buf = BytesMut::new();
        PayloadWriter::new(&mut buf).uint(9, 1);
        assert_eq!(FetchDone::decode(&buf).unwrap(), FetchDone);
        assert_eq!(StmtExecuteOk::decode(&[]).unwrap(), StmtExecuteOk);
    }
}
