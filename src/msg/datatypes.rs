//! Payload codec for the `Datatypes.Scalar` / `Datatypes.Any` messages.
//!
//! These are the value carriers for capability values and statement
//! arguments. The in-memory shapes are [`crate::expr::Scalar`] and
//! [`crate::expr::Any`]; this module binds them to the wire.

use crate::codec::{PayloadReader, PayloadWriter};
use crate::error::DecodeError;
use crate::expr::{Any, Scalar};

use super::PayloadCodec;

// Scalar.Type wire values.
const SCALAR_SINT: u64 = 1;
const SCALAR_UINT: u64 = 2;
const SCALAR_NULL: u64 = 3;
const SCALAR_OCTETS: u64 = 4;
const SCALAR_DOUBLE: u64 = 5;
const SCALAR_FLOAT: u64 = 6;
const SCALAR_BOOL: u64 = 7;
const SCALAR_STRING: u64 = 8;

// Any.Type wire values.
const ANY_SCALAR: u64 = 1;
const ANY_OBJECT: u64 = 2;
const ANY_ARRAY: u64 = 3;

impl PayloadCodec for Scalar {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut ty = None;
        let mut v_sint = None;
        let mut v_uint = None;
        let mut v_octets: Option<Vec<u8>> = None;
        let mut v_double = None;
        let mut v_float = None;
        let mut v_bool = None;
        let mut v_string: Option<(Vec<u8>, Option<u64>)> = None;

        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => ty = Some(r.varint_value(1, wire)?),
                2 => v_sint = Some(r.sint64_value(2, wire)?),
                3 => v_uint = Some(r.varint_value(3, wire)?),
                5 => {
                    let raw = r.bytes_value(5, wire)?;
                    v_octets = Some(decode_octets(raw)?);
                }
                6 => v_double = Some(r.double_value(6, wire)?),
                7 => v_float = Some(r.float_value(7, wire)?),
                8 => v_bool = Some(r.bool_value(8, wire)?),
                9 => {
                    let raw = r.bytes_value(9, wire)?;
                    v_string = Some(decode_string(raw)?);
                }
                _ => r.skip(wire)?,
            }
        }

        match ty.ok_or(DecodeError::MissingField(1))? {
            SCALAR_NULL => Ok(Scalar::Null),
            SCALAR_SINT => v_sint.map(Scalar::Sint).ok_or(DecodeError::MissingField(2)),
            SCALAR_UINT => v_uint.map(Scalar::Uint).ok_or(DecodeError::MissingField(3)),
            SCALAR_OCTETS => v_octets
                .map(Scalar::Octets)
                .ok_or(DecodeError::MissingField(5)),
            SCALAR_DOUBLE => v_double
                .map(Scalar::Double)
                .ok_or(DecodeError::MissingField(6)),
            SCALAR_FLOAT => v_float
                .map(Scalar::Float)
                .ok_or(DecodeError::MissingField(7)),
            SCALAR_BOOL => v_bool.map(Scalar::Bool).ok_or(DecodeError::MissingField(8)),
            SCALAR_STRING => {
                let (data, collation) = v_string.ok_or(DecodeError::MissingField(9))?;
                match collation {
                    Some(charset) => Ok(Scalar::StrWithCharset { charset, data }),
                    None => String::from_utf8(data)
                        .map(Scalar::Str)
                        .map_err(|_| DecodeError::Utf8(9)),
                }
            }
            _ => Err(DecodeError::Enum(1)),
        }
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        match self {
            Scalar::Null => w.uint(1, SCALAR_NULL),
            Scalar::Sint(v) => {
                w.uint(1, SCALAR_SINT);
                w.sint(2, *v);
            }
            Scalar::Uint(v) => {
                w.uint(1, SCALAR_UINT);
                w.uint(3, *v);
            }
            Scalar::Octets(data) => {
                w.uint(1, SCALAR_OCTETS);
                w.nested(5, |o| o.bytes(1, data));
            }
            Scalar::Double(v) => {
                w.uint(1, SCALAR_DOUBLE);
                w.double(6, *v);
            }
            Scalar::Float(v) => {
                w.uint(1, SCALAR_FLOAT);
                w.float(7, *v);
            }
            Scalar::Bool(v) => {
                w.uint(1, SCALAR_BOOL);
                w.boolean(8, *v);
            }
            Scalar::Str(s) => {
                w.uint(1, SCALAR_STRING);
                w.nested(9, |n| n.bytes(1, s.as_bytes()));
            }
            Scalar::StrWithCharset { charset, data } => {
                w.uint(1, SCALAR_STRING);
                w.nested(9, |n| {
                    n.bytes(1, data);
                    n.uint(2, *charset);
                });
            }
        }
    }
}

/// `Datatypes.Octets { value = 1, content_type = 2 }` - content type is
/// not surfaced, the bytes are what upper layers consume.
fn decode_octets(payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut value = None;
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => value = Some(r.bytes_value(1, wire)?.to_vec()),
            _ => r.skip(wire)?,
        }
    }
    value.ok_or(DecodeError::MissingField(1))
}

/// `Datatypes.String { value = 1, collation = 2 }`.
fn decode_string(payload: &[u8]) -> Result<(Vec<u8>, Option<u64>), DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut value = None;
    let mut collation = None;
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => value = Some(r.bytes_value(1, wire)?.to_vec()),
            2 => collation = Some(r.varint_value(2, wire)?),
            _ => r.skip(wire)?,
        }
    }
    Ok((value.ok_or(DecodeError::MissingField(1))?, collation))
}

impl PayloadCodec for Any {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(payload);
        let mut ty = None;
        let mut scalar = None;
        let mut obj = None;
        let mut array = None;

        while let Some((field, wire)) = r.next_field()? {
            match field {
                1 => ty = Some(r.varint_value(1, wire)?),
                2 => scalar = Some(Scalar::decode(r.bytes_value(2, wire)?)?),
                3 => obj = Some(decode_object(r.bytes_value(3, wire)?)?),
                4 => array = Some(decode_array(r.bytes_value(4, wire)?)?),
                _ => r.skip(wire)?,
            }
        }

        match ty.ok_or(DecodeError::MissingField(1))? {
            ANY_SCALAR => scalar
                .map(Any::Scalar)
                .ok_or(DecodeError::MissingField(2)),
            ANY_OBJECT => obj.map(Any::Doc).ok_or(DecodeError::MissingField(3)),
            ANY_ARRAY => array.map(Any::List).ok_or(DecodeError::MissingField(4)),
            _ => Err(DecodeError::Enum(1)),
        }
    }

    fn encode_fields(&self, w: &mut PayloadWriter<'_>) {
        match self {
            Any::Scalar(s) => {
                w.uint(1, ANY_SCALAR);
                w.nested(2, |n| s.encode_fields(n));
            }
            Any::Doc(fields) => {
                w.uint(1, ANY_OBJECT);
                w.nested(3, |o| {
                    for (key, value) in fields {
                        o.nested(1, |fld| {
                            fld.str(1, key);
                            fld.nested(2, |v| value.encode_fields(v));
                        });
                    }
                });
            }
            Any::List(items) => {
                w.uint(1, ANY_ARRAY);
                w.nested(4, |a| {
                    for item in items {
                        a.nested(1, |v| item.encode_fields(v));
                    }
                });
            }
        }
    }
}

/// `Datatypes.Object { fld = 1 }`, each `fld { key = 1, value = 2 }`.
fn decode_object(payload: &[u8]) -> Result<Vec<(String, Any)>, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut fields = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => {
                let raw = r.bytes_value(1, wire)?;
                let mut fr = PayloadReader::new(raw);
                let mut key = None;
                let mut value = None;
                while let Some((f, w)) = fr.next_field()? {
                    match f {
                        1 => key = Some(fr.string_value(1, w)?.to_string()),
                        2 => value = Some(Any::decode(fr.bytes_value(2, w)?)?),
                        _ => fr.skip(w)?,
                    }
                }
                fields.push((
                    key.ok_or(DecodeError::MissingField(1))?,
                    value.ok_or(DecodeError::MissingField(2))?,
                ));
            }
            _ => r.skip(wire)?,
        }
    }
    Ok(fields)
}

/// `Datatypes.Array { value = 1 }`.
fn decode_array(payload: &[u8]) -> Result<Vec<Any>, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let mut items = Vec::new();
    while let Some((field, wire)) = r.next_field()? {
        match field {
            1 => items.push(Any::decode(r.bytes_value(1, wire)?)?),
            _ => r.skip(wire)?,
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip<T: PayloadCodec + PartialEq + std::fmt::Debug>(value: &T) {
        let mut buf = BytesMut::new();
        value.encode_fields(&mut PayloadWriter::new(&mut buf));
        let decoded = T::decode(&buf).unwrap();
        assert_eq!(&decoded, value);

        // Re-serialization is byte-identical.
        let mut buf2 = BytesMut::new();
        decoded.encode_fields(&mut PayloadWriter::new(&mut buf2));
        assert_eq!(buf, buf2);
    }

    #[test]
    fn test_scalar_roundtrips() {
        roundtrip(&Scalar::Null);
        roundtrip(&Scalar::Sint(-42));
        roundtrip(&Scalar::Sint(i64::MIN));
        roundtrip(&Scalar::Uint(u64::MAX));
        roundtrip(&Scalar::Double(3.5));
        roundtrip(&Scalar::Float(-1.25));
        roundtrip(&Scalar::Bool(true));
        roundtrip(&Scalar::Octets(vec![0, 1, 2, 255]));
        roundtrip(&Scalar::Str("hello".into()));
        roundtrip(&Scalar::StrWithCharset {
            charset: 33,
            data: b"utf8mb4".to_vec(),
        });
    }

    #[test]
    fn test_any_roundtrips() {
        roundtrip(&Any::Scalar(Scalar::Sint(7)));
        roundtrip(&Any::List(vec![
            Any::Scalar(Scalar::Bool(false)),
            Any::Scalar(Scalar::Str("x".into())),
        ]));
        roundtrip(&Any::Doc(vec![
            ("tls".into(), Any::Scalar(Scalar::Bool(true))),
            (
                "nested".into(),
                Any::List(vec![Any::Scalar(Scalar::Null)]),
            ),
        ]));
    }

    #[test]
    fn test_scalar_missing_type_rejected() {
        assert_eq!(Scalar::decode(&[]).unwrap_err(), DecodeError::MissingField(1));
    }

    #[test]
    fn test_scalar_missing_value_rejected() {
        // type = SINT but no value field
        let mut buf = BytesMut::new();
        PayloadWriter::new(&mut buf).uint(1, SCALAR_SINT);
        assert_eq!(Scalar::decode(&buf).unwrap_err(), DecodeError::MissingField(2));
    }

    #[test]
    fn test_scalar_bad_type_enum_rejected() {
        let mut buf = BytesMut::new();
        PayloadWriter::new(&mut buf).uint(1, 99);
        assert_eq!(Scalar::decode(&buf).unwrap_err(), DecodeError::Enum(1));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut buf = BytesMut::new();
        {
            let mut w = PayloadWriter::new(&mut buf);
            Scalar::Sint(5).encode_fields(&mut w);
            w.str(100, "future extension");
        }
        assert_eq!(Scalar::decode(&buf).unwrap(), Scalar::Sint(5));
    }
}
