//! Message registry - type tags, payload structs, and the decode tables.
//!
//! Every message the protocol defines is enumerated exactly once per
//! direction in a [`message_table!`] invocation, which expands into the
//! [`ServerMessage`] / [`ClientMessage`] enums, the total decode switch
//! keyed on the type tag (unknown tags hit the `UnknownMessage` default
//! arm), and the outbound tag/payload accessors. The engine consults the
//! table for the direction it was constructed with; callers match on the
//! decoded enums or receive them through typed processor callbacks.

pub mod client;
pub mod crud;
pub mod datatypes;
pub mod notice;
pub mod server;

use bytes::BytesMut;

use crate::codec::PayloadWriter;
use crate::error::{DecodeError, ProtocolError, Result, ServerError};

pub use client::{
    AuthenticateStart, CapabilitiesGet, CapabilitiesSet, ConClose, ExpectClose, ExpectCondition,
    ExpectCtxOp, ExpectOpen, SessionAuthenticateContinue, SessionClose, SessionReset, StmtExecute,
};
pub use crud::{
    Collection, Column, ColumnIdentifier, CrudDelete, CrudFind, CrudInsert, CrudUpdate, DataModel,
    Limit, Order, Projection, SortDirection, TypedRow, UpdateOperation, UpdateType,
};
pub use notice::{NoticeFrame, NoticeScope, SessionStateChanged, SessionVariableChanged, Warning};
pub use server::{
    AuthenticateContinue, AuthenticateOk, Capabilities, Capability, ColumnMetaData, FetchDone,
    FetchDoneMoreResultsets, FieldType, OkMsg, Row, StmtExecuteOk,
};

/// Numeric type tags, one namespace per direction.
pub mod tags {
    /// Tags on messages the server sends.
    pub mod server {
        pub const OK: u8 = 0;
        pub const ERROR: u8 = 1;
        pub const CAPABILITIES: u8 = 2;
        pub const AUTHENTICATE_CONTINUE: u8 = 3;
        pub const AUTHENTICATE_OK: u8 = 4;
        pub const NOTICE: u8 = 11;
        pub const COLUMN_META_DATA: u8 = 12;
        pub const ROW: u8 = 13;
        pub const FETCH_DONE: u8 = 14;
        pub const FETCH_DONE_MORE_RESULTSETS: u8 = 16;
        pub const STMT_EXECUTE_OK: u8 = 17;
    }

    /// Tags on messages the client sends.
    pub mod client {
        pub const CAPABILITIES_GET: u8 = 1;
        pub const CAPABILITIES_SET: u8 = 2;
        pub const CON_CLOSE: u8 = 3;
        pub const AUTHENTICATE_START: u8 = 4;
        pub const AUTHENTICATE_CONTINUE: u8 = 5;
        pub const SESSION_RESET: u8 = 6;
        pub const SESSION_CLOSE: u8 = 7;
        pub const STMT_EXECUTE: u8 = 12;
        pub const CRUD_FIND: u8 = 17;
        pub const CRUD_INSERT: u8 = 18;
        pub const CRUD_UPDATE: u8 = 19;
        pub const CRUD_DELETE: u8 = 20;
        pub const EXPECT_OPEN: u8 = 24;
        pub const EXPECT_CLOSE: u8 = 25;
    }
}

/// Payload codec implemented by every message and submessage.
///
/// `decode` parses a complete payload; `encode_fields` appends the
/// message's fields to a writer (the caller owns framing and nesting).
pub trait PayloadCodec: Sized {
    fn decode(payload: &[u8]) -> std::result::Result<Self, DecodeError>;
    fn encode_fields(&self, w: &mut PayloadWriter<'_>);
}

/// A message the engine can put on the wire.
pub trait OutboundMessage {
    /// Type tag for the frame header.
    fn msg_type(&self) -> u8;
    /// Serialize the payload (everything after the 5-byte header).
    fn encode_payload(&self, buf: &mut BytesMut);
}

/// Declarative message table: one line per message, expanded into the
/// direction enum, the total decode switch, and the outbound accessors.
macro_rules! message_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident($payload:ty) = $tag:path, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $name {
            $( $variant($payload), )+
        }

        impl $name {
            /// Decode a payload by type tag.
            ///
            /// The switch is total: every tag of this direction has an
            /// arm, and anything else is `UnknownMessage`.
            pub fn decode(msg_type: u8, payload: &[u8]) -> Result<Self> {
                match msg_type {
                    $(
                        $tag => <$payload as PayloadCodec>::decode(payload)
                            .map($name::$variant)
                            .map_err(|reason| ProtocolError::Decode { msg_type, reason }),
                    )+
                    _ => Err(ProtocolError::UnknownMessage { msg_type }),
                }
            }

            /// Type tag this message travels under.
            pub fn msg_type(&self) -> u8 {
                match self {
                    $( $name::$variant(_) => $tag, )+
                }
            }
        }

        impl OutboundMessage for $name {
            fn msg_type(&self) -> u8 {
                $name::msg_type(self)
            }

            fn encode_payload(&self, buf: &mut BytesMut) {
                let mut w = PayloadWriter::new(buf);
                match self {
                    $( $name::$variant(msg) => msg.encode_fields(&mut w), )+
                }
            }
        }
    };
}

message_table! {
    /// Messages a client-role engine receives from the server.
    pub enum ServerMessage {
        Ok(OkMsg) = tags::server::OK,
        Error(ServerError) = tags::server::ERROR,
        Capabilities(Capabilities) = tags::server::CAPABILITIES,
        AuthenticateContinue(AuthenticateContinue) = tags::server::AUTHENTICATE_CONTINUE,
        AuthenticateOk(AuthenticateOk) = tags::server::AUTHENTICATE_OK,
        Notice(NoticeFrame) = tags::server::NOTICE,
        ColumnMetaData(ColumnMetaData) = tags::server::COLUMN_META_DATA,
        Row(Row) = tags::server::ROW,
        FetchDone(FetchDone) = tags::server::FETCH_DONE,
        FetchDoneMoreResultsets(FetchDoneMoreResultsets) = tags::server::FETCH_DONE_MORE_RESULTSETS,
        StmtExecuteOk(StmtExecuteOk) = tags::server::STMT_EXECUTE_OK,
    }
}

message_table! {
    /// Messages a server-role engine receives from the client.
    pub enum ClientMessage {
        CapabilitiesGet(CapabilitiesGet) = tags::client::CAPABILITIES_GET,
        CapabilitiesSet(CapabilitiesSet) = tags::client::CAPABILITIES_SET,
        ConClose(ConClose) = tags::client::CON_CLOSE,
        AuthenticateStart(AuthenticateStart) = tags::client::AUTHENTICATE_START,
        AuthenticateContinue(SessionAuthenticateContinue) = tags::client::AUTHENTICATE_CONTINUE,
        SessionReset(SessionReset) = tags::client::SESSION_RESET,
        SessionClose(SessionClose) = tags::client::SESSION_CLOSE,
        StmtExecute(StmtExecute) = tags::client::STMT_EXECUTE,
        CrudFind(CrudFind) = tags::client::CRUD_FIND,
        CrudInsert(CrudInsert) = tags::client::CRUD_INSERT,
        CrudUpdate(CrudUpdate) = tags::client::CRUD_UPDATE,
        CrudDelete(CrudDelete) = tags::client::CRUD_DELETE,
        ExpectOpen(ExpectOpen) = tags::client::EXPECT_OPEN,
        ExpectClose(ExpectClose) = tags::client::EXPECT_CLOSE,
    }
}

/// A decoded message of either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Decoded with the server-side half of the table.
    Server(ServerMessage),
    /// Decoded with the client-side half of the table.
    Client(ClientMessage),
}

impl Incoming {
    /// Type tag the message arrived under.
    pub fn msg_type(&self) -> u8 {
        match self {
            Incoming::Server(m) => m.msg_type(),
            Incoming::Client(m) => m.msg_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;

    fn payload_of(msg: &impl OutboundMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        msg.encode_payload(&mut buf);
        buf
    }

    #[test]
    fn test_server_decode_dispatches_by_tag() {
        let ok = ServerMessage::Ok(OkMsg {
            msg: Some("done".into()),
        });
        let buf = payload_of(&ok);
        let decoded = ServerMessage::decode(tags::server::OK, &buf).unwrap();
        assert_eq!(decoded, ok);
        assert_eq!(decoded.msg_type(), tags::server::OK);
    }

    #[test]
    fn test_unknown_server_tag() {
        let err = ServerMessage::decode(0xEE, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnknownMessage { msg_type: 0xEE }
        ));
    }

    #[test]
    fn test_unknown_client_tag() {
        // Tag 0 is unused on the client side.
        let err = ClientMessage::decode(0, &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessage { msg_type: 0 }));
    }

    #[test]
    fn test_decode_failure_carries_tag_and_reason() {
        // Error payload missing its required fields.
        let err = ServerMessage::decode(tags::server::ERROR, &[]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Decode {
                msg_type: 1,
                reason: DecodeError::MissingField(_)
            }
        ));
    }

    #[test]
    fn test_error_message_roundtrip() {
        let msg = ServerMessage::Error(ServerError {
            code: 1045,
            severity: Severity::Error,
            sql_state: "28000".into(),
            msg: "Access denied".into(),
        });
        let buf = payload_of(&msg);
        let decoded = ServerMessage::decode(tags::server::ERROR, &buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_incoming_msg_type() {
        let inc = Incoming::Server(ServerMessage::FetchDone(FetchDone));
        assert_eq!(inc.msg_type(), tags::server::FETCH_DONE);

        let inc = Incoming::Client(ClientMessage::SessionClose(SessionClose));
        assert_eq!(inc.msg_type(), tags::client::SESSION_CLOSE);
    }
}
