//! # xwire
//!
//! Wire codec and message dispatcher for the MySQL X Protocol.
//!
//! The X Protocol is a length-prefixed, typed-message protocol carried
//! over a reliable byte stream. This crate implements the protocol
//! engine underneath a client (or test server): framing, the staged
//! receive pipeline, message decoding, and dispatch to caller-supplied
//! processors. Session logic, SQL semantics and result cursors live
//! above it; sockets and TLS live below it.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): every message is a 4-byte little-endian
//!   length (which counts the tag byte), a 1-byte type tag, and the
//!   payload.
//! - **Payloads** ([`codec`], [`msg`]): protobuf wire format, decoded
//!   through a per-direction message table into plain Rust structs.
//! - **Engine** ([`connection`]): one [`Connection`] per stream, with at
//!   most one send and one receive operation at a time. Receives are
//!   staged and resumable; server notices are absorbed in passing and
//!   server errors terminate the receive through the error callback.
//! - **Processors** ([`processor`]): synchronous callback sinks the
//!   decoded messages surface through.
//!
//! ## Example
//!
//! ```ignore
//! use xwire::{ClientMessage, Connection, ReadOk, StmtExecute};
//!
//! let stream = tokio::net::TcpStream::connect(("127.0.0.1", 33060)).await?;
//! let mut conn = Connection::client(stream);
//!
//! conn.send(&ClientMessage::StmtExecute(StmtExecute::sql("SELECT 1"))).await?;
//! conn.recv(&mut ReadOk::default(), &mut my_processor).await?;
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod expr;
pub mod msg;
pub mod processor;
pub mod protocol;

pub use connection::{
    Connection, NextMsg, ReadAuthReply, ReadCapabilities, ReadCommand, ReadMetadata, ReadOk,
    ReadRows, RecvStatus, RecvVariant, Side,
};
pub use error::{DecodeError, ProtocolError, Result, ServerError, Severity};
pub use msg::{ClientMessage, Incoming, OutboundMessage, ServerMessage, StmtExecute};
pub use processor::{
    AuthProcessor, CapabilitiesProcessor, CommandProcessor, Flow, Processor, ReplyProcessor,
    ResultProcessor,
};
