//! The protocol engine: one stream, one send slot, one receive pipeline.
//!
//! [`Connection`] owns a byte stream and the two reusable frame buffers,
//! and drives the send and receive pipelines over it. It is generic over
//! `S`; anything `AsyncRead + AsyncWrite + Unpin` works (a TCP or TLS
//! stream in production, `tokio::io::duplex` in tests). The engine is
//! single-threaded cooperative: it spawns no tasks and takes no locks,
//! and suspends only inside the `read`/`write` futures of the stream.
//!
//! A connection plays one of two roles, fixed at construction:
//!
//! - [`Connection::client`] decodes messages *from the server* - the
//!   normal case;
//! - [`Connection::server`] decodes messages *from the client* - used for
//!   testing and forwarding.
//!
//! At most one send and one receive operation exist at any instant; the
//! `&mut self` receivers enforce the exclusion without locking, and the
//! explicit send slot turns a second concurrent send into a `Busy` error
//! rather than interleaved frames.

mod recv;
mod send;

pub use recv::{
    NextMsg, ReadAuthReply, ReadCapabilities, ReadCommand, ReadMetadata, ReadOk, ReadRows,
    RecvStatus, RecvVariant,
};
pub use send::SendState;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProtocolError, Result};
use crate::protocol::{FrameHeader, HEADER_SIZE, INITIAL_BUF_CAPACITY, MAX_FRAME_SIZE};

/// The side of the conversation this engine receives messages from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Receiving server messages (client role).
    Server,
    /// Receiving client messages (server role).
    Client,
}

/// Protocol engine over a byte stream.
pub struct Connection<S> {
    stream: S,
    side: Side,
    max_frame: u32,
    rd_buf: BytesMut,
    wr_buf: BytesMut,
    /// In-flight send, if any.
    send: Option<SendState>,
    /// Header consumed by a receive stage that stopped before the payload;
    /// the next stage resumes here instead of reading a new header.
    pending: Option<FrameHeader>,
}

impl<S> Connection<S> {
    /// Client-role engine: decodes messages arriving from the server.
    pub fn client(stream: S) -> Self {
        Self::new(stream, Side::Server)
    }

    /// Server-role engine: decodes messages arriving from the client.
    pub fn server(stream: S) -> Self {
        Self::new(stream, Side::Client)
    }

    fn new(stream: S, side: Side) -> Self {
        Self {
            stream,
            side,
            max_frame: MAX_FRAME_SIZE,
            rd_buf: BytesMut::with_capacity(INITIAL_BUF_CAPACITY),
            wr_buf: BytesMut::with_capacity(INITIAL_BUF_CAPACITY),
            send: None,
            pending: None,
        }
    }

    /// Lower the frame size limit (clamped to the protocol cap).
    pub fn with_max_frame(mut self, max_frame: u32) -> Self {
        self.max_frame = max_frame.min(MAX_FRAME_SIZE);
        self
    }

    /// The side this engine receives messages from.
    pub fn side(&self) -> Side {
        self.side
    }

    /// True while a started send has not been driven to completion.
    pub fn send_in_flight(&self) -> bool {
        self.send.is_some()
    }

    /// Tear down the engine and return the stream.
    ///
    /// An outstanding send is lost and a suspended receive drops its
    /// position; the stream itself may be mid-frame.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: AsyncRead + Unpin> Connection<S> {
    /// Read and validate one frame header.
    async fn read_header(&mut self) -> Result<FrameHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        self.stream
            .read_exact(&mut raw)
            .await
            .map_err(map_read_err)?;
        let header = FrameHeader::decode(&raw).expect("buffer holds a full header");
        header.validate(self.max_frame)?;
        tracing::trace!(
            "frame header: type {} payload {}",
            header.msg_type,
            header.payload_len()
        );
        Ok(header)
    }

    /// Read exactly `len` payload bytes into `rd_buf`.
    ///
    /// The buffer grows on demand and keeps its capacity afterwards; the
    /// header validation has already bounded `len`.
    async fn read_payload(&mut self, len: usize) -> Result<()> {
        self.rd_buf.clear();
        self.rd_buf.resize(len, 0);
        self.stream
            .read_exact(&mut self.rd_buf[..len])
            .await
            .map_err(map_read_err)?;
        Ok(())
    }
}

/// A short read means the peer closed mid-frame.
fn map_read_err(err: std::io::Error) -> ProtocolError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::Eos
    } else {
        ProtocolError::Io(err)
    }
}
