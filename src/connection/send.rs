//! The send pipeline: one frame at a time, encoded in place and driven to
//! completion.
//!
//! [`Connection::start_send`] serializes the message into `wr_buf` behind
//! a 5-byte header slot, patches the header, and registers the send;
//! [`Connection::finish_send`] pushes the bytes out with plain `write`
//! calls, tracking progress so a dropped future can be resumed. A second
//! `start_send` while one is in flight fails with `Busy` and leaves the
//! in-flight bytes untouched. Cancellation is not supported - abandoning
//! a half-written frame desyncs the stream, so the only exits are
//! completion or teardown.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::msg::OutboundMessage;
use crate::protocol::{FrameHeader, HEADER_SIZE};

use super::Connection;

/// Progress of the in-flight send.
#[derive(Debug, Clone, Copy)]
pub struct SendState {
    written: usize,
    len: usize,
}

impl SendState {
    /// Bytes of the frame already handed to the stream.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Total frame size (header plus payload).
    pub fn len(&self) -> usize {
        self.len
    }

    /// True only for the degenerate frame-of-nothing, which never occurs.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<S: AsyncWrite + Unpin> Connection<S> {
    /// Encode `msg` into the write buffer and register the send.
    ///
    /// Fails with [`ProtocolError::Busy`] if a send is already in flight
    /// and with [`ProtocolError::Oversize`] if the serialized frame would
    /// exceed the frame limit; neither failure touches in-flight bytes.
    pub fn start_send(&mut self, msg: &impl OutboundMessage) -> Result<()> {
        if self.send.is_some() {
            return Err(ProtocolError::Busy);
        }

        self.wr_buf.clear();
        self.wr_buf.resize(HEADER_SIZE, 0);
        msg.encode_payload(&mut self.wr_buf);

        let payload_len = self.wr_buf.len() - HEADER_SIZE;
        let length = payload_len as u64 + 1;
        if length > u64::from(self.max_frame) {
            self.wr_buf.clear();
            return Err(ProtocolError::Oversize {
                length,
                max: u64::from(self.max_frame),
            });
        }

        let header = FrameHeader {
            length: length as u32,
            msg_type: msg.msg_type(),
        };
        header.encode_into(&mut self.wr_buf[..HEADER_SIZE]);

        tracing::trace!("send started: type {} payload {}", header.msg_type, payload_len);
        self.send = Some(SendState {
            written: 0,
            len: HEADER_SIZE + payload_len,
        });
        Ok(())
    }

    /// Drive the in-flight send to completion and release the slot.
    ///
    /// Progress survives a dropped future: calling again resumes from the
    /// last completed `write`. A no-op when nothing is in flight.
    pub async fn finish_send(&mut self) -> Result<()> {
        loop {
            let (written, len) = match &self.send {
                Some(state) => (state.written, state.len),
                None => return Ok(()),
            };
            if written == len {
                break;
            }

            let n = self.stream.write(&self.wr_buf[written..len]).await?;
            if n == 0 {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "stream accepted no bytes",
                )));
            }
            if let Some(state) = self.send.as_mut() {
                state.written += n;
            }
        }

        self.stream.flush().await?;
        self.send = None;
        Ok(())
    }

    /// Send one message: `start_send` followed by `finish_send`.
    pub async fn send(&mut self, msg: &impl OutboundMessage) -> Result<()> {
        self.start_send(msg)?;
        self.finish_send().await
    }
}
