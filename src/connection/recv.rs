//! The staged receive state machine.
//!
//! One call to [`Connection::recv`] runs one *stage* of a logical receive:
//! it loops header → payload → dispatch over incoming frames until the
//! active [`RecvVariant`] finishes the operation, stops it, or an error
//! surfaces. Notices never end a stage on their own and an Error frame
//! always does; everything in between is variant policy.
//!
//! Frame position is kept on the connection, not in the variant: a stage
//! that stops at a header leaves it pending, and the next stage - possibly
//! under a different variant - resumes directly at the payload. Calling
//! `recv` again after a completed stage is therefore always safe: nothing
//! is decoded twice and no frame is lost.
//!
//! Errors observed mid-stage (unexpected or unknown message types, decode
//! failures) are deferred: the offending payload is drained so the stream
//! stays framed, and the error is raised exactly once when the stage
//! completes.

use tokio::io::AsyncRead;

use crate::error::{ProtocolError, Result};
use crate::msg::{tags, ClientMessage, Incoming, ServerMessage};
use crate::processor::{
    AuthProcessor, CapabilitiesProcessor, CommandProcessor, Flow, Processor, ReplyProcessor,
    ResultProcessor,
};

use super::{Connection, Side};

/// Outcome of one receive stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// The logical receive finished; the next `recv` starts a new one.
    Done,
    /// The stage finished but the operation is still live; call `recv`
    /// again to resume it.
    Suspended,
}

impl RecvStatus {
    /// True once the logical receive finished.
    pub fn is_done(&self) -> bool {
        matches!(self, RecvStatus::Done)
    }
}

/// Verdict on a frame header before its payload is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextMsg {
    /// Read and dispatch the payload.
    Expected,
    /// Not valid here: drain the payload and raise `UnexpectedMessage` at
    /// the stage boundary.
    Unexpected,
    /// Finish the stage with the header consumed; the next stage resumes
    /// at this frame's payload.
    Stop,
}

/// Policy of one receive operation: which message types are expected,
/// how decoded messages reach the processor, and when to keep reading.
///
/// Error and Notice frames (when receiving from a server) never reach the
/// variant; the engine handles them before consulting it.
pub trait RecvVariant<P: Processor + ?Sized> {
    /// Classify a frame by its type tag. The default expects nothing.
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        let _ = msg_type;
        NextMsg::Unexpected
    }

    /// Hand a decoded foreground message to the processor.
    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()>;

    /// After dispatching a foreground message: keep reading frames in this
    /// stage? The default finishes the operation after one message.
    fn read_more(&mut self, msg_type: u8) -> bool {
        let _ = msg_type;
        false
    }
}

impl<S: AsyncRead + Unpin> Connection<S> {
    /// Run one stage of a receive operation under `variant`, reporting to
    /// `prc`. See the module docs for the staging rules.
    pub async fn recv<V, P>(&mut self, variant: &mut V, prc: &mut P) -> Result<RecvStatus>
    where
        V: RecvVariant<P>,
        P: Processor + ?Sized,
    {
        loop {
            // Header stage: resume a pending frame or read a new header.
            let header = match self.pending.take() {
                Some(header) => header,
                None => self.read_header().await?,
            };
            let msg_type = header.msg_type;

            // Error and Notice are always accepted from a server; other
            // tags are variant policy. A server-role engine routes every
            // tag through the variant (client tag 1 is CapabilitiesGet,
            // not Error).
            let cross_cutting = self.side == Side::Server
                && (msg_type == tags::server::ERROR || msg_type == tags::server::NOTICE);

            let mut deferred: Option<ProtocolError> = None;
            let mut skip = false;
            if !cross_cutting {
                match variant.next_msg(msg_type) {
                    NextMsg::Expected => {}
                    NextMsg::Stop => {
                        self.pending = Some(header);
                        return Ok(RecvStatus::Suspended);
                    }
                    NextMsg::Unexpected => {
                        tracing::warn!("unexpected message type {}, skipping frame", msg_type);
                        deferred = Some(ProtocolError::UnexpectedMessage { msg_type });
                        skip = true;
                    }
                }
            }

            // Payload stage: skipped frames are drained, nothing more.
            let payload_len = header.payload_len();
            self.read_payload(payload_len).await?;

            // Dispatch stage.
            let mut error_frame = false;
            let mut flow = Flow::Continue;
            if !skip {
                let decoded = match self.side {
                    Side::Server => {
                        ServerMessage::decode(msg_type, &self.rd_buf[..payload_len])
                            .map(Incoming::Server)
                    }
                    Side::Client => {
                        ClientMessage::decode(msg_type, &self.rd_buf[..payload_len])
                            .map(Incoming::Client)
                    }
                };

                match decoded {
                    Err(err) => {
                        tracing::warn!("dropping frame of type {}: {}", msg_type, err);
                        deferred = Some(err);
                    }
                    Ok(incoming) => {
                        prc.message_begin(msg_type, payload_len);
                        if prc.wants_raw() {
                            prc.raw_payload(&self.rd_buf[..payload_len]);
                        }
                        match incoming {
                            Incoming::Server(ServerMessage::Error(err)) => {
                                tracing::debug!("server error {}: {}", err.code, err.msg);
                                error_frame = true;
                                prc.error(err);
                            }
                            Incoming::Server(ServerMessage::Notice(frame)) => {
                                prc.notice(frame.ty, frame.scope, &frame.payload);
                            }
                            other => {
                                if let Err(err) = variant.dispatch(&other, prc) {
                                    deferred = Some(err);
                                }
                            }
                        }
                        flow = prc.message_end();
                    }
                }
            }

            // Continuation: deferred errors surface at the stage boundary
            // and terminate the logical receive with the stream idle at
            // the next header.
            if let Some(err) = deferred {
                return Err(err);
            }
            if error_frame {
                return Ok(RecvStatus::Done);
            }
            if self.side == Side::Server && msg_type == tags::server::NOTICE {
                if flow == Flow::Stop {
                    return Ok(RecvStatus::Suspended);
                }
                continue;
            }
            if !variant.read_more(msg_type) {
                return Ok(RecvStatus::Done);
            }
            if flow == Flow::Stop {
                return Ok(RecvStatus::Suspended);
            }
        }
    }
}

/// Rejection shared by the variant dispatchers' fallback arms. The tag was
/// whitelisted by `next_msg`, so reaching the fallback means the whitelist
/// and the dispatcher disagree.
fn unexpected(msg: &Incoming) -> ProtocolError {
    ProtocolError::UnexpectedMessage {
        msg_type: msg.msg_type(),
    }
}

/// Expects a single Ok reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOk;

impl<P: ReplyProcessor + ?Sized> RecvVariant<P> for ReadOk {
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        match msg_type {
            tags::server::OK => NextMsg::Expected,
            _ => NextMsg::Unexpected,
        }
    }

    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()> {
        match msg {
            Incoming::Server(ServerMessage::Ok(ok)) => {
                prc.ok(ok);
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }
}

/// Expects a single Capabilities reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCapabilities;

impl<P: CapabilitiesProcessor + ?Sized> RecvVariant<P> for ReadCapabilities {
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        match msg_type {
            tags::server::CAPABILITIES => NextMsg::Expected,
            _ => NextMsg::Unexpected,
        }
    }

    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()> {
        match msg {
            Incoming::Server(ServerMessage::Capabilities(caps)) => {
                prc.capabilities(caps);
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }
}

/// Expects one round of an authentication exchange: either a challenge to
/// answer or the final Ok.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadAuthReply;

impl<P: AuthProcessor + ?Sized> RecvVariant<P> for ReadAuthReply {
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        match msg_type {
            tags::server::AUTHENTICATE_CONTINUE | tags::server::AUTHENTICATE_OK => {
                NextMsg::Expected
            }
            _ => NextMsg::Unexpected,
        }
    }

    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()> {
        match msg {
            Incoming::Server(ServerMessage::AuthenticateContinue(cont)) => {
                prc.auth_continue(&cont.auth_data);
                Ok(())
            }
            Incoming::Server(ServerMessage::AuthenticateOk(ok)) => {
                prc.auth_ok(ok.auth_data.as_deref().unwrap_or(&[]));
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }
}

/// Reads column metadata until the result set's shape is known.
///
/// Loops over ColumnMetaData frames. The first Row header stops the stage
/// so a row-reading operation resumes at that frame; FetchDone,
/// FetchDoneMoreResultsets and StmtExecuteOk terminate metadata directly
/// (empty result set or no result set at all).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadMetadata {
    /// Columns seen so far in this result set.
    pub columns: u32,
}

impl<P: ResultProcessor + ?Sized> RecvVariant<P> for ReadMetadata {
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        match msg_type {
            tags::server::COLUMN_META_DATA
            | tags::server::FETCH_DONE
            | tags::server::FETCH_DONE_MORE_RESULTSETS
            | tags::server::STMT_EXECUTE_OK => NextMsg::Expected,
            tags::server::ROW => NextMsg::Stop,
            _ => NextMsg::Unexpected,
        }
    }

    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()> {
        match msg {
            Incoming::Server(ServerMessage::ColumnMetaData(meta)) => {
                self.columns += 1;
                prc.column_meta(meta);
                Ok(())
            }
            Incoming::Server(ServerMessage::FetchDone(_)) => {
                prc.fetch_done();
                Ok(())
            }
            Incoming::Server(ServerMessage::FetchDoneMoreResultsets(_)) => {
                prc.fetch_done_more_resultsets();
                Ok(())
            }
            Incoming::Server(ServerMessage::StmtExecuteOk(_)) => {
                prc.stmt_execute_ok();
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }

    fn read_more(&mut self, msg_type: u8) -> bool {
        msg_type == tags::server::COLUMN_META_DATA
    }
}

/// Reads rows until the result set (and statement) is finished.
///
/// Loops over Row frames; FetchDone keeps reading for the trailing
/// StmtExecuteOk, FetchDoneMoreResultsets finishes the operation so the
/// caller can start the next metadata read, and StmtExecuteOk finishes
/// the statement. A processor can pause between rows by returning
/// [`Flow::Stop`] from `message_end`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadRows;

impl<P: ResultProcessor + ?Sized> RecvVariant<P> for ReadRows {
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        match msg_type {
            tags::server::ROW
            | tags::server::FETCH_DONE
            | tags::server::FETCH_DONE_MORE_RESULTSETS
            | tags::server::STMT_EXECUTE_OK => NextMsg::Expected,
            _ => NextMsg::Unexpected,
        }
    }

    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()> {
        match msg {
            Incoming::Server(ServerMessage::Row(row)) => {
                prc.row(row);
                Ok(())
            }
            Incoming::Server(ServerMessage::FetchDone(_)) => {
                prc.fetch_done();
                Ok(())
            }
            Incoming::Server(ServerMessage::FetchDoneMoreResultsets(_)) => {
                prc.fetch_done_more_resultsets();
                Ok(())
            }
            Incoming::Server(ServerMessage::StmtExecuteOk(_)) => {
                prc.stmt_execute_ok();
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }

    fn read_more(&mut self, msg_type: u8) -> bool {
        matches!(msg_type, tags::server::ROW | tags::server::FETCH_DONE)
    }
}

/// Server-role variant: accepts any single client command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCommand;

impl<P: CommandProcessor + ?Sized> RecvVariant<P> for ReadCommand {
    fn next_msg(&mut self, msg_type: u8) -> NextMsg {
        match msg_type {
            tags::client::CAPABILITIES_GET
            | tags::client::CAPABILITIES_SET
            | tags::client::CON_CLOSE
            | tags::client::AUTHENTICATE_START
            | tags::client::AUTHENTICATE_CONTINUE
            | tags::client::SESSION_RESET
            | tags::client::SESSION_CLOSE
            | tags::client::STMT_EXECUTE
            | tags::client::CRUD_FIND
            | tags::client::CRUD_INSERT
            | tags::client::CRUD_UPDATE
            | tags::client::CRUD_DELETE
            | tags::client::EXPECT_OPEN
            | tags::client::EXPECT_CLOSE => NextMsg::Expected,
            _ => NextMsg::Unexpected,
        }
    }

    fn dispatch(&mut self, msg: &Incoming, prc: &mut P) -> Result<()> {
        let Incoming::Client(msg) = msg else {
            return Err(unexpected(msg));
        };
        match msg {
            ClientMessage::CapabilitiesGet(_) => prc.capabilities_get(),
            ClientMessage::CapabilitiesSet(set) => prc.capabilities_set(set),
            ClientMessage::ConClose(_) => prc.con_close(),
            ClientMessage::AuthenticateStart(start) => prc.authenticate_start(start),
            ClientMessage::AuthenticateContinue(cont) => prc.authenticate_continue(cont),
            ClientMessage::SessionReset(reset) => prc.session_reset(reset),
            ClientMessage::SessionClose(_) => prc.session_close(),
            ClientMessage::StmtExecute(stmt) => prc.stmt_execute(stmt),
            ClientMessage::CrudFind(find) => prc.crud_find(find),
            ClientMessage::CrudInsert(insert) => prc.crud_insert(insert),
            ClientMessage::CrudUpdate(update) => prc.crud_update(update),
            ClientMessage::CrudDelete(delete) => prc.crud_delete(delete),
            ClientMessage::ExpectOpen(open) => prc.expect_open(open),
            ClientMessage::ExpectClose(_) => prc.expect_close(),
        }
        Ok(())
    }
}
