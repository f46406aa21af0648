//! Processor contract - the callback sink decoded messages surface through.
//!
//! A receive operation drives one or more incoming frames and reports them
//! to a caller-supplied processor. For every processed frame the processor
//! observes the sequence
//!
//! ```text
//! message_begin -> (raw_payload?) -> typed callback -> message_end
//! ```
//!
//! Two message kinds are universal and handled by the base [`Processor`]
//! trait itself: the server's Error frame (terminates the receive) and
//! Notice frames (delivered and skipped over without disturbing the
//! foreground sequence). Everything else reaches the capability trait the
//! active receive variant requires ([`ReplyProcessor`], [`AuthProcessor`],
//! [`ResultProcessor`], ...).
//!
//! Every callback is synchronous and must not re-enter the engine.

use crate::error::ServerError;
use crate::msg::{
    AuthenticateStart, Capabilities, CapabilitiesSet, ColumnMetaData, CrudDelete, CrudFind,
    CrudInsert, CrudUpdate, ExpectOpen, NoticeScope, OkMsg, Row, SessionAuthenticateContinue,
    SessionReset, StmtExecute,
};

/// What to do after a message has been fully dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep processing under the current variant's policy.
    #[default]
    Continue,
    /// Finish the current stage here; the operation can be resumed.
    Stop,
}

/// Base processor: message boundaries, the raw-payload option, and the two
/// cross-cutting sinks every receive must accept.
pub trait Processor {
    /// A frame of the given type and payload length is about to be
    /// dispatched.
    fn message_begin(&mut self, msg_type: u8, payload_len: usize) {
        let _ = (msg_type, payload_len);
    }

    /// Opt in to receiving each frame's raw payload bytes.
    fn wants_raw(&self) -> bool {
        false
    }

    /// Raw payload of the current frame, before decoding. Only called when
    /// [`Processor::wants_raw`] returns true.
    fn raw_payload(&mut self, payload: &[u8]) {
        let _ = payload;
    }

    /// The current frame has been fully dispatched. Return [`Flow::Stop`]
    /// to finish the stage here.
    fn message_end(&mut self) -> Flow {
        Flow::Continue
    }

    /// Server reported an error. The receive operation finishes after this
    /// callback; no further foreground messages are delivered from it.
    fn error(&mut self, error: ServerError);

    /// Out-of-band notice. `ty` and `payload` are the raw frame contents;
    /// decoders for the standard notice payloads live in
    /// [`crate::msg::notice`].
    fn notice(&mut self, ty: u32, scope: NoticeScope, payload: &[u8]);
}

/// Processor for plain Ok replies.
pub trait ReplyProcessor: Processor {
    fn ok(&mut self, msg: &OkMsg);
}

/// Processor for capability replies.
pub trait CapabilitiesProcessor: Processor {
    fn capabilities(&mut self, caps: &Capabilities);
}

/// Processor for the server half of an authentication exchange.
pub trait AuthProcessor: Processor {
    /// Server sent a challenge; answer with a client AuthenticateContinue.
    fn auth_continue(&mut self, auth_data: &[u8]);

    /// Authentication succeeded.
    fn auth_ok(&mut self, auth_data: &[u8]);
}

/// Processor for result-set replies: metadata, rows, and terminators.
pub trait ResultProcessor: Processor {
    fn column_meta(&mut self, meta: &ColumnMetaData);

    fn row(&mut self, row: &Row);

    /// All rows of the current result set were delivered.
    fn fetch_done(&mut self);

    /// Current result set done, another follows.
    fn fetch_done_more_resultsets(&mut self);

    /// Statement finished executing.
    fn stmt_execute_ok(&mut self);
}

/// Processor for a server-role engine receiving client commands.
pub trait CommandProcessor: Processor {
    fn capabilities_get(&mut self);
    fn capabilities_set(&mut self, set: &CapabilitiesSet);
    fn con_close(&mut self);
    fn authenticate_start(&mut self, start: &AuthenticateStart);
    fn authenticate_continue(&mut self, cont: &SessionAuthenticateContinue);
    fn session_reset(&mut self, reset: &SessionReset);
    fn session_close(&mut self);
    fn stmt_execute(&mut self, stmt: &StmtExecute);
    fn crud_find(&mut self, find: &CrudFind);
    fn crud_insert(&mut self, insert: &CrudInsert);
    fn crud_update(&mut self, update: &CrudUpdate);
    fn crud_delete(&mut self, delete: &CrudDelete);
    fn expect_open(&mut self, open: &ExpectOpen);
    fn expect_close(&mut self);
}
