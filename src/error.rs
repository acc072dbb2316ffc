//! Error taxonomy: AMQP reply-code errors, framing errors and local
//! client errors, all folded into one enum so callers can match on a
//! single type without chasing a class hierarchy.

use std::io;
use thiserror::Error;

use crate::method::MethodKind;

/// Whether an error applies to the whole connection or just one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Connection,
    Channel,
}

/// The reply-code taxonomy from AMQP 0.9.1's `connection.close`/`channel.close`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{text} (reply_code={code}, method={method:?})")]
    ContentTooLarge {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    NoConsumers {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    ConnectionForced {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    InvalidPath {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    AccessRefused {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    NotFound {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    ResourceLocked {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    PreconditionFailed {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    FrameError {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    FrameSyntaxError {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    InvalidCommand {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    ChannelNotOpen {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    UnexpectedFrame {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    ResourceError {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    NotAllowed {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    NotImplemented {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    InternalError {
        code: u16,
        text: String,
        method: Option<MethodKind>,
    },
    #[error("{text} (reply_code={code}, method={method:?})")]
    Other {
        code: u16,
        text: String,
        method: Option<MethodKind>,
        scope: ErrorScope,
    },

    #[error("operation timed out")]
    Timeout,

    #[error("connection is blocked: {0}")]
    Blocked(String),

    #[error("consumer cancelled: {0}")]
    ConsumerCancelled(String),

    #[error("no free channel ids available (channel_max reached)")]
    ChannelIdsExhausted,

    #[error("not connected")]
    NotConnected,

    #[error("publisher confirms and transactions are mutually exclusive on a channel")]
    ConfirmTxConflict,

    #[error("frame did not end with the 0xCE terminator")]
    BadFrameTerminator,

    #[error("unknown method ({class_id}, {method_id})")]
    UnknownMethod { class_id: u16, method_id: u16 },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[cfg(feature = "tls")]
    #[error(transparent)]
    Tls(#[from] native_tls::Error),
}

impl Error {
    /// Build the right variant from a numeric reply code, following
    /// AMQP 0.9.1's fixed code -> condition mapping. Unknown codes fall
    /// back to `Other` tagged with the caller-supplied scope.
    pub fn from_reply_code(
        code: u16,
        text: String,
        method: Option<MethodKind>,
        default_scope: ErrorScope,
    ) -> Error {
        match code {
            311 => Error::ContentTooLarge { code, text, method },
            313 => Error::NoConsumers { code, text, method },
            320 => Error::ConnectionForced { code, text, method },
            402 => Error::InvalidPath { code, text, method },
            403 => Error::AccessRefused { code, text, method },
            404 => Error::NotFound { code, text, method },
            405 => Error::ResourceLocked { code, text, method },
            406 => Error::PreconditionFailed { code, text, method },
            501 => Error::FrameError { code, text, method },
            502 => Error::FrameSyntaxError { code, text, method },
            503 => Error::InvalidCommand { code, text, method },
            504 => Error::ChannelNotOpen { code, text, method },
            505 => Error::UnexpectedFrame { code, text, method },
            506 => Error::ResourceError { code, text, method },
            530 => Error::NotAllowed { code, text, method },
            540 => Error::NotImplemented { code, text, method },
            541 => Error::InternalError { code, text, method },
            _ => Error::Other {
                code,
                text,
                method,
                scope: default_scope,
            },
        }
    }

    /// Whether this error closes just the channel or the whole connection.
    pub fn scope(&self) -> ErrorScope {
        use Error::*;
        match self {
            ContentTooLarge { .. }
            | NoConsumers { .. }
            | AccessRefused { .. }
            | NotFound { .. }
            | ResourceLocked { .. }
            | PreconditionFailed { .. } => ErrorScope::Channel,
            Other { scope, .. } => *scope,
            _ => ErrorScope::Connection,
        }
    }

    /// Whether the peer considers this condition recoverable, i.e. the
    /// channel (or connection) can be reopened without reconnecting the
    /// transport from scratch.
    pub fn is_recoverable(&self) -> bool {
        use Error::*;
        matches!(
            self,
            ContentTooLarge { .. }
                | NoConsumers { .. }
                | ConnectionForced { .. }
                | ResourceLocked { .. }
                | Blocked(_)
                | ConsumerCancelled(_)
        )
    }

    pub fn reply_code(&self) -> Option<u16> {
        use Error::*;
        match self {
            ContentTooLarge { code, .. }
            | NoConsumers { code, .. }
            | ConnectionForced { code, .. }
            | InvalidPath { code, .. }
            | AccessRefused { code, .. }
            | NotFound { code, .. }
            | ResourceLocked { code, .. }
            | PreconditionFailed { code, .. }
            | FrameError { code, .. }
            | FrameSyntaxError { code, .. }
            | InvalidCommand { code, .. }
            | ChannelNotOpen { code, .. }
            | UnexpectedFrame { code, .. }
            | ResourceError { code, .. }
            | NotAllowed { code, .. }
            | NotImplemented { code, .. }
            | InternalError { code, .. }
            | Other { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
