/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Error handling

use std::{error, fmt, io, sync::Arc};

use futures_channel::oneshot;

use crate::protocol::resp::RespValue;

/// All the errors the connection can produce.
///
/// `Clone` is implemented so that one underlying failure can be routed to every completion
/// handle it affects; IO errors are stored behind an `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum Error {
    /// A non-specific internal error that prevented an operation from completing
    Internal(String),

    /// An IO error occurred
    IO(Arc<io::Error>),

    /// A RESP parsing/serialising error occurred.  Frame boundaries can no longer be
    /// trusted once this is returned for a connection.
    RESP(String, Option<RespValue>),

    /// A remote error returned by the Redis server.
    ///
    /// This is only produced when a reply is *converted* via [`FromResp`](crate::FromResp);
    /// the raw submission API hands server errors back as `RespValue::Error` values.
    Remote(String),

    /// An error establishing, or with the state of, the connection itself
    Connection(ConnectionReason),

    /// The server closed the connection while a reply was still owed
    EndOfStream,

    /// An unexpected error, typically a violation of this crate's own expectations
    Unexpected(String),
}

/// Details of a connection-state failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionReason {
    /// No transport is available; either the connection was never started or the single
    /// connect attempt failed
    NotConnected,

    /// The connection is shutting down and no further queries will be sent
    Closing,
}

pub(crate) fn internal(msg: impl Into<String>) -> Error {
    Error::Internal(msg.into())
}

pub(crate) fn resp(msg: impl Into<String>, resp: RespValue) -> Error {
    Error::RESP(msg.into(), Some(resp))
}

pub(crate) fn unexpected(msg: impl Into<String>) -> Error {
    Error::Unexpected(msg.into())
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IO(Arc::new(err))
    }
}

impl From<oneshot::Canceled> for Error {
    fn from(_: oneshot::Canceled) -> Error {
        unexpected("Completion handle was dropped before a reply was delivered")
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IO(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Internal(s) => write!(f, "Internal error: {}", s),
            Error::IO(err) => write!(f, "IO error: {}", err),
            Error::RESP(s, resp) => match resp {
                Some(resp) => write!(f, "RESP error: {} ({:?})", s, resp),
                None => write!(f, "RESP error: {}", s),
            },
            Error::Remote(s) => write!(f, "Remote error: {}", s),
            Error::Connection(reason) => write!(f, "Connection error: {}", reason),
            Error::EndOfStream => write!(f, "End of stream"),
            Error::Unexpected(s) => write!(f, "Unexpected error: {}", s),
        }
    }
}

impl fmt::Display for ConnectionReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ConnectionReason::NotConnected => "not connected",
            ConnectionReason::Closing => "closing",
        })
    }
}
