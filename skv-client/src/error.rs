//! # Client Error Taxonomy
//!
//! Purpose: Classify every failure the async client can surface. All of
//! these reach the caller as a failed future; none are retried internally.
//! Local recovery is limited to cleanup: removing correlator registrations,
//! discarding connections, releasing buffers.

use std::time::Duration;

use skv_proto::{ProtoError, Status};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the async client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading, or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-format violation on inbound or outbound data.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// The pool is closed and cannot hand out connections.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// No connection became available within the acquire bound.
    #[error("no connection became available within {0:?}")]
    AcquireTimeout(Duration),

    /// The peer closed the connection while a request was outstanding.
    #[error("connection closed while a request was outstanding")]
    ConnectionClosed,

    /// Address could not be parsed into a socket address.
    #[error("invalid address")]
    InvalidAddress,

    /// The server answered with a status the operation cannot satisfy.
    #[error("server returned status {0:?}")]
    UnexpectedStatus(Status),
}
