//! # Header Layout
//!
//! Purpose: Define the fixed 16-byte frame header shared by requests and
//! responses, plus the raw get/set primitives over a byte region at fixed
//! offsets.
//!
//! ## Memory Layout
//!
//! ```text
//! Frame header (16 bytes total, big-endian):
//! +--------------+----------+---------------+----------+---------+-------------+
//! | total_len:4B | major:1B | compression:1B| count:2B | auth:4B | reserved:4B |
//! +--------------+----------+---------------+----------+---------+-------------+
//! offset 0        4          5               6          8         12
//! ```
//!
//! `total_len` covers the whole frame, header included, and is stamped last
//! during encode. `major` is overloaded: a command code on requests, a
//! status code on responses. Field order is part of the wire contract.

use crate::buffer::ChunkBuffer;
use crate::error::ProtoError;

/// One fixed-offset header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    /// Byte offset from the start of the frame.
    pub offset: usize,
    /// Field width in bytes.
    pub size: usize,
}

impl HeaderField {
    const fn new(offset: usize, size: usize) -> Self {
        HeaderField { offset, size }
    }

    /// First byte past this field.
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Reserved credential slot width in bytes.
pub const MAX_AUTH_LEN: usize = 4;

/// Width of the length prefix preceding each key.
pub const SZ_KEY_LEN: usize = 2;

/// Width of the length prefix preceding each value.
pub const SZ_VALUE_LEN: usize = 4;

/// Total frame byte length, header included. Stamped last during encode.
pub const HDR_TOTAL_LEN: HeaderField = HeaderField::new(0, 4);
/// Command code (request) or status code (response).
pub const HDR_MAJOR: HeaderField = HeaderField::new(HDR_TOTAL_LEN.end(), 1);
/// 0 = uncompressed; nonzero selects a compression scheme.
pub const HDR_COMPRESSION: HeaderField = HeaderField::new(HDR_MAJOR.end(), 1);
/// Number of logical entries the payload represents.
pub const HDR_COUNT: HeaderField = HeaderField::new(HDR_COMPRESSION.end(), 2);
/// Reserved credential slot.
pub const HDR_AUTH: HeaderField = HeaderField::new(HDR_COUNT.end(), MAX_AUTH_LEN);
/// Padding out to the 16-byte boundary.
pub const HDR_RESERVED: HeaderField = HeaderField::new(HDR_AUTH.end(), 16 - HDR_AUTH.end());

/// Size of the full fixed header; payload data begins here.
pub const HDR_END_OFFSET: usize = HDR_RESERVED.end();

/// Request command codes carried in the major byte.
///
/// Codes at or above 100 are reserved for replication commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Store a key/value entry.
    Set = 1,
    /// Fetch the value for a key.
    Get = 2,
    /// Remove a key.
    Del = 3,
    /// Replication liveness echo.
    Echo = 100,
}

impl Command {
    /// Numeric wire value of this command.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a major byte into a command.
    pub fn from_u8(value: u8) -> Result<Self, ProtoError> {
        match value {
            1 => Ok(Command::Set),
            2 => Ok(Command::Get),
            3 => Ok(Command::Del),
            100 => Ok(Command::Echo),
            other => Err(ProtoError::UnknownCommand(other)),
        }
    }
}

/// Response status codes carried in the major byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Request succeeded.
    Ok = 1,
    /// Requested key does not exist.
    KeyUnknown = 2,
    /// Request was malformed or unsupported.
    InvalidRequest = 3,
}

impl Status {
    /// Numeric wire value of this status.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a major byte into a status.
    pub fn from_u8(value: u8) -> Result<Self, ProtoError> {
        match value {
            1 => Ok(Status::Ok),
            2 => Ok(Status::KeyUnknown),
            3 => Ok(Status::InvalidRequest),
            other => Err(ProtoError::UnknownStatus(other)),
        }
    }
}

/// Read a header field without moving the buffer's read cursor.
pub fn get_field(buf: &ChunkBuffer, field: HeaderField) -> u64 {
    buf.get_uint(field.offset, field.size)
}

/// Write a header field without moving the buffer's write cursor.
pub fn set_field(buf: &mut ChunkBuffer, field: HeaderField, value: u64) {
    buf.put_uint(field.offset, field.size, value);
}

/// Stamp `total_len` from the buffer's current write cursor.
///
/// Must be the last header operation during encode: every payload write
/// after this call would leave the stamped length stale.
pub fn set_total_len(buf: &mut ChunkBuffer) {
    let total = buf.write_pos() as u64;
    set_field(buf, HDR_TOTAL_LEN, total);
}

/// Read the stamped total frame length.
pub fn get_total_len(buf: &ChunkBuffer) -> usize {
    get_field(buf, HDR_TOTAL_LEN) as usize
}
