//! # Message Codec
//!
//! Purpose: Encode and decode the repeated key/value entry stream that
//! follows the fixed header, over a growable chunked byte region.
//!
//! ## Design Principles
//! 1. **One Core, Two Roles**: [`Message`] carries all shared codec logic;
//!    [`Request`] and [`Response`] are thin wrappers that constrain what the
//!    major byte may hold.
//! 2. **Validate, Never Guess**: Typed readers check the declared length
//!    against the scalar's width instead of reinterpreting whatever is there.
//! 3. **Buffer Reuse**: A response can reclaim a consumed request's region
//!    for the common request→response turnaround on one connection.
//!
//! ## Entry Layout
//!
//! ```text
//! payload = repeated {
//!   key_len:u16   key:bytes      (key_len >= 1)
//!   value_len:u32 value:bytes    (value_len == 0 is "present but empty")
//! }
//! ```
//!
//! Fixed-width scalars reuse the same length-prefixed shape with the length
//! equal to the scalar's byte width.

use std::ops::{Deref, DerefMut};

use crate::buffer::ChunkBuffer;
use crate::error::{ProtoError, ProtoResult};
use crate::header::{
    self, Command, Status, HDR_AUTH, HDR_COMPRESSION, HDR_COUNT, HDR_END_OFFSET, HDR_MAJOR,
    MAX_AUTH_LEN, SZ_KEY_LEN, SZ_VALUE_LEN,
};

/// Initial capacity for freshly allocated messages. One chunk covers the
/// header plus a small entry without growing.
const INITIAL_CAPACITY: usize = 64;

/// Shared codec core: a chunked byte region, two cursors, and the fixed
/// `start_of_data` offset where the entry stream begins.
#[derive(Debug)]
pub struct Message {
    buf: ChunkBuffer,
    start_of_data: usize,
}

impl Message {
    fn blank() -> Self {
        let mut buf = ChunkBuffer::with_capacity(INITIAL_CAPACITY);
        buf.reset_to(HDR_END_OFFSET);
        Message {
            buf,
            start_of_data: HDR_END_OFFSET,
        }
    }

    fn from_frame_bytes(frame: Vec<u8>) -> Self {
        let mut buf = ChunkBuffer::from_vec(frame);
        let start_of_data = HDR_END_OFFSET;
        if buf.read_pos() < start_of_data {
            buf.set_read_pos(start_of_data.min(buf.write_pos()));
        }
        Message {
            buf,
            start_of_data,
        }
    }

    /// Offset where the entry stream begins. Fixed at construction.
    pub fn start_of_data(&self) -> usize {
        self.start_of_data
    }

    /// Borrow the underlying byte region.
    pub fn buffer(&self) -> &ChunkBuffer {
        &self.buf
    }

    /// Grow the region so at least `required` bytes are writable.
    pub fn ensure_capacity(&mut self, required: usize) {
        self.buf.ensure_capacity(required);
    }

    // ---- header fields (fixed offsets, no cursor movement) ----

    fn major(&self) -> u8 {
        header::get_field(&self.buf, HDR_MAJOR) as u8
    }

    fn set_major(&mut self, value: u8) {
        header::set_field(&mut self.buf, HDR_MAJOR, value as u64);
    }

    /// Compression scheme identifier; 0 means uncompressed.
    pub fn compression(&self) -> u8 {
        header::get_field(&self.buf, HDR_COMPRESSION) as u8
    }

    /// Set the compression scheme identifier.
    pub fn set_compression(&mut self, compression: u8) {
        header::set_field(&mut self.buf, HDR_COMPRESSION, compression as u64);
    }

    /// Logical entry count carried in the header.
    pub fn count(&self) -> u16 {
        header::get_field(&self.buf, HDR_COUNT) as u16
    }

    /// Set the logical entry count.
    pub fn set_count(&mut self, count: u16) {
        header::set_field(&mut self.buf, HDR_COUNT, count as u64);
    }

    /// Reserved credential slot contents.
    pub fn auth(&self) -> [u8; MAX_AUTH_LEN] {
        let mut out = [0u8; MAX_AUTH_LEN];
        self.buf.get_bytes(HDR_AUTH.offset, &mut out);
        out
    }

    /// Fill the reserved credential slot.
    pub fn set_auth(&mut self, auth: &[u8; MAX_AUTH_LEN]) {
        self.buf.put_bytes(HDR_AUTH.offset, auth);
    }

    /// Stamped total frame length. Trustworthy only after [`finalize`].
    ///
    /// [`finalize`]: Message::finalize
    pub fn total_len(&self) -> usize {
        header::get_total_len(&self.buf)
    }

    // ---- entry writers (cursor-relative) ----

    /// Append a key entry: 2-byte length prefix, then the key bytes.
    ///
    /// Empty keys and keys longer than the length field can express are
    /// rejected before any bytes are written.
    pub fn key(&mut self, key: &[u8]) -> ProtoResult<()> {
        if key.is_empty() {
            return Err(ProtoError::EmptyKey);
        }
        if key.len() > u16::MAX as usize {
            return Err(ProtoError::KeyTooLong(key.len()));
        }
        self.buf.ensure_capacity(SZ_KEY_LEN + key.len());
        self.buf.write_uint(SZ_KEY_LEN, key.len() as u64);
        self.buf.write_bytes(key);
        Ok(())
    }

    /// Append a string key.
    pub fn key_str(&mut self, key: &str) -> ProtoResult<()> {
        self.key(key.as_bytes())
    }

    fn key_scalar(&mut self, width: usize, value: u64) {
        self.buf.ensure_capacity(SZ_KEY_LEN + width);
        self.buf.write_uint(SZ_KEY_LEN, width as u64);
        self.buf.write_uint(width, value);
    }

    /// Append a 4-byte integer key.
    pub fn key_i32(&mut self, key: i32) {
        self.key_scalar(4, key as u32 as u64);
    }

    /// Append an 8-byte integer key.
    pub fn key_i64(&mut self, key: i64) {
        self.key_scalar(8, key as u64);
    }

    /// Append a value entry: 4-byte length prefix, then the value bytes.
    ///
    /// A zero-length value is legal and encodes "present but empty".
    pub fn value(&mut self, value: &[u8]) {
        self.buf.ensure_capacity(SZ_VALUE_LEN + value.len());
        self.buf.write_uint(SZ_VALUE_LEN, value.len() as u64);
        self.buf.write_bytes(value);
    }

    /// Append a string value.
    pub fn value_str(&mut self, value: &str) {
        self.value(value.as_bytes());
    }

    fn value_scalar(&mut self, width: usize, value: u64) {
        self.buf.ensure_capacity(SZ_VALUE_LEN + width);
        self.buf.write_uint(SZ_VALUE_LEN, width as u64);
        self.buf.write_uint(width, value);
    }

    /// Append a 1-byte value.
    pub fn value_u8(&mut self, value: u8) {
        self.value_scalar(1, value as u64);
    }

    /// Append a 2-byte value.
    pub fn value_i16(&mut self, value: i16) {
        self.value_scalar(2, value as u16 as u64);
    }

    /// Append a 4-byte value.
    pub fn value_i32(&mut self, value: i32) {
        self.value_scalar(4, value as u32 as u64);
    }

    /// Append an 8-byte value.
    pub fn value_i64(&mut self, value: i64) {
        self.value_scalar(8, value as u64);
    }

    /// Append a boolean value as a 1-byte scalar.
    pub fn value_bool(&mut self, value: bool) {
        self.value_u8(value as u8);
    }

    // ---- entry readers (cursor-relative) ----

    /// Read the length prefix preceding a key or value.
    ///
    /// A read cursor still inside the header is first advanced to
    /// `start_of_data`, so header reads cannot desynchronize the stream.
    fn entry_len(&mut self, sz_bytes: usize) -> ProtoResult<usize> {
        if self.buf.read_pos() < self.start_of_data {
            self.buf.set_read_pos(self.start_of_data);
        }
        Ok(self.buf.read_uint(sz_bytes)? as usize)
    }

    fn verify_entry_len(&mut self, sz_bytes: usize, expected: usize) -> ProtoResult<()> {
        let declared = self.entry_len(sz_bytes)?;
        if declared != expected {
            return Err(ProtoError::LengthMismatch { declared, expected });
        }
        Ok(())
    }

    /// Consume the next key entry as raw bytes.
    pub fn key_as_bytes(&mut self) -> ProtoResult<Vec<u8>> {
        let len = self.entry_len(SZ_KEY_LEN)?;
        if len == 0 {
            return Err(ProtoError::ZeroKeyLength);
        }
        self.buf.read_bytes(len)
    }

    /// Consume the next key entry as a UTF-8 string.
    pub fn key_as_string(&mut self) -> ProtoResult<String> {
        String::from_utf8(self.key_as_bytes()?).map_err(|_| ProtoError::InvalidUtf8)
    }

    /// Consume the next key entry as a 4-byte integer.
    pub fn key_as_i32(&mut self) -> ProtoResult<i32> {
        self.verify_entry_len(SZ_KEY_LEN, 4)?;
        Ok(self.buf.read_uint(4)? as u32 as i32)
    }

    /// Consume the next key entry as an 8-byte integer.
    pub fn key_as_i64(&mut self) -> ProtoResult<i64> {
        self.verify_entry_len(SZ_KEY_LEN, 8)?;
        Ok(self.buf.read_uint(8)? as i64)
    }

    /// Consume the next value entry as raw bytes.
    ///
    /// A zero-length value yields an empty vector, not an error: the value
    /// is present, just empty.
    pub fn value_as_bytes(&mut self) -> ProtoResult<Vec<u8>> {
        let len = self.entry_len(SZ_VALUE_LEN)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        self.buf.read_bytes(len)
    }

    /// Consume the next value entry as a UTF-8 string.
    pub fn value_as_string(&mut self) -> ProtoResult<String> {
        String::from_utf8(self.value_as_bytes()?).map_err(|_| ProtoError::InvalidUtf8)
    }

    /// Consume the next value entry as a 1-byte scalar.
    pub fn value_as_u8(&mut self) -> ProtoResult<u8> {
        self.verify_entry_len(SZ_VALUE_LEN, 1)?;
        Ok(self.buf.read_uint(1)? as u8)
    }

    /// Consume the next value entry as a 2-byte scalar.
    pub fn value_as_i16(&mut self) -> ProtoResult<i16> {
        self.verify_entry_len(SZ_VALUE_LEN, 2)?;
        Ok(self.buf.read_uint(2)? as u16 as i16)
    }

    /// Consume the next value entry as a 4-byte scalar.
    pub fn value_as_i32(&mut self) -> ProtoResult<i32> {
        self.verify_entry_len(SZ_VALUE_LEN, 4)?;
        Ok(self.buf.read_uint(4)? as u32 as i32)
    }

    /// Consume the next value entry as an 8-byte scalar.
    pub fn value_as_i64(&mut self) -> ProtoResult<i64> {
        self.verify_entry_len(SZ_VALUE_LEN, 8)?;
        Ok(self.buf.read_uint(8)? as i64)
    }

    /// Consume the next value entry as a boolean.
    pub fn value_as_bool(&mut self) -> ProtoResult<bool> {
        Ok(self.value_as_u8()? != 0)
    }

    // ---- lifecycle ----

    /// Rewind the read cursor to the start of the entry stream so entries
    /// may be read again.
    pub fn reset_reader(&mut self) {
        self.buf.set_read_pos(self.start_of_data);
    }

    /// Seal the message for transport.
    ///
    /// Rewinds the read cursor to 0, forces the write cursor to cover the
    /// full fixed header even when no payload was written, and stamps
    /// `total_len` from the final write cursor. Must be the last write-side
    /// operation before the bytes are handed to the transport.
    pub fn finalize(&mut self) {
        self.buf.set_read_pos(0);
        if self.buf.write_pos() < self.start_of_data {
            self.buf.set_write_pos(self.start_of_data);
        }
        header::set_total_len(&mut self.buf);
    }

    /// Borrow the encoded frame (after [`finalize`]) as transport slices.
    ///
    /// [`finalize`]: Message::finalize
    pub fn as_slices(&self) -> Vec<&[u8]> {
        self.buf.as_slices()
    }

    /// Copy the encoded frame into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Outbound message whose major byte holds a [`Command`].
#[derive(Debug)]
pub struct Request {
    msg: Message,
}

impl Request {
    /// Allocate a fresh request for the given command.
    pub fn new(command: Command) -> Self {
        let mut msg = Message::blank();
        msg.set_major(command.as_u8());
        Request { msg }
    }

    /// Wrap a complete inbound frame as a request for reading.
    pub fn from_frame(frame: Vec<u8>) -> Self {
        Request {
            msg: Message::from_frame_bytes(frame),
        }
    }

    /// Command carried in the major byte.
    pub fn command(&self) -> ProtoResult<Command> {
        Command::from_u8(self.msg.major())
    }

    /// Overwrite the command in the major byte.
    pub fn set_command(&mut self, command: Command) {
        self.msg.set_major(command.as_u8());
    }
}

impl Deref for Request {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.msg
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.msg
    }
}

/// Inbound (or locally built) message whose major byte holds a [`Status`].
#[derive(Debug)]
pub struct Response {
    msg: Message,
}

impl Response {
    /// Allocate a fresh response with the given status.
    pub fn new(status: Status) -> Self {
        let mut msg = Message::blank();
        msg.set_major(status.as_u8());
        Response { msg }
    }

    /// Build a response by reclaiming a consumed request's byte region.
    ///
    /// The region keeps its grown capacity; both cursors reset to
    /// `start_of_data`, the header is cleared, and the status defaults to
    /// [`Status::Ok`].
    pub fn from_request(request: Request) -> Self {
        let mut msg = request.msg;
        msg.buf.reset_to(msg.start_of_data);
        msg.buf.zero_range(0, msg.start_of_data);
        msg.set_major(Status::Ok.as_u8());
        Response { msg }
    }

    /// Wrap one complete decoded frame for reading.
    pub fn from_frame(frame: Vec<u8>) -> Self {
        Response {
            msg: Message::from_frame_bytes(frame),
        }
    }

    /// Status carried in the major byte.
    pub fn status(&self) -> ProtoResult<Status> {
        Status::from_u8(self.msg.major())
    }

    /// Overwrite the status in the major byte.
    pub fn set_status(&mut self, status: Status) {
        self.msg.set_major(status.as_u8());
    }
}

impl Deref for Response {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.msg
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.msg
    }
}
