//! # Chunked Byte Buffer
//!
//! Purpose: Back the message codec with a growable byte region that never
//! relocates previously written bytes.
//!
//! ## Design Principles
//! 1. **Rope of Chunks**: Capacity grows by appending fixed-alignment chunks,
//!    so existing data stays where it is and both cursors survive every
//!    expansion untouched.
//! 2. **Two Access Modes**: Absolute get/put for fixed-offset header fields,
//!    cursor-relative read/write for the streamed entry payload.
//! 3. **Checked Reads**: The read cursor can never pass the write cursor;
//!    short reads surface as protocol violations, not silent garbage.
//!
//! Logical offsets are contiguous across chunk boundaries; multi-byte values
//! may straddle a boundary and are assembled byte-wise.

use crate::error::{ProtoError, ProtoResult};

/// Chunk sizes are rounded up to this multiple.
const ALIGNMENT: usize = 64;

fn align_up(n: usize) -> usize {
    (n + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// Growable byte region composed of fixed-alignment chunks, with a read
/// cursor and a write cursor over one contiguous logical offset space.
#[derive(Debug)]
pub struct ChunkBuffer {
    /// Backing chunks; each is fully allocated and zero-filled at creation.
    chunks: Vec<Vec<u8>>,
    /// Sum of all chunk lengths. Never shrinks.
    capacity: usize,
    /// Next logical offset a cursor-relative read consumes.
    read_pos: usize,
    /// Next logical offset a cursor-relative write fills.
    write_pos: usize,
}

impl ChunkBuffer {
    /// Create a buffer with at least `initial` bytes of capacity, rounded up
    /// to the chunk alignment.
    pub fn with_capacity(initial: usize) -> Self {
        let size = align_up(initial.max(1));
        ChunkBuffer {
            chunks: vec![vec![0u8; size]],
            capacity: size,
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Wrap an already-complete byte region, e.g. one decoded inbound frame.
    ///
    /// The write cursor sits at the end of the data; the read cursor at 0.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let capacity = data.len();
        ChunkBuffer {
            chunks: vec![data],
            capacity,
            read_pos: 0,
            write_pos: capacity,
        }
    }

    /// Total logical capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current read cursor position.
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Current write cursor position.
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Bytes between the read and write cursors.
    pub fn readable(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Bytes between the write cursor and the end of capacity.
    pub fn writable(&self) -> usize {
        self.capacity - self.write_pos
    }

    /// Move the read cursor to an absolute offset.
    pub fn set_read_pos(&mut self, pos: usize) {
        assert!(pos <= self.capacity, "read cursor {pos} past capacity {}", self.capacity);
        self.read_pos = pos;
    }

    /// Move the write cursor to an absolute offset.
    pub fn set_write_pos(&mut self, pos: usize) {
        assert!(pos <= self.capacity, "write cursor {pos} past capacity {}", self.capacity);
        self.write_pos = pos;
    }

    /// Reset both cursors to `pos`, keeping capacity and contents.
    pub fn reset_to(&mut self, pos: usize) {
        self.set_read_pos(pos);
        self.set_write_pos(pos);
    }

    /// Grow so that at least `required` bytes are writable past the write
    /// cursor.
    ///
    /// The increment is `required - writable` rounded up to the chunk
    /// alignment and appended as a fresh chunk: no previously written byte
    /// moves and neither cursor changes.
    pub fn ensure_capacity(&mut self, required: usize) {
        let writable = self.writable();
        if writable >= required {
            return;
        }
        let increment = align_up(required - writable);
        self.chunks.push(vec![0u8; increment]);
        self.capacity += increment;
    }

    /// Map a logical offset to (chunk index, offset within chunk).
    fn locate(&self, offset: usize) -> (usize, usize) {
        let mut remaining = offset;
        for (idx, chunk) in self.chunks.iter().enumerate() {
            if remaining < chunk.len() {
                return (idx, remaining);
            }
            remaining -= chunk.len();
        }
        panic!("offset {offset} past capacity {}", self.capacity);
    }

    /// Copy `src` into the region at an absolute offset. No cursor movement.
    pub fn put_bytes(&mut self, offset: usize, src: &[u8]) {
        assert!(
            offset + src.len() <= self.capacity,
            "put of {} bytes at {offset} past capacity {}",
            src.len(),
            self.capacity
        );
        if src.is_empty() {
            return;
        }
        let (mut idx, mut intra) = self.locate(offset);
        let mut written = 0;
        while written < src.len() {
            let chunk = &mut self.chunks[idx];
            let n = (chunk.len() - intra).min(src.len() - written);
            chunk[intra..intra + n].copy_from_slice(&src[written..written + n]);
            written += n;
            idx += 1;
            intra = 0;
        }
    }

    /// Copy bytes out of the region at an absolute offset. No cursor movement.
    pub fn get_bytes(&self, offset: usize, dst: &mut [u8]) {
        assert!(
            offset + dst.len() <= self.capacity,
            "get of {} bytes at {offset} past capacity {}",
            dst.len(),
            self.capacity
        );
        if dst.is_empty() {
            return;
        }
        let (mut idx, mut intra) = self.locate(offset);
        let mut read = 0;
        while read < dst.len() {
            let chunk = &self.chunks[idx];
            let n = (chunk.len() - intra).min(dst.len() - read);
            dst[read..read + n].copy_from_slice(&chunk[intra..intra + n]);
            read += n;
            idx += 1;
            intra = 0;
        }
    }

    /// Read a big-endian header field at a fixed offset. No cursor movement.
    ///
    /// Widths other than 1, 2, or 4 bytes are a programming error.
    pub fn get_uint(&self, offset: usize, width: usize) -> u64 {
        assert!(
            matches!(width, 1 | 2 | 4),
            "unsupported header field width {width}"
        );
        let mut raw = [0u8; 4];
        self.get_bytes(offset, &mut raw[..width]);
        let mut value = 0u64;
        for &b in &raw[..width] {
            value = (value << 8) | b as u64;
        }
        value
    }

    /// Write a big-endian header field at a fixed offset. No cursor movement.
    ///
    /// Widths other than 1, 2, or 4 bytes are a programming error.
    pub fn put_uint(&mut self, offset: usize, width: usize, value: u64) {
        assert!(
            matches!(width, 1 | 2 | 4),
            "unsupported header field width {width}"
        );
        let raw = value.to_be_bytes();
        self.put_bytes(offset, &raw[8 - width..]);
    }

    /// Append bytes at the write cursor, growing capacity as needed.
    pub fn write_bytes(&mut self, src: &[u8]) {
        self.ensure_capacity(src.len());
        self.put_bytes(self.write_pos, src);
        self.write_pos += src.len();
    }

    /// Append a big-endian scalar of `width` bytes (1, 2, 4, or 8) at the
    /// write cursor.
    pub fn write_uint(&mut self, width: usize, value: u64) {
        assert!(
            matches!(width, 1 | 2 | 4 | 8),
            "unsupported scalar width {width}"
        );
        let raw = value.to_be_bytes();
        self.write_bytes(&raw[8 - width..]);
    }

    /// Consume `len` bytes at the read cursor.
    pub fn read_bytes(&mut self, len: usize) -> ProtoResult<Vec<u8>> {
        if self.readable() < len {
            return Err(ProtoError::LengthOverrun {
                needed: len,
                available: self.readable(),
            });
        }
        let mut out = vec![0u8; len];
        self.get_bytes(self.read_pos, &mut out);
        self.read_pos += len;
        Ok(out)
    }

    /// Consume a big-endian scalar of `width` bytes (1, 2, 4, or 8) at the
    /// read cursor.
    pub fn read_uint(&mut self, width: usize) -> ProtoResult<u64> {
        assert!(
            matches!(width, 1 | 2 | 4 | 8),
            "unsupported scalar width {width}"
        );
        if self.readable() < width {
            return Err(ProtoError::LengthOverrun {
                needed: width,
                available: self.readable(),
            });
        }
        let mut raw = [0u8; 8];
        self.get_bytes(self.read_pos, &mut raw[..width]);
        self.read_pos += width;
        let mut value = 0u64;
        for &b in &raw[..width] {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    /// Zero a byte range without moving either cursor.
    pub fn zero_range(&mut self, offset: usize, len: usize) {
        // Zeroing chunk-wise avoids a temporary allocation for large ranges.
        assert!(offset + len <= self.capacity);
        if len == 0 {
            return;
        }
        let (mut idx, mut intra) = self.locate(offset);
        let mut cleared = 0;
        while cleared < len {
            let chunk = &mut self.chunks[idx];
            let n = (chunk.len() - intra).min(len - cleared);
            chunk[intra..intra + n].fill(0);
            cleared += n;
            idx += 1;
            intra = 0;
        }
    }

    /// Borrow the written region (offset 0 up to the write cursor) as a
    /// sequence of slices, suitable for vectored transport writes.
    pub fn as_slices(&self) -> Vec<&[u8]> {
        let mut out = Vec::with_capacity(self.chunks.len());
        let mut remaining = self.write_pos;
        for chunk in &self.chunks {
            if remaining == 0 {
                break;
            }
            let n = remaining.min(chunk.len());
            out.push(&chunk[..n]);
            remaining -= n;
        }
        out
    }

    /// Copy the written region into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.write_pos];
        self.get_bytes(0, &mut out);
        out
    }
}
