//! # Frame Decoder
//!
//! Purpose: Split a connection's inbound byte stream into discrete, complete
//! frames using the header's 4-byte `total_len` field.
//!
//! ## Design Principles
//! 1. **Never Partial**: A frame is emitted only once all `total_len` bytes
//!    are buffered; callers downstream never see a torn message.
//! 2. **Never Blocking**: The decoder is driven by however many bytes the
//!    transport delivered and simply picks up where it left off next time.
//! 3. **Bounded**: Declared lengths below the fixed header or above the
//!    configured maximum are protocol violations, not allocation requests.
//!
//! One decoder instance exists per connection. Emitted frames carry the full
//! header plus payload; ownership of the bytes passes to the caller.

use bytes::{Bytes, BytesMut};

use crate::error::{ProtoError, ProtoResult};
use crate::header::{HDR_END_OFFSET, HDR_TOTAL_LEN};

/// Default upper bound on a single frame, header included.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Decoder state between deliveries.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Fewer than 4 bytes buffered; the total length is not yet known.
    AwaitingHeader,
    /// Total length peeked; waiting for the frame to be fully buffered.
    AwaitingBody { total_len: usize },
}

/// Streaming splitter turning an inbound byte stream into complete frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    state: State,
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default frame-size bound.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a decoder with a custom frame-size bound.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::AwaitingHeader,
            max_frame_len,
        }
    }

    /// Feed newly arrived bytes and collect every frame they complete.
    ///
    /// Returns an empty vector while a frame is still partial. A returned
    /// error means the stream is unrecoverable and the owning connection
    /// must be discarded.
    pub fn push(&mut self, data: &[u8]) -> ProtoResult<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_split_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_split_one(&mut self) -> ProtoResult<Option<Bytes>> {
        if let State::AwaitingHeader = self.state {
            if self.buffer.len() < HDR_TOTAL_LEN.size {
                return Ok(None);
            }

            // Non-destructive peek of the 4-byte total length.
            let total_len = u32::from_be_bytes(
                self.buffer[..HDR_TOTAL_LEN.size]
                    .try_into()
                    .expect("peek of 4 buffered bytes"),
            ) as usize;

            if total_len < HDR_END_OFFSET {
                return Err(ProtoError::FrameTooShort(total_len));
            }
            if total_len > self.max_frame_len {
                return Err(ProtoError::FrameTooLarge {
                    len: total_len,
                    max: self.max_frame_len,
                });
            }

            self.state = State::AwaitingBody { total_len };
        }

        let State::AwaitingBody { total_len } = self.state else {
            return Ok(None);
        };

        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let frame = self.buffer.split_to(total_len).freeze();
        self.state = State::AwaitingHeader;
        Ok(Some(frame))
    }

    /// Bytes currently buffered without forming a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Command, Status};
    use crate::message::{Request, Response};

    fn encoded_request(key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut req = Request::new(Command::Set);
        req.key(key).unwrap();
        req.value(value);
        req.set_count(1);
        req.finalize();
        req.to_vec()
    }

    #[test]
    fn test_single_complete_frame() {
        let bytes = encoded_request(b"k1", b"v1");
        let mut decoder = FrameDecoder::new();

        let frames = decoder.push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &bytes[..]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_no_emit_until_fully_buffered() {
        let bytes = encoded_request(b"key", b"some value bytes");
        let mut decoder = FrameDecoder::new();

        // Everything except the last byte: still nothing.
        let frames = decoder.push(&bytes[..bytes.len() - 1]).unwrap();
        assert!(frames.is_empty());

        let frames = decoder.push(&bytes[bytes.len() - 1..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &bytes[..]);
    }

    #[test]
    fn test_byte_at_a_time_equals_all_at_once() {
        let bytes = encoded_request(b"k1", b"v1");

        let mut all_at_once = FrameDecoder::new();
        let expected = all_at_once.push(&bytes).unwrap();

        let mut one_by_one = FrameDecoder::new();
        let mut collected = Vec::new();
        for byte in &bytes {
            collected.extend(one_by_one.push(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(collected.len(), 1);
        assert_eq!(expected.len(), 1);
        assert_eq!(collected[0], expected[0]);
    }

    #[test]
    fn test_multiple_frames_in_one_delivery() {
        let first = encoded_request(b"a", b"1");
        let second = encoded_request(b"b", b"2");
        let third = encoded_request(b"c", b"3");

        let mut combined = first.clone();
        combined.extend_from_slice(&second);
        combined.extend_from_slice(&third);

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&combined).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], &first[..]);
        assert_eq!(&frames[1][..], &second[..]);
        assert_eq!(&frames[2][..], &third[..]);
    }

    #[test]
    fn test_frame_then_partial_next() {
        let first = encoded_request(b"a", b"1");
        let second = encoded_request(b"b", b"2");

        let mut data = first.clone();
        data.extend_from_slice(&second[..3]);

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.buffered(), 3);

        let frames = decoder.push(&second[3..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &second[..]);
    }

    #[test]
    fn test_header_only_frame() {
        let mut resp = Response::new(Status::Ok);
        resp.finalize();
        let bytes = resp.to_vec();
        assert_eq!(bytes.len(), 16);

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);

        let parsed = Response::from_frame(frames[0].to_vec());
        assert_eq!(parsed.status().unwrap(), Status::Ok);
    }

    #[test]
    fn test_undersized_total_len_rejected() {
        let mut bytes = encoded_request(b"k", b"v");
        bytes[..4].copy_from_slice(&8u32.to_be_bytes());

        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.push(&bytes),
            Err(ProtoError::FrameTooShort(8))
        ));
    }

    #[test]
    fn test_oversized_total_len_rejected() {
        let mut bytes = encoded_request(b"k", b"v");
        bytes[..4].copy_from_slice(&1024u32.to_be_bytes());

        let mut decoder = FrameDecoder::with_max_frame_len(256);
        assert!(matches!(
            decoder.push(&bytes),
            Err(ProtoError::FrameTooLarge { len: 1024, max: 256 })
        ));
    }

    #[test]
    fn test_emitted_frame_decodes_as_message() {
        let bytes = encoded_request(b"k1", b"v1");
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&bytes).unwrap();

        let mut parsed = Request::from_frame(frames[0].to_vec());
        assert_eq!(parsed.command().unwrap(), Command::Set);
        assert_eq!(parsed.key_as_bytes().unwrap(), b"k1");
        assert_eq!(parsed.value_as_bytes().unwrap(), b"v1");
    }
}
