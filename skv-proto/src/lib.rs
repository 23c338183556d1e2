//! # StratusKV Wire Protocol
//!
//! Purpose: Define the length-prefixed binary protocol shared by the
//! StratusKV client and server: the fixed 16-byte frame header, the
//! key/value entry codec over a growable chunked buffer, and the streaming
//! frame decoder.
//!
//! ## Design Principles
//! 1. **Bit-Exact Layout**: Header offsets and entry prefixes are the wire
//!    contract; everything is big-endian and byte-addressed.
//! 2. **No Relocation**: Buffer growth appends chunks; written bytes and
//!    cursors survive every expansion.
//! 3. **Whole Frames Only**: The decoder never emits a partial frame.

pub mod buffer;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;

pub use buffer::ChunkBuffer;
pub use error::{ErrorKind, ProtoError, ProtoResult};
pub use frame::{FrameDecoder, DEFAULT_MAX_FRAME_LEN};
pub use header::{Command, Status, HDR_END_OFFSET};
pub use message::{Message, Request, Response};
