//! # Pooled Connection
//!
//! Purpose: Wrap one TCP connection with the inbound pipeline the protocol
//! requires: a streaming frame decoder feeding the response correlator.
//!
//! ## Design Principles
//! 1. **Attach Before Use**: The decoder and correlator are installed on the
//!    read half before the connection is handed to anyone; no frame can slip
//!    past uncorrelated.
//! 2. **Exclusive Ownership**: While checked out, a connection belongs to
//!    exactly one send operation.
//! 3. **Fail Closed**: EOF, IO errors, and protocol violations all fail the
//!    pending promise and mark the connection unhealthy; it is never pooled
//!    again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use skv_proto::FrameDecoder;

use crate::correlator::Correlator;
use crate::error::ClientError;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// One transport connection, owned by the pool and checked out to at most
/// one in-flight send at a time.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    writer: OwnedWriteHalf,
    closed: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
}

impl Connection {
    /// Install the inbound pipeline on a fresh stream and return the usable
    /// connection.
    ///
    /// Spawns the per-connection read task: bytes from the transport feed
    /// the frame decoder, and every complete frame goes to the correlator.
    pub fn attach(stream: TcpStream, correlator: Arc<Correlator>) -> Self {
        let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        let (reader, writer) = stream.into_split();
        let closed = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(read_loop(id, reader, correlator, closed.clone()));
        tracing::debug!(conn_id = id, "connection attached");

        Connection {
            id,
            writer,
            closed,
            reader_task,
        }
    }

    /// Stable identity used as the correlator key.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the transport is still believed usable.
    pub fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Write one finalized frame and flush it.
    pub async fn write_frame(&mut self, slices: &[&[u8]]) -> std::io::Result<()> {
        for slice in slices {
            self.writer.write_all(slice).await?;
        }
        self.writer.flush().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Per-connection inbound loop: transport bytes → frame decoder → correlator.
async fn read_loop(
    conn_id: u64,
    mut reader: OwnedReadHalf,
    correlator: Arc<Correlator>,
    closed: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 8 * 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!(conn_id, "peer closed connection");
                correlator.fail(conn_id, ClientError::ConnectionClosed);
                break;
            }
            Ok(n) => match decoder.push(&buf[..n]) {
                Ok(frames) => {
                    for frame in frames {
                        correlator.complete(conn_id, frame);
                    }
                }
                Err(err) => {
                    tracing::warn!(conn_id, %err, "protocol violation on inbound stream");
                    correlator.fail(conn_id, ClientError::Proto(err));
                    break;
                }
            },
            Err(err) => {
                tracing::debug!(conn_id, %err, "read failure");
                correlator.fail(conn_id, ClientError::Io(err));
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
}
