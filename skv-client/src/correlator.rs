//! # Response Correlator
//!
//! Purpose: Associate each connection that has an outstanding request with
//! the promise that should receive that connection's next decoded frame, or
//! its failure.
//!
//! ## Design Principles
//! 1. **Connection Identity Is the Key**: At most one request is outstanding
//!    per connection, so no request id is needed on the wire.
//! 2. **Resolve Exactly Once**: Every registration is removed in the same
//!    step that resolves it; a second resolution finds nothing to resolve.
//! 3. **Orphans Are Dropped**: A frame arriving with no registration is
//!    released, not queued. It is a defensive branch, not an expected path.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::ClientError;

type ResponseSender = oneshot::Sender<Result<Bytes, ClientError>>;

/// Receiver half of one pending request's promise.
pub type ResponseReceiver = oneshot::Receiver<Result<Bytes, ClientError>>;

/// Map from connection identity to the promise awaiting its next frame.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Mutex<HashMap<u64, ResponseSender>>,
}

impl Correlator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Correlator {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending request on `conn_id` and return the promise's
    /// receiving half.
    ///
    /// The serialization invariant (one outstanding request per connection)
    /// means no registration can already exist for the key.
    pub fn register(&self, conn_id: u64) -> ResponseReceiver {
        let (tx, rx) = oneshot::channel();
        let previous = self
            .pending
            .lock()
            .expect("correlator mutex poisoned")
            .insert(conn_id, tx);
        debug_assert!(previous.is_none(), "duplicate registration for connection {conn_id}");
        rx
    }

    /// Resolve the pending request on `conn_id` with a decoded frame.
    ///
    /// Frames for connections with no registration are discarded.
    pub fn complete(&self, conn_id: u64, frame: Bytes) {
        let sender = self
            .pending
            .lock()
            .expect("correlator mutex poisoned")
            .remove(&conn_id);
        match sender {
            // A dropped receiver just means the caller went away first.
            Some(tx) => {
                let _ = tx.send(Ok(frame));
            }
            None => {
                tracing::warn!(conn_id, "discarding frame with no registered promise");
            }
        }
    }

    /// Resolve the pending request on `conn_id` with a failure.
    ///
    /// A no-op when nothing is registered, so closure notifications after
    /// resolution cannot double-resolve.
    pub fn fail(&self, conn_id: u64, err: ClientError) {
        let sender = self
            .pending
            .lock()
            .expect("correlator mutex poisoned")
            .remove(&conn_id);
        if let Some(tx) = sender {
            let _ = tx.send(Err(err));
        }
    }

    /// Drop the registration for `conn_id` without resolving it.
    ///
    /// Used when the send path fails before the request reaches the wire.
    pub fn remove(&self, conn_id: u64) {
        self.pending
            .lock()
            .expect("correlator mutex poisoned")
            .remove(&conn_id);
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.pending.lock().expect("correlator mutex poisoned").len()
    }

    /// Whether no registrations are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_resolves_and_removes() {
        let correlator = Correlator::new();
        let rx = correlator.register(1);
        assert_eq!(correlator.len(), 1);

        correlator.complete(1, Bytes::from_static(b"frame"));
        assert!(correlator.is_empty());

        let result = rx.await.expect("promise resolved");
        assert_eq!(result.unwrap(), Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn test_fail_resolves_with_error() {
        let correlator = Correlator::new();
        let rx = correlator.register(2);

        correlator.fail(2, ClientError::ConnectionClosed);
        assert!(correlator.is_empty());

        let result = rx.await.expect("promise resolved");
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_resolution_happens_exactly_once() {
        let correlator = Correlator::new();
        let rx = correlator.register(3);

        correlator.fail(3, ClientError::ConnectionClosed);
        // A later frame or closure for the same connection finds nothing.
        correlator.complete(3, Bytes::from_static(b"late"));
        correlator.fail(3, ClientError::ConnectionClosed);

        let result = rx.await.expect("promise resolved");
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_orphan_frame_is_dropped() {
        let correlator = Correlator::new();
        correlator.complete(42, Bytes::from_static(b"orphan"));
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn test_remove_leaves_promise_unresolved() {
        let correlator = Correlator::new();
        let rx = correlator.register(4);
        correlator.remove(4);
        assert!(correlator.is_empty());

        // Sender dropped without a value: the receiver sees cancellation.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_connections_are_independent() {
        let correlator = Correlator::new();
        let rx_a = correlator.register(10);
        let rx_b = correlator.register(11);

        correlator.complete(11, Bytes::from_static(b"b"));
        assert_eq!(correlator.len(), 1);

        correlator.complete(10, Bytes::from_static(b"a"));
        assert_eq!(rx_a.await.unwrap().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(rx_b.await.unwrap().unwrap(), Bytes::from_static(b"b"));
    }
}
