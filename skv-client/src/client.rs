//! # Client Facade
//!
//! Purpose: The public entry point. Owns the pool and the correlator and
//! orchestrates one request/response exchange per call.
//!
//! ## Design Principles
//! 1. **One Request Per Connection At a Time**: A connection is checked out
//!    for the full exchange; its next inbound frame is this caller's answer.
//! 2. **No Internal Retries**: Every failure surfaces to the caller; the
//!    client's only recovery is cleanup.
//! 3. **Cheap to Share**: The handle is a pair of `Arc`s; clone it freely
//!    across tasks.

use std::sync::Arc;
use std::time::Duration;

use skv_proto::{Command, Request, Response, Status};

use crate::correlator::Correlator;
use crate::error::{ClientError, ClientResult};
use crate::pool::{ConnectionPool, PoolConfig};

/// Pools smaller than this thrash under concurrent load.
pub const MIN_POOL_SIZE: usize = 8;

/// Client-facing configuration; pool sizing is derived from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on live connections, floor-clamped to [`MIN_POOL_SIZE`].
    pub max_connections: usize,
    /// Bound on dialing and on waiting for a free connection.
    pub connect_timeout: Duration,
    /// TCP keepalive interval, when set.
    pub keepalive: Option<Duration>,
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: 7878,
            max_connections: 32,
            connect_timeout: Duration::from_secs(5),
            keepalive: Some(Duration::from_secs(60)),
            nodelay: true,
        }
    }
}

/// Handle to one remote endpoint; cloneable and task-safe.
#[derive(Debug, Clone)]
pub struct Client {
    pool: ConnectionPool,
    correlator: Arc<Correlator>,
}

impl Client {
    /// Connect to the configured endpoint and pre-warm the pool.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let max_connections = config.max_connections.max(MIN_POOL_SIZE);
        let pool_config = PoolConfig {
            host: config.host,
            port: config.port,
            max_connections,
            min_connections: (max_connections / 4).max(1),
            connect_timeout: config.connect_timeout,
            keepalive: config.keepalive,
            nodelay: config.nodelay,
        };

        let correlator = Arc::new(Correlator::new());
        let pool = ConnectionPool::connect(pool_config, correlator.clone()).await?;
        Ok(Client { pool, correlator })
    }

    /// Send one request and await its response.
    ///
    /// Acquires a connection, registers the response promise, writes the
    /// finalized frame, then awaits the connection's next inbound frame. Any
    /// failure after the write discards the connection; a failed write also
    /// removes the registration so no promise leaks.
    pub async fn send(&self, mut request: Request) -> ClientResult<Response> {
        request.finalize();

        let mut conn = self.pool.acquire().await?;
        let rx = self.correlator.register(conn.id());

        if let Err(err) = conn.write_frame(&request.as_slices()).await {
            self.correlator.remove(conn.id());
            self.pool.discard(conn).await;
            return Err(ClientError::Io(err));
        }

        match rx.await {
            Ok(Ok(frame)) => {
                self.pool.release(conn).await;
                Ok(Response::from_frame(frame.to_vec()))
            }
            Ok(Err(err)) => {
                self.pool.discard(conn).await;
                Err(err)
            }
            // Sender dropped without resolving: the read task is gone.
            Err(_) => {
                self.pool.discard(conn).await;
                Err(ClientError::ConnectionClosed)
            }
        }
    }

    /// Store `value` under `key`.
    pub async fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        let mut req = Request::new(Command::Set);
        req.key(key)?;
        req.value(value);
        req.set_count(1);

        let response = self.send(req).await?;
        match response.status()? {
            Status::Ok => Ok(()),
            other => Err(ClientError::UnexpectedStatus(other)),
        }
    }

    /// Fetch the value stored under `key`, or `None` when absent.
    pub async fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        let mut req = Request::new(Command::Get);
        req.key(key)?;
        req.set_count(1);

        let mut response = self.send(req).await?;
        match response.status()? {
            Status::Ok => Ok(Some(response.value_as_bytes()?)),
            Status::KeyUnknown => Ok(None),
            other => Err(ClientError::UnexpectedStatus(other)),
        }
    }

    /// Remove `key`; `false` when the key did not exist.
    pub async fn delete(&self, key: &[u8]) -> ClientResult<bool> {
        let mut req = Request::new(Command::Del);
        req.key(key)?;
        req.set_count(1);

        let response = self.send(req).await?;
        match response.status()? {
            Status::Ok => Ok(true),
            Status::KeyUnknown => Ok(false),
            other => Err(ClientError::UnexpectedStatus(other)),
        }
    }

    /// Round-trip `payload` through the replication echo command.
    pub async fn echo(&self, payload: &[u8]) -> ClientResult<Vec<u8>> {
        let mut req = Request::new(Command::Echo);
        req.value(payload);
        req.set_count(1);

        let mut response = self.send(req).await?;
        match response.status()? {
            Status::Ok => Ok(response.value_as_bytes()?),
            other => Err(ClientError::UnexpectedStatus(other)),
        }
    }

    /// Requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.len()
    }

    /// Shut the pool down; in-flight exchanges fail, new ones are refused.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
