//! # Connection Pool
//!
//! Purpose: Maintain a bounded set of connections to one remote endpoint and
//! hand them out one caller at a time.
//!
//! ## Design Principles
//! 1. **Bounded**: The live connection count never exceeds the configured
//!    maximum; callers beyond the bound wait, up to a deadline.
//! 2. **Lazy With a Warm Floor**: A minimum is dialed up front; the rest are
//!    created on demand when a caller finds no idle connection and a slot is
//!    free.
//! 3. **Health Gated**: An unhealthy connection is never handed out and
//!    never returned to the idle set; its slot is freed instead.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use crate::conn::Connection;
use crate::correlator::Correlator;
use crate::error::{ClientError, ClientResult};

/// Endpoint and sizing parameters for one pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    /// Hard upper bound on live connections.
    pub max_connections: usize,
    /// Connections dialed at construction.
    pub min_connections: usize,
    /// Bound on both dialing and waiting for a free connection.
    pub connect_timeout: Duration,
    /// TCP keepalive interval, when set.
    pub keepalive: Option<Duration>,
    /// Disable Nagle's algorithm on every connection.
    pub nodelay: bool,
}

#[derive(Debug)]
struct PoolState {
    idle: VecDeque<Connection>,
    /// Idle plus checked-out plus being-dialed connections.
    total: usize,
}

#[derive(Debug)]
struct PoolInner {
    config: PoolConfig,
    correlator: Arc<Correlator>,
    state: Mutex<PoolState>,
    /// Signalled whenever an idle connection or a free slot appears.
    available: Notify,
    closed: AtomicBool,
}

/// Bounded pool of connections to a single endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Build the pool and pre-warm `min_connections`.
    pub async fn connect(config: PoolConfig, correlator: Arc<Correlator>) -> ClientResult<Self> {
        let pool = ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                correlator,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                }),
                available: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        };

        let warm = pool
            .inner
            .config
            .min_connections
            .min(pool.inner.config.max_connections);
        for _ in 0..warm {
            let conn = pool.create_connection().await?;
            let mut state = pool.inner.state.lock().await;
            state.total += 1;
            state.idle.push_back(conn);
        }
        tracing::debug!(
            warm,
            max = pool.inner.config.max_connections,
            "connection pool ready"
        );

        Ok(pool)
    }

    /// Check a connection out, waiting up to the connect timeout for one to
    /// become available.
    pub async fn acquire(&self) -> ClientResult<Connection> {
        let deadline = Instant::now() + self.inner.config.connect_timeout;

        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(ClientError::PoolExhausted);
            }

            // Holding the lock only long enough to pop or reserve a slot.
            let mut reserved = false;
            {
                let mut state = self.inner.state.lock().await;
                while let Some(conn) = state.idle.pop_front() {
                    if conn.is_healthy() {
                        return Ok(conn);
                    }
                    tracing::debug!(conn_id = conn.id(), "dropping unhealthy idle connection");
                    state.total -= 1;
                    self.inner.available.notify_one();
                }
                if state.total < self.inner.config.max_connections {
                    state.total += 1;
                    reserved = true;
                }
            }

            if reserved {
                match self.create_connection().await {
                    Ok(conn) => return Ok(conn),
                    Err(err) => {
                        let mut state = self.inner.state.lock().await;
                        state.total -= 1;
                        self.inner.available.notify_one();
                        return Err(err);
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::AcquireTimeout(self.inner.config.connect_timeout));
            }
            if timeout(remaining, self.inner.available.notified())
                .await
                .is_err()
            {
                return Err(ClientError::AcquireTimeout(self.inner.config.connect_timeout));
            }
        }
    }

    /// Return a connection to the idle set, discarding it when unusable.
    pub async fn release(&self, conn: Connection) {
        if !conn.is_healthy() || self.inner.closed.load(Ordering::Acquire) {
            self.discard(conn).await;
            return;
        }
        let mut state = self.inner.state.lock().await;
        state.idle.push_back(conn);
        self.inner.available.notify_one();
    }

    /// Drop a connection and free its slot.
    pub async fn discard(&self, conn: Connection) {
        tracing::debug!(conn_id = conn.id(), "discarding connection");
        drop(conn);
        let mut state = self.inner.state.lock().await;
        state.total -= 1;
        self.inner.available.notify_one();
    }

    /// Refuse new acquires and terminate every idle connection.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut state = self.inner.state.lock().await;
        let dropped = state.idle.len();
        state.total -= dropped;
        state.idle.clear();
        self.inner.available.notify_waiters();
        tracing::debug!(dropped, "connection pool closed");
    }

    /// Idle connections currently pooled.
    pub async fn idle_count(&self) -> usize {
        self.inner.state.lock().await.idle.len()
    }

    /// Live connections, checked out or idle.
    pub async fn total_count(&self) -> usize {
        self.inner.state.lock().await.total
    }

    async fn create_connection(&self) -> ClientResult<Connection> {
        let addr: SocketAddr = format!("{}:{}", self.inner.config.host, self.inner.config.port)
            .parse()
            .map_err(|_| ClientError::InvalidAddress)?;

        let stream = timeout(self.inner.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::AcquireTimeout(self.inner.config.connect_timeout))??;

        configure_socket(&stream, &self.inner.config)?;

        Ok(Connection::attach(stream, self.inner.correlator.clone()))
    }
}

fn configure_socket(stream: &TcpStream, config: &PoolConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.nodelay)?;
    if let Some(interval) = config.keepalive {
        let sock = SockRef::from(stream);
        sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(interval))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn config(port: u16, max: usize, min: usize) -> PoolConfig {
        PoolConfig {
            host: "127.0.0.1".to_string(),
            port,
            max_connections: max,
            min_connections: min,
            connect_timeout: Duration::from_millis(200),
            keepalive: None,
            nodelay: true,
        }
    }

    /// Accepts connections and keeps them open without answering.
    async fn silent_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        });
        port
    }

    #[tokio::test]
    async fn test_prewarms_minimum_connections() {
        let port = silent_server().await;
        let pool = ConnectionPool::connect(config(port, 4, 2), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        assert_eq!(pool.idle_count().await, 2);
        assert_eq!(pool.total_count().await, 2);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_connections() {
        let port = silent_server().await;
        let pool = ConnectionPool::connect(config(port, 2, 0), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        let a = pool.acquire().await.expect("first");
        let b = pool.acquire().await.expect("second");
        assert_eq!(pool.total_count().await, 2);

        let err = pool.acquire().await.expect_err("beyond the bound");
        assert!(matches!(err, ClientError::AcquireTimeout(_)));

        pool.release(a).await;
        pool.release(b).await;
    }

    #[tokio::test]
    async fn test_release_makes_waiter_progress() {
        let port = silent_server().await;
        let pool = ConnectionPool::connect(config(port, 1, 0), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        let held = pool.acquire().await.expect("first");

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.release(held).await;

        let conn = waiter.await.expect("join").expect("acquired after release");
        assert_eq!(pool.total_count().await, 1);
        pool.release(conn).await;
    }

    #[tokio::test]
    async fn test_discard_frees_the_slot() {
        let port = silent_server().await;
        let pool = ConnectionPool::connect(config(port, 1, 0), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        let conn = pool.acquire().await.expect("first");
        pool.discard(conn).await;
        assert_eq!(pool.total_count().await, 0);

        let replacement = pool.acquire().await.expect("slot was freed");
        pool.release(replacement).await;
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let port = silent_server().await;
        let pool = ConnectionPool::connect(config(port, 2, 0), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        let first = pool.acquire().await.expect("first");
        let id = first.id();
        pool.release(first).await;

        let again = pool.acquire().await.expect("second");
        assert_eq!(again.id(), id);
        pool.release(again).await;
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_acquire() {
        let port = silent_server().await;
        let pool = ConnectionPool::connect(config(port, 2, 1), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        pool.close().await;
        assert_eq!(pool.idle_count().await, 0);
        assert_eq!(pool.total_count().await, 0);

        let err = pool.acquire().await.expect_err("pool is closed");
        assert!(matches!(err, ClientError::PoolExhausted));
    }

    #[tokio::test]
    async fn test_unhealthy_idle_connection_not_handed_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let pool = ConnectionPool::connect(config(port, 2, 0), Arc::new(Correlator::new()))
            .await
            .expect("pool");

        // Dial one connection, then have the server hang up on it.
        let accept = tokio::spawn(async move { listener.accept().await });
        let conn = pool.acquire().await.expect("first");
        let first_id = conn.id();
        let (server_side, _) = accept.await.expect("join").expect("accept");
        pool.release(conn).await;
        drop(server_side);

        // Wait for the read loop to observe the closure.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = pool.acquire().await.expect_err("no server left to dial");
        assert!(matches!(
            err,
            ClientError::Io(_) | ClientError::AcquireTimeout(_)
        ));
        // The dead connection was dropped rather than handed back out.
        assert_ne!(pool.idle_count().await, 1, "conn {first_id} must not be pooled");
    }
}
