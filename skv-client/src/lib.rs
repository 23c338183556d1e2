//! # StratusKV Async Client
//!
//! Purpose: Multiplex concurrent callers over a bounded pool of TCP
//! connections to one StratusKV endpoint, one request per connection at a
//! time, correlating each connection's next inbound frame with the caller
//! that wrote to it.
//!
//! ## Design Principles
//! 1. **Serialize Per Connection**: A connection carries exactly one
//!    outstanding request, so connection identity alone correlates
//!    responses.
//! 2. **Fail Fast, Clean Up Locally**: Errors surface to the caller
//!    unretried; the client only removes registrations and discards broken
//!    connections.
//! 3. **Attachment Before Use**: Every connection gets its frame decoder
//!    and correlator hookup before the pool will hand it out.
//!
//! ```no_run
//! use skv_client::{Client, ClientConfig};
//!
//! # async fn example() -> Result<(), skv_client::ClientError> {
//! let client = Client::connect(ClientConfig::default()).await?;
//! client.set(b"user:42", b"alice").await?;
//! let value = client.get(b"user:42").await?;
//! assert_eq!(value.as_deref(), Some(&b"alice"[..]));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod conn;
pub mod correlator;
pub mod error;
pub mod pool;
pub mod routing;

pub use client::{Client, ClientConfig, MIN_POOL_SIZE};
pub use conn::Connection;
pub use correlator::Correlator;
pub use error::{ClientError, ClientResult};
pub use pool::{ConnectionPool, PoolConfig};
pub use routing::{route_key, HASH_SEED};
