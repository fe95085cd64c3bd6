//! Connection pooling for remote-call clients
//!
//! This module provides a bounded pool of long-lived connections. Callers get
//! a handle, use it like any connection, and close it to hand the connection
//! back for reuse.
//!
//! # Example
//!
//! ```ignore
//! use rpcpool::pool::{ChannelPool, PoolConfig};
//!
//! let config = PoolConfig::new(5, 30)?;
//! let pool = ChannelPool::new(config, || MyClient::dial("127.0.0.1:7777"))?;
//!
//! let conn = pool.get()?;
//! let reply = conn.call("Arith.Multiply", &json!({ "a": 7, "b": 8 }));
//! if reply.as_ref().is_err_and(|e| e.is_transport()) {
//!     conn.mark_unusable();
//! }
//! // Back into the pool, or closed if it was marked unusable
//! conn.close()?;
//! ```

mod buffer;
mod config;
mod handle;
mod pool;


pub use config::PoolConfig;
pub use handle::PooledConnection;
pub use pool::{ChannelPool, ConnectionFactory, Pool};
