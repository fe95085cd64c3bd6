//! rpcpool core - Abstractions shared by the pool and connection implementations
//!
//! This crate defines:
//!
//! - `RpcConnection` - Trait every pooled connection implements
//! - `PendingCall` / `CallCompletion` - Asynchronous call bookkeeping
//! - `RpcError` - Error type used across the workspace

mod call;
mod connection;
mod error;

pub use call::*;
pub use connection::*;
pub use error::*;

pub use serde_json::Value;
