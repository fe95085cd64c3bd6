//! rpcpool - Pooling of long-lived remote-call connections
//!
//! This crate hands out connections from a bounded pool and recycles them when
//! callers close their handles.

pub mod pool;

pub use pool::{ChannelPool, ConnectionFactory, Pool, PoolConfig, PooledConnection};
pub use rpcpool_core::{
    CallCompletion, CallId, CompletionReceiver, CompletionSender, PendingCall, Result,
    RpcConnection, RpcError, Value, completion_channel,
};
