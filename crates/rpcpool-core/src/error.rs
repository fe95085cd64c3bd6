//! Error types for rpcpool

use thiserror::Error;

/// Core error type for pool and connection operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("factory is not able to fill the pool: {0}")]
    InitialFill(#[source] Box<RpcError>),

    #[error("pool is closed")]
    PoolClosed,

    #[error("connection is nil, rejecting")]
    NilConnection,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Call error: {0}")]
    Call(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RpcError {
    /// Whether this error reports an operation against a shut down pool
    pub fn is_pool_closed(&self) -> bool {
        matches!(self, RpcError::PoolClosed)
    }

    /// Whether this error came from the transport rather than the remote side
    ///
    /// Callers typically mark a pooled handle unusable after a transport error
    /// so the broken connection is destroyed instead of recycled.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Connection(_) | RpcError::Io(_))
    }
}

/// Result type alias for rpcpool operations
pub type Result<T> = std::result::Result<T, RpcError>;
