//! Connection capability trait

use serde_json::Value;

use crate::{CompletionSender, PendingCall, Result};

/// A client connection to a remote service
///
/// This is the only surface the pool relies on. Implementations own dialing,
/// the wire protocol and call dispatch; the pool merely stores connections
/// and closes the ones it evicts.
pub trait RpcConnection: Send + Sync + 'static {
    /// Invoke `method` and wait for its reply
    fn call(&self, method: &str, args: &Value) -> Result<Value>;

    /// Invoke `method` without waiting
    ///
    /// The returned [`PendingCall`] identifies the call; its outcome is sent
    /// on `done` once available.
    fn call_async(&self, method: &str, args: Value, done: CompletionSender) -> PendingCall;

    /// Terminate the connection
    fn close(&self) -> Result<()>;

    /// Check whether the connection has been closed
    ///
    /// Default implementation always returns false.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<T: RpcConnection + ?Sized> RpcConnection for Box<T> {
    fn call(&self, method: &str, args: &Value) -> Result<Value> {
        (**self).call(method, args)
    }

    fn call_async(&self, method: &str, args: Value, done: CompletionSender) -> PendingCall {
        (**self).call_async(method, args, done)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
