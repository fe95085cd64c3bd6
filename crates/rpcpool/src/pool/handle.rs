//! Handle returned by the pool

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rpcpool_core::{CompletionSender, PendingCall, Result, RpcConnection, RpcError, Value};

use super::pool::ChannelPool;

/// A connection borrowed from the pool
///
/// Calls are forwarded to the wrapped connection. Closing the handle puts
/// the connection back into the pool instead of terminating it, unless the
/// handle was marked unusable, in which case the connection really is closed.
/// A handle dropped without being closed is released the same way.
pub struct PooledConnection<C: RpcConnection> {
    /// Taken out on release
    connection: RwLock<Option<C>>,
    pool: ChannelPool<C>,
    unusable: AtomicBool,
}

impl<C: RpcConnection> PooledConnection<C> {
    pub(crate) fn new(connection: C, pool: ChannelPool<C>) -> Self {
        Self {
            connection: RwLock::new(Some(connection)),
            pool,
            unusable: AtomicBool::new(false),
        }
    }

    /// Mark the connection as broken so closing the handle destroys it
    ///
    /// Only this handle is affected. Typically used after a call failed with
    /// a transport error.
    pub fn mark_unusable(&self) {
        self.unusable.store(true, Ordering::SeqCst);
    }

    pub fn is_unusable(&self) -> bool {
        self.unusable.load(Ordering::SeqCst)
    }

    /// Check whether the handle still holds its connection
    pub fn is_released(&self) -> bool {
        self.connection.read().is_none()
    }

    fn release(&self) -> Result<()> {
        let connection = self.connection.write().take();

        if self.is_unusable() {
            return match connection {
                Some(connection) => {
                    tracing::debug!("closing connection marked unusable");
                    connection.close()
                }
                None => Ok(()),
            };
        }

        self.pool.put(connection)
    }
}

impl<C: RpcConnection> RpcConnection for PooledConnection<C> {
    fn call(&self, method: &str, args: &Value) -> Result<Value> {
        match self.connection.read().as_ref() {
            Some(connection) => connection.call(method, args),
            None => Err(RpcError::NilConnection),
        }
    }

    fn call_async(&self, method: &str, args: Value, done: CompletionSender) -> PendingCall {
        match self.connection.read().as_ref() {
            Some(connection) => connection.call_async(method, args, done),
            None => {
                let pending = PendingCall::new(method);
                pending.deliver(&done, Err(RpcError::NilConnection));
                pending
            }
        }
    }

    /// Put the connection back into the pool
    ///
    /// An error here does not necessarily mean the connection misbehaved
    /// while in use: it may come from the pool closing a connection it had
    /// no room for. Closing an already released handle yields
    /// [`RpcError::NilConnection`] unless it was marked unusable.
    fn close(&self) -> Result<()> {
        self.release()
    }

    fn is_closed(&self) -> bool {
        self.connection
            .read()
            .as_ref()
            .is_none_or(|connection| connection.is_closed())
    }
}

impl<C: RpcConnection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if self.connection.get_mut().is_none() {
            return;
        }
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to release pooled connection on drop");
        }
    }
}

impl<C: RpcConnection> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("released", &self.is_released())
            .field("unusable", &self.is_unusable())
            .finish()
    }
}
