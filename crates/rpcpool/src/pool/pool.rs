//! Connection pool implementation

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rpcpool_core::{Result, RpcConnection, RpcError};

use super::buffer::IdleBuffer;
use super::config::PoolConfig;
use super::handle::PooledConnection;

/// Factory trait for creating new connections
///
/// Called once per connection the pool needs to open, possibly from many
/// threads at once. Errors are handed to the caller unchanged.
pub trait ConnectionFactory<C>: Send + Sync + 'static {
    /// Create a new connection
    fn create(&self) -> Result<C>;
}

impl<C, F> ConnectionFactory<C> for F
where
    F: Fn() -> Result<C> + Send + Sync + 'static,
{
    fn create(&self) -> Result<C> {
        self()
    }
}

/// Caller-facing interface of a connection pool
pub trait Pool: Send + Sync {
    type Connection: RpcConnection;

    /// Get a connection from the pool
    ///
    /// Closing the returned handle puts the connection back. Closing it when
    /// the pool is full or shut down closes the connection instead, and any
    /// error from that close is reported to the caller.
    fn get(&self) -> Result<PooledConnection<Self::Connection>>;

    /// Shut the pool down and close every idle connection
    ///
    /// The pool is unusable afterwards. Calling this twice is harmless.
    fn close(&self);

    /// Number of idle connections currently held by the pool
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The parts of the pool that are cleared on shutdown
struct Store<C> {
    idle: Arc<IdleBuffer<C>>,
    factory: Arc<dyn ConnectionFactory<C>>,
}

impl<C> Clone for Store<C> {
    fn clone(&self) -> Self {
        Self {
            idle: Arc::clone(&self.idle),
            factory: Arc::clone(&self.factory),
        }
    }
}

struct Shared<C: RpcConnection> {
    config: PoolConfig,
    /// `None` once the pool has been shut down
    store: Mutex<Option<Store<C>>>,
}

impl<C: RpcConnection> Shared<C> {
    /// Capture and clear the store, then close whatever is idle
    ///
    /// Only the caller that finds the store present does any work.
    fn shutdown(&self) -> bool {
        let store = self.store.lock().take();
        let Some(store) = store else {
            return false;
        };

        store.idle.close();

        let mut drained = 0usize;
        let mut failed = 0usize;
        for conn in store.idle.drain() {
            drained += 1;
            if let Err(e) = conn.close() {
                failed += 1;
                tracing::warn!(error = %e, "failed to close idle connection during shutdown");
            }
        }

        tracing::info!(drained, failed, "connection pool closed");
        true
    }
}

impl<C: RpcConnection> Drop for Shared<C> {
    fn drop(&mut self) {
        if self.store.get_mut().is_some() {
            tracing::debug!("connection pool dropped without close, shutting down");
            self.shutdown();
        }
    }
}

/// A pool of reusable connections backed by a bounded idle buffer
///
/// `get` never waits: it hands out an idle connection when one is available
/// and asks the factory for a new one otherwise. Only the idle buffer is
/// bounded; connections returned while it is full are closed.
///
/// Clones share the same pool.
pub struct ChannelPool<C: RpcConnection> {
    shared: Arc<Shared<C>>,
}

impl<C: RpcConnection> Clone for ChannelPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: RpcConnection> ChannelPool<C> {
    /// Create a new connection pool with the given configuration and factory
    ///
    /// Opens `initial_size` connections up front. If the factory fails for
    /// any of them, the connections created so far are closed and the
    /// factory's error is returned wrapped in [`RpcError::InitialFill`].
    #[tracing::instrument(
        skip(factory),
        fields(initial_size = config.initial_size(), max_size = config.max_size())
    )]
    pub fn new<F: ConnectionFactory<C>>(config: PoolConfig, factory: F) -> Result<Self> {
        let idle = Arc::new(IdleBuffer::new(config.max_size()));
        let factory: Arc<dyn ConnectionFactory<C>> = Arc::new(factory);

        let pool = Self {
            shared: Arc::new(Shared {
                config,
                store: Mutex::new(Some(Store {
                    idle: Arc::clone(&idle),
                    factory: Arc::clone(&factory),
                })),
            }),
        };

        for created in 0..config.initial_size() {
            let conn = match factory.create() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, created, "factory is not able to fill the pool");
                    pool.close();
                    return Err(RpcError::InitialFill(Box::new(e)));
                }
            };

            // initial_size <= max_size, so this only fails if the invariant is broken
            if let Err(conn) = idle.try_push(conn) {
                let _ = conn.close();
            }
        }

        tracing::info!(idle = idle.len(), "connection pool created");
        Ok(pool)
    }

    /// Create a pool from bare sizes, validating them first
    pub fn with_capacity<F: ConnectionFactory<C>>(
        initial_size: usize,
        max_size: usize,
        factory: F,
    ) -> Result<Self> {
        Self::new(PoolConfig::new(initial_size, max_size)?, factory)
    }

    fn store(&self) -> Option<Store<C>> {
        self.shared.store.lock().clone()
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Take an idle connection if one is available right now
    /// 2. Otherwise create a new connection through the factory
    ///
    /// Returns [`RpcError::PoolClosed`] once the pool has been shut down.
    pub fn get(&self) -> Result<PooledConnection<C>> {
        let Some(store) = self.store() else {
            return Err(RpcError::PoolClosed);
        };

        match store.idle.try_pop() {
            Some(conn) => {
                tracing::trace!(idle = store.idle.len(), "reusing idle connection");
                Ok(self.wrap(conn))
            }
            // drained by a concurrent shutdown
            None if store.idle.is_closed() => Err(RpcError::PoolClosed),
            None => {
                let conn = store.factory.create()?;
                tracing::debug!("no idle connection, created a new one");
                Ok(self.wrap(conn))
            }
        }
    }

    /// Bind a raw connection to a fresh handle
    fn wrap(&self, conn: C) -> PooledConnection<C> {
        PooledConnection::new(conn, self.clone())
    }

    /// Return a connection to the pool
    ///
    /// If the pool is full or closed the connection is closed instead and
    /// the outcome of that close is returned.
    pub(crate) fn put(&self, conn: Option<C>) -> Result<()> {
        let conn = conn.ok_or(RpcError::NilConnection)?;

        let (rejected, closed) = {
            let store = self.shared.store.lock();
            match store.as_ref() {
                Some(store) => (store.idle.try_push(conn).err(), false),
                None => (Some(conn), true),
            }
        };

        match rejected {
            None => Ok(()),
            Some(conn) => {
                if closed {
                    tracing::debug!("pool is closed, closing returned connection");
                } else {
                    tracing::debug!("pool is full, closing returned connection");
                }
                conn.close()
            }
        }
    }

    /// Close the pool and every idle connection in it
    ///
    /// Errors from individual connections are logged and otherwise ignored.
    /// Connections that are checked out at this point are closed when their
    /// handles are released.
    #[tracing::instrument(skip(self))]
    pub fn close(&self) {
        if !self.shared.shutdown() {
            tracing::trace!("connection pool already closed");
        }
    }

    /// Number of idle connections, 0 once closed
    pub fn len(&self) -> usize {
        self.shared
            .store
            .lock()
            .as_ref()
            .map_or(0, |store| store.idle.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether the pool has been shut down
    pub fn is_closed(&self) -> bool {
        self.shared.store.lock().is_none()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }
}

impl<C: RpcConnection> Pool for ChannelPool<C> {
    type Connection = C;

    fn get(&self) -> Result<PooledConnection<C>> {
        ChannelPool::get(self)
    }

    fn close(&self) {
        ChannelPool::close(self)
    }

    fn len(&self) -> usize {
        ChannelPool::len(self)
    }
}

impl<C: RpcConnection> fmt::Debug for ChannelPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("idle", &self.len())
            .field("max_size", &self.shared.config.max_size())
            .field("closed", &self.is_closed())
            .finish()
    }
}
