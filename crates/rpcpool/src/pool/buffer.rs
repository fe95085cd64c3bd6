//! Bounded store of idle connections

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;

/// Lock-free bounded queue of idle connections with an explicit shutdown flag
///
/// Pushes and pops never block. Once closed, pushes are refused; pops keep
/// working so the closer can drain whatever is left.
pub(crate) struct IdleBuffer<C> {
    queue: ArrayQueue<C>,
    closed: AtomicBool,
}

impl<C> IdleBuffer<C> {
    /// # Panics
    ///
    /// Panics if `capacity` is 0. Pool configuration rejects that earlier.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
        }
    }

    /// Insert without waiting, handing the connection back when full or closed
    pub(crate) fn try_push(&self, conn: C) -> Result<(), C> {
        if self.is_closed() {
            return Err(conn);
        }
        self.queue.push(conn)
    }

    pub(crate) fn try_pop(&self) -> Option<C> {
        self.queue.pop()
    }

    /// Refuse further inserts
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pop every connection currently present
    pub(crate) fn drain(&self) -> impl Iterator<Item = C> + '_ {
        std::iter::from_fn(move || self.queue.pop())
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
