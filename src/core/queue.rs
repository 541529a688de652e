//! Blocking FIFO queue with optional capacity, and the message type that flows
//! through it.
//!
//! Every queue in the pool carries [`Message`] values: either a task or the
//! shutdown sentinel. Keeping the sentinel as an enum variant means a worker
//! matches on it exhaustively instead of comparing against a magic value.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use parking_lot::{Condvar, Mutex};

/// Element type of every pool queue.
#[derive(Debug)]
pub enum Message<T> {
    /// A unit of work to execute.
    Task(T),
    /// No further work will arrive for the worker that consumes this.
    Shutdown,
}

impl<T> Message<T> {
    /// Returns `true` for the shutdown sentinel.
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Thread-safe FIFO queue.
///
/// With a capacity, `push` blocks while the queue is full (backpressure).
/// Without one, `push` never blocks. `pop` always blocks while the queue is
/// empty. Any number of producers and consumers may share the queue through an
/// `Arc`.
///
/// Uses a single `parking_lot::Mutex` around the buffer plus two
/// `parking_lot::Condvar`s, one per waiting side.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<NonZeroUsize>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Create a queue that never blocks producers.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Create a queue with an optional capacity; `None` is unbounded.
    pub fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        let initial = capacity.map_or(0, |c| c.get().min(1024));
        Self {
            items: Mutex::new(VecDeque::with_capacity(initial)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append `item` at the tail, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        if let Some(capacity) = self.capacity {
            self.not_full
                .wait_while(&mut items, |items| items.len() >= capacity.get());
        }
        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
    }

    /// Remove and return the head, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                if self.capacity.is_some() {
                    self.not_full.notify_one();
                }
                return item;
            }
            self.not_empty.wait(&mut items);
        }
    }

    /// Number of items currently queued. Stale as soon as it returns.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Configured capacity, `None` when unbounded.
    pub const fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
