//! Blocking bounded FIFO shared between pipeline stages.
//!
//! Used both as a hand-off queue between stages and as a free list of
//! preallocated items: a stage that needs a buffer pops one and blocks
//! until a downstream stage returns it.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Multi-producer, multi-consumer FIFO with a fixed capacity.
///
/// `push` blocks while the queue is full, `pop` while it is empty.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Create a full queue holding `count` items made by `make`; the
    /// capacity equals `count`.
    pub fn filled_with(count: usize, mut make: impl FnMut() -> T) -> Self {
        let queue = Self::new(count);
        {
            let mut items = queue.items.lock();
            for _ in 0..count {
                items.push_back(make());
            }
        }
        queue
    }

    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            self.not_full.wait(&mut items);
        }
        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
    }

    pub fn pop(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut items);
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
