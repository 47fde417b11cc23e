//! Bounded message queues between caller threads and the state machine

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// FIFO of raw text messages with a depth limit
///
/// Storage exists only while the state machine runs: the queue is opened
/// when the worker starts and closed (dropping its contents) when it exits.
/// A closed queue rejects pushes.
pub(crate) struct BoundedQueue {
    capacity: AtomicUsize,
    items: Mutex<Option<VecDeque<String>>>,
}

impl BoundedQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity),
            items: Mutex::new(None),
        }
    }

    pub(crate) fn open(&self) {
        let mut items = self.items.lock();
        if items.is_none() {
            *items = Some(VecDeque::with_capacity(self.capacity().min(1024)));
        }
    }

    pub(crate) fn close(&self) {
        *self.items.lock() = None;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.items.lock().is_some()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// New depth; entries beyond it stay queued but block further pushes
    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    /// Append at the tail. Returns false if the queue is closed or full.
    pub(crate) fn push(&self, item: String) -> bool {
        self.push_if(item, |_| true)
    }

    /// Append at the tail if `admit` accepts the item, checked under the
    /// same lock as the depth.
    pub(crate) fn push_if(&self, item: String, admit: impl FnOnce(&str) -> bool) -> bool {
        let capacity = self.capacity();
        let mut guard = self.items.lock();
        match guard.as_mut() {
            Some(items) if items.len() < capacity && admit(&item) => {
                items.push_back(item);
                true
            }
            _ => false,
        }
    }

    /// Copy of the oldest entry, left in place
    pub(crate) fn front(&self) -> Option<String> {
        self.items.lock().as_ref()?.front().cloned()
    }

    pub(crate) fn pop(&self) -> Option<String> {
        self.items.lock().as_mut()?.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.lock().as_ref().map_or(0, VecDeque::len)
    }
}
