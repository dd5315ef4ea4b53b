//! Bounded multi-producer buffer drained by a single consumer
//!
//! Producers can insert three ways: [`BoundedBuffer::try_push`] never waits,
//! [`BoundedBuffer::push_blocking`] parks the calling thread while the
//! buffer is full and [`BoundedBuffer::push`] suspends the calling task.
//! Blocking producers wait on a condition variable and async producers on
//! a `Notify`, so either kind can be woken by the consumer regardless of
//! which runtime (if any) it runs on.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tokio::sync::Notify;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushError<T> {
    Full(T),
    Closed(T),
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Items ever inserted; drained items leave in the same order
    pushed: u64,
}

pub(crate) struct BoundedBuffer<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    space_freed: Condvar,
    space_notify: Notify,
}

impl<T> BoundedBuffer<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                pushed: 0,
            }),
            capacity,
            space_freed: Condvar::new(),
            space_notify: Notify::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of items inserted so far, counted under the same lock as the
    /// insert itself
    pub(crate) fn pushed(&self) -> u64 {
        self.state.lock().pushed
    }

    pub(crate) fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PushError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        state.items.push_back(item);
        state.pushed += 1;
        Ok(())
    }

    /// Insert, parking the thread while full. `Err` hands back the item if
    /// the buffer was closed before space became available.
    pub(crate) fn push_blocking(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(item);
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                state.pushed += 1;
                return Ok(());
            }
            self.space_freed.wait(&mut state);
        }
    }

    /// Insert, suspending the task while full
    pub(crate) async fn push(&self, mut item: T) -> Result<(), T> {
        loop {
            let notified = self.space_notify.notified();
            tokio::pin!(notified);
            // register before checking so a drain in between is not missed
            notified.as_mut().enable();

            match self.try_push(item) {
                Ok(()) => return Ok(()),
                Err(PushError::Closed(rejected)) => return Err(rejected),
                Err(PushError::Full(rejected)) => item = rejected,
            }
            notified.await;
        }
    }

    /// Move up to `max` items into `out` without waiting; returns the count
    pub(crate) fn drain_into(&self, out: &mut Vec<T>, max: usize) -> usize {
        let taken = {
            let mut state = self.state.lock();
            let n = max.min(state.items.len());
            out.extend(state.items.drain(..n));
            n
        };
        if taken > 0 {
            self.wake_producers();
        }
        taken
    }

    /// Stop accepting items and release every waiting producer.
    ///
    /// Items already buffered stay available to `drain_into`.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.wake_producers();
    }

    fn wake_producers(&self) {
        self.space_freed.notify_all();
        self.space_notify.notify_waiters();
    }
}
