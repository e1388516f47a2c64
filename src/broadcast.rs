//! Close-based broadcast.
//!
//! The publisher stores the value in a once-only slot and then closes a
//! signal channel. Closing is visible to every subscriber at once, and the
//! slot's write happens-before any read that follows the observed close.

use crate::error::FutureError;
use crossbeam::channel::{after, bounded, select, Receiver, Sender, TryRecvError};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

struct Slot<T> {
    value: OnceLock<T>,
    closed: Receiver<()>,
}

pub struct Publisher<T> {
    slot: Arc<Slot<T>>,
    // Never sent on. Dropping it is the close.
    _signal: Sender<()>,
}

pub struct Subscriber<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

pub fn channel<T>() -> (Publisher<T>, Subscriber<T>) {
    let (signal, closed) = bounded(0);
    let slot = Arc::new(Slot {
        value: OnceLock::new(),
        closed,
    });
    let subscriber = Subscriber {
        slot: Arc::clone(&slot),
    };
    (
        Publisher {
            slot,
            _signal: signal,
        },
        subscriber,
    )
}

/// Computes on a new thread and publishes the result.
pub fn spawn<T, F>(compute: F) -> Subscriber<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (publisher, subscriber) = channel();
    thread::spawn(move || publisher.publish(compute()));
    subscriber
}

impl<T> Publisher<T> {
    /// Fills the slot, then closes the signal as `self` goes out of scope.
    pub fn publish(self, value: T) {
        // One publisher per slot, consumed here: the slot is always empty.
        let filled = self.slot.value.set(value);
        debug_assert!(filled.is_ok());
    }
}

impl<T> Subscriber<T> {
    /// Blocks until the signal channel is closed, then reads the slot.
    pub fn wait(&self) -> Result<&T, FutureError> {
        // recv only ever fails here: nothing is sent, closing is the signal.
        let _ = self.slot.closed.recv();
        self.published()
    }

    /// An already closed broadcast is read even for a zero timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<&T, FutureError> {
        if self.is_closed() {
            return self.published();
        }
        select! {
            recv(self.slot.closed) -> _ => self.published(),
            recv(after(timeout)) -> _ => Err(FutureError::TimedOut(timeout)),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.slot.closed.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn published(&self) -> Result<&T, FutureError> {
        self.slot.value.get().ok_or(FutureError::Disconnected)
    }
}
