//! A future is a channel: the worker holds the sending half, the reader
//! holds the receiving half, and a blocking receive is the await.

use crate::error::FutureError;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Capacity of the handoff channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handoff {
    /// Zero capacity: the worker blocks until a reader takes the value.
    #[default]
    Unbuffered,
    /// One slot: the worker drops the value off and carries on.
    Buffered,
}

impl Handoff {
    pub fn capacity(self) -> usize {
        match self {
            Handoff::Unbuffered => 0,
            Handoff::Buffered => 1,
        }
    }
}

/// The worker's half.
pub struct Promise<T> {
    tx: Sender<T>,
}

impl<T> Promise<T> {
    /// Hands the value over. With [`Handoff::Unbuffered`] this blocks until
    /// the reader receives it.
    pub fn complete(self, value: T) -> Result<(), FutureError> {
        self.tx.send(value).map_err(|_| FutureError::Abandoned)
    }
}

/// The reader's half.
pub struct ChannelFuture<T> {
    rx: Receiver<T>,
}

pub fn pair<T>(handoff: Handoff) -> (Promise<T>, ChannelFuture<T>) {
    let (tx, rx) = bounded(handoff.capacity());
    (Promise { tx }, ChannelFuture { rx })
}

impl<T: Send + 'static> ChannelFuture<T> {
    /// Runs `compute` on its own thread and resolves with its result.
    pub fn spawn<F>(handoff: Handoff, compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (promise, future) = pair(handoff);
        thread::spawn(move || {
            if let Err(err) = promise.complete(compute()) {
                log::debug!("worker result discarded: {}", err);
            }
        });
        future
    }
}

impl<T> ChannelFuture<T> {
    /// Blocks until the worker delivers.
    pub fn wait(self) -> Result<T, FutureError> {
        self.rx.recv().map_err(|_| FutureError::Disconnected)
    }

    /// Waits at most `timeout`. A value already handed over is returned even
    /// for a zero timeout. Only the wait is abandoned on timeout; the worker
    /// keeps running and the future can be waited on again.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, FutureError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => FutureError::TimedOut(timeout),
            RecvTimeoutError::Disconnected => FutureError::Disconnected,
        })
    }

    /// Takes the value if it is ready, without blocking.
    pub fn try_get(&self) -> Result<Option<T>, FutureError> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FutureError::Disconnected),
        }
    }

    pub(crate) fn into_receiver(self) -> Receiver<T> {
        self.rx
    }
}
