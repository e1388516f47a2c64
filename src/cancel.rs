//! Cancelling the worker itself, not just the wait.
//!
//! A [`CancelSource`] owns the sending half of a signal channel; every
//! [`CancelToken`] holds the receiving half. Cancelling drops the sender, which
//! closes the channel for all tokens at once. A token may also carry a
//! deadline after which it counts as cancelled on its own.

use crate::error::FutureError;
use crate::future::{pair, ChannelFuture, Handoff};
use crossbeam::channel::{at, bounded, never, select, unbounded, Receiver, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

pub struct CancelSource {
    trigger: Mutex<Option<Sender<()>>>,
    token: CancelToken,
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    done: Receiver<()>,
    deadline: Option<Instant>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A source whose tokens also cancel themselves after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        let (trigger, done) = bounded(0);
        Self {
            trigger: Mutex::new(Some(trigger)),
            token: CancelToken { done, deadline },
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Idempotent. Dropping the source has the same effect.
    pub fn cancel(&self) {
        let mut trigger = self.trigger.lock().unwrap_or_else(PoisonError::into_inner);
        if trigger.take().is_some() {
            log::debug!("cancel requested");
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// `Cancelled` wins over `DeadlineExceeded` when both apply.
    pub fn check(&self) -> Result<(), FutureError> {
        if matches!(self.done.try_recv(), Err(TryRecvError::Disconnected)) {
            return Err(FutureError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(FutureError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Blocks until the source cancels or the deadline passes, and says which.
    pub fn cancelled(&self) -> FutureError {
        if matches!(self.done.try_recv(), Err(TryRecvError::Disconnected)) {
            return FutureError::Cancelled;
        }
        let deadline = self.deadline.map(at).unwrap_or_else(never);
        select! {
            recv(self.done) -> _ => FutureError::Cancelled,
            recv(deadline) -> _ => FutureError::DeadlineExceeded,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// What a cancellable worker reports after each unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Pending,
    Ready(T),
}

pub struct CancellableFuture<T> {
    inner: ChannelFuture<Result<T, FutureError>>,
}

impl<T> CancellableFuture<T> {
    pub fn wait(self) -> Result<T, FutureError> {
        self.inner.wait()?
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, FutureError> {
        self.inner.wait_timeout(timeout)?
    }
}

fn run_steps<T, F>(token: &CancelToken, mut step: F) -> Result<T, FutureError>
where
    F: FnMut() -> Step<T>,
{
    loop {
        token.check()?;
        if let Step::Ready(value) = step() {
            return Ok(value);
        }
    }
}

/// Runs `step` repeatedly on a worker thread, checking `token` before each call.
pub fn spawn_cancellable<T, F>(token: CancelToken, step: F) -> CancellableFuture<T>
where
    T: Send + 'static,
    F: FnMut() -> Step<T> + Send + 'static,
{
    // Buffered so a cancelled worker never waits for a reader that left.
    let (promise, inner) = pair(Handoff::Buffered);
    thread::spawn(move || {
        let outcome = run_steps(&token, step);
        if let Err(err) = &outcome {
            log::debug!("worker stopped early: {}", err);
        }
        let _ = promise.complete(outcome);
    });
    CancellableFuture { inner }
}

/// Several workers compute the same thing; the first success wins and the
/// others are cancelled. If every worker fails, the last failure is returned.
pub fn first_of<T, F>(workers: Vec<F>) -> Result<T, FutureError>
where
    T: Send + 'static,
    F: FnMut() -> Step<T> + Send + 'static,
{
    let source = CancelSource::new();
    let (tx, rx) = unbounded();

    for (id, step) in workers.into_iter().enumerate() {
        let tx = tx.clone();
        let token = source.token();
        thread::spawn(move || {
            let outcome = run_steps(&token, step);
            log::trace!("racer {} finished: ok={}", id, outcome.is_ok());
            let _ = tx.send(outcome);
        });
    }
    drop(tx);

    let mut last_error = FutureError::Disconnected;
    for outcome in rx.iter() {
        match outcome {
            Ok(value) => {
                source.cancel();
                return Ok(value);
            }
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}
