//! Read the same future any number of times.
//!
//! The worker computes once, then keeps handing out copies. Every send blocks
//! until a reader is ready, so the loop never spins. Unlike a plain
//! goroutine-style loop, the worker stops as soon as the last handle is gone.

use crate::error::FutureError;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

#[derive(Clone)]
pub struct RepeatingFuture<T> {
    rx: Receiver<T>,
}

impl<T: Clone + Send + 'static> RepeatingFuture<T> {
    pub fn spawn<F>(compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_observed(compute, |_: &T| {})
    }

    /// Like [`spawn`](Self::spawn), but `observe` runs before every handoff.
    pub fn spawn_observed<F, O>(compute: F, mut observe: O) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
        O: FnMut(&T) + Send + 'static,
    {
        let (tx, rx) = bounded(0);
        thread::spawn(move || {
            let value = compute();
            let mut handoffs = 0usize;
            loop {
                observe(&value);
                if tx.send(value.clone()).is_err() {
                    break;
                }
                handoffs += 1;
                log::trace!("repeating worker handed off copy #{}", handoffs);
            }
            log::debug!("all readers gone after {} handoffs; worker exits", handoffs);
        });
        Self { rx }
    }
}

impl<T> RepeatingFuture<T> {
    pub fn get(&self) -> Result<T, FutureError> {
        self.rx.recv().map_err(|_| FutureError::Disconnected)
    }

    /// A copy the worker is already offering is taken even for a zero timeout.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, FutureError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => FutureError::TimedOut(timeout),
            RecvTimeoutError::Disconnected => FutureError::Disconnected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_every_read_sees_same_value() {
        let future = RepeatingFuture::spawn(|| 4);
        for _ in 0..10 {
            assert_eq!(future.get(), Ok(4));
        }
    }

    #[test]
    fn test_compute_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let future = RepeatingFuture::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            String::from("result")
        });

        for _ in 0..5 {
            assert_eq!(future.get().unwrap(), "result");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cloned_handles_read_from_threads() {
        let future = RepeatingFuture::spawn(|| 16);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reader = future.clone();
                thread::spawn(move || (0..5).map(|_| reader.get().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![16; 5]);
        }
    }

    #[test]
    fn test_observer_runs_before_each_handoff() {
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&observed);
        let future = RepeatingFuture::spawn_observed(
            || 4,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        future.get().unwrap();
        future.get().unwrap();
        // One observation per completed read, plus one for the send now pending.
        assert!(observed.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_worker_exits_when_handles_dropped() {
        let (done_tx, done_rx) = unbounded::<()>();
        // The observer owns the sender, so it is dropped only when the worker loop ends.
        let future = RepeatingFuture::spawn_observed(
            || 1,
            move |_| {
                let _sender = &done_tx;
            },
        );
        assert_eq!(future.get(), Ok(1));
        drop(future);

        let ended = done_rx.recv_timeout(Duration::from_secs(5));
        assert_eq!(ended, Err(RecvTimeoutError::Disconnected));
    }

    #[test]
    fn test_get_timeout_while_computing() {
        let future = RepeatingFuture::spawn(|| {
            thread::sleep(Duration::from_millis(200));
            4
        });
        assert!(future.get_timeout(Duration::from_millis(10)).unwrap_err().is_timeout());
        assert_eq!(future.get_timeout(Duration::from_secs(5)), Ok(4));
    }

    #[test]
    fn test_zero_timeout_takes_offered_copy() {
        let (offering_tx, offering_rx) = bounded::<()>(1);
        let future = RepeatingFuture::spawn_observed(
            || 4,
            move |_| {
                let _ = offering_tx.try_send(());
            },
        );
        assert_eq!(future.get(), Ok(4));

        for _ in 0..20 {
            // The observer has run, so the worker is about to park in the next send.
            offering_rx.recv().unwrap();
            thread::sleep(Duration::from_millis(10));
            assert_eq!(future.get_timeout(Duration::ZERO), Ok(4));
        }
    }
}
