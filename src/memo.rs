//! One-shot memoized read: the first caller receives from the channel, every
//! later caller gets the cached result.

use crate::error::FutureError;
use crate::future::{ChannelFuture, Handoff};
use crossbeam::channel::Receiver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

pub struct MemoFuture<T> {
    source: Receiver<T>,
    value: OnceLock<Result<T, FutureError>>,
    receives: AtomicUsize,
}

impl<T> MemoFuture<T> {
    pub fn new(future: ChannelFuture<T>) -> Self {
        Self {
            source: future.into_receiver(),
            value: OnceLock::new(),
            receives: AtomicUsize::new(0),
        }
    }

    /// Blocks until the value is available. Concurrent callers wait on the
    /// one receive in flight rather than receiving themselves.
    pub fn get(&self) -> Result<&T, FutureError> {
        self.value
            .get_or_init(|| {
                self.receives.fetch_add(1, Ordering::SeqCst);
                self.source.recv().map_err(|_| FutureError::Disconnected)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// How many times the channel was actually read: 0 before the first
    /// `get`, 1 forever after.
    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

impl<T: Send + 'static> MemoFuture<T> {
    pub fn spawn<F>(compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::new(ChannelFuture::spawn(Handoff::Unbuffered, compute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::pair;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_repeated_get_returns_cached_value() {
        let memo = MemoFuture::spawn(|| 16);
        assert!(!memo.is_resolved());
        assert_eq!(memo.get(), Ok(&16));
        assert_eq!(memo.get(), Ok(&16));
        assert_eq!(memo.get(), Ok(&16));
        assert!(memo.is_resolved());
        assert_eq!(memo.receives(), 1);
    }

    #[test]
    fn test_many_threads_one_receive() {
        // The worker sends exactly once. A second receive would see a closed
        // channel and fail, so every caller succeeding proves the guard held.
        let memo = Arc::new(MemoFuture::spawn(|| {
            thread::sleep(Duration::from_millis(30));
            String::from("shared")
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = Arc::clone(&memo);
                thread::spawn(move || memo.get().map(|value| value.clone()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(String::from("shared")));
        }
        assert_eq!(memo.receives(), 1);
    }

    #[test]
    fn test_disconnect_is_cached() {
        let (promise, future) = pair::<i32>(Handoff::Unbuffered);
        let memo = MemoFuture::new(future);
        drop(promise);

        assert_eq!(memo.get(), Err(FutureError::Disconnected));
        assert_eq!(memo.get(), Err(FutureError::Disconnected));
        assert_eq!(memo.receives(), 1);
    }

    #[test]
    fn test_no_receive_before_first_get() {
        let memo = MemoFuture::spawn(|| 1);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(memo.receives(), 0);
        assert!(!memo.is_resolved());
    }
}
