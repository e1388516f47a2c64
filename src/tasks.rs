//! The same futures on tokio: tasks instead of threads, oneshot and watch
//! channels instead of crossbeam, `tokio::time::timeout` instead of `select!`.

use crate::error::FutureError;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex, OnceCell};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Single-shot handoff
// =============================================================================

pub struct TaskFuture<T> {
    rx: Option<oneshot::Receiver<T>>,
}

impl<T: Send + 'static> TaskFuture<T> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            if tx.send(work.await).is_err() {
                log::debug!("task result discarded: reader dropped the future");
            }
        });
        Self { rx: Some(rx) }
    }

    /// For CPU-bound work that would stall the runtime's worker threads.
    pub fn spawn_blocking<F>(compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            if tx.send(compute()).is_err() {
                log::debug!("blocking result discarded: reader dropped the future");
            }
        });
        Self { rx: Some(rx) }
    }
}

impl<T> TaskFuture<T> {
    /// Wraps a receiver whose sender is driven by hand.
    pub fn from_receiver(rx: oneshot::Receiver<T>) -> Self {
        Self { rx: Some(rx) }
    }

    pub async fn wait(self) -> Result<T, FutureError> {
        match self.rx {
            Some(rx) => rx.await.map_err(|_| FutureError::Disconnected),
            None => Err(FutureError::Consumed),
        }
    }

    /// Abandons only the wait on timeout; the task keeps running and the
    /// future can be awaited again. Once a value is returned, it is gone.
    pub async fn wait_timeout(&mut self, limit: Duration) -> Result<T, FutureError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(FutureError::Consumed);
        };
        match timeout(limit, rx).await {
            Ok(received) => {
                self.rx = None;
                received.map_err(|_| FutureError::Disconnected)
            }
            Err(_) => Err(FutureError::TimedOut(limit)),
        }
    }

    /// Non-blocking poll; a taken value is not returned twice.
    pub fn try_get(&mut self) -> Result<Option<T>, FutureError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(FutureError::Consumed);
        };
        match rx.try_recv() {
            Ok(value) => {
                self.rx = None;
                Ok(Some(value))
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => {
                self.rx = None;
                Err(FutureError::Disconnected)
            }
        }
    }
}

// =============================================================================
// Multi-reader future over a watch channel
// =============================================================================

/// Every reader observes the same value once the task has published it.
pub struct SharedTask<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T> Clone for SharedTask<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SharedTask<T> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            tx.send_replace(Some(work.await));
        });
        Self { rx }
    }

    pub async fn get(&self) -> Result<T, FutureError> {
        let mut rx = self.rx.clone();
        let published = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| FutureError::Disconnected)?;
        (*published).clone().ok_or(FutureError::Disconnected)
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

// =============================================================================
// Memoized read
// =============================================================================

pub struct MemoTask<T> {
    source: Mutex<Option<oneshot::Receiver<T>>>,
    value: OnceCell<T>,
}

impl<T> MemoTask<T> {
    pub fn new(task: TaskFuture<T>) -> Self {
        Self {
            source: Mutex::new(task.rx),
            value: OnceCell::new(),
        }
    }

    /// Only the first caller awaits the task; everyone else gets the cached value.
    pub async fn get(&self) -> Result<&T, FutureError> {
        self.value
            .get_or_try_init(|| async move {
                // Gone only if an earlier attempt saw the task die.
                let source = self.source.lock().await.take();
                match source {
                    Some(rx) => rx.await.map_err(|_| FutureError::Disconnected),
                    None => Err(FutureError::Disconnected),
                }
            })
            .await
    }

    pub fn is_resolved(&self) -> bool {
        self.value.initialized()
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Races `work` against `token`; cancelling drops the work at its next await point.
pub fn spawn_cancellable<T, F>(
    token: CancellationToken,
    work: F,
) -> TaskFuture<Result<T, FutureError>>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    TaskFuture::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => Err(FutureError::Cancelled),
            value = work => Ok(value),
        }
    })
}

/// The task stops itself after `limit`. The returned token cancels it sooner.
pub fn spawn_with_deadline<T, F>(
    limit: Duration,
    work: F,
) -> (CancellationToken, TaskFuture<Result<T, FutureError>>)
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let future = TaskFuture::spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => Err(FutureError::Cancelled),
            outcome = timeout(limit, work) => outcome.map_err(|_| FutureError::DeadlineExceeded),
        }
    });
    (token, future)
}

/// Runs every computation; the first to finish wins and the rest are cancelled
/// through child tokens of `token`.
pub async fn first_completed<T, F>(
    token: CancellationToken,
    works: Vec<F>,
) -> Result<T, FutureError>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let mut racers: FuturesUnordered<_> = works
        .into_iter()
        .map(|work| spawn_cancellable(token.child_token(), work).wait())
        .collect();

    let mut last_error = FutureError::Disconnected;
    while let Some(outcome) = racers.next().await {
        match outcome.and_then(|inner| inner) {
            Ok(value) => {
                token.cancel();
                return Ok(value);
            }
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_wait_returns_value() {
        let future = TaskFuture::spawn(async { 2 });
        assert_eq!(future.wait().await, Ok(2));
    }

    #[tokio::test]
    async fn test_spawn_blocking_returns_value() {
        let future = TaskFuture::spawn_blocking(|| (1..=10).sum::<i64>());
        assert_eq!(future.wait().await, Ok(55));
    }

    #[tokio::test]
    async fn test_wait_timeout_then_value() {
        let mut future = TaskFuture::spawn(async {
            sleep(Duration::from_millis(100)).await;
            8
        });
        assert_eq!(
            future.wait_timeout(Duration::from_millis(10)).await,
            Err(FutureError::TimedOut(Duration::from_millis(10)))
        );
        assert_eq!(future.wait_timeout(Duration::from_secs(5)).await, Ok(8));
        assert_eq!(
            future.wait_timeout(Duration::from_secs(5)).await,
            Err(FutureError::Consumed)
        );
    }

    #[tokio::test]
    async fn test_try_get_pending_then_ready() {
        let (tx, rx) = oneshot::channel();
        let mut future = TaskFuture { rx: Some(rx) };
        assert_eq!(future.try_get(), Ok(None));
        tx.send(3).unwrap();
        assert_eq!(future.try_get(), Ok(Some(3)));
        assert_eq!(future.try_get(), Err(FutureError::Consumed));
    }

    async fn failing_work() -> i32 {
        panic!("task failed")
    }

    #[tokio::test]
    async fn test_panicking_task_disconnects() {
        let future = TaskFuture::spawn(failing_work());
        assert_eq!(future.wait().await, Err(FutureError::Disconnected));
    }

    #[tokio::test]
    async fn test_shared_task_many_readers() {
        let shared = SharedTask::spawn(async {
            sleep(Duration::from_millis(20)).await;
            4
        });
        assert!(!shared.is_resolved());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                tokio::spawn(async move { shared.get().await })
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.await.unwrap(), Ok(4));
        }
        assert_eq!(shared.get().await, Ok(4));
        assert!(shared.is_resolved());
    }

    #[tokio::test]
    async fn test_memo_task_awaits_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let memo = Arc::new(MemoTask::new(TaskFuture::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            16
        })));

        let readers: Vec<_> = (0..5)
            .map(|_| {
                let memo = Arc::clone(&memo);
                tokio::spawn(async move { memo.get().await.copied() })
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.await.unwrap(), Ok(16));
        }
        assert_eq!(memo.get().await, Ok(&16));
        assert!(memo.is_resolved());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_task() {
        let token = CancellationToken::new();
        let future = spawn_cancellable(token.clone(), async {
            sleep(Duration::from_secs(10)).await;
            1
        });
        sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert_eq!(future.wait().await, Ok(Err(FutureError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_stops_task() {
        let (_token, future) = spawn_with_deadline(Duration::from_millis(20), async {
            sleep(Duration::from_secs(10)).await;
            1
        });
        assert_eq!(future.wait().await, Ok(Err(FutureError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_deadline_met() {
        let (_token, future) = spawn_with_deadline(Duration::from_secs(5), async { 7 });
        assert_eq!(future.wait().await, Ok(Ok(7)));
    }

    #[tokio::test]
    async fn test_first_completed_cancels_losers() {
        let token = CancellationToken::new();
        let works: Vec<std::pin::Pin<Box<dyn Future<Output = i64> + Send>>> = vec![
            Box::pin(async {
                sleep(Duration::from_secs(10)).await;
                1
            }),
            Box::pin(async {
                sleep(Duration::from_millis(5)).await;
                2
            }),
        ];
        assert_eq!(first_completed(token.clone(), works).await, Ok(2));
        assert!(token.is_cancelled());
    }
}
