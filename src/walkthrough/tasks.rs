use super::{report_stopped, Outcome, SLICES};
use crate::config::WalkthroughConfig;
use crate::error::FutureError;
use crate::narrator::Narrator;
use crate::tasks::{
    first_completed, spawn_cancellable, spawn_with_deadline, MemoTask, SharedTask, TaskFuture,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

type BoxedWork<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A long computation that yields at each of its [`SLICES`] pieces, so a
/// cancel or deadline can stop it between pieces.
async fn sliced<T>(total: Duration, value: T) -> T {
    let slice = total / SLICES;
    for _ in 0..SLICES {
        sleep(slice).await;
    }
    value
}

pub struct TaskWalkthrough {
    config: WalkthroughConfig,
    narrator: Narrator,
}

impl TaskWalkthrough {
    pub fn new(config: WalkthroughConfig, narrator: Narrator) -> Self {
        Self { config, narrator }
    }

    pub async fn run(&self) -> Result<Outcome, FutureError> {
        self.simple_future().await?;
        self.buffered_future().await?;
        self.repeated_reads().await?;
        self.memoized_reads().await?;
        self.broadcast_reads().await?;
        self.cancelled_worker().await?;
        self.worker_deadline().await?;
        self.fastest_worker().await?;
        self.timeout_read().await
    }

    pub async fn simple_future(&self) -> Result<i64, FutureError> {
        self.narrator.section("A simple future");

        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let future = TaskFuture::spawn(async move {
            narrator.say("Calculating");
            sleep(delay).await;
            narrator.say("done");
            input * 2
        });

        self.narrator.say("Waiting");
        let value = future.wait().await?;
        self.narrator.say(format!("got {}", value));
        Ok(value)
    }

    /// A oneshot never blocks its sender, so every task future is buffered.
    pub async fn buffered_future(&self) -> Result<i64, FutureError> {
        self.narrator.section("A buffered future");

        let (tx, rx) = oneshot::channel();
        let future = TaskFuture::from_receiver(rx);
        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let worker = tokio::spawn(async move {
            narrator.say("Calculating");
            sleep(delay).await;
            narrator.say("done");
            tx.send(input * 2).map_err(|_| FutureError::Abandoned)?;
            narrator.say("Result handed off, cleaning up");
            Ok::<_, FutureError>(())
        });

        self.narrator.say("Doing other things");
        worker.await.map_err(|_| FutureError::Disconnected)??;
        self.narrator.say("Worker finished before anyone read the result");

        self.narrator.say("Waiting");
        let value = future.wait().await?;
        self.narrator.say(format!("got {}", value));
        Ok(value)
    }

    pub async fn repeated_reads(&self) -> Result<(i64, i64), FutureError> {
        self.narrator.section("Reading the future multiple times");

        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let future = SharedTask::spawn(async move {
            narrator.say("Calculating");
            sleep(delay).await;
            narrator.say("Writing result");
            input * 4
        });

        self.narrator.say("Waiting");
        let first = future.get().await?;
        self.narrator.say(format!("got {}", first));
        let second = future.get().await?;
        self.narrator.say(format!("got {}", second));
        Ok((first, second))
    }

    pub async fn memoized_reads(&self) -> Result<Vec<i64>, FutureError> {
        let readers = self.config.readers;
        self.narrator
            .section(&format!("Reading a memoized future from {} readers", readers));

        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let memo = Arc::new(MemoTask::new(TaskFuture::spawn(async move {
            narrator.say("Calculating");
            sleep(delay).await;
            narrator.say("done");
            input * 16
        })));

        self.narrator.say("Waiting");
        let handles: Vec<_> = (1..=readers)
            .map(|id| {
                let memo = Arc::clone(&memo);
                let narrator = self.narrator.clone();
                tokio::spawn(async move {
                    let value = *memo.get().await?;
                    narrator.say(format!("reader {} got {}", id, value));
                    Ok::<_, FutureError>(value)
                })
            })
            .collect();

        let mut values = Vec::with_capacity(readers);
        for handle in handles {
            values.push(handle.await.map_err(|_| FutureError::Disconnected)??);
        }
        Ok(values)
    }

    /// The watch channel is tokio's close-and-read: one publish, any number of readers.
    pub async fn broadcast_reads(&self) -> Result<Vec<i64>, FutureError> {
        self.narrator.section("Broadcasting through a watch channel");

        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let shared = SharedTask::spawn(async move {
            narrator.say("Calculating");
            sleep(delay).await;
            narrator.say("Publishing result");
            input * 32
        });

        let handles: Vec<_> = (1..=self.config.readers)
            .map(|id| {
                let shared = shared.clone();
                let narrator = self.narrator.clone();
                tokio::spawn(async move {
                    let value = shared.get().await?;
                    narrator.say(format!("reader {} got {}", id, value));
                    Ok::<_, FutureError>(value)
                })
            })
            .collect();

        self.narrator.say("Waiting");
        let mut values = Vec::with_capacity(handles.len());
        for handle in handles {
            values.push(handle.await.map_err(|_| FutureError::Disconnected)??);
        }
        Ok(values)
    }

    pub async fn cancelled_worker(&self) -> Result<Option<i64>, FutureError> {
        self.narrator.section("Cancelling the computing task");

        let token = CancellationToken::new();
        let future = spawn_cancellable(
            token.clone(),
            sliced(self.config.compute_delay(), self.config.input * 2),
        );
        self.narrator.say("Calculating");

        sleep(self.config.cancel_after()).await;
        self.narrator.say("Cancelling");
        token.cancel();

        let outcome = future.wait().await.and_then(|inner| inner);
        report_stopped(&self.narrator, outcome)
    }

    pub async fn worker_deadline(&self) -> Result<Option<i64>, FutureError> {
        self.narrator.section("Giving the task a deadline");

        let (_token, future) = spawn_with_deadline(
            self.config.worker_deadline(),
            sliced(self.config.slow_compute_delay(), self.config.input * 2),
        );
        self.narrator.say("Calculating");
        self.narrator.say("Waiting");

        let outcome = future.wait().await.and_then(|inner| inner);
        report_stopped(&self.narrator, outcome)
    }

    pub async fn fastest_worker(&self) -> Result<(usize, i64), FutureError> {
        self.narrator.section("Taking the fastest of several tasks");

        let delay = self.config.compute_delay();
        let value = self.config.input * 2;
        let works: Vec<BoxedWork<(usize, i64)>> = [delay, delay / 4, delay / 2]
            .into_iter()
            .enumerate()
            .map(|(id, total)| Box::pin(sliced(total, (id, value))) as BoxedWork<_>)
            .collect();

        self.narrator.say("Waiting");
        let (winner, value) = first_completed(CancellationToken::new(), works).await?;
        self.narrator
            .say(format!("task {} finished first with {}", winner, value));
        Ok((winner, value))
    }

    pub async fn timeout_read(&self) -> Result<Outcome, FutureError> {
        self.narrator.section("Reading with a timeout");

        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.slow_compute_delay());
        let mut future = TaskFuture::spawn(async move {
            narrator.say("Calculating");
            sleep(delay).await;
            narrator.say("Writing result");
            input * 8
        });

        self.narrator.say("Waiting");
        match future.wait_timeout(self.config.read_timeout()).await {
            Ok(value) => {
                self.narrator.say(format!("got {}", value));
                Ok(Outcome::Completed)
            }
            Err(FutureError::TimedOut(_)) => {
                self.narrator.say("Timed out");
                Ok(Outcome::TimedOut)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::Transcript;
    use crate::walkthrough::testing::fast_config;

    fn walkthrough(config: WalkthroughConfig) -> (TaskWalkthrough, Transcript) {
        let transcript = Transcript::new();
        (TaskWalkthrough::new(config, transcript.narrator()), transcript)
    }

    #[tokio::test]
    async fn test_simple_future() {
        let (walkthrough, transcript) = walkthrough(fast_config());
        assert_eq!(walkthrough.simple_future().await, Ok(2));
        assert!(transcript.lines().iter().any(|line| line == "got 2"));
    }

    #[tokio::test]
    async fn test_buffered_worker_finishes_first() {
        let (walkthrough, transcript) = walkthrough(fast_config());
        assert_eq!(walkthrough.buffered_future().await, Ok(2));

        let lines = transcript.lines();
        let cleanup = lines
            .iter()
            .position(|line| line == "Result handed off, cleaning up")
            .unwrap();
        let waiting = lines.iter().position(|line| line == "Waiting").unwrap();
        assert!(cleanup < waiting);
    }

    #[tokio::test]
    async fn test_repeated_reads() {
        let (walkthrough, _) = walkthrough(fast_config());
        assert_eq!(walkthrough.repeated_reads().await, Ok((4, 4)));
    }

    #[tokio::test]
    async fn test_memoized_reads() {
        let (walkthrough, transcript) = walkthrough(fast_config());
        assert_eq!(walkthrough.memoized_reads().await, Ok(vec![16; 3]));
        assert_eq!(transcript.text().matches("Calculating").count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reads() {
        let (walkthrough, _) = walkthrough(fast_config());
        assert_eq!(walkthrough.broadcast_reads().await, Ok(vec![32; 3]));
    }

    #[tokio::test]
    async fn test_cancelled_worker() {
        let (walkthrough, transcript) = walkthrough(fast_config());
        assert_eq!(walkthrough.cancelled_worker().await, Ok(None));
        assert!(transcript.text().contains("computation was cancelled"));
    }

    #[tokio::test]
    async fn test_worker_deadline() {
        let (walkthrough, _) = walkthrough(fast_config());
        assert_eq!(walkthrough.worker_deadline().await, Ok(None));
    }

    #[tokio::test]
    async fn test_fastest_worker() {
        let config = WalkthroughConfig {
            compute_delay_ms: 400,
            ..fast_config()
        };
        let (walkthrough, _) = walkthrough(config);
        assert_eq!(walkthrough.fastest_worker().await, Ok((1, 2)));
    }

    #[tokio::test]
    async fn test_timeout_read_times_out() {
        let (walkthrough, transcript) = walkthrough(fast_config());
        assert_eq!(walkthrough.timeout_read().await, Ok(Outcome::TimedOut));
        assert!(transcript.text().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_timeout_read_completes() {
        let config = WalkthroughConfig {
            slow_compute_delay_ms: 10,
            read_timeout_ms: 2000,
            ..fast_config()
        };
        let (walkthrough, transcript) = walkthrough(config);
        assert_eq!(walkthrough.timeout_read().await, Ok(Outcome::Completed));
        assert!(transcript.text().contains("got 8"));
    }

    #[tokio::test]
    async fn test_run_ends_with_timeout() {
        let (walkthrough, _) = walkthrough(fast_config());
        assert_eq!(walkthrough.run().await, Ok(Outcome::TimedOut));
    }
}
