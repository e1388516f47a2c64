use super::{report_stopped, Outcome, SLICES};
use crate::broadcast;
use crate::cancel::{first_of, spawn_cancellable, CancelSource, Step};
use crate::config::WalkthroughConfig;
use crate::error::FutureError;
use crate::future::{pair, Handoff};
use crate::memo::MemoFuture;
use crate::narrator::Narrator;
use crate::repeat::RepeatingFuture;
use std::thread;
use std::time::Duration;

/// A long computation cut into [`SLICES`] pieces.
fn sliced<T: Clone>(total: Duration, value: T) -> impl FnMut() -> Step<T> {
    let slice = total / SLICES;
    let mut done = 0;
    move || {
        thread::sleep(slice);
        done += 1;
        if done >= SLICES {
            Step::Ready(value.clone())
        } else {
            Step::Pending
        }
    }
}

pub struct ThreadWalkthrough {
    config: WalkthroughConfig,
    narrator: Narrator,
}

impl ThreadWalkthrough {
    pub fn new(config: WalkthroughConfig, narrator: Narrator) -> Self {
        Self { config, narrator }
    }

    /// Runs every block in order. The timeout block comes last; when it
    /// times out the walkthrough ends there.
    pub fn run(&self) -> Result<Outcome, FutureError> {
        self.simple_future()?;
        self.buffered_future()?;
        self.repeated_reads()?;
        self.memoized_reads()?;
        self.broadcast_reads()?;
        self.cancelled_worker()?;
        self.worker_deadline()?;
        self.fastest_worker()?;
        self.timeout_read()
    }

    // ## The basics

    pub fn simple_future(&self) -> Result<i64, FutureError> {
        self.narrator.section("A simple future");

        let (promise, future) = pair(Handoff::Unbuffered);
        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        thread::spawn(move || {
            narrator.say("Calculating");
            thread::sleep(delay);
            narrator.say("done");
            // Blocks here until the reader is ready.
            if let Err(err) = promise.complete(input * 2) {
                log::warn!("simple future: {}", err);
            }
        });

        self.narrator.say("Waiting");
        let value = future.wait()?;
        self.narrator.say(format!("got {}", value));
        Ok(value)
    }

    // ## Let the worker carry on after delivering

    pub fn buffered_future(&self) -> Result<i64, FutureError> {
        self.narrator.section("A buffered future");

        let (promise, future) = pair(Handoff::Buffered);
        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let worker = thread::spawn(move || {
            narrator.say("Calculating");
            thread::sleep(delay);
            narrator.say("done");
            promise.complete(input * 2)?;
            narrator.say("Result handed off, cleaning up");
            Ok::<_, FutureError>(())
        });

        // Nobody reads until the worker has finished entirely.
        self.narrator.say("Doing other things");
        worker.join().map_err(|_| FutureError::Disconnected)??;
        self.narrator.say("Worker finished before anyone read the result");

        self.narrator.say("Waiting");
        let value = future.wait()?;
        self.narrator.say(format!("got {}", value));
        Ok(value)
    }

    // ## Read the future multiple times

    pub fn repeated_reads(&self) -> Result<(i64, i64), FutureError> {
        self.narrator.section("Reading the future multiple times");

        let (compute_narrator, write_narrator) = (self.narrator.clone(), self.narrator.clone());
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let future = RepeatingFuture::spawn_observed(
            move || {
                compute_narrator.say("Calculating");
                thread::sleep(delay);
                input * 4
            },
            move |_| write_narrator.say("Writing result"),
        );

        self.narrator.say("Waiting");
        let first = future.get()?;
        self.narrator.say(format!("got {}", first));
        let second = future.get()?;
        self.narrator.say(format!("got {}", second));
        Ok((first, second))
    }

    // ## Memoize the first read

    pub fn memoized_reads(&self) -> Result<Vec<i64>, FutureError> {
        let readers = self.config.readers;
        self.narrator
            .section(&format!("Reading a memoized future from {} readers", readers));

        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        let memo = MemoFuture::spawn(move || {
            narrator.say("Calculating");
            thread::sleep(delay);
            narrator.say("done");
            input * 16
        });

        self.narrator.say("Waiting");
        let values = thread::scope(|scope| {
            let handles: Vec<_> = (1..=readers)
                .map(|id| {
                    let (memo, narrator) = (&memo, &self.narrator);
                    scope.spawn(move || {
                        let value = *memo.get()?;
                        narrator.say(format!("reader {} got {}", id, value));
                        Ok::<_, FutureError>(value)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(FutureError::Disconnected)))
                .collect::<Result<Vec<i64>, FutureError>>()
        })?;

        self.narrator.say(format!(
            "{} reads, {} receive from the channel",
            values.len(),
            memo.receives()
        ));
        Ok(values)
    }

    // ## Broadcast by closing a channel

    pub fn broadcast_reads(&self) -> Result<Vec<i64>, FutureError> {
        self.narrator.section("Broadcasting by closing a channel");

        let (publisher, subscriber) = broadcast::channel();
        let narrator = self.narrator.clone();
        let (input, delay) = (self.config.input, self.config.compute_delay());
        thread::spawn(move || {
            narrator.say("Calculating");
            thread::sleep(delay);
            narrator.say("Publishing result and closing the channel");
            publisher.publish(input * 32);
        });

        let handles: Vec<_> = (1..=self.config.readers)
            .map(|id| {
                let subscriber = subscriber.clone();
                let narrator = self.narrator.clone();
                thread::spawn(move || {
                    let value = *subscriber.wait()?;
                    narrator.say(format!("reader {} got {}", id, value));
                    Ok::<_, FutureError>(value)
                })
            })
            .collect();

        self.narrator.say("Waiting");
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(FutureError::Disconnected)))
            .collect()
    }

    // ## Cancel the computing worker

    pub fn cancelled_worker(&self) -> Result<Option<i64>, FutureError> {
        self.narrator.section("Cancelling the computing worker");

        let source = CancelSource::new();
        let future = spawn_cancellable(
            source.token(),
            sliced(self.config.compute_delay(), self.config.input * 2),
        );
        self.narrator.say("Calculating");

        thread::sleep(self.config.cancel_after());
        self.narrator.say("Cancelling");
        source.cancel();

        report_stopped(&self.narrator, future.wait())
    }

    // ## Have the worker time out

    pub fn worker_deadline(&self) -> Result<Option<i64>, FutureError> {
        self.narrator.section("Giving the worker a deadline");

        // Keep the source alive: dropping it would cancel the worker early.
        let source = CancelSource::with_timeout(self.config.worker_deadline());
        let future = spawn_cancellable(
            source.token(),
            sliced(self.config.slow_compute_delay(), self.config.input * 2),
        );
        self.narrator.say("Calculating");
        self.narrator.say("Waiting");

        let outcome = future.wait();
        drop(source);
        report_stopped(&self.narrator, outcome)
    }

    // ## Several workers, first one wins

    pub fn fastest_worker(&self) -> Result<(usize, i64), FutureError> {
        self.narrator.section("Taking the fastest of several workers");

        let delay = self.config.compute_delay();
        let value = self.config.input * 2;
        let workers: Vec<_> = [delay, delay / 4, delay / 2]
            .into_iter()
            .enumerate()
            .map(|(id, total)| sliced(total, (id, value)))
            .collect();

        self.narrator.say("Waiting");
        let (winner, value) = first_of(workers)?;
        self.narrator
            .say(format!("worker {} finished first with {}", winner, value));
        Ok((winner, value))
    }

    // ## Read with a timeout

    pub fn timeout_read(&self) -> Result<Outcome, FutureError> {
        self.narrator.section("Reading with a timeout");

        let (compute_narrator, write_narrator) = (self.narrator.clone(), self.narrator.clone());
        let (input, delay) = (self.config.input, self.config.slow_compute_delay());
        // The computing side stays exactly as in the repeated-read block.
        let future = RepeatingFuture::spawn_observed(
            move || {
                compute_narrator.say("Calculating");
                thread::sleep(delay);
                input * 8
            },
            move |_| write_narrator.say("Writing result"),
        );

        self.narrator.say("Waiting");
        match future.get_timeout(self.config.read_timeout()) {
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
