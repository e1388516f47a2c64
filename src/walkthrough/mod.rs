//! The demonstration blocks, once on threads and once on tokio tasks.
//!
//! Every block creates its own worker and channel, narrates what both sides
//! do, and returns what the reader saw so tests can check it.

pub mod tasks;
pub mod threads;

use crate::error::FutureError;
use crate::narrator::Narrator;

pub use tasks::TaskWalkthrough;
pub use threads::ThreadWalkthrough;

/// How the final, timeout-bounded block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    TimedOut,
}

/// Slices used by the cancellable workers; they check their token in between.
pub(crate) const SLICES: u32 = 10;

/// Cancel and deadline stops are expected results of a block, anything else
/// is a real failure.
pub(crate) fn report_stopped<T: std::fmt::Display>(
    narrator: &Narrator,
    outcome: Result<T, FutureError>,
) -> Result<Option<T>, FutureError> {
    match outcome {
        Ok(value) => {
            narrator.say(format!("got {}", value));
            Ok(Some(value))
        }
        Err(err @ (FutureError::Cancelled | FutureError::DeadlineExceeded)) => {
            narrator.say(format!("Worker stopped: {}", err));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
