//! # Futures from threads and channels
//!
//! A future is a proxy for a value that may not be computed yet. With a worker
//! and a channel, no futures library is needed:
//!
//! ```
//! use channel_futures::{ChannelFuture, Handoff};
//!
//! let future = ChannelFuture::spawn(Handoff::Unbuffered, || 1 * 2); // async
//! assert_eq!(future.wait(), Ok(2));                                // await
//! ```
//!
//! The modules cover the assumptions hidden in those three lines:
//!
//! - [`future`]: single-shot handoff, buffered or not, with a timeout-bounded read
//! - [`repeat`]: reading the same value more than once
//! - [`memo`]: only the first reader touches the channel
//! - [`broadcast`]: closing a channel as a signal to any number of readers
//! - [`cancel`]: stopping the worker itself, by hand or by deadline
//! - [`tasks`]: the same ideas on tokio
//! - [`walkthrough`]: the narrated demonstration blocks behind the binaries

pub mod broadcast;
pub mod cancel;
pub mod config;
pub mod error;
pub mod future;
pub mod memo;
pub mod narrator;
pub mod repeat;
pub mod tasks;
pub mod walkthrough;

pub use cancel::{CancelSource, CancelToken, CancellableFuture, Step};
pub use config::WalkthroughConfig;
pub use error::{ConfigError, FutureError};
pub use future::{pair, ChannelFuture, Handoff, Promise};
pub use memo::MemoFuture;
pub use narrator::{Narrator, Transcript};
pub use repeat::RepeatingFuture;
pub use walkthrough::{Outcome, TaskWalkthrough, ThreadWalkthrough};
