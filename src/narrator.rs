//! Line-oriented console output shared between readers and workers.

use colored::Colorize;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// A cloneable line sink. Workers on other threads or tasks narrate through
/// their own clone; each line is written under the lock, so lines never interleave.
#[derive(Clone)]
pub struct Narrator {
    sink: Arc<Mutex<dyn Write + Send>>,
}

impl Narrator {
    pub fn stdout() -> Self {
        Self::new(Arc::new(Mutex::new(io::stdout())))
    }

    pub fn new(sink: Arc<Mutex<dyn Write + Send>>) -> Self {
        Self { sink }
    }

    pub fn say(&self, line: impl Display) {
        // A worker that panicked mid-line leaves nothing worth protecting.
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(sink, "{}", line).and_then(|_| sink.flush()) {
            log::warn!("dropping narration line: {}", err);
        }
    }

    /// Prints a blank line, the title, and a dashed underline.
    pub fn section(&self, title: &str) {
        self.say("");
        self.say(title.bold());
        self.say("-".repeat(title.len()));
    }
}

/// In-memory sink used by tests to inspect what was narrated.
#[derive(Clone, Default)]
pub struct Transcript {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn narrator(&self) -> Narrator {
        let sink: Arc<Mutex<dyn Write + Send>> = self.buffer.clone();
        Narrator::new(sink)
    }

    pub fn text(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}
