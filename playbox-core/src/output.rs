//! Ordered log of program output and panics.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::hooks::OutputSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "out")]
    Output,
    #[serde(rename = "err")]
    Error,
}

/// One diagnostic record in wire shape: `{"type": "out" | "err", "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
}

impl Entry {
    pub fn output(content: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Output,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Error,
            content: content.into(),
        }
    }
}

/// How long captured output is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Every run starts with an empty log.
    #[default]
    PerRun,
    /// The log accumulates for the lifetime of the process.
    Process,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<Entry>,
    /// The last entry is an output line not yet terminated by a newline.
    open: bool,
}

/// Line-buffered output log fed by the runtime hooks.
#[derive(Debug, Default)]
pub struct OutputCapture {
    state: Mutex<LogState>,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of program output.
    ///
    /// The first line of the chunk continues an unterminated output line
    /// left by the previous write; every further line becomes a new entry.
    pub fn write_text(&self, text: &str) {
        let mut state = self.state.lock();
        let pieces: Vec<&str> = text.split('\n').collect();
        let last_index = pieces.len() - 1;
        for (index, piece) in pieces.into_iter().enumerate() {
            let terminated = index < last_index;
            if index == 0 && state.open {
                if let Some(entry) = state.entries.last_mut() {
                    entry.content.push_str(piece);
                }
            } else if terminated || !piece.is_empty() {
                state.entries.push(Entry::output(piece));
            } else {
                continue;
            }
            state.open = !terminated;
        }
    }

    pub fn write_panic(&self, message: &str) {
        let mut state = self.state.lock();
        state.entries.push(Entry::error(format!("panic: {message}")));
        state.open = false;
    }

    /// Prepares the log for a new run and returns the index of its first entry.
    pub fn begin_run(&self, retention: Retention) -> usize {
        let mut state = self.state.lock();
        if retention == Retention::PerRun {
            state.entries.clear();
        }
        state.open = false;
        state.entries.len()
    }

    /// Entries recorded at or after `mark`.
    pub fn since(&self, mark: usize) -> Vec<Entry> {
        let state = self.state.lock();
        state.entries.get(mark..).map(<[Entry]>::to_vec).unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().entries.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.open = false;
    }
}

impl OutputSink for OutputCapture {
    fn write(&self, chunk: &[u8]) {
        self.write_text(&String::from_utf8_lossy(chunk));
    }

    fn panic(&self, message: &str) {
        self.write_panic(message);
    }
}
