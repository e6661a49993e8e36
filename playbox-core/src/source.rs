//! Source positions shared across compile requests.
//!
//! A [`FileSet`] hands out disjoint offset ranges to every file it has ever
//! seen. It only grows, so a [`Pos`] recorded by an earlier request keeps
//! resolving to the same file, line and column for the lifetime of the
//! process.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Offset into the global position space of a [`FileSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One located (or unlocated) syntax or type error reported by a frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub message: String,
}

impl SourceError {
    pub fn at(position: Position, message: impl Into<String>) -> Self {
        Self {
            position: Some(position),
            message: message.into(),
        }
    }

    pub fn unlocated(message: impl Into<String>) -> Self {
        Self {
            position: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(position) => write!(f, "{position}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Orders errors by position, keeping unlocated ones last.
///
/// The sort is stable: errors at the same position keep the order in which
/// the frontend reported them, and nothing is deduplicated.
pub fn sort_errors(errors: &mut [SourceError]) {
    errors.sort_by(|a, b| match (&a.position, &b.position) {
        (Some(a), Some(b)) => (a.line, a.column).cmp(&(b.line, b.column)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// A file registered in a [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    base: u64,
    size: u64,
    line_starts: Arc<[u64]>,
}

impl SourceFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global position of a byte offset inside this file.
    ///
    /// Offsets past the end clamp to the end of the file.
    pub fn pos(&self, offset: usize) -> Pos {
        Pos(self.base + (offset as u64).min(self.size))
    }

    /// 1-based line and column of a global position inside this file.
    pub fn position(&self, pos: Pos) -> Option<Position> {
        if pos.0 < self.base || pos.0 > self.base + self.size {
            return None;
        }
        let offset = pos.0 - self.base;
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        };
        let column = offset - self.line_starts[line_index];
        Some(Position::new(
            self.name.clone(),
            line_index as u32 + 1,
            column as u32 + 1,
        ))
    }
}

/// Append-only registry of every file compiled by this process.
#[derive(Debug, Default)]
pub struct FileSet {
    files: RwLock<Vec<SourceFile>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file and reserves its position range.
    ///
    /// Each file gets one extra position past its end so that an
    /// end-of-file position never aliases the next file's base.
    pub fn add_file(&self, name: &str, source: &str) -> SourceFile {
        let mut line_starts = vec![0u64];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(index, _)| index as u64 + 1),
        );

        let mut files = self.files.write();
        let base = files
            .last()
            .map(|file| file.base + file.size + 1)
            .unwrap_or(1);
        let file = SourceFile {
            name: name.to_string(),
            base,
            size: source.len() as u64,
            line_starts: line_starts.into(),
        };
        files.push(file.clone());
        file
    }

    pub fn position(&self, pos: Pos) -> Option<Position> {
        let files = self.files.read();
        let index = files.partition_point(|file| file.base <= pos.0);
        let file = files.get(index.checked_sub(1)?)?;
        file.position(pos)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
