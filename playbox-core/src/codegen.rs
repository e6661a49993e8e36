//! Program writer.
//!
//! Joins the code fragments of every resolved package, dependencies first and
//! the entry package last, into one self-contained blob the host runtime can
//! evaluate. Each fragment is preceded by a marker line, and the resulting
//! [`Program`] keeps a line map so that a line of the blob can be traced back
//! to the package it came from.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::Archive;
use crate::error::{CompileError, InternalError};
use crate::resolver::ArchiveResolver;

/// Lines of the blob that belong to one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSegment {
    pub import_path: String,
    /// 1-based line of the first line of the fragment.
    pub first_line: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub code: String,
    pub segments: Vec<ProgramSegment>,
}

impl Program {
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Import paths in load order; the entry package is last.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|segment| segment.import_path.as_str())
    }

    /// Maps a 1-based blob line to `(import path, line within its fragment)`.
    pub fn locate(&self, line: usize) -> Option<(&str, usize)> {
        self.segments
            .iter()
            .find(|s| line >= s.first_line && line < s.first_line + s.line_count)
            .map(|s| (s.import_path.as_str(), line - s.first_line + 1))
    }
}

/// Writes `dependencies` (already in load order) followed by `entry`.
pub fn write_program(
    dependencies: &[Arc<Archive>],
    entry: &Archive,
) -> Result<Program, InternalError> {
    let mut code = String::new();
    let mut segments = Vec::with_capacity(dependencies.len() + 1);
    let mut next_line = 1;

    writeln!(
        code,
        "// playbox program: {} package(s)",
        dependencies.len() + 1
    )
    .map_err(stream_error)?;
    next_line += 1;

    let packages = dependencies
        .iter()
        .map(Arc::as_ref)
        .chain(std::iter::once(entry));
    for archive in packages {
        writeln!(code, "// package {}", archive.import_path).map_err(stream_error)?;
        next_line += 1;

        code.push_str(&archive.code);
        if !archive.code.is_empty() && !archive.code.ends_with('\n') {
            code.push('\n');
        }
        let line_count = archive.code.lines().count();
        segments.push(ProgramSegment {
            import_path: archive.import_path.clone(),
            first_line: next_line,
            line_count,
        });
        next_line += line_count;
    }

    Ok(Program { code, segments })
}

fn stream_error(error: std::fmt::Error) -> InternalError {
    InternalError::new(format!("failed to write program: {error}"))
}

/// Resolves the transitive imports of a compiled entry package and writes
/// the runnable program.
pub fn link(resolver: &ArchiveResolver, entry: &Archive) -> Result<Program, CompileError> {
    let dependencies = resolver.resolve_closure(entry)?;
    debug!(
        entry = %entry.import_path,
        dependencies = dependencies.len(),
        "writing program"
    );
    Ok(write_program(&dependencies, entry)?)
}
