use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::output::Entry;
use crate::source::SourceError;

/// Errors raised while loading archive bundles from disk.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read bundle: {0}")]
    BundleIo(#[from] std::io::Error),
    #[error("archive bundle directory was not found at {0}")]
    MissingBundle(PathBuf),
    #[error(transparent)]
    Archive(#[from] ArchiveFormatError),
    #[error(transparent)]
    Types(#[from] TypeRegistrationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    Transport(String),
    /// The server answered with a non-success status.
    Status(u16),
    NotFound,
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch {location}: {kind}")]
pub struct FetchError {
    pub location: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(location: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            location: location.into(),
            kind,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transport(reason) => write!(f, "transport error: {reason}"),
            FetchErrorKind::Status(code) => write!(f, "server returned status {code}"),
            FetchErrorKind::NotFound => f.write_str("archive not found"),
            FetchErrorKind::Io(reason) => write!(f, "i/o error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed archive for {path}: {reason}")]
pub struct ArchiveFormatError {
    pub path: String,
    pub reason: String,
}

impl ArchiveFormatError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("symbol {symbol} of {path} is already registered as `{existing}`, archive declares `{incoming}`")]
pub struct TypeRegistrationError {
    pub path: String,
    pub symbol: String,
    pub existing: String,
    pub incoming: String,
}

/// Why a single import path could not be resolved.
///
/// `Clone` so that every waiter of a shared in-flight fetch receives the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Format(#[from] ArchiveFormatError),
    #[error(transparent)]
    Types(#[from] TypeRegistrationError),
}

/// A dependency of the program could not be resolved.
///
/// `chain` starts at the entry package and ends at the failing path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {cause}", .chain.join(" -> "))]
pub struct DependencyError {
    pub chain: Vec<String>,
    pub cause: ResolveError,
}

impl DependencyError {
    /// The import path that failed.
    pub fn path(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn diagnostic(&self) -> Entry {
        Entry::error(self.message.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Parse,
    Compile,
    Dependency,
    Runtime,
    Internal,
}

/// Failure of a compile request before anything was executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{} syntax error(s)", .0.len())]
    Parse(Vec<SourceError>),
    #[error("{} compile error(s)", .0.len())]
    Compile(Vec<SourceError>),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CompileError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CompileError::Parse(_) => FailureKind::Parse,
            CompileError::Compile(_) => FailureKind::Compile,
            CompileError::Dependency(_) => FailureKind::Dependency,
            CompileError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Wire entries for this failure, one per source error.
    pub fn diagnostics(&self) -> Vec<Entry> {
        match self {
            CompileError::Parse(errors) | CompileError::Compile(errors) => errors
                .iter()
                .map(|error| Entry::error(error.to_string()))
                .collect(),
            CompileError::Dependency(error) => vec![Entry::error(error.to_string())],
            CompileError::Internal(error) => vec![Entry::error(error.to_string())],
        }
    }
}
