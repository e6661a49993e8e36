//! Core of the playbox compile-and-run pipeline.
//!
//! A program goes through
//!
//!   source text
//!     -> frontend parse     (syntax, source-located errors)
//!     -> frontend compile   (entry archive; imports resolved on demand)
//!     -> resolver closure   (dependency archives, fetched once and cached)
//!     -> codegen            (one runnable program blob)
//!     -> host runtime       (output captured through the hooks)
//!
//! The frontend, the script engine and the archive transport are seams;
//! host crates (the CLI, the browser bridge) supply them.

// ---------------------------------------------------------------------
// Errors and diagnostics
// ---------------------------------------------------------------------

pub mod error;
pub mod source;
pub mod output;
pub mod report;

// ---------------------------------------------------------------------
// Archives and their cache
// ---------------------------------------------------------------------

pub mod archive;
pub mod types;
pub mod store;
pub mod transport;
pub mod resolver;
pub mod bundle;

// ---------------------------------------------------------------------
// Seams to the toolchain and the host
// ---------------------------------------------------------------------

pub mod frontend;
pub mod hooks;

// ---------------------------------------------------------------------
// Program generation and orchestration
// ---------------------------------------------------------------------

pub mod codegen;
pub mod config;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use archive::{Archive, ExportedSymbol};
pub use codegen::{Program, ProgramSegment, link};
pub use config::PlaygroundConfig;
pub use error::{
    ArchiveFormatError, CompileError, CoreError, DependencyError, FailureKind, FetchError,
    FetchErrorKind, InternalError, ResolveError, RuntimeError, TypeRegistrationError,
};
pub use frontend::{CheckFailure, CompileEnv, Frontend, Importer};
pub use hooks::{HOOKS, HookKind, HostRuntime, OutputSink};
pub use orchestrator::{Playground, RunFailure, RunOutcome, RunReport, Stage};
#[cfg(feature = "async")]
pub use orchestrator::CompileTask;
pub use output::{Entry, EntryKind, OutputCapture, Retention};
pub use report::Report;
pub use resolver::{ArchiveResolver, ResolverStats};
pub use source::{FileSet, Pos, Position, SourceError, SourceFile};
pub use store::ArchiveStore;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{DirTransport, Transport};
