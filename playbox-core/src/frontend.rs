//! The source-language front end seam.
//!
//! Lexing, parsing, type checking and per-package code generation belong to
//! an external toolchain. The orchestrator only drives it through
//! [`Frontend`] and interprets the shape of its results.

use std::sync::Arc;

use crate::archive::Archive;
use crate::error::ResolveError;
use crate::source::{FileSet, SourceError, SourceFile};
use crate::types::TypeSnapshot;

/// On-demand access to dependency archives while compiling.
pub trait Importer {
    fn import(&self, import_path: &str) -> Result<Arc<Archive>, ResolveError>;
}

/// Why compiling a parsed program failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// Type or semantic errors in the program itself.
    Errors(Vec<SourceError>),
    /// An imported package could not be resolved.
    Import {
        import_path: String,
        cause: ResolveError,
    },
}

impl From<Vec<SourceError>> for CheckFailure {
    fn from(errors: Vec<SourceError>) -> Self {
        CheckFailure::Errors(errors)
    }
}

/// What a frontend sees while compiling the entry package.
pub struct CompileEnv<'a> {
    package: &'a str,
    files: &'a FileSet,
    importer: &'a dyn Importer,
    types: TypeSnapshot,
}

impl<'a> CompileEnv<'a> {
    pub fn new(
        package: &'a str,
        files: &'a FileSet,
        importer: &'a dyn Importer,
        types: TypeSnapshot,
    ) -> Self {
        Self {
            package,
            files,
            importer,
            types,
        }
    }

    /// Import path the compiled package must declare.
    pub fn package(&self) -> &str {
        self.package
    }

    pub fn files(&self) -> &FileSet {
        self.files
    }

    /// Types of every package resolved when compilation began. Archives
    /// returned by [`CompileEnv::import`] carry their own exports.
    pub fn types(&self) -> &TypeSnapshot {
        &self.types
    }

    /// Resolves an import, fetching it if needed.
    ///
    /// Failures are meant to be returned as [`CheckFailure::Import`].
    pub fn import(&self, import_path: &str) -> Result<Arc<Archive>, CheckFailure> {
        self.importer
            .import(import_path)
            .map_err(|cause| CheckFailure::Import {
                import_path: import_path.to_string(),
                cause,
            })
    }
}

pub trait Frontend {
    /// Parsed program; request-scoped, never shared between requests.
    type Syntax;

    /// Parses one source file. Errors are reported all at once.
    fn parse(&self, file: &SourceFile, source: &str) -> Result<Self::Syntax, Vec<SourceError>>;

    /// Type-checks and generates code for the entry package.
    ///
    /// The returned archive lists the entry's direct imports; the
    /// orchestrator resolves their transitive closure afterwards.
    fn compile(&self, syntax: Self::Syntax, env: &CompileEnv<'_>) -> Result<Archive, CheckFailure>;
}
