//! Compile-run orchestration.
//!
//! A [`Playground`] drives one request through
//! `Parsing -> Compiling -> ResolvingDependencies -> Generating -> Executing`.
//! Request-scoped state (the syntax tree, diagnostic lists) lives on the
//! stack of the call; only the resolver's store, the [`FileSet`] and the
//! output log are shared between requests.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, info_span, warn};

use crate::archive::Archive;
use crate::codegen::{self, Program};
use crate::config::PlaygroundConfig;
use crate::error::{CompileError, DependencyError, FailureKind, RuntimeError};
use crate::frontend::{CheckFailure, CompileEnv, Frontend};
use crate::hooks::HostRuntime;
use crate::output::{Entry, OutputCapture};
use crate::resolver::ArchiveResolver;
use crate::source::{FileSet, SourceError, sort_errors};
use crate::transport::Transport;

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    Compiling,
    ResolvingDependencies,
    Generating,
    Executing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parsing => "parsing",
            Stage::Compiling => "compiling",
            Stage::ResolvingDependencies => "resolving-dependencies",
            Stage::Generating => "generating",
            Stage::Executing => "executing",
        };
        f.write_str(name)
    }
}

/// Result of evaluating a program once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Entries produced by this run, in program order.
    pub output: Vec<Entry>,
    pub error: Option<RuntimeError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl RunFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            RunFailure::Compile(error) => error.kind(),
            RunFailure::Runtime(_) => FailureKind::Runtime,
        }
    }

    pub fn diagnostics(&self) -> Vec<Entry> {
        match self {
            RunFailure::Compile(error) => error.diagnostics(),
            RunFailure::Runtime(error) => vec![error.diagnostic()],
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFailure::Compile(error) => write!(f, "{error}"),
            RunFailure::Runtime(error) => write!(f, "runtime error: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded {
        program: Program,
        output: Vec<Entry>,
    },
    Failed {
        failure: RunFailure,
        /// Present when compilation succeeded and execution failed.
        program: Option<Program>,
        output: Vec<Entry>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn output(&self) -> &[Entry] {
        match self {
            RunOutcome::Succeeded { output, .. } | RunOutcome::Failed { output, .. } => output,
        }
    }

    pub fn program(&self) -> Option<&Program> {
        match self {
            RunOutcome::Succeeded { program, .. } => Some(program),
            RunOutcome::Failed { program, .. } => program.as_ref(),
        }
    }
}

pub struct Playground<F, R> {
    config: PlaygroundConfig,
    resolver: Arc<ArchiveResolver>,
    files: Arc<FileSet>,
    frontend: F,
    runtime: R,
    output: Arc<OutputCapture>,
    /// Serializes executions so that runs never interleave in the log.
    run_lock: Mutex<()>,
}

impl<F: Frontend, R: HostRuntime> Playground<F, R> {
    /// Fetches archives over HTTP from `config.base_url`.
    #[cfg(feature = "http")]
    pub fn new(config: PlaygroundConfig, frontend: F, runtime: R) -> Self {
        let transport = crate::transport::HttpTransport::new(
            &config.base_url,
            config.fetch_timeout,
            config.connect_timeout,
        );
        Self::with_transport(config, Arc::new(transport), frontend, runtime)
    }

    pub fn with_transport(
        config: PlaygroundConfig,
        transport: Arc<dyn Transport>,
        frontend: F,
        runtime: R,
    ) -> Self {
        Self::with_resolver(config, Arc::new(ArchiveResolver::new(transport)), frontend, runtime)
    }

    /// Shares an existing resolver, and with it the archive cache.
    pub fn with_resolver(
        config: PlaygroundConfig,
        resolver: Arc<ArchiveResolver>,
        frontend: F,
        runtime: R,
    ) -> Self {
        let output = Arc::new(OutputCapture::new());
        runtime.install(output.clone());
        Self {
            config,
            resolver,
            files: Arc::new(FileSet::new()),
            frontend,
            runtime,
            output,
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<ArchiveResolver> {
        &self.resolver
    }

    pub fn files(&self) -> &Arc<FileSet> {
        &self.files
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Everything the output log currently holds.
    pub fn output_history(&self) -> Vec<Entry> {
        self.output.entries()
    }

    /// Compiles `source` into a runnable program.
    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        let request = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("compile", request);
        let _entered = span.enter();

        let result = self.compile_entry(source).and_then(|entry| self.link(&entry));
        match &result {
            Ok(program) => info!(packages = program.segments.len(), "compile succeeded"),
            Err(error) => info!(kind = ?error.kind(), %error, "compile failed"),
        }
        result
    }

    fn compile_entry(&self, source: &str) -> Result<Archive, CompileError> {
        debug!(stage = %Stage::Parsing);
        let file = self.files.add_file(&self.config.file_name, source);
        let syntax = self
            .frontend
            .parse(&file, source)
            .map_err(|errors| CompileError::Parse(ordered(errors, "syntax error")))?;

        debug!(stage = %Stage::Compiling);
        let env = CompileEnv::new(
            &self.config.entry_package,
            &self.files,
            self.resolver.as_ref(),
            self.resolver.store().types(),
        );
        self.frontend
            .compile(syntax, &env)
            .map_err(|failure| match failure {
                CheckFailure::Errors(errors) => {
                    CompileError::Compile(ordered(errors, "compilation failed"))
                }
                CheckFailure::Import { import_path, cause } => DependencyError {
                    chain: vec![self.config.entry_package.clone(), import_path],
                    cause,
                }
                .into(),
            })
    }

    /// Resolves the imports of an already compiled entry package and writes
    /// the program.
    pub fn link(&self, entry: &Archive) -> Result<Program, CompileError> {
        debug!(stage = %Stage::ResolvingDependencies, imports = entry.imports.len());
        let program = codegen::link(&self.resolver, entry)?;
        debug!(stage = %Stage::Generating, packages = program.segments.len());
        Ok(program)
    }

    /// Evaluates a program. Can be called any number of times.
    pub fn run(&self, program: &Program) -> RunReport {
        let _running = self.run_lock.lock();
        debug!(stage = %Stage::Executing, bytes = program.code.len());
        let mark = self.output.begin_run(self.config.retention);
        let result = self.runtime.eval(program.code());
        let output = self.output.since(mark);
        if let Err(error) = &result {
            warn!(%error, "program raised an error");
        }
        RunReport {
            output,
            error: result.err(),
        }
    }

    pub fn compile_and_run(&self, source: &str) -> RunOutcome {
        let program = match self.compile(source) {
            Ok(program) => program,
            Err(error) => {
                return RunOutcome::Failed {
                    failure: RunFailure::Compile(error),
                    program: None,
                    output: Vec::new(),
                };
            }
        };
        let report = self.run(&program);
        match report.error {
            None => RunOutcome::Succeeded {
                program,
                output: report.output,
            },
            Some(error) => RunOutcome::Failed {
                failure: RunFailure::Runtime(error),
                program: Some(program),
                output: report.output,
            },
        }
    }
}

/// Source order, and never an empty list.
fn ordered(mut errors: Vec<SourceError>, fallback: &str) -> Vec<SourceError> {
    if errors.is_empty() {
        errors.push(SourceError::unlocated(fallback));
    }
    sort_errors(&mut errors);
    errors
}

#[cfg(feature = "async")]
mod background {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio::task::JoinHandle;

    use super::Playground;
    use crate::codegen::Program;
    use crate::error::{CompileError, InternalError};
    use crate::frontend::Frontend;
    use crate::hooks::HostRuntime;

    /// A compile running on the blocking pool.
    ///
    /// Resolves to the same result [`Playground::compile`] returns; a task
    /// that panicked or was cancelled becomes [`CompileError::Internal`].
    pub struct CompileTask {
        handle: JoinHandle<Result<Program, CompileError>>,
    }

    impl Future for CompileTask {
        type Output = Result<Program, CompileError>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            Pin::new(&mut self.handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|error| {
                    Err(InternalError::new(format!("compile task failed: {error}")).into())
                })
            })
        }
    }

    impl<F, R> Playground<F, R>
    where
        F: Frontend + Send + Sync + 'static,
        R: HostRuntime + Send + Sync + 'static,
    {
        /// Compiles on the tokio blocking pool. Must be called from within a
        /// tokio runtime.
        pub fn compile_async(self: &Arc<Self>, source: impl Into<String>) -> CompileTask {
            let playground = Arc::clone(self);
            let source = source.into();
            CompileTask {
                handle: tokio::task::spawn_blocking(move || playground.compile(&source)),
            }
        }

        /// Compiles in the background and hands the result to `callback`.
        pub fn compile_with_callback<C>(
            self: &Arc<Self>,
            source: impl Into<String>,
            callback: C,
        ) -> JoinHandle<()>
        where
            C: FnOnce(Result<Program, CompileError>) + Send + 'static,
        {
            let task = self.compile_async(source);
            tokio::spawn(async move { callback(task.await) })
        }
    }
}

#[cfg(feature = "async")]
pub use background::CompileTask;
