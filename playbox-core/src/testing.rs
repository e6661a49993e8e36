//! In-memory fakes for the transport, frontend and runtime seams.
//!
//! The frontend understands a tiny line language, one statement per line:
//!
//! ```text
//! import "fmt"
//! print "hello"      // writes the string plus a newline
//! write "partial"    // writes the string as-is
//! panic "boom"
//! throw "TypeError: x is not a function"
//! undefined name     // compiles to a type error
//! ```
//!
//! Code fragments are lines of `write <json>`, `panic <json>` or
//! `throw <json>` which [`ScriptRuntime`] interprets; anything else is
//! ignored at run time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::archive::Archive;
use crate::error::{FetchError, FetchErrorKind, RuntimeError};
use crate::frontend::{CheckFailure, CompileEnv, Frontend};
use crate::hooks::{HostRuntime, OutputSink};
use crate::source::{Position, SourceError, SourceFile};
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct MemoryTransport {
    archives: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(self, archive: Archive) -> Self {
        self.insert(archive);
        self
    }

    pub fn with_raw(self, import_path: &str, bytes: Vec<u8>) -> Self {
        self.archives.lock().insert(import_path.to_string(), bytes);
        self
    }

    /// Every fetch sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, archive: Archive) {
        let bytes = archive.to_json().expect("archive serializes").into_bytes();
        self.archives.lock().insert(archive.import_path, bytes);
    }

    pub fn fetch_count(&self, import_path: &str) -> usize {
        self.fetches.lock().get(import_path).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, import_path: &str) -> Result<Vec<u8>, FetchError> {
        *self.fetches.lock().entry(import_path.to_string()).or_default() += 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.archives
            .lock()
            .get(import_path)
            .cloned()
            .ok_or_else(|| FetchError::new(format!("memory:{import_path}"), FetchErrorKind::NotFound))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Import(String),
    Write(String),
    Panic(String),
    Throw(String),
    Undefined { name: String, line: u32 },
}

#[derive(Debug, Default)]
pub struct ScriptFrontend {
    compiles: AtomicUsize,
}

impl ScriptFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `compile` ran.
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

fn quoted(rest: &str) -> Option<String> {
    serde_json::from_str::<String>(rest.trim()).ok()
}

impl Frontend for ScriptFrontend {
    type Syntax = (String, Vec<Statement>);

    fn parse(&self, file: &SourceFile, source: &str) -> Result<Self::Syntax, Vec<SourceError>> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let line_no = index as u32 + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (keyword, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
            let statement = match keyword {
                "import" => quoted(rest).map(Statement::Import),
                "print" => quoted(rest).map(|text| Statement::Write(format!("{text}\n"))),
                "write" => quoted(rest).map(Statement::Write),
                "panic" => quoted(rest).map(Statement::Panic),
                "throw" => quoted(rest).map(Statement::Throw),
                "undefined" if !rest.trim().is_empty() => Some(Statement::Undefined {
                    name: rest.trim().to_string(),
                    line: line_no,
                }),
                _ => None,
            };
            match statement {
                Some(statement) => statements.push(statement),
                None => errors.push(SourceError::at(
                    Position::new(file.name(), line_no, 1),
                    format!("unexpected statement {keyword:?}"),
                )),
            }
        }
        if errors.is_empty() {
            Ok((file.name().to_string(), statements))
        } else {
            Err(errors)
        }
    }

    fn compile(&self, syntax: Self::Syntax, env: &CompileEnv<'_>) -> Result<Archive, CheckFailure> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let (file, statements) = syntax;
        let mut imports = Vec::new();
        let mut code = Vec::new();
        let mut errors = Vec::new();
        for statement in statements {
            match statement {
                Statement::Import(path) => {
                    env.import(&path)?;
                    imports.push(path);
                }
                Statement::Write(text) => code.push(format!("write {}", json(&text))),
                Statement::Panic(text) => code.push(format!("panic {}", json(&text))),
                Statement::Throw(text) => code.push(format!("throw {}", json(&text))),
                Statement::Undefined { name, line } => errors.push(SourceError::at(
                    Position::new(file.clone(), line, 1),
                    format!("undefined: {name}"),
                )),
            }
        }
        if !errors.is_empty() {
            return Err(CheckFailure::Errors(errors));
        }
        Ok(Archive::new(env.package(), code.join("\n")).with_imports(imports))
    }
}

fn json(text: &str) -> String {
    serde_json::to_string(text).expect("string serializes")
}

/// Interprets code written by [`ScriptFrontend`].
#[derive(Default)]
pub struct ScriptRuntime {
    sink: Mutex<Option<Arc<dyn OutputSink>>>,
    evals: AtomicUsize,
}

impl ScriptRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evals(&self) -> usize {
        self.evals.load(Ordering::SeqCst)
    }
}

impl HostRuntime for ScriptRuntime {
    fn install(&self, sink: Arc<dyn OutputSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn eval(&self, code: &str) -> Result<(), RuntimeError> {
        self.evals.fetch_add(1, Ordering::SeqCst);
        let sink = self
            .sink
            .lock()
            .clone()
            .ok_or_else(|| RuntimeError::new("hooks are not installed"))?;
        for line in code.lines() {
            let Some((op, rest)) = line.split_once(' ') else {
                continue;
            };
            let Some(text) = quoted(rest) else {
                continue;
            };
            match op {
                "write" => sink.write(text.as_bytes()),
                "panic" => {
                    sink.panic(&text);
                    return Err(RuntimeError::new(text));
                }
                "throw" => return Err(RuntimeError::new(text)),
                _ => {}
            }
        }
        Ok(())
    }
}
