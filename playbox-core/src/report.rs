//! Host-facing result shape.

use serde::Serialize;

use crate::codegen::Program;
use crate::error::{CompileError, FailureKind};
use crate::orchestrator::{RunFailure, RunOutcome};
use crate::output::Entry;

/// What a host renders after a compile or a compile-and-run.
///
/// `diagnostics` holds the failure itself (source errors, a dependency
/// problem or a runtime error); `output` holds what the program printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report {
    Succeeded {
        code: String,
        output: Vec<Entry>,
    },
    Failed {
        kind: FailureKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Failing import path for dependency failures.
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        diagnostics: Vec<Entry>,
        output: Vec<Entry>,
    },
}

impl Report {
    pub fn compiled(result: &Result<Program, CompileError>) -> Self {
        match result {
            Ok(program) => Report::Succeeded {
                code: program.code.clone(),
                output: Vec::new(),
            },
            Err(error) => Self::compile_failure(error),
        }
    }

    pub fn compile_failure(error: &CompileError) -> Self {
        let path = match error {
            CompileError::Dependency(dependency) => Some(dependency.path().to_string()),
            _ => None,
        };
        Report::Failed {
            kind: error.kind(),
            code: None,
            path,
            diagnostics: error.diagnostics(),
            output: Vec::new(),
        }
    }

    pub fn outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Succeeded { program, output } => Report::Succeeded {
                code: program.code.clone(),
                output: output.clone(),
            },
            RunOutcome::Failed {
                failure: RunFailure::Compile(error),
                ..
            } => Self::compile_failure(error),
            RunOutcome::Failed {
                failure: RunFailure::Runtime(error),
                program,
                output,
            } => Report::Failed {
                kind: FailureKind::Runtime,
                code: program.as_ref().map(|p| p.code.clone()),
                path: None,
                diagnostics: vec![error.diagnostic()],
                output: output.clone(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Report::Succeeded { .. })
    }

    pub fn to_json(&self) -> String {
        // Every field is a string, an enum or a list of those.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"failed","kind":"internal","diagnostics":[{{"type":"err","content":{:?}}}],"output":[]}}"#, e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DependencyError, FetchError, FetchErrorKind, RuntimeError};
    use serde_json::json;

    #[test]
    fn dependency_failure_names_path() {
        let error = CompileError::Dependency(DependencyError {
            chain: vec!["main".into(), "foo/bar".into()],
            cause: FetchError::new("./pkg/foo/bar.a.js", FetchErrorKind::NotFound).into(),
        });
        let value: serde_json::Value =
            serde_json::from_str(&Report::compile_failure(&error).to_json()).expect("json");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["kind"], "dependency");
        assert_eq!(value["path"], "foo/bar");
        assert_eq!(value["diagnostics"].as_array().map(Vec::len), Some(1));
        assert!(value.get("code").is_none());
    }

    #[test]
    fn runtime_failure_keeps_code_and_output() {
        let program = Program {
            code: "boom()".into(),
            segments: Vec::new(),
        };
        let outcome = RunOutcome::Failed {
            failure: RunFailure::Runtime(RuntimeError::new("boom")),
            program: Some(program),
            output: vec![Entry::output("before"), Entry::error("panic: boom")],
        };
        let report = Report::outcome(&outcome);
        assert!(!report.is_success());
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).expect("json");
        assert_eq!(value["kind"], "runtime");
        assert_eq!(value["code"], "boom()");
        assert_eq!(value["diagnostics"], json!([{"type": "err", "content": "boom"}]));
        assert_eq!(value["output"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn success_carries_code_and_output() {
        let report = Report::Succeeded {
            code: "run()".into(),
            output: vec![Entry::output("hi")],
        };
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).expect("json");
        assert_eq!(
            value,
            json!({"status": "succeeded", "code": "run()", "output": [{"type": "out", "content": "hi"}]})
        );
    }
}
