//! Browser bridge for the playbox pipeline.
//!
//! The page supplies the source-language frontend as a script object with
//! `parse(fileName, source)`, `imports(syntax)` and
//! `compile(syntax, typesJson)`; programs run through the page's own script
//! engine. Archives are fetched with synchronous requests relative to the
//! configured base URL. Results cross back as JSON strings.

pub mod convert;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use playbox_core::hooks::HOOKS;
use playbox_core::transport::archive_url;
use playbox_core::{
    Archive, CheckFailure, CompileEnv, FetchError, FetchErrorKind, Frontend, HookKind,
    HostRuntime, OutputSink, PlaygroundConfig, Position, Program, Report, Retention, RuntimeError,
    SourceError, SourceFile, Transport,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use crate::convert::{
    decode_archive, decode_diagnostics, decode_fetch_response, decode_imports, runtime_message,
    types_json,
};

#[wasm_bindgen(module = "/js/host.js")]
extern "C" {
    #[wasm_bindgen(js_name = installHook)]
    fn install_hook(name: &str, handler: &Closure<dyn Fn(String)>);

    #[wasm_bindgen(catch, js_name = evalProgram)]
    fn eval_program(code: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_name = fetchArchiveSync)]
    fn fetch_archive_sync(url: &str) -> Result<String, JsValue>;

    #[wasm_bindgen(js_name = isError)]
    fn is_error(value: &JsValue) -> bool;

    fn describe(value: &JsValue) -> String;

    fn schedule(task: &JsValue);

    fn invoke(callback: &JsValue, payload: &str);
}

#[wasm_bindgen]
extern "C" {
    /// The page's frontend object.
    pub type ScriptFrontend;

    #[wasm_bindgen(method, catch)]
    fn parse(this: &ScriptFrontend, file_name: &str, source: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn imports(this: &ScriptFrontend, syntax: &JsValue) -> Result<String, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn compile(this: &ScriptFrontend, syntax: &JsValue, types_json: &str)
    -> Result<String, JsValue>;
}

struct JsTransport {
    base_url: String,
}

impl Transport for JsTransport {
    fn fetch(&self, import_path: &str) -> Result<Vec<u8>, FetchError> {
        let url = archive_url(&self.base_url, import_path);
        match fetch_archive_sync(&url) {
            Ok(json) => decode_fetch_response(&url, &json),
            Err(raised) => Err(FetchError::new(
                url,
                FetchErrorKind::Transport(describe(&raised)),
            )),
        }
    }
}

struct JsFrontend {
    object: ScriptFrontend,
}

fn thrown(raised: &JsValue, locate: impl Fn(usize) -> Option<Position>) -> Vec<SourceError> {
    decode_diagnostics(&describe(raised), locate)
}

impl Frontend for JsFrontend {
    /// The parsed file travels with the script-side syntax so that
    /// compile errors given as offsets can be located.
    type Syntax = (SourceFile, JsValue);

    fn parse(&self, file: &SourceFile, source: &str) -> Result<Self::Syntax, Vec<SourceError>> {
        self.object
            .parse(file.name(), source)
            .map(|syntax| (file.clone(), syntax))
            .map_err(|raised| thrown(&raised, |offset| file.position(file.pos(offset))))
    }

    fn compile(&self, syntax: Self::Syntax, env: &CompileEnv<'_>) -> Result<Archive, CheckFailure> {
        let (file, syntax) = syntax;
        let locate = |offset: usize| env.files().position(file.pos(offset));
        let listed = self
            .object
            .imports(&syntax)
            .map_err(|raised| CheckFailure::Errors(thrown(&raised, locate)))?;
        let paths = decode_imports(&listed).map_err(|e| CheckFailure::Errors(e.into()))?;

        let mut imported = Vec::with_capacity(paths.len());
        for path in &paths {
            imported.push(env.import(path)?);
        }

        let types = types_json(env.types(), &imported);
        let archive = self
            .object
            .compile(&syntax, &types)
            .map_err(|raised| CheckFailure::Errors(thrown(&raised, locate)))?;
        decode_archive(env.package(), &archive).map_err(|e| CheckFailure::Errors(e.into()))
    }
}

#[derive(Default)]
struct JsRuntime {
    hooks: RefCell<Vec<Closure<dyn Fn(String)>>>,
}

impl HostRuntime for JsRuntime {
    fn install(&self, sink: Arc<dyn OutputSink>) {
        let mut hooks = self.hooks.borrow_mut();
        for hook in HOOKS {
            let sink = sink.clone();
            let handler: Closure<dyn Fn(String)> = match hook.kind {
                HookKind::Write => Closure::new(move |chunk: String| sink.write(chunk.as_bytes())),
                HookKind::Panic => Closure::new(move |message: String| sink.panic(&message)),
            };
            install_hook(hook.global, &handler);
            hooks.push(handler);
        }
    }

    fn eval(&self, code: &str) -> Result<(), RuntimeError> {
        eval_program(code)
            .map_err(|raised| RuntimeError::new(runtime_message(is_error(&raised), &describe(&raised))))
    }
}

type Inner = playbox_core::Playground<JsFrontend, JsRuntime>;

#[wasm_bindgen]
pub struct Playground {
    inner: Rc<Inner>,
}

#[wasm_bindgen]
impl Playground {
    /// `baseUrl` defaults to the page's directory. With `retainOutput` the
    /// output log keeps every run instead of starting fresh.
    #[wasm_bindgen(constructor)]
    pub fn new(
        frontend: ScriptFrontend,
        base_url: Option<String>,
        retain_output: Option<bool>,
    ) -> Playground {
        let mut config = PlaygroundConfig::default();
        if let Some(base_url) = base_url {
            config = config.with_base_url(base_url);
        }
        if retain_output.unwrap_or(false) {
            config = config.with_retention(Retention::Process);
        }
        let transport = Arc::new(JsTransport {
            base_url: config.base_url.clone(),
        });
        let inner = Inner::with_transport(
            config,
            transport,
            JsFrontend { object: frontend },
            JsRuntime::default(),
        );
        Playground {
            inner: Rc::new(inner),
        }
    }

    /// Compiles and returns a JSON report; on success `code` holds the program.
    pub fn compile(&self, source: &str) -> String {
        Report::compiled(&self.inner.compile(source)).to_json()
    }

    /// Like `compile`, but returns at once and hands the report to
    /// `callback` from a later task.
    #[wasm_bindgen(js_name = compileAsync)]
    pub fn compile_async(&self, source: String, callback: JsValue) {
        let inner = Rc::clone(&self.inner);
        let task = Closure::once_into_js(move || {
            let report = Report::compiled(&inner.compile(&source));
            invoke(&callback, &report.to_json());
        });
        schedule(&task);
    }

    /// Runs a program produced by `compile`; throws the runtime error.
    pub fn run(&self, code: String) -> Result<(), JsValue> {
        let program = Program {
            code,
            segments: Vec::new(),
        };
        match self.inner.run(&program).error {
            None => Ok(()),
            Some(error) => Err(JsValue::from_str(&error.message)),
        }
    }

    #[wasm_bindgen(js_name = compileAndRun)]
    pub fn compile_and_run(&self, source: &str) -> String {
        Report::outcome(&self.inner.compile_and_run(source)).to_json()
    }

    /// The output log as JSON `[{type, content}]`.
    pub fn output(&self) -> String {
        serde_json::to_string(&self.inner.output_history()).unwrap_or_else(|_| "[]".to_string())
    }
}
