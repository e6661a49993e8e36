//! Host-provided hooks and the runtime seam.
//!
//! Generated programs report output through two host globals. The table
//! below names them; host bridges bind each global to an [`OutputSink`]
//! before the first program is evaluated.

use std::sync::Arc;

use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// The program wrote a chunk of text to standard output.
    Write,

    /// The program panicked with a message.
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookDescriptor {
    /// Name of the global the generated code calls.
    pub global: &'static str,

    /// Shape of the call, informational only.
    pub signature: &'static str,

    pub kind: HookKind,
}

/// Globals generated code calls.
pub const HOOKS: &[HookDescriptor] = &[
    HookDescriptor {
        global: "__playbox_write",
        signature: "(chunk: string) => void",
        kind: HookKind::Write,
    },
    HookDescriptor {
        global: "__playbox_panic",
        signature: "(message: string) => void",
        kind: HookKind::Panic,
    },
];

/// Receiver of the two hooks.
pub trait OutputSink: Send + Sync {
    fn write(&self, chunk: &[u8]);
    fn panic(&self, message: &str);
}

/// The engine that evaluates generated programs.
///
/// `install` is called exactly once, before any `eval`. Evaluation runs to
/// completion on the calling thread; anything the program raises must come
/// back as a [`RuntimeError`] rather than unwinding into the caller.
pub trait HostRuntime {
    fn install(&self, sink: Arc<dyn OutputSink>);
    fn eval(&self, code: &str) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_global_per_hook_kind() {
        assert_eq!(HOOKS.len(), 2);
        assert_ne!(HOOKS[0].kind, HOOKS[1].kind);
        assert_ne!(HOOKS[0].global, HOOKS[1].global);
        assert!(HOOKS.iter().all(|hook| hook.global.starts_with("__playbox_")));
    }
}
