//! Code generation and just-in-time execution.
//!
//! Each top-level construct is lowered into its own Cranelift module and
//! handed to the execution engine:
//!
//! ```text
//! Expr -> ModuleCompiler -> Cranelift IR -> Engine (native code, symbols)
//! ```
//!
//! The [`Engine`] owns the host ISA, the symbol table, and every module
//! whose code is still callable. Anonymous top-level expressions are added
//! under a [`ModuleHandle`] and removed again right after invocation, so
//! their code does not accumulate.

mod compiler;
mod engine;
mod runtime;
mod translate;

pub use compiler::{declaration_text, ModuleCompiler};
pub use engine::{Engine, ModuleHandle};

use std::fmt;

/// Failure in the JIT layer proper, as opposed to a compile error in the
/// user's program.
#[derive(Debug, Clone)]
pub enum JitError {
    /// Cranelift setup or compilation failed.
    CompilationFailed(String),
    /// Adding or finalizing a module failed.
    ModuleError(String),
    /// A symbol lookup came back empty.
    SymbolNotFound(String),
}

impl fmt::Display for JitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JitError::CompilationFailed(msg) => write!(f, "JIT compilation failed: {}", msg),
            JitError::ModuleError(msg) => write!(f, "JIT module error: {}", msg),
            JitError::SymbolNotFound(name) => write!(f, "JIT: unknown symbol '{}'", name),
        }
    }
}

impl std::error::Error for JitError {}
