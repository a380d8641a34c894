//! # Kaleido — a small numeric language on a Cranelift JIT
//!
//! Kaleido reads a Kaleidoscope-like expression language from a character
//! stream, parses it with a user-extensible operator-precedence parser,
//! lowers it to Cranelift IR, and runs it natively. Bare expressions at
//! the top level are compiled into an anonymous function, invoked once,
//! and thrown away.
//!
//! ## Quick start
//!
//! ```
//! use std::io::Cursor;
//! use kaleido::Session;
//!
//! let source = "def add(a b) a + b; add(1, 2);";
//! let mut out = Vec::new();
//! let mut session = Session::new(Cursor::new(source.as_bytes().to_vec()), &mut out).unwrap();
//! session.run().unwrap();
//! assert!(String::from_utf8_lossy(&out).contains("Evaluated to 3.000000"));
//! ```
//!
//! ## Architecture
//!
//! One top-level construct flows through the pipeline at a time:
//!
//! 1. **Reader** — lexer and precedence-climbing parser produce the AST
//! 2. **Lowering** — each construct is emitted into its own Cranelift
//!    module; mutable locals become frontend variables
//! 3. **Engine** — finalizes modules, resolves symbols across them and to
//!    the host helpers, and frees anonymous expressions after invocation

pub mod ast;
pub mod driver;
pub mod error;
pub mod jit;
pub mod reader;

pub use ast::{Expr, FnKind, FunctionDef, Prototype};
pub use driver::Session;
pub use error::{CompileError, CompileResult};
pub use jit::{Engine, JitError, ModuleCompiler};
pub use reader::{Lexer, Parser, Token};
