//! Compile-time error taxonomy.
//!
//! Syntactic failures carry the diagnostic text produced at the parse
//! site; semantic failures at lowering time are categorized so callers
//! can match on them. The driver renders every one of these as a single
//! `LogError:` line and keeps going.

use std::fmt;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Unexpected token for the current production.
    Syntax(String),
    /// A name with no binding in the current function.
    UnknownVariable(String),
    /// A callee that is neither in the current module nor registered.
    UnknownFunction(String),
    /// `<op> x` where no `unary<op>` function is resolvable.
    UnknownUnaryOperator(char),
    /// `x <op> y` for a glyph that is neither built in nor defined.
    UnknownBinaryOperator(char),
    /// Call with the wrong number of arguments.
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    /// Left-hand side of `=` was not a variable reference.
    InvalidAssignmentTarget,
    /// `def` of a name that already has a body in the JIT.
    Redefinition(String),
    /// Verifier or module-level failure while emitting IR.
    Codegen(String),
}

impl CompileError {
    pub fn syntax(message: impl Into<String>) -> Self {
        CompileError::Syntax(message.into())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax(message) => write!(f, "{}", message),
            CompileError::UnknownVariable(name) => {
                write!(f, "Unknown variable name '{}'", name)
            }
            CompileError::UnknownFunction(name) => {
                write!(f, "Unknown function referenced: '{}'", name)
            }
            CompileError::UnknownUnaryOperator(op) => {
                write!(f, "Unknown unary operator '{}'", op)
            }
            CompileError::UnknownBinaryOperator(op) => {
                write!(f, "invalid binary operator '{}'", op)
            }
            CompileError::ArityMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "Incorrect # arguments passed to '{}': expected {}, got {}",
                name, expected, got
            ),
            CompileError::InvalidAssignmentTarget => {
                write!(f, "destination of '=' must be a variable")
            }
            CompileError::Redefinition(name) => {
                write!(f, "Function '{}' cannot be redefined.", name)
            }
            CompileError::Codegen(message) => write!(f, "codegen failed: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}
