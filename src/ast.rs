//! Abstract syntax for the expression language.
//!
//! Everything evaluates to a 64-bit float. Expressions form a tree with
//! exclusive ownership: every child is boxed into its parent, no sharing,
//! no cycles. Lowering dispatches on the variant tag.

/// Name of the synthetic zero-argument function wrapping a bare top-level
/// expression. Added to the JIT under a resource tracker, invoked once,
/// then removed.
pub const ANON_FUNCTION: &str = "__anon_expr";

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Reference to a named value.
    Variable(String),
    /// Application of a user-defined unary operator.
    Unary { op: char, operand: Box<Expr> },
    /// Binary operator application. `=` is a binary expression whose
    /// left child must be a `Variable`; that constraint is checked at
    /// lowering time.
    Binary {
        op: char,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Call of a named function with ordered arguments.
    Call { callee: String, args: Vec<Expr> },
    /// Conditional. Both branches are mandatory.
    If {
        cond: Box<Expr>,
        then_body: Box<Expr>,
        else_body: Box<Expr>,
    },
    /// Counted loop. `step` defaults to `1.0` when absent. The loop
    /// itself evaluates to `0.0`.
    For {
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    /// Mutable local bindings scoped to `body`. Initializers default
    /// to `0.0`.
    Var {
        bindings: Vec<(String, Option<Expr>)>,
        body: Box<Expr>,
    },
}

/// What kind of callable a prototype declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnKind {
    /// An ordinary named function.
    Function,
    /// A user-defined unary operator; arity is exactly one.
    UnaryOp,
    /// A user-defined binary operator; arity is exactly two.
    BinaryOp { precedence: i32 },
}

/// A function signature: enough to emit a declaration into any module.
///
/// For operator kinds the name is the fixed prefix (`unary`/`binary`)
/// followed by the operator glyph, so the glyph is always the last
/// character of the name.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
    pub kind: FnKind,
}

impl Prototype {
    pub fn function(name: impl Into<String>, params: Vec<String>) -> Self {
        Prototype {
            name: name.into(),
            params,
            kind: FnKind::Function,
        }
    }

    /// The synthetic prototype wrapping a top-level expression.
    pub fn anonymous() -> Self {
        Prototype::function(ANON_FUNCTION, Vec::new())
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The operator glyph for operator prototypes.
    pub fn operator_glyph(&self) -> Option<char> {
        match self.kind {
            FnKind::Function => None,
            FnKind::UnaryOp | FnKind::BinaryOp { .. } => self.name.chars().last(),
        }
    }
}

/// A function definition: a prototype together with its body expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub proto: Prototype,
    pub body: Expr,
}
