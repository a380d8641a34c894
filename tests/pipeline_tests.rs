//! End-to-end tests: source text in, diagnostic stream out.
//!
//! Each test drives a full `Session` over an in-memory stream and asserts
//! on the captured diagnostics, the same way the binary runs over stdin
//! and stderr.

use std::collections::HashMap;
use std::io::Cursor;

use kaleido::{Expr, Parser, Session};

fn run(source: &str) -> String {
    let mut out = Vec::new();
    let mut session = Session::new(Cursor::new(source.as_bytes().to_vec()), &mut out)
        .expect("engine construction");
    session.run().expect("session I/O");
    String::from_utf8(out).expect("diagnostics are UTF-8")
}

fn evaluated_line(value: f64) -> String {
    format!("Evaluated to {:.6}", value)
}

// Basic pipeline

#[test]
fn top_level_addition() {
    let out = run("4+5;");
    assert!(out.contains("Read top-level expression:"));
    assert!(out.contains(&evaluated_line(9.0)));
}

#[test]
fn function_definition_and_call() {
    let out = run("def add(a b) a+b; add(3,4);");
    assert!(out.contains("Read function definition:"));
    assert!(out.contains(&evaluated_line(7.0)));
}

#[test]
fn extern_of_host_helper_resolves() {
    let out = run("extern printd(x); printd(3);");
    assert!(out.contains("Read extern: fn %printd(f64) -> f64"));
    assert!(out.contains(&evaluated_line(0.0)));
}

#[test]
fn extern_putchard_resolves() {
    let out = run("extern putchard(c); putchard(65);");
    assert!(out.contains(&evaluated_line(0.0)));
}

#[test]
fn comments_and_newlines_are_transparent() {
    let out = run("def g(x)\n  # doubling, over two lines\n  x * 2;\ng(4);");
    assert!(out.contains(&evaluated_line(8.0)));
}

// Control flow and mutable locals

#[test]
fn recursive_fibonacci() {
    let out = run("def fib(n) if n < 2 then n else fib(n-1) + fib(n-2); fib(10);");
    assert!(out.contains(&evaluated_line(55.0)));
}

#[test]
fn loop_with_var_assignment_and_step() {
    let out = run(
        "def loopsum(n) var s = 0 in (for i = 1, i < n+1, 1.0 in s = s + i) + s; loopsum(10);",
    );
    assert!(out.contains(&evaluated_line(55.0)));
}

#[test]
fn conditional_picks_the_right_branch() {
    let out = run("if 1 < 2 then 10 else 20; if 2 < 1 then 10 else 20;");
    assert!(out.contains(&evaluated_line(10.0)));
    assert!(out.contains(&evaluated_line(20.0)));
}

#[test]
fn greater_than_mirrors_less_than() {
    let out = run("3 > 2; 2 > 3;");
    assert!(out.contains(&evaluated_line(1.0)));
    assert!(out.contains(&evaluated_line(0.0)));
}

#[test]
fn var_shadowing_restores_outer_binding() {
    let out = run("def f(x) (var x = 10 in x) + x; f(1);");
    assert!(out.contains(&evaluated_line(11.0)));
}

// User-defined operators

#[test]
fn user_binary_operator() {
    let out = run("def binary | 5 (a b) if a then 1 else if b then 1 else 0; 0 | 1;");
    assert!(out.contains(&evaluated_line(1.0)));
}

#[test]
fn user_unary_operator() {
    let out = run("def unary ! (v) if v then 0 else 1; !1; !0;");
    assert!(out.contains(&evaluated_line(0.0)));
    assert!(out.contains(&evaluated_line(1.0)));
}

#[test]
fn user_operator_precedence_is_respected() {
    // `|` at precedence 5 binds looser than `<` at 10.
    let out = run("def binary | 5 (a b) if a then 1 else if b then 1 else 0; 1 < 0 | 2 < 3;");
    assert!(out.contains(&evaluated_line(1.0)));
}

// Error handling and recovery

#[test]
fn def_alone_reports_and_terminates_quietly() {
    let out = run("def");
    assert!(out.contains("LogError: Expected function name in prototype"));
    assert!(!out.contains("Evaluated to"));
}

#[test]
fn unknown_variable_is_reported() {
    let out = run("x;");
    assert!(out.contains("LogError: Unknown variable name 'x'"));
}

#[test]
fn unknown_function_is_reported() {
    let out = run("foo(1);");
    assert!(out.contains("LogError: Unknown function referenced: 'foo'"));
}

#[test]
fn arity_mismatch_is_reported() {
    let out = run("def id(x) x; id(1, 2);");
    assert!(out.contains("LogError: Incorrect # arguments passed to 'id': expected 1, got 2"));
}

#[test]
fn assignment_to_non_variable_is_reported() {
    let out = run("1 = 2;");
    assert!(out.contains("LogError: destination of '=' must be a variable"));
}

#[test]
fn redefinition_is_rejected_and_original_survives() {
    let out = run("def f(x) x; def f(x) x + 1; f(5);");
    assert!(out.contains("LogError: Function 'f' cannot be redefined."));
    assert!(out.contains(&evaluated_line(5.0)));
}

#[test]
fn extern_then_definition_is_allowed() {
    let out = run("extern h(x); def h(x) x * 3; h(2);");
    assert!(!out.contains("cannot be redefined"));
    assert!(out.contains(&evaluated_line(6.0)));
}

#[test]
fn recovery_continues_with_the_next_construct() {
    let out = run("def 5; 4+5;");
    assert!(out.contains("LogError:"));
    assert!(out.contains(&evaluated_line(9.0)));
}

#[test]
fn anonymous_expressions_do_not_accumulate() {
    // Every bare expression compiles, runs, and is removed; three in a
    // row all evaluate independently.
    let out = run("1+1; 2+2; 3+3;");
    assert!(out.contains(&evaluated_line(2.0)));
    assert!(out.contains(&evaluated_line(4.0)));
    assert!(out.contains(&evaluated_line(6.0)));
}

// JIT results cross-checked against a reference interpreter over the AST.

fn interpret(expr: &Expr, env: &mut HashMap<String, f64>) -> f64 {
    match expr {
        Expr::Number(value) => *value,
        Expr::Variable(name) => env[name],
        Expr::Binary { op, lhs, rhs } => {
            if *op == '=' {
                let value = interpret(rhs, env);
                if let Expr::Variable(name) = lhs.as_ref() {
                    env.insert(name.clone(), value);
                }
                return value;
            }
            let l = interpret(lhs, env);
            let r = interpret(rhs, env);
            match op {
                '+' => l + r,
                '-' => l - r,
                '*' => l * r,
                '/' => l / r,
                '<' => (l < r) as i64 as f64,
                '>' => (l > r) as i64 as f64,
                other => panic!("operator '{}' is not in the reference set", other),
            }
        }
        Expr::If {
            cond,
            then_body,
            else_body,
        } => {
            if interpret(cond, env) != 0.0 {
                interpret(then_body, env)
            } else {
                interpret(else_body, env)
            }
        }
        Expr::For {
            var,
            start,
            end,
            step,
            body,
        } => {
            let start = interpret(start, env);
            let shadowed = env.insert(var.clone(), start);
            loop {
                interpret(body, env);
                let step = match step {
                    Some(step) => interpret(step, env),
                    None => 1.0,
                };
                let next = env[var] + step;
                env.insert(var.clone(), next);
                if interpret(end, env) == 0.0 {
                    break;
                }
            }
            match shadowed {
                Some(prev) => env.insert(var.clone(), prev),
                None => env.remove(var),
            };
            0.0
        }
        Expr::Var { bindings, body } => {
            let mut shadowed = Vec::new();
            for (name, init) in bindings {
                let value = match init {
                    Some(init) => interpret(init, env),
                    None => 0.0,
                };
                shadowed.push((name.clone(), env.insert(name.clone(), value)));
            }
            let value = interpret(body, env);
            for (name, prev) in shadowed {
                match prev {
                    Some(prev) => env.insert(name, prev),
                    None => env.remove(&name),
                };
            }
            value
        }
        Expr::Unary { .. } | Expr::Call { .. } => {
            panic!("reference interpreter only covers closed, call-free expressions")
        }
    }
}

#[test]
fn jit_matches_reference_interpreter() {
    let expressions = [
        "1 + 2 * 3 - 4 / 2",
        "8 - 4 - 2",
        "2 < 3",
        "3 < 2",
        "3 > 2",
        "(1 + 2) * (3 + 4)",
        "if 1 < 2 then 10 else 20",
        "if 0 then 1 else if 3 > 4 then 2 else 3",
        "var a = 2, b = 3 in a * b + a",
        "var x = 1 in x = x + 41",
        "var s in (for i = 0, i < 5 in s = s + i) + s",
        "var s = 0 in (for i = 1, i < 11, 2 in s = s + i) + s",
    ];

    for source in expressions {
        let mut parser = Parser::new(source.as_bytes());
        parser.advance();
        let def = parser.parse_top_level().expect("expression parses");
        let expected = interpret(&def.body, &mut HashMap::new());

        let out = run(&format!("{};", source));
        assert!(
            out.contains(&evaluated_line(expected)),
            "JIT disagreed with the interpreter on `{}` (expected {:.6}):\n{}",
            source,
            expected,
            out
        );
    }
}
