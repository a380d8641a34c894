//! The top-level driver: dispatch, error recovery, printing.
//!
//! A [`Session`] owns the whole pipeline — parser (and with it the
//! operator table), prototype registry, and execution engine — and runs
//! the read-compile-execute loop over an input stream. All diagnostics go
//! to the session's output sink; the binary passes stderr, tests pass a
//! buffer.
//!
//! Recovery is panic-mode at the top level: a parse failure reports one
//! `LogError:` line and skips a single token; a lowering failure reports
//! and simply drops the module under construction.

use std::io::{self, Read, Write};

use rustc_hash::FxHashMap;

use crate::ast::{self, FunctionDef, Prototype};
use crate::error::CompileError;
use crate::jit::{declaration_text, Engine, JitError, ModuleCompiler};
use crate::reader::{Parser, Token};

const PROMPT: &str = "ready> ";

pub struct Session<R, W> {
    parser: Parser<R>,
    engine: Engine,
    /// Most recent prototype per name; consulted to rematerialize
    /// declarations into each fresh module.
    protos: FxHashMap<String, Prototype>,
    out: W,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(input: R, out: W) -> Result<Self, JitError> {
        Ok(Session {
            parser: Parser::new(input),
            engine: Engine::new()?,
            protos: FxHashMap::default(),
            out,
        })
    }

    /// Run the interactive loop until end-of-input.
    pub fn run(&mut self) -> io::Result<()> {
        write!(self.out, "{}", PROMPT)?;
        self.out.flush()?;
        self.parser.advance(); // prime the first token

        loop {
            write!(self.out, "{}", PROMPT)?;
            self.out.flush()?;
            match self.parser.current() {
                Token::Eof => return Ok(()),
                Token::Char(';') => {
                    self.parser.advance();
                }
                Token::Def => self.handle_definition()?,
                Token::Extern => self.handle_extern()?,
                _ => self.handle_top_level()?,
            }
        }
    }

    fn handle_definition(&mut self) -> io::Result<()> {
        let function = match self.parser.parse_definition() {
            Ok(function) => function,
            Err(e) => return self.recover(&e),
        };
        self.protos
            .insert(function.proto.name.clone(), function.proto.clone());

        let (clif, compiler) = match self.lower(&function) {
            Ok(ok) => ok,
            Err(e) => return self.log_error(&e),
        };
        match self.engine.add_module(compiler) {
            Ok(_) => {
                writeln!(self.out, "Read function definition:")?;
                write!(self.out, "{}", clif)?;
                writeln!(self.out)
            }
            Err(e) => writeln!(self.out, "{}", e),
        }
    }

    fn handle_extern(&mut self) -> io::Result<()> {
        match self.parser.parse_extern() {
            Ok(proto) => {
                writeln!(self.out, "Read extern: {}", declaration_text(&proto))?;
                self.protos.insert(proto.name.clone(), proto);
                Ok(())
            }
            Err(e) => self.recover(&e),
        }
    }

    fn handle_top_level(&mut self) -> io::Result<()> {
        let function = match self.parser.parse_top_level() {
            Ok(function) => function,
            Err(e) => return self.recover(&e),
        };
        self.protos
            .insert(function.proto.name.clone(), function.proto.clone());

        let (clif, compiler) = match self.lower(&function) {
            Ok(ok) => ok,
            Err(e) => return self.log_error(&e),
        };
        let handle = match self.engine.add_module(compiler) {
            Ok(handle) => handle,
            Err(e) => return writeln!(self.out, "{}", e),
        };

        writeln!(self.out, "Read top-level expression:")?;
        write!(self.out, "{}", clif)?;
        writeln!(self.out)?;

        match self.engine.lookup(ast::ANON_FUNCTION) {
            Some(ptr) => {
                // Safety: `__anon_expr` was just defined with signature
                // () -> f64 and passed the verifier.
                let entry: extern "C" fn() -> f64 = unsafe { std::mem::transmute(ptr) };
                let value = entry();
                writeln!(self.out, "Evaluated to {:.6}", value)?;
            }
            None => {
                let e = JitError::SymbolNotFound(ast::ANON_FUNCTION.to_string());
                writeln!(self.out, "{}", e)?;
            }
        }

        // The expression ran; its code must not accumulate.
        self.engine.remove(handle);
        Ok(())
    }

    /// Lower one function into a fresh module.
    fn lower(&mut self, function: &FunctionDef) -> Result<(String, ModuleCompiler), CompileError> {
        let mut compiler = ModuleCompiler::new(self.engine.new_module());
        let clif = compiler.compile(function, &self.protos, self.engine.defined())?;
        Ok((clif, compiler))
    }

    fn log_error(&mut self, err: &CompileError) -> io::Result<()> {
        writeln!(self.out, "LogError: {}", err)
    }

    /// Report a parse error and skip one token to resynchronize.
    fn recover(&mut self, err: &CompileError) -> io::Result<()> {
        self.log_error(err)?;
        self.parser.advance();
        Ok(())
    }
}
