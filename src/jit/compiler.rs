//! Per-module compiler: AST function → Cranelift IR → defined function.
//!
//! One `ModuleCompiler` lives for exactly one top-level construct. It owns
//! the module being filled, declares every function the construct
//! references (rematerializing registered prototypes as imports), and on
//! success is consumed by [`Engine::add_module`](super::Engine::add_module).
//! On any lowering failure the whole compiler is dropped, which discards
//! the partially emitted function with it.

use cranelift_codegen::ir::types::F64;
use cranelift_codegen::ir::{AbiParam, InstBuilder, Signature, UserFuncName};
use cranelift_codegen::verifier::verify_function;
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{FunctionDef, Prototype};
use crate::error::{CompileError, CompileResult};

use super::translate::FunctionTranslator;

pub struct ModuleCompiler {
    module: JITModule,
    ctx: Context,
    builder_ctx: FunctionBuilderContext,
    /// Functions declared in this module: name → (id, arity).
    declared: FxHashMap<String, (FuncId, usize)>,
    /// Functions this module defines, in definition order.
    exported: Vec<(String, FuncId)>,
}

impl ModuleCompiler {
    pub fn new(module: JITModule) -> Self {
        let ctx = module.make_context();
        ModuleCompiler {
            module,
            ctx,
            builder_ctx: FunctionBuilderContext::new(),
            declared: FxHashMap::default(),
            exported: Vec::new(),
        }
    }

    /// Lower one function into this module and return its CLIF text.
    ///
    /// `protos` is the process-wide prototype registry used to
    /// rematerialize declarations for callees that live in earlier
    /// modules; `defined` is the set of names that already have a body in
    /// the JIT, used to reject redefinition up front.
    pub fn compile(
        &mut self,
        function: &FunctionDef,
        protos: &FxHashMap<String, Prototype>,
        defined: &FxHashSet<String>,
    ) -> CompileResult<String> {
        let proto = &function.proto;
        if defined.contains(&proto.name) {
            return Err(CompileError::Redefinition(proto.name.clone()));
        }

        let sig = self.float_signature(proto.arity());
        let func_id = self
            .module
            .declare_function(&proto.name, Linkage::Export, &sig)
            .map_err(|e| CompileError::Codegen(e.to_string()))?;
        self.declared
            .insert(proto.name.clone(), (func_id, proto.arity()));

        self.ctx.func.signature = sig;
        self.ctx.func.name = UserFuncName::testcase(proto.name.as_str());

        let mut builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.builder_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let mut translator =
            FunctionTranslator::new(&mut self.module, &mut self.declared, protos);
        translator.bind_params(&mut builder, entry, &proto.params);
        let ret = translator.expr(&mut builder, &function.body)?;
        builder.ins().return_(&[ret]);
        builder.finalize();

        verify_function(&self.ctx.func, self.module.isa())
            .map_err(|e| CompileError::Codegen(e.to_string()))?;

        let clif = format!("{}", self.ctx.func);

        self.module
            .define_function(func_id, &mut self.ctx)
            .map_err(|e| CompileError::Codegen(e.to_string()))?;
        self.module.clear_context(&mut self.ctx);

        self.exported.push((proto.name.clone(), func_id));
        Ok(clif)
    }

    pub(super) fn into_parts(self) -> (JITModule, Vec<(String, FuncId)>) {
        (self.module, self.exported)
    }

    fn float_signature(&self, arity: usize) -> Signature {
        let mut sig = self.module.make_signature();
        for _ in 0..arity {
            sig.params.push(AbiParam::new(F64));
        }
        sig.returns.push(AbiParam::new(F64));
        sig
    }
}

/// Render an `extern` declaration for display.
pub fn declaration_text(proto: &Prototype) -> String {
    let params = vec!["f64"; proto.arity()].join(", ");
    format!("fn %{}({}) -> f64", proto.name, params)
}
