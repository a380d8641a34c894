//! Expression lowering: AST nodes to Cranelift IR.
//!
//! Every value is an `f64`. Mutable locals — parameters, `var` bindings,
//! and loop induction variables — are frontend `Variable`s; the frontend's
//! SSA construction takes the place of stack slots plus a
//! promote-to-register pass, so no local ever touches memory. Comparison
//! results are 1-bit flags widened back to 0.0/1.0.
//!
//! Scoping is save/restore on the name table: `for` and `var` stash any
//! binding they shadow and reinstate it when their region ends.

use cranelift_codegen::ir::condcodes::FloatCC;
use cranelift_codegen::ir::types::{F64, I32};
use cranelift_codegen::ir::{AbiParam, Block, InstBuilder, Value};
use cranelift_frontend::{FunctionBuilder, Variable};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ast::{Expr, Prototype};
use crate::error::{CompileError, CompileResult};

pub(super) struct FunctionTranslator<'a> {
    module: &'a mut JITModule,
    /// Per-module declarations: name → (id, arity).
    declared: &'a mut FxHashMap<String, (FuncId, usize)>,
    /// Process-wide prototype registry, for rematerializing callees.
    protos: &'a FxHashMap<String, Prototype>,
    /// Name → variable binding for the function being emitted.
    vars: FxHashMap<String, Variable>,
    next_var: u32,
}

impl<'a> FunctionTranslator<'a> {
    pub(super) fn new(
        module: &'a mut JITModule,
        declared: &'a mut FxHashMap<String, (FuncId, usize)>,
        protos: &'a FxHashMap<String, Prototype>,
    ) -> Self {
        FunctionTranslator {
            module,
            declared,
            protos,
            vars: FxHashMap::default(),
            next_var: 0,
        }
    }

    /// Bind each formal parameter to a fresh variable holding the
    /// incoming block parameter.
    pub(super) fn bind_params(
        &mut self,
        builder: &mut FunctionBuilder,
        entry: Block,
        params: &[String],
    ) {
        let values: SmallVec<[Value; 8]> = builder.block_params(entry).iter().copied().collect();
        for (name, &value) in params.iter().zip(values.iter()) {
            let var = self.fresh_var(builder);
            builder.def_var(var, value);
            self.vars.insert(name.clone(), var);
        }
    }

    pub(super) fn expr(
        &mut self,
        builder: &mut FunctionBuilder,
        expr: &Expr,
    ) -> CompileResult<Value> {
        match expr {
            Expr::Number(value) => Ok(builder.ins().f64const(*value)),

            Expr::Variable(name) => match self.vars.get(name) {
                Some(&var) => Ok(builder.use_var(var)),
                None => Err(CompileError::UnknownVariable(name.clone())),
            },

            Expr::Unary { op, operand } => {
                let operand = self.expr(builder, operand)?;
                let name = format!("unary{}", op);
                let (func_id, _) = self
                    .lookup_callee(&name)?
                    .ok_or(CompileError::UnknownUnaryOperator(*op))?;
                Ok(self.emit_call(builder, func_id, &[operand]))
            }

            Expr::Binary { op, lhs, rhs } => self.binary(builder, *op, lhs, rhs),

            Expr::Call { callee, args } => {
                let (func_id, arity) = self
                    .lookup_callee(callee)?
                    .ok_or_else(|| CompileError::UnknownFunction(callee.clone()))?;
                if arity != args.len() {
                    return Err(CompileError::ArityMismatch {
                        name: callee.clone(),
                        expected: arity,
                        got: args.len(),
                    });
                }
                let mut values: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len());
                for arg in args {
                    values.push(self.expr(builder, arg)?);
                }
                Ok(self.emit_call(builder, func_id, &values))
            }

            Expr::If {
                cond,
                then_body,
                else_body,
            } => self.conditional(builder, cond, then_body, else_body),

            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => self.counted_loop(builder, var, start, end, step.as_deref(), body),

            Expr::Var { bindings, body } => self.scoped_bindings(builder, bindings, body),
        }
    }

    fn binary(
        &mut self,
        builder: &mut FunctionBuilder,
        op: char,
        lhs: &Expr,
        rhs: &Expr,
    ) -> CompileResult<Value> {
        // Assignment has no left operand to evaluate; the lhs names a slot.
        if op == '=' {
            let name = match lhs {
                Expr::Variable(name) => name,
                _ => return Err(CompileError::InvalidAssignmentTarget),
            };
            let value = self.expr(builder, rhs)?;
            let var = *self
                .vars
                .get(name)
                .ok_or_else(|| CompileError::UnknownVariable(name.clone()))?;
            builder.def_var(var, value);
            return Ok(value);
        }

        let l = self.expr(builder, lhs)?;
        let r = self.expr(builder, rhs)?;
        match op {
            '+' => Ok(builder.ins().fadd(l, r)),
            '-' => Ok(builder.ins().fsub(l, r)),
            '*' => Ok(builder.ins().fmul(l, r)),
            '/' => Ok(builder.ins().fdiv(l, r)),
            '<' => {
                let flag = builder.ins().fcmp(FloatCC::UnorderedOrLessThan, l, r);
                Ok(self.widen_flag(builder, flag))
            }
            '>' => {
                let flag = builder.ins().fcmp(FloatCC::UnorderedOrGreaterThan, l, r);
                Ok(self.widen_flag(builder, flag))
            }
            _ => {
                let name = format!("binary{}", op);
                let (func_id, _) = self
                    .lookup_callee(&name)?
                    .ok_or(CompileError::UnknownBinaryOperator(op))?;
                Ok(self.emit_call(builder, func_id, &[l, r]))
            }
        }
    }

    fn conditional(
        &mut self,
        builder: &mut FunctionBuilder,
        cond: &Expr,
        then_body: &Expr,
        else_body: &Expr,
    ) -> CompileResult<Value> {
        let cond = self.expr(builder, cond)?;
        let zero = builder.ins().f64const(0.0);
        let flag = builder.ins().fcmp(FloatCC::OrderedNotEqual, cond, zero);

        let then_block = builder.create_block();
        let else_block = builder.create_block();
        let merge_block = builder.create_block();
        // The merge block's parameter is the phi selecting the branch value.
        builder.append_block_param(merge_block, F64);

        builder.ins().brif(flag, then_block, &[], else_block, &[]);

        builder.switch_to_block(then_block);
        builder.seal_block(then_block);
        let then_value = self.expr(builder, then_body)?;
        builder.ins().jump(merge_block, &[then_value]);

        builder.switch_to_block(else_block);
        builder.seal_block(else_block);
        let else_value = self.expr(builder, else_body)?;
        builder.ins().jump(merge_block, &[else_value]);

        builder.switch_to_block(merge_block);
        builder.seal_block(merge_block);
        Ok(builder.block_params(merge_block)[0])
    }

    fn counted_loop(
        &mut self,
        builder: &mut FunctionBuilder,
        name: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> CompileResult<Value> {
        let start = self.expr(builder, start)?;
        let var = self.fresh_var(builder);
        builder.def_var(var, start);

        let loop_block = builder.create_block();
        let after_block = builder.create_block();
        builder.ins().jump(loop_block, &[]);

        // The loop block gets a back-edge below; it cannot be sealed until
        // that edge exists.
        builder.switch_to_block(loop_block);

        let shadowed = self.vars.insert(name.to_string(), var);

        self.expr(builder, body)?; // body value is discarded

        let step = match step {
            Some(step) => self.expr(builder, step)?,
            None => builder.ins().f64const(1.0),
        };
        let current = builder.use_var(var);
        let next = builder.ins().fadd(current, step);
        builder.def_var(var, next);

        let end = self.expr(builder, end)?;
        let zero = builder.ins().f64const(0.0);
        let flag = builder.ins().fcmp(FloatCC::OrderedNotEqual, end, zero);
        builder.ins().brif(flag, loop_block, &[], after_block, &[]);
        builder.seal_block(loop_block);

        builder.switch_to_block(after_block);
        builder.seal_block(after_block);

        match shadowed {
            Some(prev) => self.vars.insert(name.to_string(), prev),
            None => self.vars.remove(name),
        };

        Ok(builder.ins().f64const(0.0))
    }

    fn scoped_bindings(
        &mut self,
        builder: &mut FunctionBuilder,
        bindings: &[(String, Option<Expr>)],
        body: &Expr,
    ) -> CompileResult<Value> {
        // Bindings land incrementally, so a later initializer sees the
        // earlier names (but not its own).
        let mut shadowed: Vec<(String, Option<Variable>)> = Vec::with_capacity(bindings.len());
        for (name, init) in bindings {
            let value = match init {
                Some(init) => self.expr(builder, init)?,
                None => builder.ins().f64const(0.0),
            };
            let var = self.fresh_var(builder);
            builder.def_var(var, value);
            shadowed.push((name.clone(), self.vars.insert(name.clone(), var)));
        }

        let value = self.expr(builder, body)?;

        for (name, prev) in shadowed {
            match prev {
                Some(prev) => self.vars.insert(name, prev),
                None => self.vars.remove(&name),
            };
        }
        Ok(value)
    }

    /// Resolve a callee: already declared in this module, or registered in
    /// the prototype registry (declared here as an import), or absent.
    fn lookup_callee(&mut self, name: &str) -> CompileResult<Option<(FuncId, usize)>> {
        if let Some(&found) = self.declared.get(name) {
            return Ok(Some(found));
        }
        let proto = match self.protos.get(name) {
            Some(proto) => proto,
            None => return Ok(None),
        };

        let mut sig = self.module.make_signature();
        for _ in 0..proto.arity() {
            sig.params.push(AbiParam::new(F64));
        }
        sig.returns.push(AbiParam::new(F64));

        let func_id = self
            .module
            .declare_function(name, Linkage::Import, &sig)
            .map_err(|e| CompileError::Codegen(e.to_string()))?;
        self.declared.insert(name.to_string(), (func_id, proto.arity()));
        Ok(Some((func_id, proto.arity())))
    }

    fn emit_call(&mut self, builder: &mut FunctionBuilder, func_id: FuncId, args: &[Value]) -> Value {
        let callee = self.module.declare_func_in_func(func_id, builder.func);
        let call = builder.ins().call(callee, args);
        builder.inst_results(call)[0]
    }

    /// Widen a comparison flag to 0.0 / 1.0.
    fn widen_flag(&self, builder: &mut FunctionBuilder, flag: Value) -> Value {
        let wide = builder.ins().uextend(I32, flag);
        builder.ins().fcvt_from_uint(F64, wide)
    }

    fn fresh_var(&mut self, builder: &mut FunctionBuilder) -> Variable {
        let var = Variable::from_u32(self.next_var);
        self.next_var += 1;
        builder.declare_var(var, F64);
        var
    }
}
