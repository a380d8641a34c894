//! The execution engine: module lifecycle and symbol resolution.
//!
//! Modules are compiled one per top-level construct and transferred here.
//! The engine keeps a process-wide symbol table (the two host helpers plus
//! every function it has finalized) and seeds each fresh module builder
//! with a snapshot of it, so a new module resolves exactly the symbols
//! added strictly before it was created. Names the snapshot does not cover
//! fall back to `cranelift-jit`'s process-level lookup, which is how an
//! `extern` of a libc/libm function binds.

use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use rustc_hash::{FxHashMap, FxHashSet};

use super::compiler::ModuleCompiler;
use super::runtime;
use super::JitError;

/// Identifies one added module so its definitions can be torn down as a
/// unit. The resource tracker of the anonymous-expression path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHandle(usize);

/// A finalized module kept alive while its code may still be called.
struct TrackedModule {
    module: Option<JITModule>,
    /// Names this module contributed to the symbol table.
    names: Vec<String>,
}

impl Drop for TrackedModule {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // Safety: the engine has already unregistered this module's
            // symbols; no pointer into its code outlives the handle.
            unsafe { module.free_memory() };
        }
    }
}

pub struct Engine {
    isa: OwnedTargetIsa,
    /// Resolvable name → native address. Host helpers plus every
    /// finalized function.
    symbols: FxHashMap<String, *const u8>,
    /// Names that have a body in some added module.
    defined: FxHashSet<String>,
    modules: Vec<Option<TrackedModule>>,
}

impl Engine {
    pub fn new() -> Result<Self, JitError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("use_colocated_libcalls", "false")
            .map_err(|e| JitError::CompilationFailed(e.to_string()))?;
        flag_builder
            .set("is_pic", "false")
            .map_err(|e| JitError::CompilationFailed(e.to_string()))?;
        flag_builder
            .set("opt_level", "speed")
            .map_err(|e| JitError::CompilationFailed(e.to_string()))?;

        let isa_builder = cranelift_native::builder()
            .map_err(|msg| JitError::CompilationFailed(msg.to_string()))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| JitError::CompilationFailed(e.to_string()))?;

        let mut symbols = FxHashMap::default();
        symbols.insert("putchard".to_string(), runtime::putchard as *const u8);
        symbols.insert("printd".to_string(), runtime::printd as *const u8);

        Ok(Engine {
            isa,
            symbols,
            defined: FxHashSet::default(),
            modules: Vec::new(),
        })
    }

    /// A fresh, empty module that resolves everything added so far.
    pub fn new_module(&self) -> JITModule {
        let mut builder =
            JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        for (name, ptr) in &self.symbols {
            builder.symbol(name.as_str(), *ptr);
        }
        JITModule::new(builder)
    }

    /// Take ownership of a completed module: finalize its code, publish
    /// its functions, and keep it alive. The returned handle can tear the
    /// module down again.
    pub fn add_module(&mut self, compiler: ModuleCompiler) -> Result<ModuleHandle, JitError> {
        let (mut module, exported) = compiler.into_parts();
        module
            .finalize_definitions()
            .map_err(|e| JitError::ModuleError(e.to_string()))?;

        let mut names = Vec::with_capacity(exported.len());
        for (name, func_id) in exported {
            let ptr = module.get_finalized_function(func_id);
            self.symbols.insert(name.clone(), ptr);
            self.defined.insert(name.clone());
            names.push(name);
        }

        let handle = ModuleHandle(self.modules.len());
        self.modules.push(Some(TrackedModule {
            module: Some(module),
            names,
        }));
        Ok(handle)
    }

    /// Resolve a name to a native address.
    pub fn lookup(&self, name: &str) -> Option<*const u8> {
        self.symbols.get(name).copied()
    }

    /// Names with a body in some added module. Host helpers and plain
    /// `extern` declarations are not in this set.
    pub fn defined(&self) -> &FxHashSet<String> {
        &self.defined
    }

    /// Tear down one added module: its symbols stop resolving and its
    /// code is freed.
    pub fn remove(&mut self, handle: ModuleHandle) {
        if let Some(tracked) = self.modules.get_mut(handle.0).and_then(Option::take) {
            for name in &tracked.names {
                self.symbols.remove(name);
                self.defined.remove(name);
            }
        }
    }
}
