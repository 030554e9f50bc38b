use std::cell::RefCell;
use std::path::Path;

use anyhow::{anyhow, Result};
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;
use serde::Serialize;
use tracing::debug;

use crate::backend::codegen::entry_name;
use crate::backend::executor::{self, ExecOptions, Execution};
use crate::backend::runtime;
use crate::error::Error;
use crate::frontend::syntax::Span;
use crate::frontend::typed_ast::Program;
use crate::frontend::{SemanticError, SemanticErrorKind, Type};

/// Signature of a function defined by the compiled program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnInfo {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub span: Span,
}

impl FnInfo {
    pub fn collect(program: &Program) -> Vec<FnInfo> {
        program
            .funcs
            .iter()
            .map(|func| FnInfo {
                name: func.name.clone(),
                params: func
                    .params
                    .iter()
                    .map(|id| program.symbol(*id).ty)
                    .collect(),
                return_type: func.return_type,
                span: func.span.clone(),
            })
            .collect()
    }
}

/// Generated code for one compilation unit. The same module backs IR/object
/// export and JIT execution.
pub struct CompiledModule<'ctx> {
    module: Module<'ctx>,
    functions: Vec<FnInfo>,
    optimize: bool,
    // A module can only be handed to one execution engine.
    engine: RefCell<Option<ExecutionEngine<'ctx>>>,
}

impl<'ctx> CompiledModule<'ctx> {
    pub fn new(module: Module<'ctx>, functions: Vec<FnInfo>, optimize: bool) -> Self {
        Self {
            module,
            functions,
            optimize,
            engine: RefCell::new(None),
        }
    }

    pub fn name(&self) -> String {
        self.module.get_name().to_string_lossy().into_owned()
    }

    pub fn ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    pub fn verify(&self) -> Result<()> {
        self.module
            .verify()
            .map_err(|e| anyhow!("failed to verify module: {}", e))
    }

    pub fn functions(&self) -> &[FnInfo] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&FnInfo> {
        self.functions.iter().find(|func| func.name == name)
    }

    pub fn write_ir(&self, path: &Path) -> Result<()> {
        self.module
            .print_to_file(path)
            .map_err(|e| anyhow!("failed to write IR to {}: {}", path.display(), e))
    }

    /// Emits a native object file for the host.
    pub fn write_object(&self, path: &Path) -> Result<()> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(|e| anyhow!("failed to initialize target: {}", e))?;

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(|e| {
            anyhow!(
                "unsupported target {}: {}",
                triple.as_str().to_string_lossy(),
                e
            )
        })?;
        let machine = target
            .create_target_machine(
                &triple,
                &TargetMachine::get_host_cpu_name().to_string(),
                &TargetMachine::get_host_cpu_features().to_string(),
                self.optimization_level(),
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| anyhow!("failed to create target machine"))?;

        machine
            .write_to_file(&self.module, FileType::Object, path)
            .map_err(|e| anyhow!("failed to write object to {}: {}", path.display(), e))
    }

    fn optimization_level(&self) -> OptimizationLevel {
        if self.optimize {
            OptimizationLevel::Default
        } else {
            OptimizationLevel::None
        }
    }

    fn entry_address(&self, entry: &str) -> Result<usize> {
        let mut engine = self.engine.borrow_mut();

        if engine.is_none() {
            ExecutionEngine::link_in_mc_jit();

            let created = self
                .module
                .create_jit_execution_engine(self.optimization_level())
                .map_err(|e| anyhow!("failed to create execution engine: {}", e))?;

            for (name, address) in runtime::symbols() {
                if let Some(function) = self.module.get_function(name) {
                    created.add_global_mapping(&function, address);
                }
            }

            debug!(module = %self.name(), "created execution engine");

            *engine = Some(created);
        }

        let engine = engine
            .as_ref()
            .ok_or_else(|| anyhow!("execution engine unavailable"))?;

        engine
            .get_function_address(&entry_name(entry))
            .map_err(|e| anyhow!("entry point '{}' wasn't generated: {:?}", entry, e))
    }

    /// JIT-compiles the module on first use and runs `entry`, which must be a
    /// function without parameters.
    pub fn execute(&self, entry: &str, opts: &ExecOptions) -> Result<Execution, Error> {
        let info = match self.function(entry) {
            Some(info) if info.params.is_empty() => info,
            Some(info) => {
                return Err(Error::Semantic(vec![SemanticError::new(
                    info.span.clone(),
                    SemanticErrorKind::InvalidEntryPoint,
                    format!(
                        "entry point '{}' must not take parameters, found {}",
                        entry,
                        info.params.len()
                    ),
                )]));
            }
            None => {
                return Err(Error::Semantic(vec![SemanticError::new(
                    Span::default(),
                    SemanticErrorKind::InvalidEntryPoint,
                    format!("entry point '{}' is not declared", entry),
                )]));
            }
        };

        let address = self.entry_address(entry)?;

        debug!(entry, "executing");

        Ok(executor::execute(address, info.return_type, opts)?)
    }
}
