use std::fs;
use std::path::Path;
use std::time::Duration;

use inkwell::context::Context;
use ron::ser::PrettyConfig;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{CodeGen, CompiledModule, ExecOptions, FnInfo, RuntimeError, Value};
use crate::error::Error;
use crate::frontend::syntax::{self, Program};
use crate::frontend::{typed_ast, Analyzer};

/// Pretty RON with struct names, the format of every structured dump.
pub fn to_ron<T: Serialize>(value: &T) -> Result<String, Error> {
    Ok(ron::ser::to_string_pretty(
        value,
        PrettyConfig::default()
            .struct_names(true)
            .indentor("  ")
            .compact_arrays(true),
    )?)
}

pub struct Options {
    pub entry: String,
    pub module_name: String,
    pub timeout: Option<Duration>,
    pub max_call_depth: usize,
    pub stack_size: usize,
    pub echo: bool,
    pub optimize: bool,
    pub print_ir: bool,
    pub print_ast: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            module_name: "main".to_string(),
            timeout: Some(Duration::from_secs(5)),
            max_call_depth: 10_000,
            stack_size: 64 * 1024 * 1024,
            echo: false,
            optimize: false,
            print_ir: false,
            print_ast: false,
        }
    }
}

pub struct CompileOutput<'ctx> {
    pub module: CompiledModule<'ctx>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    pub output: String,
    pub value: Option<Value>,
    pub error: Option<RuntimeError>,
}

pub struct Engine {
    opts: Options,
}

impl Engine {
    pub fn new(opts: Options) -> Self {
        Self { opts }
    }

    /// Lexes and parses `source` without looking at its meaning.
    pub fn check_syntax(&self, source: &str) -> Result<Program, Error> {
        let tokens = syntax::tokenize(source)?;
        let program = syntax::parse(tokens)?;

        debug!(decls = program.decls.len(), "syntax check passed");

        if self.opts.print_ast {
            println!("{}", to_ron(&program)?);
        }

        Ok(program)
    }

    pub fn analyze(&self, source: &str) -> Result<typed_ast::Program, Error> {
        let tree = self.check_syntax(source)?;

        Ok(Analyzer::new().analyze(tree)?)
    }

    pub fn compile<'ctx>(
        &self,
        context: &'ctx Context,
        source: &str,
    ) -> Result<CompileOutput<'ctx>, Error> {
        let program = self.analyze(source)?;
        let module = CodeGen::new(context, &program, &self.opts.module_name).generate()?;
        let module = CompiledModule::new(module, FnInfo::collect(&program), self.opts.optimize);

        if self.opts.print_ir {
            println!("{}", module.ir());
        }

        let message = format!(
            "compiled module '{}': {} function(s), {} global(s)",
            module.name(),
            program.funcs.len(),
            program.globals.len()
        );

        info!("{}", message);

        Ok(CompileOutput { module, message })
    }

    /// Compiles `source` and runs the entry function. `inputs` feeds input
    /// statements in order; without it they read from stdin.
    pub fn compile_and_run(
        &self,
        source: &str,
        inputs: Option<Vec<String>>,
    ) -> Result<RunOutput, Error> {
        let context = Context::create();
        let CompileOutput { module, .. } = self.compile(&context, source)?;

        let opts = ExecOptions {
            inputs,
            timeout: self.opts.timeout,
            max_call_depth: self.opts.max_call_depth,
            stack_size: self.opts.stack_size,
            echo: self.opts.echo,
        };
        let execution = module.execute(&self.opts.entry, &opts)?;

        Ok(RunOutput {
            output: execution.output,
            value: execution.value,
            error: execution.error,
        })
    }

    pub fn run_file(&self, path: &Path, inputs: Option<Vec<String>>) -> Result<RunOutput, Error> {
        let source = fs::read_to_string(path)?;

        self.compile_and_run(&source, inputs)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
