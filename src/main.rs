use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use inkwell::context::Context;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use grammo::{to_ron, Engine, Error, Options};

/// Compiler and JIT runner for Grammo programs
#[derive(Parser)]
#[clap(name = "grammo", version)]
struct Opts {
    /// Print results and errors as RON
    #[clap(long, global = true)]
    ron: bool,
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Check the syntax of a program
    Check(CheckCmd),
    /// Compile a program without running it
    Compile(CompileCmd),
    /// Compile and run a program
    Run(RunCmd),
}

#[derive(Args)]
struct CheckCmd {
    source: PathBuf,
}

#[derive(Args)]
struct CompileCmd {
    source: PathBuf,
    /// Show the generated IR
    #[clap(long)]
    ir: bool,
    /// Show the syntax tree
    #[clap(long)]
    ast: bool,
    /// Show the signatures of all functions
    #[clap(long)]
    functions: bool,
    /// Write the generated IR to a file
    #[clap(long)]
    emit_ir: Option<PathBuf>,
    /// Write a native object file
    #[clap(long)]
    emit_obj: Option<PathBuf>,
    #[clap(long)]
    optimize: bool,
}

#[derive(Args)]
struct RunCmd {
    source: PathBuf,
    /// Value for the next input statement (repeatable); reads stdin otherwise
    #[clap(long)]
    input: Vec<String>,
    #[clap(long, default_value = "main")]
    entry: String,
    /// Wall-clock limit in milliseconds, 0 disables it
    #[clap(long, default_value_t = 5000)]
    timeout_ms: u64,
    #[clap(long)]
    max_depth: Option<usize>,
    #[clap(long)]
    optimize: bool,
}

fn print_ron<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", to_ron(value)?);

    Ok(())
}

/// Prints the structured payload of `err` as RON, if it has one.
fn print_error_ron(err: &Error) -> bool {
    let result = match err {
        Error::Lex(e) => print_ron(e),
        Error::Syntax(e) => print_ron(e),
        Error::Semantic(errors) => print_ron(errors),
        _ => return false,
    };

    result.is_ok()
}

fn cmd(opts: Opts) -> Result<i32, Error> {
    match opts.cmd {
        Cmd::Check(CheckCmd { source }) => {
            let source = fs::read_to_string(source)?;
            Engine::default().check_syntax(&source)?;

            println!("ok");
        }
        Cmd::Compile(CompileCmd {
            source,
            ir,
            ast,
            functions,
            emit_ir,
            emit_obj,
            optimize,
        }) => {
            let source = fs::read_to_string(source)?;
            let engine = Engine::new(Options {
                optimize,
                print_ir: ir,
                print_ast: ast,
                ..Options::default()
            });

            if ast {
                engine.check_syntax(&source)?;
                return Ok(0);
            }

            let context = Context::create();
            let output = engine.compile(&context, &source)?;

            if functions {
                print_ron(&output.module.functions())?;
            }

            if let Some(path) = emit_ir {
                output.module.write_ir(&path)?;
            }

            if let Some(path) = emit_obj {
                output.module.write_object(&path)?;
            }

            eprintln!("{}", output.message);
        }
        Cmd::Run(RunCmd {
            source,
            input,
            entry,
            timeout_ms,
            max_depth,
            optimize,
        }) => {
            let defaults = Options::default();
            let engine = Engine::new(Options {
                entry,
                optimize,
                timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
                max_call_depth: max_depth.unwrap_or(defaults.max_call_depth),
                echo: !opts.ron,
                ..defaults
            });
            let inputs = if input.is_empty() { None } else { Some(input) };
            let output = engine.run_file(&source, inputs)?;

            if opts.ron {
                print_ron(&output)?;
            }

            if let Some(err) = output.error {
                if !opts.ron {
                    eprintln!("{}", err);
                }

                return Ok(1);
            }
        }
    }

    Ok(0)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let ron = opts.ron;

    match cmd(opts) {
        Ok(code) => exit(code),
        Err(e) => {
            if !(ron && print_error_ron(&e)) {
                eprintln!("{}", e);
            }

            exit(1);
        }
    }
}
