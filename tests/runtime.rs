use std::time::Duration;

use grammo::backend::{ExecOptions, RuntimeErrorKind, Value};
use grammo::{Engine, Options};
use inkwell::context::Context;
use test_case::test_case;

mod common;

#[test_case("factorial", &["5"], "x:r:120\n"; "factorial from input")]
#[test_case("promotion", &[], "7.5\n3.0 2.5 3 3.5\n"; "int to real promotion")]
#[test_case("loops", &[], "012\nsum: 55\nsteps: 4\n"; "for and while loops")]
#[test_case("branches", &[], "negative zero small large\n"; "elif chain")]
#[test_case("strings", &[], "hello, grammo!\ntrue true true true\n"; "string concat and compare")]
#[test_case("globals", &[], "3 10 25.0\n"; "global initializers")]
#[test_case("short_circuit", &[], "skipped: 0\nevaluated: 2 true\n"; "short circuit")]
#[test_case("arithmetic", &[], "-3 -15 5 false\n"; "integer arithmetic")]
#[test_case(
    "input_types",
    &["41", " 1.25 ", "false", "some text"],
    "42 2.5 true some text?\n";
    "input of every type"
)]
fn runtime(name: &str, inputs: &[&str], expected: &str) {
    let filename = format!("runtime/{name}.gm");
    let output = common::run(&filename, inputs).unwrap();

    assert_eq!(output.error, None);
    assert_eq!(output.value, Some(Value::Void));
    assert_eq!(output.output, expected);
}

#[test]
fn deterministic() {
    let first = common::run("runtime/globals.gm", &[]).unwrap();
    let second = common::run("runtime/globals.gm", &[]).unwrap();

    assert_eq!(first, second);
}

#[test]
fn module_runs_twice_from_fresh_globals() {
    let context = Context::create();
    let source = common::source("runtime/globals.gm").unwrap();
    let compiled = common::engine().compile(&context, &source).unwrap();
    let opts = ExecOptions::default();

    let first = compiled.module.execute("main", &opts).unwrap();
    let second = compiled.module.execute("main", &opts).unwrap();

    assert_eq!(first.output, "3 10 25.0\n");
    assert_eq!(first, second);
}

#[test_case("answer", Value::Int(42), ""; "int entry")]
#[test_case("ratio", Value::Real(0.25), ""; "real entry")]
#[test_case("name", Value::Str("grammo".to_string()), ""; "string entry")]
#[test_case("truth", Value::Bool(true), ""; "bool entry")]
#[test_case("main", Value::Void, "side effect"; "void entry")]
fn entry_value(entry: &str, expected: Value, output: &str) {
    let engine = Engine::new(Options {
        entry: entry.to_string(),
        ..Options::default()
    });
    let result = common::run_with(&engine, "runtime/entry_value.gm", &[]).unwrap();

    assert_eq!(result.value, Some(expected));
    assert_eq!(result.output, output);
}

#[test_case(&["abc"], "expected int, found 'abc'"; "not a number")]
#[test_case(&[], "input is exhausted"; "no input left")]
fn malformed_input(inputs: &[&str], message: &str) {
    let output = common::run("runtime/factorial.gm", inputs).unwrap();
    let error = output.error.unwrap();

    assert_eq!(error.kind, RuntimeErrorKind::MalformedInput);
    assert!(error.message.contains(message), "{}", error);
    assert_eq!(output.output, "x:");
    assert_eq!(output.value, None);
}

#[test_case("div_zero", "before\n"; "int divisor")]
#[test_case("real_div_zero", "half: 0.5\n"; "real divisor")]
fn division_by_zero(name: &str, output: &str) {
    let filename = format!("runtime/{name}.gm");
    let result = common::run(&filename, &[]).unwrap();

    assert_eq!(result.error.unwrap().kind, RuntimeErrorKind::DivisionByZero);
    assert_eq!(result.output, output);
    assert_eq!(result.value, None);
}

#[test]
fn stack_overflow() {
    let engine = Engine::new(Options {
        max_call_depth: 200,
        ..Options::default()
    });
    let output = common::run_with(&engine, "runtime/deep_recursion.gm", &[]).unwrap();

    assert_eq!(output.error.unwrap().kind, RuntimeErrorKind::StackOverflow);
    assert_eq!(output.output, "");
}

#[test]
fn timeout() {
    let engine = Engine::new(Options {
        timeout: Some(Duration::from_millis(200)),
        ..Options::default()
    });
    let output = common::run_with(&engine, "runtime/infinite_loop.gm", &[]).unwrap();

    assert_eq!(output.error.unwrap().kind, RuntimeErrorKind::Timeout);
    assert_eq!(output.output, "spinning\n");
}

#[test]
fn optimized_run() {
    let engine = Engine::new(Options {
        optimize: true,
        ..Options::default()
    });
    let output = common::run_with(&engine, "runtime/factorial.gm", &["6"]).unwrap();

    assert_eq!(output.output, "x:r:720\n");
}
