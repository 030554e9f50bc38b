#[cfg(test)]
#[allow(dead_code)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use grammo::frontend::{syntax, typed_ast, SemanticErrorKind};
    use grammo::{Engine, Error, Options, RunOutput};

    pub fn source(name: &str) -> Result<String, Error> {
        Ok(fs::read_to_string(format!("tests/source/{name}"))?)
    }

    pub fn engine() -> Engine {
        Engine::new(Options {
            timeout: Some(Duration::from_secs(10)),
            ..Options::default()
        })
    }

    pub fn parse(name: &str) -> Result<syntax::Program, Error> {
        engine().check_syntax(&source(name)?)
    }

    pub fn analyze(name: &str) -> Result<typed_ast::Program, Error> {
        engine().analyze(&source(name)?)
    }

    /// Kinds of the semantic errors reported for `name`, empty when it checks.
    pub fn error_kinds(name: &str) -> Vec<SemanticErrorKind> {
        match analyze(name) {
            Ok(_) => vec![],
            Err(Error::Semantic(errors)) => errors.into_iter().map(|e| e.kind).collect(),
            Err(e) => panic!("expected semantic errors, found: {}", e),
        }
    }

    pub fn run_with(engine: &Engine, name: &str, inputs: &[&str]) -> Result<RunOutput, Error> {
        let inputs = inputs.iter().map(ToString::to_string).collect();
        engine.compile_and_run(&source(name)?, Some(inputs))
    }

    pub fn run(name: &str, inputs: &[&str]) -> Result<RunOutput, Error> {
        run_with(&engine(), name, inputs)
    }
}

#[cfg(test)]
pub use tests::*;
