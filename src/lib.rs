pub mod backend;
mod engine;
mod error;
pub mod frontend;

pub use engine::{to_ron, CompileOutput, Engine, Options, RunOutput};
pub use error::Error;
