mod codegen;
mod executor;
pub mod lower;
mod module;
pub mod runtime;

pub use codegen::{entry_name, CodeGen};
pub use executor::{ExecOptions, Execution, Value};
pub use module::{CompiledModule, FnInfo};
pub use runtime::{RuntimeError, RuntimeErrorKind};
