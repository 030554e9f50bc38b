use std::collections::VecDeque;
use std::ffi::{c_char, CStr};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::runtime::{self, format_real, InputSource, RuntimeError, Session};
use crate::frontend::Type;

/// Value returned by the entry function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
    Void,
}

impl Value {
    /// # Safety
    ///
    /// For `string` results `raw` must be null or the address of a live,
    /// NUL-terminated buffer.
    unsafe fn decode(raw: i64, ty: Type) -> Self {
        match ty {
            Type::Int => Value::Int(raw),
            Type::Real => Value::Real(f64::from_bits(raw as u64)),
            Type::Bool => Value::Bool(raw != 0),
            Type::String => {
                let ptr = raw as usize as *const c_char;

                if ptr.is_null() {
                    Value::Str(String::new())
                } else {
                    Value::Str(CStr::from_ptr(ptr).to_string_lossy().into_owned())
                }
            }
            Type::Void => Value::Void,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{}", value),
            Value::Real(value) => write!(f, "{}", format_real(*value)),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Values for input statements, in order. `None` reads lines from stdin.
    pub inputs: Option<Vec<String>>,
    pub timeout: Option<Duration>,
    pub max_call_depth: usize,
    pub stack_size: usize,
    /// Mirrors program output to stdout while it is captured.
    pub echo: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            inputs: Some(vec![]),
            timeout: Some(Duration::from_secs(5)),
            max_call_depth: 10_000,
            stack_size: 64 * 1024 * 1024,
            echo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    pub output: String,
    /// Absent when the program stopped on a runtime error.
    pub value: Option<Value>,
    pub error: Option<RuntimeError>,
}

/// Runs the entry wrapper at `address` on a dedicated thread and waits for it,
/// asking it to stop once `opts.timeout` elapsed.
///
/// The address must come from the execution engine that owns the code and
/// stays alive for the duration of this call.
pub fn execute(address: usize, return_type: Type, opts: &ExecOptions) -> Result<Execution> {
    let cancel = Arc::new(AtomicBool::new(false));
    let input = match &opts.inputs {
        Some(inputs) => InputSource::Queue(inputs.iter().cloned().collect::<VecDeque<_>>()),
        None => InputSource::Stdin,
    };
    let session =
        Session::new(input, opts.max_call_depth, Arc::clone(&cancel)).with_echo(opts.echo);

    thread::scope(|scope| {
        let (done, finished) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("grammo-exec".to_string())
            .stack_size(opts.stack_size)
            .spawn_scoped(scope, move || {
                runtime::install(session);

                // SAFETY: `address` points at a generated `i64 ()` entry wrapper.
                let entry: extern "C" fn() -> i64 = unsafe { std::mem::transmute(address) };
                let raw = entry();

                // Strings produced by the program live in the session, so the
                // result is decoded before it is dropped.
                let session = runtime::uninstall();
                let value = match session.as_ref().and_then(|session| session.fault()) {
                    Some(_) => None,
                    None => Some(unsafe { Value::decode(raw, return_type) }),
                };

                let _ = done.send(());

                (value, session)
            })?;

        match opts.timeout {
            Some(timeout) => {
                if let Err(mpsc::RecvTimeoutError::Timeout) = finished.recv_timeout(timeout) {
                    warn!(?timeout, "execution timed out, cancelling");
                    cancel.store(true, Ordering::Relaxed);
                }
            }
            None => {
                let _ = finished.recv();
            }
        }

        let (value, session) = handle
            .join()
            .map_err(|_| anyhow!("execution thread panicked"))?;
        let (output, error) = session
            .ok_or_else(|| anyhow!("execution session went missing"))?
            .into_parts();

        debug!(
            output = output.len(),
            error = ?error.as_ref().map(|err| err.kind),
            "execution finished"
        );

        Ok(Execution {
            output,
            value,
            error,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(unsafe { Value::decode(-3, Type::Int) }, Value::Int(-3));
        assert_eq!(
            unsafe { Value::decode(7.5f64.to_bits() as i64, Type::Real) },
            Value::Real(7.5)
        );
        assert_eq!(unsafe { Value::decode(1, Type::Bool) }, Value::Bool(true));
        assert_eq!(unsafe { Value::decode(0, Type::String) }, Value::Str(String::new()));

        let text = c"hello";
        assert_eq!(
            unsafe { Value::decode(text.as_ptr() as usize as i64, Type::String) },
            Value::Str("hello".to_string())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Void.to_string(), "void");
    }

    extern "C" fn answer() -> i64 {
        42
    }

    #[test]
    fn test_execute_native_entry() {
        let address = (answer as extern "C" fn() -> i64) as usize;
        let execution = execute(address, Type::Int, &ExecOptions::default()).unwrap();

        assert_eq!(execution.value, Some(Value::Int(42)));
        assert_eq!(execution.output, "");
        assert!(execution.error.is_none());
    }
}
