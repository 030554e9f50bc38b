use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{c_char, CStr, CString};
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

pub const ENTER: &str = "grammo.rt.enter";
pub const LEAVE: &str = "grammo.rt.leave";
pub const POLL: &str = "grammo.rt.poll";
pub const OK: &str = "grammo.rt.ok";
pub const DIV_ZERO: &str = "grammo.rt.div_zero";
pub const WRITE_STR: &str = "grammo.rt.write_str";
pub const WRITE_INT: &str = "grammo.rt.write_int";
pub const WRITE_REAL: &str = "grammo.rt.write_real";
pub const WRITE_BOOL: &str = "grammo.rt.write_bool";
pub const NEWLINE: &str = "grammo.rt.newline";
pub const READ_INT: &str = "grammo.rt.read_int";
pub const READ_REAL: &str = "grammo.rt.read_real";
pub const READ_BOOL: &str = "grammo.rt.read_bool";
pub const READ_STR: &str = "grammo.rt.read_str";
pub const CONCAT: &str = "grammo.rt.concat";
pub const COMPARE: &str = "grammo.rt.compare";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuntimeErrorKind {
    DivisionByZero,
    StackOverflow,
    Timeout,
    MalformedInput,
}

impl Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DivisionByZero => "DivisionByZero",
            Self::StackOverflow => "StackOverflow",
            Self::Timeout => "Timeout",
            Self::MalformedInput => "MalformedInput",
        };

        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RuntimeError: {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Formats a `real` the way programs print it: the shortest representation
/// that reads back to the same value, with `.0` on integral values.
pub fn format_real(value: f64) -> String {
    let text = value.to_string();

    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

pub enum InputSource {
    Queue(VecDeque<String>),
    Stdin,
}

/// State of one program execution. It lives in a thread local of the thread
/// running the generated code, which reaches it only through the functions
/// below.
pub struct Session {
    input: InputSource,
    output: String,
    echo: bool,
    fault: Option<RuntimeError>,
    depth: usize,
    max_depth: usize,
    cancel: Arc<AtomicBool>,
    strings: Vec<CString>,
}

impl Session {
    pub fn new(input: InputSource, max_depth: usize, cancel: Arc<AtomicBool>) -> Self {
        Self {
            input,
            output: String::new(),
            echo: false,
            fault: None,
            depth: 0,
            max_depth,
            cancel,
            strings: vec![],
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn fault(&self) -> Option<&RuntimeError> {
        self.fault.as_ref()
    }

    pub fn into_parts(self) -> (String, Option<RuntimeError>) {
        (self.output, self.fault)
    }

    fn raise(&mut self, err: RuntimeError) {
        if self.fault.is_none() {
            trace!(kind = %err.kind, "runtime fault");
            self.fault = Some(err);
        }
    }

    /// Records a timeout once the watchdog asked for cancellation.
    fn cancelled(&mut self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            self.raise(RuntimeError::new(
                RuntimeErrorKind::Timeout,
                "execution time limit exceeded",
            ));
        }

        self.fault.is_some()
    }

    fn write(&mut self, text: &str) {
        self.output.push_str(text);

        if self.echo {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn next_input(&mut self, expected: &str) -> Option<String> {
        let line = match &mut self.input {
            InputSource::Queue(queue) => queue.pop_front(),
            InputSource::Stdin => {
                let mut line = String::new();

                match io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => Some(line),
                }
            }
        };

        if line.is_none() {
            self.raise(RuntimeError::new(
                RuntimeErrorKind::MalformedInput,
                format!("expected {} but the input is exhausted", expected),
            ));
        }

        line
    }

    fn read<T: std::str::FromStr>(&mut self, expected: &str) -> Option<T> {
        let line = self.next_input(expected)?;
        let text = line.trim();

        match text.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.raise(RuntimeError::new(
                    RuntimeErrorKind::MalformedInput,
                    format!("expected {}, found '{}'", expected, text),
                ));

                None
            }
        }
    }

    fn intern(&mut self, text: String) -> *const c_char {
        let text = CString::new(text.replace('\0', "")).unwrap_or_default();
        let ptr = text.as_ptr();

        self.strings.push(text);
        ptr
    }
}

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

pub fn install(session: Session) {
    SESSION.with(|cell| *cell.borrow_mut() = Some(session));
}

pub fn uninstall() -> Option<Session> {
    SESSION.with(|cell| cell.borrow_mut().take())
}

fn with_session<R>(f: impl FnOnce(&mut Session) -> R) -> Option<R> {
    SESSION.with(|cell| cell.borrow_mut().as_mut().map(f))
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated buffer that outlives the
/// returned reference.
unsafe fn text<'a>(ptr: *const c_char) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        return "".into();
    }

    CStr::from_ptr(ptr).to_string_lossy()
}

extern "C" fn enter() -> i32 {
    with_session(|session| {
        session.depth += 1;

        if session.cancelled() {
            return 0;
        }

        if session.depth > session.max_depth {
            let message = format!("call depth exceeded {}", session.max_depth);
            session.raise(RuntimeError::new(RuntimeErrorKind::StackOverflow, message));

            return 0;
        }

        1
    })
    .unwrap_or(0)
}

extern "C" fn leave() {
    with_session(|session| session.depth = session.depth.saturating_sub(1));
}

extern "C" fn poll() -> i32 {
    with_session(|session| !session.cancelled() as i32).unwrap_or(0)
}

extern "C" fn ok() -> i32 {
    with_session(|session| session.fault.is_none() as i32).unwrap_or(0)
}

extern "C" fn div_zero() {
    with_session(|session| {
        session.raise(RuntimeError::new(
            RuntimeErrorKind::DivisionByZero,
            "division by zero",
        ))
    });
}

unsafe extern "C" fn write_str(ptr: *const c_char) {
    let value = text(ptr);
    with_session(|session| session.write(&value));
}

extern "C" fn write_int(value: i64) {
    with_session(|session| session.write(&value.to_string()));
}

extern "C" fn write_real(value: f64) {
    with_session(|session| session.write(&format_real(value)));
}

extern "C" fn write_bool(value: i32) {
    with_session(|session| session.write(if value != 0 { "true" } else { "false" }));
}

extern "C" fn newline() {
    with_session(|session| session.write("\n"));
}

extern "C" fn read_int() -> i64 {
    with_session(|session| session.read::<i64>("int"))
        .flatten()
        .unwrap_or_default()
}

extern "C" fn read_real() -> f64 {
    with_session(|session| session.read::<f64>("real"))
        .flatten()
        .unwrap_or_default()
}

extern "C" fn read_bool() -> i32 {
    with_session(|session| session.read::<bool>("bool"))
        .flatten()
        .map(i32::from)
        .unwrap_or_default()
}

extern "C" fn read_str() -> *const c_char {
    with_session(|session| {
        let line = session.next_input("string").unwrap_or_default();
        let line = line.trim_end_matches(['\r', '\n']).to_string();

        session.intern(line)
    })
    .unwrap_or(std::ptr::null())
}

unsafe extern "C" fn concat(lhs: *const c_char, rhs: *const c_char) -> *const c_char {
    let value = format!("{}{}", text(lhs), text(rhs));
    with_session(|session| session.intern(value)).unwrap_or(std::ptr::null())
}

unsafe extern "C" fn compare(lhs: *const c_char, rhs: *const c_char) -> i32 {
    let lhs = if lhs.is_null() { c"" } else { CStr::from_ptr(lhs) };
    let rhs = if rhs.is_null() { c"" } else { CStr::from_ptr(rhs) };

    lhs.cmp(rhs) as i32
}

macro_rules! address {
    ($func:expr, $ty:ty) => {
        ($func as $ty) as usize
    };
}

/// Addresses of the support functions, keyed by the names generated code
/// declares them under.
pub fn symbols() -> [(&'static str, usize); 16] {
    type Str = *const c_char;

    [
        (ENTER, address!(enter, extern "C" fn() -> i32)),
        (LEAVE, address!(leave, extern "C" fn())),
        (POLL, address!(poll, extern "C" fn() -> i32)),
        (OK, address!(ok, extern "C" fn() -> i32)),
        (DIV_ZERO, address!(div_zero, extern "C" fn())),
        (WRITE_STR, address!(write_str, unsafe extern "C" fn(Str))),
        (WRITE_INT, address!(write_int, extern "C" fn(i64))),
        (WRITE_REAL, address!(write_real, extern "C" fn(f64))),
        (WRITE_BOOL, address!(write_bool, extern "C" fn(i32))),
        (NEWLINE, address!(newline, extern "C" fn())),
        (READ_INT, address!(read_int, extern "C" fn() -> i64)),
        (READ_REAL, address!(read_real, extern "C" fn() -> f64)),
        (READ_BOOL, address!(read_bool, extern "C" fn() -> i32)),
        (READ_STR, address!(read_str, extern "C" fn() -> Str)),
        (CONCAT, address!(concat, unsafe extern "C" fn(Str, Str) -> Str)),
        (COMPARE, address!(compare, unsafe extern "C" fn(Str, Str) -> i32)),
    ]
}
