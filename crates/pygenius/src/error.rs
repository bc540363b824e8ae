use thiserror::Error;

use crate::traceback::Traceback;

/// A Python exception raised while a snippet runs.
///
/// `kind` is the Python category name (`"ValueError"`, `"KeyError"`, ...).
/// The traceback is empty until the evaluator attaches the active frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub kind: String,
    pub message: String,
    pub traceback: Traceback,
}

impl Exception {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            traceback: Traceback::default(),
        }
    }

    /// The `"<Category>: <message>"` summary line.
    ///
    /// Exceptions raised without a message render as the bare category,
    /// the way Python prints `raise ValueError`.
    pub fn summary(&self) -> String {
        if self.message.is_empty() {
            self.kind.clone()
        } else {
            format!("{}: {}", self.kind, self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The snippet does not parse. Execution is never attempted.
    #[error("SyntaxError: {message} at line {line}")]
    Syntax { message: String, line: usize },

    /// A raised exception, possibly carrying a traceback.
    #[error("{}", .0.summary())]
    Exception(Box<Exception>),

    #[error("TypeError: expected {expected}, got {got}")]
    Type { expected: String, got: String },

    #[error("NameError: name '{0}' is not defined")]
    NameError(String),

    #[error("ZeroDivisionError: division by zero")]
    DivisionByZero,

    #[error("NotImplementedError: {0} is not supported")]
    Unsupported(String),

    #[error("RuntimeError: {0}")]
    Runtime(String),
}

impl Error {
    /// Build a raised exception of the given Python category.
    pub fn raise(kind: &str, message: impl Into<String>) -> Self {
        Error::Exception(Box::new(Exception::new(kind, message)))
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::Type {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// The Python category name this error is reported under.
    pub fn category(&self) -> &str {
        match self {
            Error::Syntax { .. } => "SyntaxError",
            Error::Exception(exc) => &exc.kind,
            Error::Type { .. } => "TypeError",
            Error::NameError(_) => "NameError",
            Error::DivisionByZero => "ZeroDivisionError",
            Error::Unsupported(_) => "NotImplementedError",
            Error::Runtime(_) => "RuntimeError",
        }
    }

    /// The message without its category prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Syntax { message, .. } => message.clone(),
            Error::Exception(exc) => exc.message.clone(),
            Error::Type { expected, got } => format!("expected {}, got {}", expected, got),
            Error::NameError(name) => format!("name '{}' is not defined", name),
            Error::DivisionByZero => "division by zero".to_string(),
            Error::Unsupported(what) => format!("{} is not supported", what),
            Error::Runtime(msg) => msg.clone(),
        }
    }

    /// Convert into an [`Exception`], keeping any traceback already attached.
    pub fn into_exception(self) -> Exception {
        match self {
            Error::Exception(exc) => *exc,
            other => Exception::new(other.category(), other.message()),
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Error::Syntax { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
