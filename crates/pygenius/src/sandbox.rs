use std::sync::Arc;

use rustpython_parser::ast::{self, Expr, Stmt};
use rustpython_parser::{Mode, parse};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::eval::Evaluator;
use crate::namespace::Namespace;
use crate::output::Streams;
use crate::traceback::SourceCode;
use crate::value::PyValue;

/// A Python interpreter with one persistent namespace.
///
/// The sandbox is the low-level handle the [`ExecutionEngine`] and
/// [`Console`] are built on: it runs code and hands failures back as
/// [`Error`]s instead of turning them into text. Note that it isolates
/// the namespace only; it is not a security boundary.
///
/// # Example
///
/// ```
/// use pygenius::{PyValue, Sandbox};
///
/// let mut sandbox = Sandbox::new();
/// sandbox.set_variable("base", 10);
///
/// let result = sandbox.execute(r#"
/// total = base
/// for i in range(4):
///     total += i
/// total
/// "#).unwrap();
///
/// assert_eq!(result, PyValue::Int(16));
/// ```
///
/// A cloned sandbox gets its own namespace, but lists, dicts and sets bound
/// in it are still shared with the original.
///
/// [`ExecutionEngine`]: crate::ExecutionEngine
/// [`Console`]: crate::Console
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    namespace: Namespace,
    config: EngineConfig,
}

impl Sandbox {
    /// Create a sandbox with an empty namespace and default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            namespace: Namespace::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bind a variable in the global namespace.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<PyValue>) {
        self.namespace.set(name, value.into());
    }

    pub fn get_variable(&self, name: &str) -> Option<&PyValue> {
        self.namespace.get(name)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Drop every binding.
    pub fn clear(&mut self) {
        self.namespace = Namespace::new();
    }

    /// Execute Python code, discarding anything it prints.
    ///
    /// Returns the value of the last expression, or `PyValue::None` if the
    /// code ends with a statement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] if the code does not parse, and the raised
    /// exception otherwise.
    ///
    /// ```
    /// use pygenius::Sandbox;
    ///
    /// let mut sandbox = Sandbox::new();
    /// let err = sandbox.execute("[1, 2][5]").unwrap_err();
    /// assert_eq!(err.to_string(), "IndexError: list index out of range");
    /// ```
    pub fn execute(&mut self, code: &str) -> Result<PyValue> {
        let mut streams = Streams::new(None);
        self.run(code, &mut streams)
    }

    /// Execute Python code and capture what it writes.
    ///
    /// ```
    /// use pygenius::Sandbox;
    ///
    /// let mut sandbox = Sandbox::new();
    /// let output = sandbox.execute_with_output(r#"
    /// import sys
    /// print("x is", 10)
    /// print("careful", file=sys.stderr)
    /// "#).unwrap();
    ///
    /// assert_eq!(output.stdout, "x is 10\n");
    /// assert_eq!(output.stderr, "careful\n");
    /// ```
    pub fn execute_with_output(&mut self, code: &str) -> Result<ExecuteOutput> {
        let mut streams = Streams::new(None);
        let result = self.run(code, &mut streams)?;
        Ok(ExecuteOutput {
            result,
            stdout: streams.stdout.getvalue(),
            stderr: streams.stderr.getvalue(),
        })
    }

    /// Execute a whole program, writing output into `streams`.
    pub fn run(&mut self, code: &str, streams: &mut Streams<'_>) -> Result<PyValue> {
        let source = Arc::new(SourceCode::new(code));
        let body = parse_program(&source, &self.config.filename)?;
        let mut evaluator = Evaluator::new(&mut self.namespace, streams, &self.config, source);
        evaluator.run_module(&body)
    }

    /// Evaluate `code` as a single expression.
    ///
    /// Returns `None` when the text is not an expression (a statement, or
    /// invalid syntax), in which case nothing has run.
    pub fn eval(&mut self, code: &str, streams: &mut Streams<'_>) -> Option<Result<PyValue>> {
        let expr = parse_expression(code, &self.config.filename)?;
        let source = Arc::new(SourceCode::new(code));
        let mut evaluator = Evaluator::new(&mut self.namespace, streams, &self.config, source);
        Some(evaluator.eval_expression(&expr))
    }
}

/// Result of executing code with output capture.
#[derive(Debug, Clone)]
pub struct ExecuteOutput {
    /// The value of the last expression.
    pub result: PyValue,
    pub stdout: String,
    pub stderr: String,
}

impl ExecuteOutput {
    pub fn has_output(&self) -> bool {
        !self.stdout.is_empty() || !self.stderr.is_empty()
    }
}

/// Parse a program, reporting failures with a 1-based line number.
pub(crate) fn parse_program(source: &SourceCode, filename: &str) -> Result<Vec<Stmt>> {
    match parse(source.text(), Mode::Module, filename) {
        Ok(ast::Mod::Module(module)) => Ok(module.body),
        Ok(_) => Err(Error::Syntax {
            message: "expected a module".to_string(),
            line: 1,
        }),
        Err(err) => Err(Error::Syntax {
            message: err.error.to_string(),
            line: source.line_of(err.offset.to_usize()),
        }),
    }
}

fn parse_expression(code: &str, filename: &str) -> Option<Expr> {
    match parse(code, Mode::Expression, filename).ok()? {
        ast::Mod::Expression(expression) => Some(*expression.body),
        _ => None,
    }
}
