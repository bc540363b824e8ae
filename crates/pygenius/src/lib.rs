//! PyGenius - run, inspect and explain learner Python snippets
//!
//! PyGenius executes short Python programs with an embedded interpreter,
//! captures everything they print, and reports the result the way a
//! teaching tool needs it: plain text plus an ordered stream of tagged
//! records a UI can style.
//!
//! # Features
//!
//! - **Execution engine**: each snippet runs in a fresh namespace with
//!   stdout and stderr captured; failures become text, never panics or
//!   `Err`s
//! - **Console**: one namespace shared across submissions, with
//!   expression echo
//! - **Introspection**: after a successful run, arrays, frames and
//!   containers left in the namespace are summarised
//! - **Static analysis**: four textual bug heuristics, no execution needed
//! - **Error explanations**: canned learner-friendly text per error category
//!
//! This is not a security sandbox. Snippets are isolated by namespace only.
//!
//! # Quick Start
//!
//! ```
//! use pygenius::{ExecutionEngine, analyze, explain};
//!
//! let engine = ExecutionEngine::new();
//! let result = engine.execute("x = 10\nprint(x / 4)", None);
//! assert_eq!(result, "2.5\n");
//!
//! let failure = engine.execute("items = [1, 2]\nitems[5]", None);
//! assert!(failure.starts_with("IndexError: list index out of range\nTraceback"));
//!
//! let findings = analyze("def add(x, acc=[]):\n    return acc\n");
//! assert_eq!(findings[0].line, 1);
//!
//! let explanation = explain("IndexError: list index out of range", "");
//! assert_eq!(explanation.suggestion, "Add bounds checking: if index < len(your_list):");
//! ```
//!
//! # Supported Python
//!
//! ## Types
//! - `None`, `bool`, `int`, `float`, `str`, `list`, `tuple`, `dict`, `set`
//! - numpy-style `ndarray`, pandas-style `DataFrame` and `Series`
//!
//! Lists, dicts and sets are shared between names and arguments as in Python.
//!
//! ## Statements
//! - Assignment with unpacking, augmented and annotated assignment
//! - `if`/`elif`/`else`, `for` and `while` with `break`/`continue`/`else`
//! - `def` with defaults, `*args`, `**kwargs`, closures and recursion
//! - `try`/`except`/`else`/`finally`, `raise`, `assert`
//! - `import`/`from ... import` of the built-in modules
//!
//! ## Modules
//! - `math`, `json`, `sys`, `typing`, `numpy`, `pandas`, `matplotlib.pyplot`
//!
//! # Not Supported
//!
//! - Class definitions, `with`, generators, async code
//! - File and network access
//! - Cancelling a running snippet: an infinite loop blocks its thread

mod analyzer;
mod args;
mod array;
mod builtins;
mod config;
mod engine;
mod error;
mod eval;
mod explain;
mod introspect;
mod methods;
mod modules;
mod namespace;
mod operators;
mod output;
mod sandbox;
mod slice;
mod traceback;
mod value;

pub use analyzer::{AnalysisFinding, FindingKind, Rule, Severity, analyze};
pub use args::Args;
pub use array::{DType, DataFrame, NdArray, Series};
pub use config::EngineConfig;
pub use engine::{Console, Execution, ExecutionEngine, NO_OUTPUT, Outcome};
pub use error::{Error, Exception, Result};
pub use explain::{ErrorExplanation, GENERIC_SUGGESTION, explain};
pub use introspect::{LIBRARY_HANDLES, summarize};
pub use modules::PYTHON_VERSION;
pub use namespace::Namespace;
pub use output::{Observer, OutputKind, OutputRecord, OutputSink, Streams};
pub use sandbox::{ExecuteOutput, Sandbox};
pub use traceback::{SourceCode, TraceFrame, Traceback};
pub use value::{PyValue, Stream};

/// Execute a snippet in a fresh namespace with default settings.
///
/// Shorthand for [`ExecutionEngine::execute`].
pub fn execute(snippet: &str, observer: Option<Observer<'_>>) -> String {
    ExecutionEngine::new().execute(snippet, observer)
}
