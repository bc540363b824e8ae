//! Turning snippet runs into text results and ordered output records.
//!
//! [`ExecutionEngine`] runs each snippet in a fresh namespace;
//! [`Console`] keeps one namespace alive across submissions. Both share the
//! same reporting: output streamed as it is written, then variable
//! summaries on success, or an error record followed by the traceback.
//! Neither ever returns an error to its caller.

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::introspect;
use crate::modules;
use crate::namespace::Namespace;
use crate::output::{Observer, OutputKind, OutputRecord, Streams};
use crate::sandbox::Sandbox;
use crate::value::PyValue;

/// Result text when a snippet runs cleanly and prints nothing.
pub const NO_OUTPUT: &str = "Code executed successfully (no output)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Outcome {
    Success,
    SyntaxError,
    RuntimeError,
}

/// Everything one execution produced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Execution {
    /// The textual result, exactly as `execute` returns it.
    pub result: String,
    pub outcome: Outcome,
    /// Every record delivered to the observer, in order.
    pub records: Vec<OutputRecord>,
}

impl Execution {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Records of one kind, in order.
    pub fn records_of(&self, kind: OutputKind) -> impl Iterator<Item = &OutputRecord> {
        self.records.iter().filter(move |record| record.kind == kind)
    }
}

/// Runs snippets in isolated namespaces.
///
/// # Example
///
/// ```
/// use pygenius::{ExecutionEngine, OutputKind, OutputRecord};
///
/// let engine = ExecutionEngine::new();
/// let mut seen = Vec::new();
/// let mut observer = |record: &OutputRecord| seen.push(record.clone());
///
/// let result = engine.execute("scores = [90, 85]\nprint(sum(scores))", Some(&mut observer));
///
/// assert_eq!(result, "175\n");
/// assert_eq!(
///     seen,
///     vec![
///         OutputRecord::new("175", OutputKind::Output),
///         OutputRecord::new("📦 Variable 'scores': list with 2 items", OutputKind::Progress),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a snippet and return its textual result.
    pub fn execute(&self, snippet: &str, observer: Option<Observer<'_>>) -> String {
        self.run(snippet, observer).result
    }

    /// Execute a snippet, returning the result text together with the
    /// outcome and the full record list.
    pub fn run(&self, snippet: &str, observer: Option<Observer<'_>>) -> Execution {
        debug!(length = snippet.len(), "executing snippet");
        let mut sandbox = Sandbox::with_config(self.config.clone());
        seed_namespace(&mut sandbox);
        let mut streams = Streams::new(observer);
        let result = sandbox.run(snippet, &mut streams);
        finish(result, sandbox.namespace(), streams, &self.config)
    }
}

/// Bind the names every fresh namespace starts with.
fn seed_namespace(sandbox: &mut Sandbox) {
    sandbox.set_variable("__name__", "__main__");
    if !sandbox.config().preload_libraries {
        return;
    }
    for (handle, module) in [("np", "numpy"), ("pd", "pandas"), ("plt", "matplotlib.pyplot")] {
        if let Some(value) = modules::load(module) {
            sandbox.set_variable(handle, value);
        }
    }
}

fn result_text(streams: &Streams<'_>) -> String {
    let stdout = streams.stdout.getvalue();
    let stderr = streams.stderr.getvalue();
    let mut parts = Vec::new();
    if !stdout.is_empty() {
        parts.push(stdout);
    }
    if !stderr.is_empty() {
        parts.push(format!("STDERR: {}", stderr));
    }
    if parts.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        parts.join("\n")
    }
}

/// Report a finished run through `streams` and build the execution.
fn finish(
    result: Result<PyValue>,
    namespace: &Namespace,
    mut streams: Streams<'_>,
    config: &EngineConfig,
) -> Execution {
    let (result, outcome) = match result {
        Ok(_) => {
            let text = result_text(&streams);
            for summary in introspect::summarize(namespace) {
                streams.emit(summary, OutputKind::Progress);
            }
            (text, Outcome::Success)
        }
        Err(err) => report_failure(err, &mut streams, config),
    };
    let records = streams.into_records();
    debug!(?outcome, records = records.len(), "execution finished");
    Execution {
        result,
        outcome,
        records,
    }
}

fn report_failure(
    err: Error,
    streams: &mut Streams<'_>,
    config: &EngineConfig,
) -> (String, Outcome) {
    if err.is_syntax() {
        let message = err.to_string();
        streams.emit(message.clone(), OutputKind::Error);
        return (message, Outcome::SyntaxError);
    }
    let exc = err.into_exception();
    let summary = exc.summary();
    let trace = exc.traceback.render(&config.filename, &summary);
    streams.emit(summary.clone(), OutputKind::Error);
    streams.emit(trace.clone(), OutputKind::Error);
    (format!("{}\n{}", summary, trace), Outcome::RuntimeError)
}

/// An interactive session over one long-lived namespace.
///
/// Each submission is first tried as an expression, whose value is echoed
/// the way the Python prompt does; anything else runs as statements.
/// The console does no locking: concurrent callers must take turns.
///
/// # Example
///
/// ```
/// use pygenius::Console;
///
/// let mut console = Console::new();
/// console.submit("total = 40", None);
/// assert_eq!(console.submit("total + 2", None).result, "42");
/// ```
#[derive(Debug, Clone)]
pub struct Console {
    sandbox: Sandbox,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut sandbox = Sandbox::with_config(config);
        seed_namespace(&mut sandbox);
        Self { sandbox }
    }

    /// Run one submission against the session namespace.
    pub fn submit(&mut self, line: &str, observer: Option<Observer<'_>>) -> Execution {
        debug!(length = line.len(), "console submission");
        let mut streams = Streams::new(observer);
        let config = self.sandbox.config().clone();

        if let Some(result) = self.sandbox.eval(line, &mut streams) {
            return match result {
                Ok(value) => {
                    let mut text = result_text(&streams);
                    if !value.is_none() {
                        let echo = value.to_string();
                        streams.emit(echo.clone(), OutputKind::Output);
                        text = if text == NO_OUTPUT {
                            echo
                        } else {
                            format!("{}{}", text, echo)
                        };
                    }
                    Execution {
                        result: text,
                        outcome: Outcome::Success,
                        records: streams.into_records(),
                    }
                }
                Err(err) => finish(Err(err), self.sandbox.namespace(), streams, &config),
            };
        }

        let result = self.sandbox.run(line, &mut streams);
        finish(result, self.sandbox.namespace(), streams, &config)
    }

    /// Restore the namespace to its freshly seeded state.
    pub fn reset(&mut self) {
        self.sandbox.clear();
        seed_namespace(&mut self.sandbox);
    }

    pub fn namespace(&self) -> &Namespace {
        self.sandbox.namespace()
    }

    /// Summaries of the session's user variables.
    pub fn variables(&self) -> Vec<String> {
        introspect::summarize(self.sandbox.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_result_text_joins_streams() {
        let engine = ExecutionEngine::new();
        assert_eq!(
            engine.execute("import sys\nprint('a')\nsys.stderr.write('b')", None),
            "a\n\nSTDERR: b"
        );
        assert_eq!(engine.execute("x = 1", None), NO_OUTPUT);
    }

    #[test]
    fn test_seeded_names() {
        let engine = ExecutionEngine::new();
        assert_eq!(engine.execute("print(__name__)", None), "__main__\n");
        assert_eq!(engine.execute("print(np.zeros(2).shape)", None), "(2,)\n");

        let bare =
            ExecutionEngine::with_config(EngineConfig::default().with_preload_libraries(false));
        let execution = bare.run("np.zeros(2)", None);
        assert_eq!(execution.outcome, Outcome::RuntimeError);
        assert!(execution.result.starts_with("NameError: name 'np' is not defined\n"));
    }

    #[test]
    fn test_console_echo_and_reset() {
        let mut console = Console::new();
        assert_eq!(console.submit("'hi'", None).result, "'hi'");
        assert_eq!(console.submit("x = [1, 2]", None).result, NO_OUTPUT);
        assert_eq!(console.submit("x", None).result, "[1, 2]");
        console.reset();
        assert_eq!(console.submit("x", None).outcome, Outcome::RuntimeError);
    }
}
