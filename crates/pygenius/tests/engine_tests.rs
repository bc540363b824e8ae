use pretty_assertions::assert_eq;
use pygenius::{
    EngineConfig, ExecutionEngine, NO_OUTPUT, Outcome, OutputKind, OutputRecord, execute,
};

fn record(text: &str, kind: OutputKind) -> OutputRecord {
    OutputRecord::new(text, kind)
}

fn collect(engine: &ExecutionEngine, snippet: &str) -> (String, Vec<OutputRecord>) {
    let mut seen = Vec::new();
    let mut observer = |record: &OutputRecord| seen.push(record.clone());
    let result = engine.execute(snippet, Some(&mut observer));
    (result, seen)
}

#[test]
fn test_printed_literal_appears_once() {
    let engine = ExecutionEngine::new();
    for (snippet, literal) in [
        ("value = 42\nprint(value)", "42"),
        ("greeting = 'hello there'\nprint(greeting)", "hello there"),
        ("ratio = 0.75\nprint(ratio)", "0.75"),
        ("flag = True\nprint(flag)", "True"),
    ] {
        let result = engine.execute(snippet, None);
        assert_eq!(result.matches(literal).count(), 1, "snippet: {}", snippet);
        assert!(!result.contains("STDERR:"), "snippet: {}", snippet);
    }
}

#[test]
fn test_silent_snippet() {
    assert_eq!(execute("x = 1\ny = x + 1", None), NO_OUTPUT);
}

#[test]
fn test_stderr_is_prefixed() {
    let engine = ExecutionEngine::new();
    assert_eq!(
        engine.execute("import sys\nprint('careful', file=sys.stderr)", None),
        "STDERR: careful\n"
    );
    assert_eq!(
        engine.execute("import sys\nprint('out')\nprint('err', file=sys.stderr)", None),
        "out\n\nSTDERR: err\n"
    );
}

#[test]
fn test_syntax_error_is_reported_without_progress() {
    let engine = ExecutionEngine::new();
    let snippet = "numbers = [1, 2, 3]\nif numbers\n    print(numbers)\n";
    let (result, records) = collect(&engine, snippet);

    assert!(result.starts_with("SyntaxError:"), "got: {}", result);
    assert!(result.ends_with(" at line 2"), "got: {}", result);
    assert_eq!(records, vec![record(&result, OutputKind::Error)]);
    assert!(records.iter().all(|r| r.kind != OutputKind::Progress));
}

#[test]
fn test_syntax_error_never_runs_anything() {
    let engine = ExecutionEngine::new();
    let execution = engine.run("print('side effect')\ndef broken(:\n    pass", None);
    assert_eq!(execution.outcome, Outcome::SyntaxError);
    assert_eq!(execution.records_of(OutputKind::Output).count(), 0);
}

#[test]
fn test_runtime_error_result_shape() {
    let engine = ExecutionEngine::new();
    let result = engine.execute("data = {'name': 'Ada'}\nprint(data['age'])", None);

    let mut lines = result.lines();
    assert_eq!(lines.next(), Some("KeyError: 'age'"));
    let trace = lines.next().unwrap_or_default();
    assert!(!trace.trim().is_empty());
    assert_eq!(trace, "Traceback (most recent call last):");
}

#[test]
fn test_runtime_error_full_trace() {
    let engine = ExecutionEngine::new();
    let snippet = "def divide(a, b):\n    return a / b\n\nprint(divide(1, 0))\n";
    let (result, records) = collect(&engine, snippet);

    let trace = "Traceback (most recent call last):\n  File \"<string>\", line 4, in <module>\n    print(divide(1, 0))\n  File \"<string>\", line 2, in divide\n    return a / b\nZeroDivisionError: division by zero";
    assert_eq!(result, format!("ZeroDivisionError: division by zero\n{}", trace));
    assert_eq!(
        records,
        vec![
            record("ZeroDivisionError: division by zero", OutputKind::Error),
            record(trace, OutputKind::Error),
        ]
    );
}

#[test]
fn test_custom_filename_in_trace() {
    let engine = ExecutionEngine::with_config(EngineConfig::default().with_filename("lesson.py"));
    let result = engine.execute("missing_name", None);
    assert!(result.contains("File \"lesson.py\", line 1, in <module>"));
}

#[test]
fn test_output_before_failure_is_streamed_not_returned() {
    let engine = ExecutionEngine::new();
    let (result, records) = collect(&engine, "print('start')\nitems = [1]\nitems[3]");

    assert!(!result.contains("start"));
    let kinds: Vec<(OutputKind, &str)> = records
        .iter()
        .map(|r| (r.kind, r.text.lines().next().unwrap_or_default()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (OutputKind::Output, "start"),
            (OutputKind::Error, "IndexError: list index out of range"),
            (OutputKind::Error, "Traceback (most recent call last):"),
        ]
    );
}

#[test]
fn test_records_order_output_then_progress() {
    let engine = ExecutionEngine::new();
    let snippet =
        "scores = [88, 92, 79]\nprint('avg', sum(scores) / len(scores))\nlookup = {'a': 1}";
    let (result, records) = collect(&engine, snippet);

    assert_eq!(result, "avg 86.33333333333333\n");
    assert_eq!(
        records,
        vec![
            record("avg", OutputKind::Output),
            record("86.33333333333333", OutputKind::Output),
            record("📦 Variable 'scores': list with 3 items", OutputKind::Progress),
            record("📦 Variable 'lookup': dict with 1 items", OutputKind::Progress),
        ]
    );
}

#[test]
fn test_introspection_does_not_alter_result() {
    let engine = ExecutionEngine::new();
    let execution = engine.run("grid = np.ones((2, 3))", None);

    assert_eq!(execution.result, NO_OUTPUT);
    assert!(execution.is_success());
    assert_eq!(
        execution.records,
        vec![record(
            "📊 Variable 'grid': ndarray shape=(2, 3)",
            OutputKind::Progress
        )]
    );
}

#[test]
fn test_library_handles_never_reported() {
    let engine = ExecutionEngine::new();
    let execution = engine.run("import numpy\nframe = pd.DataFrame({'x': [1, 2]})", None);

    let progress: Vec<&str> = execution
        .records_of(OutputKind::Progress)
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(progress, vec!["📊 Variable 'frame': DataFrame shape=(2, 1)"]);
    for handle in ["'np'", "'pd'", "'plt'", "'__name__'"] {
        assert!(progress.iter().all(|text| !text.contains(handle)));
    }
}

#[test]
fn test_separate_executions_share_nothing() {
    let engine = ExecutionEngine::new();
    let snippet = "try:\n    counter += 1\nexcept NameError:\n    counter = 1\nprint(counter)";

    let first = engine.execute(snippet, None);
    let second = engine.execute(snippet, None);
    assert_eq!(first, "1\n");
    assert_eq!(first, second);

    let defined = engine.execute("leftover = 5", None);
    assert_eq!(defined, NO_OUTPUT);
    assert!(
        engine
            .execute("print(leftover)", None)
            .starts_with("NameError: name 'leftover' is not defined")
    );
}

#[test]
fn test_plotting_calls_are_accepted() {
    let engine = ExecutionEngine::new();
    let result = engine.execute(
        "plt.plot([1, 2, 3], [4, 5, 6])\nplt.title('growth')\nplt.show()\nprint('plotted')",
        None,
    );
    assert_eq!(result, "plotted\n");
}

#[test]
fn test_without_preloaded_libraries() {
    let engine =
        ExecutionEngine::with_config(EngineConfig::default().with_preload_libraries(false));
    assert!(engine.execute("pd", None).starts_with("NameError:"));
    assert_eq!(
        engine.execute("import numpy as np\nprint(np.arange(3).tolist())", None),
        "[0, 1, 2]\n"
    );
}

#[test]
fn test_blank_writes_not_forwarded() {
    let engine = ExecutionEngine::new();
    let execution = engine.run("print()\nprint('  ')\nprint('x', end='')", None);

    assert_eq!(execution.result, "\n  \nx");
    assert_eq!(execution.records, vec![record("x", OutputKind::Output)]);
}

#[test]
fn test_default_recursion_limit_on_small_thread() {
    let result = std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(|| ExecutionEngine::new().execute("def f(n):\n  return f(n+1)\nf(0)", None))
        .unwrap()
        .join()
        .unwrap();
    assert!(
        result.starts_with("RecursionError: maximum recursion depth exceeded"),
        "{}",
        result
    );
}
