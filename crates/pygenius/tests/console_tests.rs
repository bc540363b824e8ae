use pretty_assertions::assert_eq;
use pygenius::{Console, EngineConfig, NO_OUTPUT, Outcome, OutputKind, OutputRecord};

#[test]
fn test_state_survives_between_submissions() {
    let mut console = Console::new();

    assert_eq!(console.submit("prices = [3, 4]", None).result, NO_OUTPUT);
    assert_eq!(console.submit("prices.append(5)", None).result, NO_OUTPUT);
    assert_eq!(console.submit("sum(prices)", None).result, "12");
}

#[test]
fn test_expression_echo_uses_repr() {
    let mut console = Console::new();

    let execution = console.submit("'tea' + 'pot'", None);
    assert_eq!(execution.result, "'teapot'");
    assert_eq!(
        execution.records,
        vec![OutputRecord::new("'teapot'", OutputKind::Output)]
    );

    // None is not echoed.
    assert_eq!(console.submit("None", None).result, NO_OUTPUT);
}

#[test]
fn test_printing_expression_is_not_echoed_twice() {
    let mut console = Console::new();
    let execution = console.submit("print('hi')", None);
    assert_eq!(execution.result, "hi\n");
    assert_eq!(
        execution.records,
        vec![OutputRecord::new("hi", OutputKind::Output)]
    );
}

#[test]
fn test_statements_report_variables() {
    let mut console = Console::new();
    let mut seen = Vec::new();
    let mut observer = |record: &OutputRecord| seen.push(record.clone());

    let execution = console.submit("names = {'ann', 'bo'}", Some(&mut observer));
    assert!(execution.is_success());
    assert_eq!(
        seen,
        vec![OutputRecord::new(
            "📦 Variable 'names': set with 2 items",
            OutputKind::Progress
        )]
    );
    assert_eq!(
        console.variables(),
        vec!["📦 Variable 'names': set with 2 items".to_string()]
    );
}

#[test]
fn test_failures_keep_session_alive() {
    let mut console = Console::new();
    console.submit("total = 10", None);

    let execution = console.submit("total / 0", None);
    assert_eq!(execution.outcome, Outcome::RuntimeError);
    assert!(execution.result.starts_with("ZeroDivisionError: division by zero\n"));

    let execution = console.submit("for x in", None);
    assert_eq!(execution.outcome, Outcome::SyntaxError);

    assert_eq!(console.submit("total", None).result, "10");
}

#[test]
fn test_functions_defined_earlier_are_callable() {
    let mut console = Console::new();
    console.submit("def double(n):\n    return n * 2", None);
    assert_eq!(console.submit("double(21)", None).result, "42");
}

#[test]
fn test_reset_restores_seeded_namespace() {
    let mut console = Console::new();
    console.submit("scratch = [1]", None);
    console.reset();

    assert!(console.namespace().get("scratch").is_none());
    assert!(console.namespace().get("np").is_some());
    assert_eq!(console.submit("__name__", None).result, "'__main__'");
}

#[test]
fn test_console_respects_config() {
    let mut console = Console::with_config(EngineConfig::default().with_preload_libraries(false));
    assert!(console.namespace().get("np").is_none());
    assert_eq!(console.submit("np", None).outcome, Outcome::RuntimeError);
}
