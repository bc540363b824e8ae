use pretty_assertions::assert_eq;
use pygenius::{ErrorExplanation, ExecutionEngine, GENERIC_SUGGESTION, explain};

#[test]
fn test_zero_division() {
    let explanation = explain("ZeroDivisionError: division by zero", "");
    assert_eq!(explanation.error_type, "ZeroDivisionError");
    assert!(!explanation.suggestion.is_empty());
    assert_ne!(explanation.suggestion, GENERIC_SUGGESTION);
}

#[test]
fn test_known_categories() {
    let cases = [
        ("IndexError: list index out of range", "IndexError"),
        ("KeyError: 'age'", "KeyError"),
        ("TypeError: unsupported operand", "TypeError"),
        ("ValueError: invalid literal", "ValueError"),
        ("NameError: name 'x' is not defined", "NameError"),
        ("AttributeError: 'list' object has no attribute 'push'", "AttributeError"),
        ("ImportError: cannot import name 'nope'", "ImportError"),
    ];
    for (message, category) in cases {
        assert_eq!(explain(message, "").error_type, category);
    }
}

#[test]
fn test_module_not_found() {
    // "ModuleNotFoundError" does not contain "ImportError", so the earlier
    // entry is skipped.
    let explanation = explain("ModuleNotFoundError: No module named 'requests'", "");
    assert_eq!(explanation.error_type, "ModuleNotFoundError");
    assert_eq!(explanation.suggestion, GENERIC_SUGGESTION);
}

#[test]
fn test_key_error_triple() {
    assert_eq!(
        explain("KeyError: 'age'", "person['age']"),
        ErrorExplanation {
            error_type: "KeyError".to_string(),
            explanation: "The dictionary doesn't have this key. Use .get() method or check if key exists with 'in' operator.".to_string(),
            suggestion: "Use: your_dict.get(key, default_value)".to_string(),
        }
    );
}

#[test]
fn test_context_does_not_change_explanation() {
    let bare = explain("NameError: name 'y' is not defined", "");
    let with_context = explain("NameError: name 'y' is not defined", "print(y)");
    assert_eq!(bare, with_context);
}

#[test]
fn test_unknown_category() {
    let explanation = explain("something odd happened", "");
    assert_eq!(explanation.error_type, "Unknown");
    assert!(!explanation.explanation.is_empty());
    assert!(!explanation.suggestion.is_empty());
}

#[test]
fn test_engine_failures_are_explainable() {
    let engine = ExecutionEngine::new();
    let result = engine.execute("ages = {'ann': 3}\nages['bo']", None);
    let first_line = result.lines().next().unwrap_or_default();
    assert_eq!(explain(first_line, "").error_type, "KeyError");

    let result = engine.execute("import not_a_real_module", None);
    let first_line = result.lines().next().unwrap_or_default();
    assert_eq!(explain(first_line, "").error_type, "ModuleNotFoundError");
}
