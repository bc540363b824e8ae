//! Canned explanations for Python error categories.

/// What went wrong, in learner terms, and how to fix it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorExplanation {
    pub error_type: String,
    pub explanation: String,
    pub suggestion: String,
}

/// Known categories, matched in order by substring.
const EXPLANATIONS: &[(&str, &str)] = &[
    (
        "IndexError",
        "You're trying to access an index that doesn't exist in the list/array. Remember: Python uses 0-based indexing, so a list with 5 items has indices 0-4.",
    ),
    (
        "KeyError",
        "The dictionary doesn't have this key. Use .get() method or check if key exists with 'in' operator.",
    ),
    (
        "TypeError",
        "You're using an operation with incompatible types. Check variable types with type().",
    ),
    (
        "ValueError",
        "The value is correct type but inappropriate value. Check the documentation for valid values.",
    ),
    (
        "NameError",
        "This variable or function hasn't been defined. Check spelling and scope.",
    ),
    (
        "ZeroDivisionError",
        "Cannot divide by zero. Add a check before division.",
    ),
    (
        "AttributeError",
        "This object doesn't have the attribute/method you're trying to use. Check the object's type.",
    ),
    (
        "ImportError",
        "Cannot import this module. Check if it's installed: pip install <module>",
    ),
    (
        "ModuleNotFoundError",
        "Python can't find this module. You may need to install it first.",
    ),
];

const SUGGESTIONS: &[(&str, &str)] = &[
    ("IndexError", "Add bounds checking: if index < len(your_list):"),
    ("KeyError", "Use: your_dict.get(key, default_value)"),
    ("ZeroDivisionError", "Add check: if divisor != 0:"),
    (
        "NameError",
        "Define the variable before using it, or import the module",
    ),
    (
        "AttributeError",
        "Check object type or use hasattr(obj, \"attribute\")",
    ),
];

pub const GENERIC_SUGGESTION: &str = "Review the code carefully and fix the issue.";

pub const UNKNOWN_EXPLANATION: &str =
    "An unexpected error occurred. Check your code syntax and logic.";

pub const UNKNOWN_SUGGESTION: &str = "Try running the code line by line to identify the issue.";

/// Explain a failure message such as `"KeyError: 'age'"`.
///
/// The first known category appearing anywhere in `message` wins. The
/// code context does not change the explanation text; it is only passed
/// on to [`suggestion`].
///
/// # Example
///
/// ```
/// use pygenius::explain;
///
/// let explanation = explain("ZeroDivisionError: division by zero", "");
/// assert_eq!(explanation.error_type, "ZeroDivisionError");
/// assert_eq!(explanation.suggestion, "Add check: if divisor != 0:");
/// ```
pub fn explain(message: &str, code_context: &str) -> ErrorExplanation {
    match EXPLANATIONS
        .iter()
        .find(|(category, _)| message.contains(category))
    {
        Some((category, explanation)) => ErrorExplanation {
            error_type: category.to_string(),
            explanation: explanation.to_string(),
            suggestion: suggestion(category, code_context).to_string(),
        },
        None => ErrorExplanation {
            error_type: "Unknown".to_string(),
            explanation: UNKNOWN_EXPLANATION.to_string(),
            suggestion: UNKNOWN_SUGGESTION.to_string(),
        },
    }
}

/// The fix suggestion for a category, or the generic one.
pub fn suggestion(category: &str, _code_context: &str) -> &'static str {
    SUGGESTIONS
        .iter()
        .find(|(known, _)| *known == category)
        .map_or(GENERIC_SUGGESTION, |&(_, text)| text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_match_in_table_order_wins() {
        // Both names appear; IndexError comes first in the table.
        let explanation = explain("KeyError raised while handling IndexError", "");
        assert_eq!(explanation.error_type, "IndexError");
    }

    #[test]
    fn test_category_without_specific_suggestion() {
        let explanation = explain("ValueError: invalid literal for int()", "int('x')");
        assert_eq!(explanation.error_type, "ValueError");
        assert_eq!(explanation.suggestion, GENERIC_SUGGESTION);
    }

    #[test]
    fn test_unknown_message() {
        assert_eq!(
            explain("RecursionError: maximum recursion depth exceeded", ""),
            ErrorExplanation {
                error_type: "Unknown".to_string(),
                explanation: UNKNOWN_EXPLANATION.to_string(),
                suggestion: UNKNOWN_SUGGESTION.to_string(),
            }
        );
    }
}
