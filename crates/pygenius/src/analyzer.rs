//! Heuristic bug scanner for learner snippets.
//!
//! Each [`Rule`] is a literal, line-oriented text check. Nothing here parses
//! the code, so the scanner never fails: any text, valid Python or not,
//! yields a (possibly empty) list of findings. False positives and false
//! negatives are expected.

use std::fmt;

/// Whether a finding is a likely bug or a style hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FindingKind {
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Warning => "warning",
            FindingKind::Info => "info",
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One potential problem on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisFinding {
    /// 1-based line number.
    pub line: usize,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: FindingKind,
    pub message: String,
    pub severity: Severity,
}

/// The four heuristic checks, in the order their findings are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// A division whose divisor text looks like zero.
    DivisionByZero,
    /// A simple assignment whose name never shows up again.
    UnusedVariable,
    /// A `def` line with an empty list or dict default.
    MutableDefault,
    /// `except:` with no exception type.
    BareExcept,
}

const SUSPICIOUS_DIVISORS: &[&str] = &["/0", "/ 0", "/variable", "/ value"];

impl Rule {
    pub const ALL: [Rule; 4] = [
        Rule::DivisionByZero,
        Rule::UnusedVariable,
        Rule::MutableDefault,
        Rule::BareExcept,
    ];

    /// Run this rule over every line of a snippet.
    pub fn scan(&self, lines: &[&str]) -> Vec<AnalysisFinding> {
        (0..lines.len())
            .filter_map(|index| self.check(lines, index))
            .collect()
    }

    /// Check the line at `index` (0-based), with the rest of the snippet
    /// available for rules that look ahead.
    pub fn check(&self, lines: &[&str], index: usize) -> Option<AnalysisFinding> {
        let line = lines.get(index)?;
        let number = index + 1;
        match self {
            Rule::DivisionByZero => {
                let suspicious = line.contains('/')
                    && !line.contains("= 0")
                    && SUSPICIOUS_DIVISORS.iter().any(|d| line.contains(d));
                suspicious.then(|| {
                    finding(
                        number,
                        FindingKind::Warning,
                        "Possible division-by-zero - ensure divisor is not zero",
                        Severity::High,
                    )
                })
            }
            Rule::UnusedVariable => {
                if !line.contains('=') || line.contains("==") {
                    return None;
                }
                let name = line.split('=').next().unwrap_or_default().trim();
                let used = lines[number..].iter().any(|later| {
                    later.contains(name) && later.find('=') != later.find(name)
                });
                (!used && is_identifier(name)).then(|| {
                    finding(
                        number,
                        FindingKind::Info,
                        &format!("Variable '{}' may be unused", name),
                        Severity::Low,
                    )
                })
            }
            Rule::MutableDefault => {
                let mutable = line.contains("def ")
                    && line.contains('=')
                    && (line.contains("[]") || line.contains("{}"));
                mutable.then(|| {
                    finding(
                        number,
                        FindingKind::Warning,
                        "Mutable default argument detected - use None and initialize inside function",
                        Severity::Medium,
                    )
                })
            }
            Rule::BareExcept => {
                let bare = line.contains("except:") && !line.contains("Exception");
                bare.then(|| {
                    finding(
                        number,
                        FindingKind::Warning,
                        "Bare except clause - catch specific exceptions instead",
                        Severity::Medium,
                    )
                })
            }
        }
    }
}

fn finding(line: usize, kind: FindingKind, message: &str, severity: Severity) -> AnalysisFinding {
    AnalysisFinding {
        line,
        kind,
        message: message.to_string(),
        severity,
    }
}

/// Whether `name` reads as a Python identifier. Keywords count.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}

/// Scan a snippet with every rule.
///
/// Findings are grouped by rule in [`Rule::ALL`] order, and by line within
/// each rule. The same line may be reported by several rules.
///
/// # Example
///
/// ```
/// use pygenius::{Severity, analyze};
///
/// let findings = analyze("try:\n    risky()\nexcept:\n    pass\n");
/// assert_eq!(findings.len(), 1);
/// assert_eq!(findings[0].line, 3);
/// assert_eq!(findings[0].severity, Severity::Medium);
/// ```
pub fn analyze(snippet: &str) -> Vec<AnalysisFinding> {
    let lines: Vec<&str> = snippet.split('\n').collect();
    Rule::ALL.iter().flat_map(|rule| rule.scan(&lines)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<&str> {
        text.split('\n').collect()
    }

    #[test]
    fn test_division_rule() {
        let rule = Rule::DivisionByZero;
        assert!(rule.check(&lines("x = 10 / 0"), 0).is_some());
        assert!(rule.check(&lines("ratio = total / value"), 0).is_some());
        assert!(rule.check(&lines("ratio = total/value"), 0).is_none());
        assert!(rule.check(&lines("half = total / 2"), 0).is_none());
        assert!(rule.check(&lines("r = a/variable"), 0).is_some());
        // An assignment of zero on the same line suppresses the warning.
        assert!(rule.check(&lines("d = 0; x = 1/0"), 0).is_none());
    }

    #[test]
    fn test_unused_rule_looks_only_at_later_lines() {
        let rule = Rule::UnusedVariable;
        let snippet = lines("total = 5\nprint(total)");
        assert!(rule.check(&snippet, 0).is_none());

        let snippet = lines("print('hi')\ncount = 1");
        let found = rule.check(&snippet, 1).map(|f| f.message);
        assert_eq!(found, Some("Variable 'count' may be unused".to_string()));
    }

    #[test]
    fn test_unused_rule_is_textual() {
        let rule = Rule::UnusedVariable;
        // `x` is found inside `max`, so it counts as used.
        assert!(rule.check(&lines("x = 1\nprint(max(2, 3))"), 0).is_none());
        // Any later line mentioning the name counts, even a reassignment.
        assert!(rule.check(&lines("x = 1\nx = 2"), 0).is_none());
        assert!(rule.check(&lines("x = 1\ny = 2"), 0).is_some());
        // Augmented assignments do not split into an identifier.
        assert!(rule.check(&lines("x += 1"), 0).is_none());
        assert!(rule.check(&lines("a == b"), 0).is_none());
    }

    #[test]
    fn test_mutable_default_rule() {
        let rule = Rule::MutableDefault;
        assert!(rule.check(&lines("def f(items=[]):"), 0).is_some());
        assert!(rule.check(&lines("def f(opts={}):"), 0).is_some());
        assert!(rule.check(&lines("def f(items=None):"), 0).is_none());
    }

    #[test]
    fn test_bare_except_rule() {
        let rule = Rule::BareExcept;
        assert!(rule.check(&lines("except:"), 0).is_some());
        assert!(rule.check(&lines("except ValueError:"), 0).is_none());
        assert!(rule.check(&lines("except: # Exception"), 0).is_none());
    }

    #[test]
    fn test_findings_grouped_by_rule() {
        let snippet = "def f(a=[]):\n    return a\nr = 1/0\n";
        let findings = analyze(snippet);
        let summary: Vec<(usize, Severity)> =
            findings.iter().map(|f| (f.line, f.severity)).collect();
        assert_eq!(
            summary,
            vec![(3, Severity::High), (3, Severity::Low), (1, Severity::Medium)]
        );
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("total_2"));
        assert!(is_identifier("_"));
        assert!(is_identifier("if"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier(""));
    }
}
