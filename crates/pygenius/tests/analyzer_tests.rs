use pretty_assertions::assert_eq;
use pygenius::{AnalysisFinding, FindingKind, Severity, analyze};

#[test]
fn test_bare_except() {
    let findings = analyze("except:\n    pass\n");
    assert_eq!(
        findings,
        vec![AnalysisFinding {
            line: 1,
            kind: FindingKind::Warning,
            message: "Bare except clause - catch specific exceptions instead".to_string(),
            severity: Severity::Medium,
        }]
    );
    assert!(findings[0].message.contains("except"));
}

#[test]
fn test_analysis_is_deterministic() {
    let snippet = r#"
def collect(item, bucket=[]):
    bucket.append(item)
    return bucket

try:
    ratio = 10 / 0
except:
    ratio = None
unused = 3
"#;
    let first = analyze(snippet);
    let second = analyze(snippet);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_division_by_zero() {
    let findings = analyze("total = 100\nresult = total / 0\nprint(result)");
    let division: Vec<&AnalysisFinding> = findings
        .iter()
        .filter(|f| f.severity == Severity::High)
        .collect();
    assert_eq!(division.len(), 1);
    assert_eq!(division[0].line, 2);
    assert_eq!(
        division[0].message,
        "Possible division-by-zero - ensure divisor is not zero"
    );
}

#[test]
fn test_mutable_default() {
    let findings = analyze("def add(x, items=[]):\n    items.append(x)\n    return items");
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].line, 1);
    assert_eq!(findings[0].kind, FindingKind::Warning);
    assert_eq!(findings[0].severity, Severity::Medium);
}

#[test]
fn test_unused_variable() {
    let findings = analyze("total = 1\nspare = 2\nprint(total)");
    assert_eq!(
        findings,
        vec![AnalysisFinding {
            line: 2,
            kind: FindingKind::Info,
            message: "Variable 'spare' may be unused".to_string(),
            severity: Severity::Low,
        }]
    );
}

#[test]
fn test_substring_counts_as_use() {
    // `count` appears inside `counter`, so it is treated as used.
    let findings = analyze("count = 0\ncounter = 1\nprint(counter)");
    assert!(findings.iter().all(|f| f.message != "Variable 'count' may be unused"));
}

#[test]
fn test_findings_are_grouped_by_pass() {
    // `x` would count as used: it appears inside `except`.
    let snippet = "try:\n    q = 5 / 0\nexcept:\n    pass\ndef f(a={}):\n    return a";
    let findings = analyze(snippet);
    let summary: Vec<(usize, Severity)> = findings.iter().map(|f| (f.line, f.severity)).collect();
    assert_eq!(
        summary,
        vec![
            (2, Severity::High),
            (2, Severity::Low),
            (5, Severity::Medium),
            (3, Severity::Medium),
        ]
    );
}

#[test]
fn test_lines_are_within_snippet() {
    let snippet = "a = 1\nb = a / 0\nexcept:\n";
    let line_count = snippet.split('\n').count();
    for finding in analyze(snippet) {
        assert!(finding.line >= 1 && finding.line <= line_count);
    }
}

#[test]
fn test_garbage_input_never_fails() {
    assert_eq!(analyze(""), vec![]);
    assert_eq!(analyze("}}}{{{ ((("), vec![]);
    let findings = analyze("= = =\n==\n/ 0 = ");
    assert!(findings.iter().all(|f| f.line <= 3));
}

#[test]
fn test_clean_code_has_no_findings() {
    let snippet = "def mean(values):\n    if not values:\n        return 0\n    return sum(values) / len(values)\n\nprint(mean([1, 2, 3]))";
    assert_eq!(analyze(snippet), vec![]);
}

#[cfg(feature = "serde")]
#[test]
fn test_findings_serialize_with_type_field() {
    let findings = analyze("except:\n    pass");
    let json = serde_json::to_value(&findings).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "line": 1,
            "type": "warning",
            "message": "Bare except clause - catch specific exceptions instead",
            "severity": "medium"
        }])
    );
}
