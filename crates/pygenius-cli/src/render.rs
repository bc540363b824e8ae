//! Terminal rendering for records, findings and explanations.

use std::io::{self, Write};

use owo_colors::OwoColorize;
use pygenius::{AnalysisFinding, ErrorExplanation, FindingKind, OutputKind, OutputRecord, Severity};

use crate::packages::Package;

/// Print one record as its own line: output on stdout, the rest on stderr.
pub fn print_record(record: &OutputRecord) {
    match record.kind {
        OutputKind::Output => {
            println!("{}", record.text.trim_end_matches('\n'));
            let _ = io::stdout().flush();
        }
        OutputKind::Progress => eprintln!("{}", record.text.dimmed()),
        OutputKind::Error => eprintln!("{}", record.text.red()),
    }
}

pub fn print_findings(findings: &[AnalysisFinding]) {
    if findings.is_empty() {
        println!("{}", "✓ No potential issues found".green());
        return;
    }
    println!(
        "{:>5}  {:<8} {:<7} {}",
        "LINE".bold(),
        "SEVERITY".bold(),
        "TYPE".bold(),
        "MESSAGE".bold()
    );
    for finding in findings {
        let severity = format!("{:<8}", finding.severity.as_str());
        let severity = match finding.severity {
            Severity::High => severity.red().to_string(),
            Severity::Medium => severity.yellow().to_string(),
            Severity::Low => severity.blue().to_string(),
        };
        let kind = match finding.kind {
            FindingKind::Warning => "⚠",
            FindingKind::Info => "ℹ",
        };
        println!(
            "{:>5}  {} {:<7} {}",
            finding.line, severity, kind, finding.message
        );
    }
}

pub fn print_explanation(explanation: &ErrorExplanation) {
    println!("{} {}", "Error type:".bold(), explanation.error_type.red());
    println!();
    println!("{}", explanation.explanation);
    println!();
    println!("{} {}", "💡 Suggestion:".bold(), explanation.suggestion.cyan());
}

pub fn print_packages(packages: &[Package]) {
    let width = packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for package in packages {
        println!("{:<width$}  {}", package.name, package.version.dimmed(), width = width);
    }
}

/// Print a collaborator's status line, coloured by its leading mark.
pub fn print_status(message: &str) {
    if message.starts_with('✓') {
        println!("{}", message.green());
    } else {
        eprintln!("{}", message.red());
    }
}
