//! JSON and stderr output formatting.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use teralens_core::{ErrorEnvelope, Report};

/// Format the report as JSON.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_report(report: &Report, compact: bool) -> String {
    if compact {
        report.to_json()
    } else {
        report.to_json_pretty()
    }
}

/// Format a soft-mode error payload as JSON.
pub fn format_envelope(envelope: &ErrorEnvelope, compact: bool) -> String {
    if compact {
        serde_json::to_string(envelope).expect("envelope serialization cannot fail")
    } else {
        serde_json::to_string_pretty(envelope).expect("envelope serialization cannot fail")
    }
}

/// Echo report warnings to stderr, colored when attached to a terminal.
pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    let colored = std::io::stderr().is_terminal();
    for warning in warnings {
        if colored {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        } else {
            eprintln!("warning: {warning}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teralens_core::{extract, ExtractRequest};

    #[test]
    fn test_format_report_pretty_and_compact() {
        let report = extract(&ExtractRequest::new("SELECT * FROM sales.orders")).unwrap();
        let pretty = format_report(&report, false);
        assert!(pretty.contains('\n'));
        assert!(pretty.contains("_tables"));

        let compact = format_report(&report, true);
        assert!(!compact.contains('\n'));
    }

    #[test]
    fn test_format_envelope() {
        let err = extract(&ExtractRequest::new("SELECT FROM")).unwrap_err();
        let payload = format_envelope(&err.envelope(), true);
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "parse");
        assert!(value["error"].as_str().unwrap().contains("parse error"));
    }
}
