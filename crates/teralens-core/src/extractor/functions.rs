//! Function-name canonicalization and the function/procedure inventory.

use super::visitor::{walk_expr, walk_statement, Visitor};
use crate::types::{FunctionKind, FunctionRef};
use regex::Regex;
use sqlparser::ast::{Expr, Statement};
use std::collections::HashSet;

/// Synonym table collapsing alternate spellings onto canonical names.
const CANONICAL_SYNONYMS: &[(&str, &str)] = &[
    ("substring", "SUBSTR"),
    ("char_length", "LENGTH"),
    ("current_date", "CURRENT_DATE"),
    ("currentdate", "CURRENT_DATE"),
    ("current_timestamp", "CURRENT_TIMESTAMP"),
    ("current_time", "CURRENT_TIME"),
];

/// Canonical (upper-case) form of a function name.
pub(crate) fn canonical_function_name(raw: &str) -> String {
    let lower = raw.to_lowercase();
    for (synonym, canonical) in CANONICAL_SYNONYMS {
        if lower == *synonym {
            return (*canonical).to_string();
        }
    }
    raw.to_uppercase()
}

/// Keyword-style functions rendered without parentheses.
pub(crate) fn renders_without_parens(canonical: &str) -> bool {
    matches!(
        canonical,
        "CURRENT_DATE" | "CURRENT_TIMESTAMP" | "CURRENT_TIME"
    )
}

/// True when `rendered` contains `name` immediately followed (modulo
/// whitespace) by an opening parenthesis. Bare identifier forms such as
/// `CURRENT_DATE` fail this check and are not inventoried.
pub(crate) fn is_parenthesized_call(name: &str, rendered: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\s*\(", regex::escape(name));
    Regex::new(&pattern)
        .map(|re| re.is_match(rendered))
        .unwrap_or(false)
}

/// Collects `{name, type, builtin}` entries for every parenthesized
/// function call and every CALLed procedure, deduplicated by
/// `(name, type)` in first-seen order.
pub(crate) struct FunctionInventory<'a> {
    pub(crate) functions: &'a mut Vec<FunctionRef>,
    pub(crate) seen: &'a mut HashSet<(String, FunctionKind)>,
}

impl<'a> FunctionInventory<'a> {
    pub(crate) fn collect(&mut self, statement: &Statement) {
        if let Statement::Call(function) = statement {
            self.record(function.name.to_string(), FunctionKind::Procedure);
        }
        self.visit_statement(statement);
    }

    fn record(&mut self, name: String, kind: FunctionKind) {
        if name.is_empty() {
            return;
        }
        if self.seen.insert((name.clone(), kind)) {
            self.functions.push(FunctionRef::new(name, kind));
        }
    }
}

impl Visitor for FunctionInventory<'_> {
    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Function(function) = expr {
            let name = function.name.to_string();
            if is_parenthesized_call(&name, &expr.to_string()) {
                self.record(name, FunctionKind::Function);
            }
        }
        walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_synonyms() {
        assert_eq!(canonical_function_name("substring"), "SUBSTR");
        assert_eq!(canonical_function_name("SUBSTRING"), "SUBSTR");
        assert_eq!(canonical_function_name("char_length"), "LENGTH");
        assert_eq!(canonical_function_name("currentdate"), "CURRENT_DATE");
        assert_eq!(canonical_function_name("current_timestamp"), "CURRENT_TIMESTAMP");
    }

    #[test]
    fn test_canonical_default_uppercases() {
        assert_eq!(canonical_function_name("oreplace"), "OREPLACE");
        assert_eq!(canonical_function_name("Upper"), "UPPER");
    }

    #[test]
    fn test_bare_rendering_names() {
        assert!(renders_without_parens("CURRENT_DATE"));
        assert!(renders_without_parens("CURRENT_TIME"));
        assert!(!renders_without_parens("UPPER"));
    }

    #[test]
    fn test_parenthesized_call_check() {
        assert!(is_parenthesized_call("UPPER", "UPPER(b.status)"));
        assert!(is_parenthesized_call("upper", "UPPER (b.status)"));
        assert!(!is_parenthesized_call("CURRENT_DATE", "CURRENT_DATE"));
        assert!(!is_parenthesized_call("status", "UPPER(status)"));
    }
}
