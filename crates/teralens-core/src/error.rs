//! Error types for SQL parsing and extraction.
//!
//! Extraction is all-or-nothing: a parse or runtime failure aborts the
//! run with an [`ExtractError`] and no partial report is produced.
//! Non-fatal findings (ambiguous references, `SELECT *` usage) are not
//! errors; they accumulate into the report's `_warnings` array.

use crate::types::{Dialect, ErrorEnvelope};
use sqlparser::parser::ParserError;
use std::fmt;
use thiserror::Error;

/// The parser rejected the input.
///
/// Carries the parser's message verbatim, the dialect the input was
/// parsed under, and the failure location when the parser reported one.
/// Soft-mode callers flatten all of this into the envelope message;
/// strict-mode callers can read the fields directly.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The parser's own message.
    pub message: String,
    /// Dialect the input was parsed under.
    pub dialect: Dialect,
    /// 1-indexed failure location, when the parser reported one.
    pub position: Option<Position>,
}

/// A line/column pair inside the SQL input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    /// Wraps a sqlparser failure.
    ///
    /// The parser embeds the location in its message text rather than in
    /// a structured field; `position_in_message` recovers it.
    pub(crate) fn from_parser(err: ParserError, dialect: Dialect) -> Self {
        let message = match err {
            ParserError::TokenizerError(message) | ParserError::ParserError(message) => message,
            ParserError::RecursionLimitExceeded => {
                "statement nesting exceeds the parser's recursion limit".to_string()
            }
        };
        let position = position_in_message(&message);
        Self {
            message,
            dialect,
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(
                f,
                "{} parse error at line {}, column {}: {}",
                self.dialect.as_str(),
                position.line,
                position.column,
                self.message
            ),
            None => write!(f, "{} parse error: {}", self.dialect.as_str(), self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Recovers the `... at Line: X, Column: Y` location sqlparser appends to
/// its messages. Both markers must be present; anything else yields
/// `None` rather than a half-filled position.
fn position_in_message(message: &str) -> Option<Position> {
    let line = number_after(message, "Line: ")?;
    let column = number_after(message, "Column: ")?;
    Some(Position { line, column })
}

fn number_after(text: &str, marker: &str) -> Option<usize> {
    let start = text.find(marker)? + marker.len();
    let digits: String = text[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Fatal extraction error.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ExtractError {
    /// Builds the soft-mode payload for this error.
    pub fn envelope(&self) -> ErrorEnvelope {
        let kind = match self {
            ExtractError::Parse(_) => "parse",
            ExtractError::Runtime(_) => "runtime",
        };
        ErrorEnvelope {
            error: self.to_string(),
            kind: kind.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;

    #[test]
    fn test_position_recovered_from_message() {
        let pos = position_in_message("Expected: an expression, found: EOF at Line: 2, Column: 14");
        assert_eq!(
            pos,
            Some(Position {
                line: 2,
                column: 14
            })
        );
    }

    #[test]
    fn test_position_requires_both_markers() {
        assert_eq!(position_in_message("Expected: an expression, found: EOF"), None);
        assert_eq!(position_in_message("found: EOF at Line: 2"), None);
        assert_eq!(position_in_message("at Column: 7"), None);
        assert_eq!(position_in_message("at Line: x, Column: 7"), None);
    }

    #[test]
    fn test_from_parser_keeps_dialect_and_message() {
        let err = parse_sql("SELECT order_id FROM").unwrap_err();
        assert_eq!(err.dialect, Dialect::Teradata);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_display_with_position() {
        let err = ParseError {
            message: "found: EOF".to_string(),
            dialect: Dialect::Teradata,
            position: Some(Position { line: 1, column: 21 }),
        };
        assert_eq!(
            err.to_string(),
            "teradata parse error at line 1, column 21: found: EOF"
        );
    }

    #[test]
    fn test_display_without_position() {
        let err = ParseError {
            message: "unterminated string literal".to_string(),
            dialect: Dialect::Generic,
            position: None,
        };
        assert_eq!(
            err.to_string(),
            "generic parse error: unterminated string literal"
        );
    }

    #[test]
    fn test_envelope_kinds() {
        let parse = ExtractError::Parse(ParseError {
            message: "found: EOF".to_string(),
            dialect: Dialect::Teradata,
            position: None,
        });
        let env = parse.envelope();
        assert_eq!(env.kind, "parse");
        assert_eq!(env.error, "teradata parse error: found: EOF");

        let runtime = ExtractError::Runtime("input too large".to_string());
        let env = runtime.envelope();
        assert_eq!(env.kind, "runtime");
        assert_eq!(env.error, "runtime error: input too large");
    }
}
