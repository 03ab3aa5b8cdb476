//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// teralens - Teradata SQL dependency extractor
#[derive(Parser, Debug)]
#[command(name = "teralens")]
#[command(about = "Extract table, column, and filter dependencies from Teradata SQL", long_about = None)]
#[command(version)]
pub struct Args {
    /// SQL files to analyze (reads from stdin if none provided); multiple
    /// files are combined into one aggregated report
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long, default_value = "teradata", value_enum)]
    pub dialect: DialectArg,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,

    /// On parse or runtime failure, print an error payload and exit 0
    /// instead of failing
    #[arg(long)]
    pub soft_errors: bool,

    /// Suppress warnings on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Teradata,
    Generic,
}

impl From<DialectArg> for teralens_core::Dialect {
    fn from(dialect: DialectArg) -> Self {
        match dialect {
            DialectArg::Teradata => teralens_core::Dialect::Teradata,
            DialectArg::Generic => teralens_core::Dialect::Generic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["teralens"]);
        assert_eq!(args.dialect, DialectArg::Teradata);
        assert!(!args.compact);
        assert!(!args.soft_errors);
        assert!(args.files.is_empty());
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::parse_from([
            "teralens",
            "--dialect",
            "generic",
            "--compact",
            "--soft-errors",
            "query.sql",
        ]);
        assert_eq!(args.dialect, DialectArg::Generic);
        assert!(args.compact);
        assert!(args.soft_errors);
        assert_eq!(args.files.len(), 1);
    }
}
