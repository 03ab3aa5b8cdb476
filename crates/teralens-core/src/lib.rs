pub mod error;
pub mod extractor;
pub mod parser;
pub mod types;

// Re-export main types and functions
pub use error::{ExtractError, ParseError, Position};
pub use extractor::{extract, ExtractRequest};
pub use parser::{parse_sql, parse_sql_with_dialect};

pub use types::{
    Condition, Dialect, ErrorEnvelope, FunctionKind, FunctionRef, FunctionStackEntry,
    PseudocodeEntry, QualifiedName, Report, ReportMeta,
};
