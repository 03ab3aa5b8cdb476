//! Public types for the dependency report.
//!
//! The report is serialized with a stable top-level key order (struct field
//! order) and sorted map keys, so two runs over the same input produce
//! byte-identical JSON.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlparser::ast::ObjectName;
use sqlparser::dialect::GenericDialect;
use std::collections::BTreeMap;
use std::fmt;

/// SQL dialect tag accepted by the parser layer.
///
/// Teradata is the primary target. Both variants parse through sqlparser's
/// generic dialect, which accepts the ANSI core of Teradata SQL; the tag is
/// carried into `_meta.dialect` unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Teradata,
    Generic,
}

impl Dialect {
    /// Returns the dialect tag used in report metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Teradata => "teradata",
            Dialect::Generic => "generic",
        }
    }

    /// Returns the sqlparser dialect backing this tag.
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        match self {
            Dialect::Teradata | Dialect::Generic => Box::new(GenericDialect {}),
        }
    }
}

/// A physical table name split into its dotted parts.
///
/// Rendered as `catalog.schema.base` with empty parts omitted. Source case
/// is preserved; lookups normalize separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub base: String,
}

impl QualifiedName {
    /// Builds a qualified name from a parsed object name.
    ///
    /// Quote styles are stripped by the parser; identifier values keep the
    /// case they had in the source. Names with more than three parts fold
    /// the extra leading parts into the catalog.
    pub(crate) fn from_object_name(name: &ObjectName) -> Option<Self> {
        let mut parts: Vec<String> = name.0.iter().map(|ident| ident.value.clone()).collect();
        let base = parts.pop()?;
        if base.is_empty() {
            return None;
        }
        let schema = parts.pop();
        let catalog = if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        };
        Some(Self {
            catalog,
            schema,
            base,
        })
    }

    pub(crate) fn bare(base: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            base: base.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{catalog}.")?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        write!(f, "{}", self.base)
    }
}

/// One wrapper in a function stack, outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FunctionStackEntry {
    /// Canonical (upper-case) function name.
    #[serde(rename = "fn")]
    pub name: String,
    /// Non-column arguments: parsed literal values, or rendered SQL for
    /// anything that is not a literal.
    pub args: Vec<Value>,
}

/// A constant filter recorded against a `(table, column)` pair.
///
/// Only `op` is always present; the remaining fields are populated per
/// predicate shape and omitted when empty. `fn`/`value_fn` carry the
/// lower-cased outermost wrapper name while stack entries (and the
/// per-element `value_fns`) use canonical upper-case names.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, Default)]
pub struct Condition {
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Value>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub fn_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fn_args: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fn_stack: Option<Vec<FunctionStackEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_fn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_fn_args: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_fn_stack: Option<Vec<FunctionStackEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_fns: Option<Vec<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_fn_args_list: Option<Vec<Vec<Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_fn_stack_list: Option<Vec<Vec<FunctionStackEntry>>>,
}

impl Condition {
    pub(crate) fn new(op: &str) -> Self {
        Self {
            op: op.to_string(),
            ..Self::default()
        }
    }

    /// Canonical serialization used to order condition lists. Field order
    /// is fixed by the struct, so the key is deterministic.
    pub(crate) fn sort_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Whether an invocation names a function or a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
    Procedure,
}

/// An invoked function or procedure.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FunctionRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FunctionKind,
    /// Reserved for builtin classification; always null today.
    pub builtin: Option<bool>,
}

impl FunctionRef {
    pub(crate) fn new(name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            builtin: None,
        }
    }
}

/// Pseudocode for one labeled SELECT.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, Default)]
pub struct PseudocodeEntry {
    pub join: String,
    #[serde(rename = "where")]
    pub where_clause: String,
    pub having: String,
}

/// Report metadata.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, Default)]
pub struct ReportMeta {
    pub statements: usize,
    pub dialect: String,
}

/// The aggregated dependency report for one input.
///
/// Field order here is the top-level key order of the JSON document.
#[derive(Debug, Clone, Serialize, JsonSchema, Default)]
pub struct Report {
    #[serde(rename = "_tables")]
    pub tables: Vec<String>,
    #[serde(rename = "_variables")]
    pub variables: BTreeMap<String, Vec<String>>,
    #[serde(rename = "_values")]
    pub values: BTreeMap<String, BTreeMap<String, Vec<Condition>>>,
    #[serde(rename = "_temp_tables")]
    pub temp_tables: Vec<String>,
    #[serde(rename = "_ctes")]
    pub ctes: Vec<String>,
    #[serde(rename = "_functions")]
    pub functions: Vec<FunctionRef>,
    #[serde(rename = "_created_objects")]
    pub created_objects: Vec<String>,
    #[serde(rename = "_write_targets")]
    pub write_targets: Vec<String>,
    #[serde(rename = "_pseudocode")]
    pub pseudocode: BTreeMap<String, Vec<PseudocodeEntry>>,
    #[serde(rename = "_warnings")]
    pub warnings: Vec<String>,
    #[serde(rename = "_meta")]
    pub meta: ReportMeta,
}

impl Report {
    /// Compact JSON rendering.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("report serialization cannot fail")
    }

    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("report serialization cannot fail")
    }
}

/// Soft-mode error payload returned in place of a report.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_qualified_name_display() {
        let name = QualifiedName {
            catalog: Some("dw".into()),
            schema: Some("sales".into()),
            base: "orders".into(),
        };
        assert_eq!(name.to_string(), "dw.sales.orders");

        let name = QualifiedName {
            catalog: None,
            schema: Some("sales".into()),
            base: "orders".into(),
        };
        assert_eq!(name.to_string(), "sales.orders");

        assert_eq!(QualifiedName::bare("vt").to_string(), "vt");
    }

    #[test]
    fn test_condition_omits_empty_fields() {
        let mut cond = Condition::new("=");
        cond.value = Some(json!(117));
        let rendered = serde_json::to_string(&cond).unwrap();
        assert_eq!(rendered, r#"{"op":"=","value":117}"#);
    }

    #[test]
    fn test_condition_fn_fields_render() {
        let mut cond = Condition::new("=");
        cond.value = Some(json!("SHIPPED"));
        cond.fn_name = Some("upper".into());
        cond.fn_stack = Some(vec![FunctionStackEntry {
            name: "UPPER".into(),
            args: vec![],
        }]);
        let rendered = serde_json::to_string(&cond).unwrap();
        assert_eq!(
            rendered,
            r#"{"op":"=","value":"SHIPPED","fn":"upper","fn_stack":[{"fn":"UPPER","args":[]}]}"#
        );
    }

    #[test]
    fn test_function_ref_builtin_is_null() {
        let f = FunctionRef::new("OREPLACE", FunctionKind::Function);
        let rendered = serde_json::to_string(&f).unwrap();
        assert_eq!(
            rendered,
            r#"{"name":"OREPLACE","type":"function","builtin":null}"#
        );
    }

    #[test]
    fn test_report_key_order() {
        let report = Report::default();
        let rendered = report.to_json();
        let keys = [
            "_tables",
            "_variables",
            "_values",
            "_temp_tables",
            "_ctes",
            "_functions",
            "_created_objects",
            "_write_targets",
            "_pseudocode",
            "_warnings",
            "_meta",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| rendered.find(&format!("\"{k}\"")).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "top-level keys out of order: {rendered}");
    }

    #[test]
    fn test_dialect_tags() {
        assert_eq!(Dialect::Teradata.as_str(), "teradata");
        assert_eq!(Dialect::Generic.as_str(), "generic");
        assert_eq!(Dialect::default(), Dialect::Teradata);
    }
}
