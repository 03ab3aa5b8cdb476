//! Predicate classification: turns constant filters into typed
//! [`Condition`] records keyed by `(base table, column)`.
//!
//! Predicate shapes from different AST spellings are normalized before
//! emission (`NOT x IN (...)` and `x NOT IN (...)` produce the same
//! record), and nested function wrappers on either side are unwrapped into
//! ordered stacks. Attribution failures skip the condition silently; the
//! column attributor already reported them.

use super::functions::canonical_function_name;
use super::scope::ScopeStack;
use super::scope::UnqualifiedResolution;
use super::MAX_RECURSION_DEPTH;
use crate::types::{Condition, FunctionStackEntry, QualifiedName};
use serde_json::{json, Value as JsonValue};
use sqlparser::ast::{
    BinaryOperator, CastKind, DataType, Expr, FunctionArg, FunctionArgExpr, FunctionArguments,
    GroupByExpr, Ident, JoinConstraint, Select, SelectItem, UnaryOperator, Value,
};
use std::collections::{BTreeSet, HashMap};

/// A column reference peeled out of a predicate side, with the function
/// wrappers that surrounded it (outermost first).
struct ColumnSide {
    qualifier: Vec<String>,
    column: String,
    stack: Vec<FunctionStackEntry>,
}

/// Literal value(s) peeled out of the non-column side.
struct ValueSide {
    stack: Vec<FunctionStackEntry>,
    values: Vec<JsonValue>,
}

pub(crate) struct PredicateClassifier<'a> {
    pub(crate) stack: &'a ScopeStack,
    pub(crate) values: &'a mut HashMap<QualifiedName, HashMap<String, Vec<Condition>>>,
    pub(crate) variables: &'a mut HashMap<QualifiedName, BTreeSet<String>>,
}

impl<'a> PredicateClassifier<'a> {
    /// Scans one SELECT's own clauses for predicate nodes.
    pub(crate) fn scan_select(&mut self, select: &Select) {
        for item in &select.projection {
            if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
                self.walk(expr, 0);
            }
        }
        for table in &select.from {
            for join in &table.joins {
                if let Some(JoinConstraint::On(on)) =
                    super::visitor::join_constraint(&join.join_operator)
                {
                    self.walk(on, 0);
                }
            }
        }
        if let Some(selection) = &select.selection {
            self.walk(selection, 0);
        }
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.walk(expr, 0);
            }
        }
        if let Some(having) = &select.having {
            self.walk(having, 0);
        }
        if let Some(qualify) = &select.qualify {
            self.walk(qualify, 0);
        }
    }

    fn walk(&mut self, expr: &Expr, depth: usize) {
        if depth > MAX_RECURSION_DEPTH {
            return;
        }
        let next = depth + 1;

        match expr {
            Expr::Nested(inner) => self.walk(inner, next),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => {
                // A NOT wrapping IN or LIKE is the negated predicate, not
                // a plain one nested under NOT; unify here so neither form
                // double-emits.
                match strip_nested(inner) {
                    Expr::InList {
                        expr: col,
                        list,
                        negated: false,
                    } => self.classify_in(col, list, true),
                    Expr::Like {
                        negated: false,
                        expr: col,
                        pattern,
                        ..
                    } => self.classify_like(col, pattern, true),
                    _ => self.walk(inner, next),
                }
            }
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And | BinaryOperator::Or => {
                    self.walk(left, next);
                    self.walk(right, next);
                }
                BinaryOperator::Eq => self.classify_comparison(left, right, "="),
                BinaryOperator::Gt => self.classify_comparison(left, right, ">"),
                BinaryOperator::GtEq => self.classify_comparison(left, right, ">="),
                BinaryOperator::Lt => self.classify_comparison(left, right, "<"),
                BinaryOperator::LtEq => self.classify_comparison(left, right, "<="),
                _ => {}
            },
            Expr::InList {
                expr: col,
                list,
                negated,
            } => self.classify_in(col, list, *negated),
            Expr::Like {
                negated,
                expr: col,
                pattern,
                ..
            } => self.classify_like(col, pattern, *negated),
            Expr::Between {
                expr: col,
                negated: false,
                low,
                high,
            } => self.classify_between(col, low, high),
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                if let Some(operand) = operand {
                    self.walk(operand, next);
                }
                for condition in conditions {
                    self.walk(condition, next);
                }
                for result in results {
                    self.walk(result, next);
                }
                if let Some(else_result) = else_result {
                    self.walk(else_result, next);
                }
            }
            Expr::Tuple(exprs) => {
                for item in exprs {
                    self.walk(item, next);
                }
            }
            // Subqueries classify their own predicates.
            Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => {}
            _ => {}
        }
    }

    fn classify_comparison(&mut self, left: &Expr, right: &Expr, op: &str) {
        let left_col = column_side(left);
        let right_col = column_side(right);
        // Column-to-column comparisons are join-style equalities; the
        // renderer handles them, no constant filter is recorded.
        let (col, value_expr, op) = match (left_col, right_col) {
            (Some(_), Some(_)) | (None, None) => return,
            (Some(col), None) => (col, right, op.to_string()),
            (None, Some(col)) => (col, left, flip_operator(op)),
        };

        let side = value_side(value_expr);
        if side.values.is_empty() {
            return;
        }

        let Some(base) = self.resolve(&col) else {
            return;
        };

        // Ranges take a single bound; a tuple on the value side of an
        // equality yields one condition per element.
        let values: Vec<JsonValue> = if op == "=" {
            side.values.clone()
        } else {
            side.values.iter().take(1).cloned().collect()
        };
        for value in values {
            let mut cond = Condition::new(&op);
            cond.value = Some(value);
            apply_column_stack(&mut cond, &col.stack);
            apply_value_stack(&mut cond, &side.stack);
            self.emit(base.clone(), &col.column, cond);
        }
    }

    fn classify_in(&mut self, col_expr: &Expr, list: &[Expr], negated: bool) {
        let Some(col) = column_side(col_expr) else {
            return;
        };

        let mut values = Vec::new();
        let mut value_fns: Vec<Option<String>> = Vec::new();
        let mut args_list: Vec<Vec<JsonValue>> = Vec::new();
        let mut stack_list: Vec<Vec<FunctionStackEntry>> = Vec::new();
        for element in list {
            let side = value_side(element);
            // Elements without a literal payload are dropped, matching
            // the tuple handling of literal extraction.
            let Some(value) = side.values.into_iter().next() else {
                continue;
            };
            values.push(value);
            value_fns.push(side.stack.first().map(|entry| entry.name.clone()));
            args_list.push(side.stack.first().map(|entry| entry.args.clone()).unwrap_or_default());
            stack_list.push(side.stack);
        }
        if values.is_empty() {
            return;
        }

        let Some(base) = self.resolve(&col) else {
            return;
        };

        let mut cond = Condition::new(if negated { "not in" } else { "in" });
        cond.values = Some(values);
        if value_fns.iter().any(Option::is_some) {
            cond.value_fns = Some(value_fns);
        }
        if args_list.iter().any(|args| !args.is_empty()) {
            cond.value_fn_args_list = Some(args_list);
        }
        if stack_list.iter().any(|stack| !stack.is_empty()) {
            cond.value_fn_stack_list = Some(stack_list);
        }
        apply_column_stack(&mut cond, &col.stack);
        self.emit(base, &col.column, cond);
    }

    fn classify_like(&mut self, col_expr: &Expr, pattern: &Expr, negated: bool) {
        let Some(col) = column_side(col_expr) else {
            return;
        };
        let side = value_side(pattern);
        let Some(value) = side.values.first().cloned() else {
            return;
        };
        let Some(base) = self.resolve(&col) else {
            return;
        };

        let mut cond = Condition::new(if negated { "not like" } else { "like" });
        cond.value = Some(value);
        apply_column_stack(&mut cond, &col.stack);
        apply_value_stack(&mut cond, &side.stack);
        self.emit(base, &col.column, cond);
    }

    fn classify_between(&mut self, col_expr: &Expr, low: &Expr, high: &Expr) {
        let Some(col) = column_side(col_expr) else {
            return;
        };
        let Some(base) = self.resolve(&col) else {
            return;
        };

        let mut cond = Condition::new("between");
        cond.low = Some(bound_value(low));
        cond.high = Some(bound_value(high));
        apply_column_stack(&mut cond, &col.stack);
        self.emit(base, &col.column, cond);
    }

    fn resolve(&self, col: &ColumnSide) -> Option<QualifiedName> {
        if col.qualifier.is_empty() {
            match self.stack.resolve_unqualified() {
                UnqualifiedResolution::Unique(base) => Some(base),
                _ => None,
            }
        } else {
            let full = col.qualifier.join(".");
            let last = col.qualifier.last().map(String::as_str).unwrap_or("");
            self.stack
                .resolve_qualifier(&full, last, &col.column)
                .map(|resolution| resolution.base().clone())
        }
    }

    fn emit(&mut self, base: QualifiedName, column: &str, cond: Condition) {
        // A classified predicate is also a column usage.
        self.variables
            .entry(base.clone())
            .or_default()
            .insert(column.to_string());

        let list = self
            .values
            .entry(base)
            .or_default()
            .entry(column.to_string())
            .or_default();
        if !list.contains(&cond) {
            list.push(cond);
        }
    }
}

fn flip_operator(op: &str) -> String {
    match op {
        ">" => "<",
        ">=" => "<=",
        "<" => ">",
        "<=" => ">=",
        other => other,
    }
    .to_string()
}

fn apply_column_stack(cond: &mut Condition, stack: &[FunctionStackEntry]) {
    let Some(outer) = stack.first() else {
        return;
    };
    cond.fn_name = Some(outer.name.to_lowercase());
    if !outer.args.is_empty() {
        cond.fn_args = Some(outer.args.clone());
    }
    cond.fn_stack = Some(stack.to_vec());
}

fn apply_value_stack(cond: &mut Condition, stack: &[FunctionStackEntry]) {
    let Some(outer) = stack.first() else {
        return;
    };
    cond.value_fn = Some(outer.name.to_lowercase());
    if !outer.args.is_empty() {
        cond.value_fn_args = Some(outer.args.clone());
    }
    cond.value_fn_stack = Some(stack.to_vec());
}

fn strip_nested(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) => strip_nested(inner),
        other => other,
    }
}

/// Peels one function wrapper off an expression, returning the stack
/// entry and the sub-expression to descend into. The descent target is
/// the leading value expression; every remaining argument is recorded as
/// a parsed literal or rendered SQL.
fn peel_one(expr: &Expr) -> Option<(FunctionStackEntry, &Expr)> {
    match expr {
        Expr::Function(function) => {
            if function.over.is_some() {
                return None;
            }
            let name = canonical_function_name(&function.name.to_string());
            let exprs = function_arg_exprs(function);
            let (first, rest) = exprs.split_first()?;
            let args = rest.iter().map(|&arg| literal_or_rendered(arg)).collect();
            Some((FunctionStackEntry { name, args }, *first))
        }
        Expr::Extract { field, expr, .. } => Some((
            FunctionStackEntry {
                name: "EXTRACT".to_string(),
                args: vec![json!(field.to_string())],
            },
            expr.as_ref(),
        )),
        Expr::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => {
            let mut args = Vec::new();
            if let Some(from) = substring_from {
                args.push(literal_or_rendered(from));
            }
            if let Some(length) = substring_for {
                args.push(literal_or_rendered(length));
            }
            Some((
                FunctionStackEntry {
                    name: "SUBSTR".to_string(),
                    args,
                },
                expr.as_ref(),
            ))
        }
        Expr::Trim {
            expr, trim_what, ..
        } => {
            let args = trim_what
                .iter()
                .map(|what| literal_or_rendered(what))
                .collect();
            Some((
                FunctionStackEntry {
                    name: "TRIM".to_string(),
                    args,
                },
                expr.as_ref(),
            ))
        }
        Expr::Cast {
            kind: CastKind::Cast,
            expr,
            data_type,
            ..
        } => Some((
            FunctionStackEntry {
                name: "CAST".to_string(),
                args: vec![json!(data_type.to_string())],
            },
            expr.as_ref(),
        )),
        Expr::Ceil { expr, .. } => Some((
            FunctionStackEntry {
                name: "CEIL".to_string(),
                args: vec![],
            },
            expr.as_ref(),
        )),
        Expr::Floor { expr, .. } => Some((
            FunctionStackEntry {
                name: "FLOOR".to_string(),
                args: vec![],
            },
            expr.as_ref(),
        )),
        _ => None,
    }
}

fn function_arg_exprs(function: &sqlparser::ast::Function) -> Vec<&Expr> {
    let FunctionArguments::List(list) = &function.args else {
        return Vec::new();
    };
    list.args
        .iter()
        .filter_map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
            | FunctionArg::Named {
                arg: FunctionArgExpr::Expr(expr),
                ..
            } => Some(expr),
            _ => None,
        })
        .collect()
}

fn literal_or_rendered(expr: &Expr) -> JsonValue {
    literal_scalar(expr).unwrap_or_else(|| json!(expr.to_string()))
}

/// Unwraps a predicate side down to a column reference, if there is one.
fn column_side(expr: &Expr) -> Option<ColumnSide> {
    let mut stack = Vec::new();
    let mut current = expr;
    for _ in 0..MAX_RECURSION_DEPTH {
        match current {
            Expr::Nested(inner) => current = inner.as_ref(),
            Expr::Identifier(ident) => {
                return Some(ColumnSide {
                    qualifier: Vec::new(),
                    column: ident.value.clone(),
                    stack,
                })
            }
            Expr::CompoundIdentifier(parts) => return compound_column(parts, stack),
            _ => match peel_one(current) {
                Some((entry, inner)) => {
                    stack.push(entry);
                    current = inner;
                }
                None => return None,
            },
        }
    }
    None
}

fn compound_column(parts: &[Ident], stack: Vec<FunctionStackEntry>) -> Option<ColumnSide> {
    let column = parts.last()?.value.clone();
    let qualifier = parts[..parts.len() - 1]
        .iter()
        .map(|ident| ident.value.clone())
        .collect();
    Some(ColumnSide {
        qualifier,
        column,
        stack,
    })
}

/// Unwraps a predicate side down to its literal value(s).
fn value_side(expr: &Expr) -> ValueSide {
    let mut stack = Vec::new();
    let mut current = expr;
    for _ in 0..MAX_RECURSION_DEPTH {
        if let Some(value) = literal_scalar(current) {
            return ValueSide {
                stack,
                values: vec![value],
            };
        }
        match current {
            Expr::Nested(inner) => current = inner.as_ref(),
            Expr::Tuple(elements) => {
                let values = elements.iter().filter_map(literal_scalar).collect();
                return ValueSide { stack, values };
            }
            _ => match peel_one(current) {
                Some((entry, inner)) => {
                    stack.push(entry);
                    current = inner;
                }
                None => {
                    return ValueSide {
                        stack,
                        values: Vec::new(),
                    }
                }
            },
        }
    }
    ValueSide {
        stack,
        values: Vec::new(),
    }
}

/// BETWEEN bounds keep their rendered SQL when they are not literals.
fn bound_value(expr: &Expr) -> JsonValue {
    literal_scalar(expr).unwrap_or_else(|| json!(expr.to_string()))
}

/// Parses a literal node into a JSON value.
///
/// Numbers become integers when they parse as such, then floats, then the
/// raw digits. Date/time literals and casts to date/time types keep their
/// rendered SQL form (`DATE '2024-01-01'`). Parentheses are transparent.
pub(crate) fn literal_scalar(expr: &Expr) -> Option<JsonValue> {
    match expr {
        Expr::Value(value) => match value {
            Value::Number(text, _) => Some(parse_number(text)),
            Value::SingleQuotedString(text) | Value::DoubleQuotedString(text) => {
                Some(json!(text))
            }
            Value::NationalStringLiteral(text) | Value::EscapedStringLiteral(text) => {
                Some(json!(text))
            }
            _ => None,
        },
        Expr::TypedString { data_type, .. } if is_datetime_type(data_type) => {
            Some(json!(expr.to_string()))
        }
        Expr::Cast {
            kind: CastKind::Cast,
            data_type,
            ..
        } if is_datetime_type(data_type) => Some(json!(expr.to_string())),
        Expr::Nested(inner) => literal_scalar(inner),
        _ => None,
    }
}

fn parse_number(text: &str) -> JsonValue {
    if let Ok(int) = text.parse::<i64>() {
        return json!(int);
    }
    if let Ok(float) = text.parse::<f64>() {
        return json!(float);
    }
    json!(text)
}

fn is_datetime_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Date | DataType::Timestamp(_, _) | DataType::Time(_, _) | DataType::Datetime(_)
    )
}
