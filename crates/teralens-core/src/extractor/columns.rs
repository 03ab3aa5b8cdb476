//! Column attribution: records which columns of which base tables a
//! SELECT touches, and warns about references it cannot place.
//!
//! The walk covers one SELECT's own clauses and stops at subquery
//! boundaries; nested SELECTs attribute their own references with the
//! ancestor scopes still visible on the stack.

use super::scope::{Resolution, ScopeStack, UnqualifiedResolution};
use super::visitor::join_constraint;
use super::MAX_RECURSION_DEPTH;
use crate::types::QualifiedName;
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Ident, JoinConstraint,
    ObjectName, OrderByExpr, Select, SelectItem, WindowType,
};
use std::collections::{BTreeSet, HashMap};

/// Warning prefixes shared with the report consumers.
pub(crate) mod warning_codes {
    pub(crate) const SELECT_STAR: &str = "select_star_used";
    pub(crate) const AMBIGUOUS_COLUMN: &str = "ambiguous_column_origin";
    pub(crate) const RECURSION_LIMIT: &str = "recursion_limit";
}

pub(crate) struct ColumnAttributor<'a> {
    pub(crate) stack: &'a ScopeStack,
    pub(crate) variables: &'a mut HashMap<QualifiedName, BTreeSet<String>>,
    pub(crate) warnings: &'a mut Vec<String>,
    pub(crate) depth_warned: bool,
}

impl<'a> ColumnAttributor<'a> {
    pub(crate) fn new(
        stack: &'a ScopeStack,
        variables: &'a mut HashMap<QualifiedName, BTreeSet<String>>,
        warnings: &'a mut Vec<String>,
    ) -> Self {
        Self {
            stack,
            variables,
            warnings,
            depth_warned: false,
        }
    }

    /// Records every column and star reference in the SELECT's clauses.
    pub(crate) fn record_select(&mut self, select: &Select, order_by: Option<&[OrderByExpr]>) {
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.walk(expr, 0);
                }
                SelectItem::QualifiedWildcard(name, _) => self.qualified_star(name),
                SelectItem::Wildcard(_) => self.bare_star(),
            }
        }
        for table in &select.from {
            for join in &table.joins {
                if let Some(JoinConstraint::On(on)) = join_constraint(&join.join_operator) {
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
        if let Some(order_by) = order_by {
            for order in order_by {
                self.walk(&order.expr, 0);
            }
        }
    }

    fn record(&mut self, base: QualifiedName, column: &str) {
        self.variables
            .entry(base)
            .or_default()
            .insert(column.to_string());
    }

    /// A bare `*` attributes to every base table in the local FROM.
    fn bare_star(&mut self) {
        let bases = self.stack.local_bases();
        if bases.is_empty() {
            self.warnings.push(format!(
                "{}: '*' with no FROM tables in scope",
                warning_codes::SELECT_STAR
            ));
            return;
        }
        for base in bases {
            self.warnings.push(format!(
                "{}: table {} has '*' referenced",
                warning_codes::SELECT_STAR,
                base
            ));
            self.record(base, "*");
        }
    }

    /// A qualified `t.*` attributes to the base resolved from `t`.
    fn qualified_star(&mut self, name: &ObjectName) {
        let full = name
            .0
            .iter()
            .map(|ident| ident.value.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let last = name.0.last().map(|ident| ident.value.as_str()).unwrap_or("");
        match self.stack.resolve_qualifier(&full, last, "*") {
            Some(resolution) => {
                let base = resolution.base().clone();
                self.warnings.push(format!(
                    "{}: table {} has '*' referenced",
                    warning_codes::SELECT_STAR,
                    base
                ));
                self.record(base, "*");
            }
            None => self.warnings.push(format!(
                "{}: could not resolve qualifier '{}' for star",
                warning_codes::AMBIGUOUS_COLUMN,
                full
            )),
        }
    }

    fn qualified_column(&mut self, parts: &[Ident]) {
        let column = match parts.last() {
            Some(last) => last.value.clone(),
            None => return,
        };
        let qualifier: Vec<&str> = parts[..parts.len() - 1]
            .iter()
            .map(|ident| ident.value.as_str())
            .collect();
        let full = qualifier.join(".");
        let last = qualifier.last().copied().unwrap_or("");
        match self.stack.resolve_qualifier(&full, last, &column) {
            Some(Resolution::Table(base)) => self.record(base, &column),
            // Resolved through a derived table: the inner SELECT already
            // records the real column under its base.
            Some(_) => {}
            None => self.warnings.push(format!(
                "{}: could not resolve qualifier '{}' for column '{}'",
                warning_codes::AMBIGUOUS_COLUMN,
                full, column
            )),
        }
    }

    fn unqualified_column(&mut self, column: &str) {
        match self.stack.resolve_unqualified() {
            UnqualifiedResolution::Unique(base) => self.record(base, column),
            UnqualifiedResolution::Ambiguous => self.warnings.push(format!(
                "{}: column '{}' is ambiguous across multiple tables in scope",
                warning_codes::AMBIGUOUS_COLUMN,
                column
            )),
            UnqualifiedResolution::NoTables => self.warnings.push(format!(
                "{}: column '{}' with no FROM tables in scope",
                warning_codes::AMBIGUOUS_COLUMN,
                column
            )),
        }
    }

    fn depth_limit(&mut self) {
        if !self.depth_warned {
            self.depth_warned = true;
            self.warnings.push(format!(
                "{}: expression nesting exceeds {}; some references were skipped",
                warning_codes::RECURSION_LIMIT,
                MAX_RECURSION_DEPTH
            ));
        }
    }

    fn walk(&mut self, expr: &Expr, depth: usize) {
        if depth > MAX_RECURSION_DEPTH {
            self.depth_limit();
            return;
        }
        let next = depth + 1;

        match expr {
            Expr::Identifier(ident) => self.unqualified_column(&ident.value),
            Expr::CompoundIdentifier(parts) => self.qualified_column(parts),
            Expr::Wildcard => self.bare_star(),
            Expr::QualifiedWildcard(name) => self.qualified_star(name),
            Expr::BinaryOp { left, right, .. } => {
                self.walk(left, next);
                self.walk(right, next);
            }
            Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => self.walk(expr, next),
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => self.walk(expr, next),
            Expr::InList { expr, list, .. } => {
                self.walk(expr, next);
                for item in list {
                    self.walk(item, next);
                }
            }
            // The subquery attributes its own references.
            Expr::InSubquery { expr, .. } => self.walk(expr, next),
            Expr::Subquery(_) | Expr::Exists { .. } => {}
            Expr::Between {
                expr, low, high, ..
            } => {
                self.walk(expr, next);
                self.walk(low, next);
                self.walk(high, next);
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
                self.walk(expr, next);
                self.walk(pattern, next);
            }
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
            Expr::Cast { expr, .. }
            | Expr::Extract { expr, .. }
            | Expr::Ceil { expr, .. }
            | Expr::Floor { expr, .. } => self.walk(expr, next),
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                self.walk(expr, next);
                if let Some(from) = substring_from {
                    self.walk(from, next);
                }
                if let Some(length) = substring_for {
                    self.walk(length, next);
                }
            }
            Expr::Trim {
                expr, trim_what, ..
            } => {
                self.walk(expr, next);
                if let Some(what) = trim_what {
                    self.walk(what, next);
                }
            }
            Expr::Position { expr, r#in } => {
                self.walk(expr, next);
                self.walk(r#in, next);
            }
            Expr::Function(function) => {
                if let FunctionArguments::List(list) = &function.args {
                    for arg in &list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(expr),
                                ..
                            } => self.walk(expr, next),
                            FunctionArg::Unnamed(FunctionArgExpr::Wildcard)
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Wildcard,
                                ..
                            } => self.bare_star(),
                            FunctionArg::Unnamed(FunctionArgExpr::QualifiedWildcard(name))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::QualifiedWildcard(name),
                                ..
                            } => self.qualified_star(name),
                        }
                    }
                }
                if let Some(filter) = &function.filter {
                    self.walk(filter, next);
                }
                if let Some(WindowType::WindowSpec(spec)) = &function.over {
                    for expr in &spec.partition_by {
                        self.walk(expr, next);
                    }
                    for order in &spec.order_by {
                        self.walk(&order.expr, next);
                    }
                }
            }
            Expr::Tuple(exprs) => {
                for expr in exprs {
                    self.walk(expr, next);
                }
            }
            _ => {}
        }
    }
}
