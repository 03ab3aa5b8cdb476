//! Pseudocode rendering for WHERE, HAVING, and JOIN predicates.
//!
//! The renderer is total: every expression produces a string. Known shapes
//! render structurally with columns qualified to their resolved base
//! tables; anything else falls back to the node's own SQL with alias→base
//! substitution applied, so a rendering failure never aborts the run.

use super::functions::{canonical_function_name, renders_without_parens};
use super::scope::{first_select_of, ScopeStack, UnqualifiedResolution};
use super::visitor::join_constraint;
use super::{SelectLabels, MAX_RECURSION_DEPTH};
use regex::Regex;
use sqlparser::ast::{
    BinaryOperator, CastKind, DuplicateTreatment, Expr, FunctionArg, FunctionArgExpr,
    FunctionArguments, Ident, JoinConstraint, Query, Select, TableWithJoins, UnaryOperator, Value,
};

pub(crate) struct Renderer<'a> {
    pub(crate) stack: &'a ScopeStack,
    pub(crate) labels: &'a SelectLabels,
}

impl<'a> Renderer<'a> {
    pub(crate) fn render_where(&self, select: &Select) -> String {
        select
            .selection
            .as_ref()
            .map(|expr| self.render_expr(expr, 0))
            .unwrap_or_default()
    }

    pub(crate) fn render_having(&self, select: &Select) -> String {
        select
            .having
            .as_ref()
            .map(|expr| self.render_expr(expr, 0))
            .unwrap_or_default()
    }

    /// Join pseudocode: per ON clause, every explicit equality child is
    /// rendered and AND-combined; an ON without equalities renders whole.
    pub(crate) fn render_joins(&self, select: &Select) -> String {
        let mut conditions = Vec::new();
        for table in &select.from {
            self.collect_join_conditions(table, &mut conditions);
        }
        combine(conditions)
    }

    fn collect_join_conditions(&self, table: &TableWithJoins, out: &mut Vec<String>) {
        if let sqlparser::ast::TableFactor::NestedJoin {
            table_with_joins, ..
        } = &table.relation
        {
            self.collect_join_conditions(table_with_joins, out);
        }
        for join in &table.joins {
            if let sqlparser::ast::TableFactor::NestedJoin {
                table_with_joins, ..
            } = &join.relation
            {
                self.collect_join_conditions(table_with_joins, out);
            }
            if let Some(JoinConstraint::On(on)) = join_constraint(&join.join_operator) {
                let mut equalities = Vec::new();
                self.collect_equalities(on, &mut equalities);
                let condition = if equalities.is_empty() {
                    self.render_expr(on, 0)
                } else {
                    combine(equalities)
                };
                if !condition.is_empty() {
                    out.push(condition);
                }
            }
        }
    }

    fn collect_equalities(&self, expr: &Expr, out: &mut Vec<String>) {
        match expr {
            Expr::Nested(inner) => self.collect_equalities(inner, out),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => self.collect_equalities(inner, out),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } => out.push(format!(
                "({} == {})",
                self.render_expr(left, 0),
                self.render_expr(right, 0)
            )),
            Expr::BinaryOp { left, op, right }
                if matches!(op, BinaryOperator::And | BinaryOperator::Or) =>
            {
                self.collect_equalities(left, out);
                self.collect_equalities(right, out);
            }
            _ => {}
        }
    }

    pub(crate) fn render_expr(&self, expr: &Expr, depth: usize) -> String {
        if depth > MAX_RECURSION_DEPTH {
            return self.fallback(expr);
        }
        let next = depth + 1;

        match expr {
            Expr::Identifier(ident) => self.render_unqualified(ident),
            Expr::CompoundIdentifier(parts) => self.render_qualified(parts),
            Expr::Value(value) => render_value(value),
            Expr::TypedString { .. } => expr.to_string(),
            Expr::Nested(inner) => format!("({})", self.render_expr(inner, next)),
            Expr::BinaryOp { left, op, right } => {
                let symbol = match op {
                    BinaryOperator::Eq => "==",
                    BinaryOperator::NotEq => "!=",
                    BinaryOperator::Gt => ">",
                    BinaryOperator::GtEq => ">=",
                    BinaryOperator::Lt => "<",
                    BinaryOperator::LtEq => "<=",
                    BinaryOperator::And => "AND",
                    BinaryOperator::Or => "OR",
                    _ => return self.fallback(expr),
                };
                format!(
                    "({} {} {})",
                    self.render_expr(left, next),
                    symbol,
                    self.render_expr(right, next)
                )
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => format!("(NOT {})", self.render_expr(inner, next)),
            Expr::InList {
                expr: col,
                list,
                negated,
            } => {
                let rendered: Vec<String> = list
                    .iter()
                    .map(|item| self.render_expr(item, next))
                    .collect();
                format!(
                    "({} {}IN ({}))",
                    self.render_expr(col, next),
                    if *negated { "NOT " } else { "" },
                    rendered.join(", ")
                )
            }
            Expr::InSubquery {
                expr: col,
                subquery,
                negated,
            } => match self.label_for_query(subquery) {
                Some(label) => format!(
                    "({} {}IN (Operation {}))",
                    self.render_expr(col, next),
                    if *negated { "NOT " } else { "" },
                    label
                ),
                None => self.fallback(expr),
            },
            Expr::Between {
                expr: col,
                negated,
                low,
                high,
            } => format!(
                "({} {}BETWEEN {} AND {})",
                self.render_expr(col, next),
                if *negated { "NOT " } else { "" },
                self.render_expr(low, next),
                self.render_expr(high, next)
            ),
            Expr::Like {
                negated,
                expr: col,
                pattern,
                ..
            } => format!(
                "({} {}LIKE {})",
                self.render_expr(col, next),
                if *negated { "NOT " } else { "" },
                self.render_expr(pattern, next)
            ),
            Expr::Exists { subquery, negated } => {
                let exists = match self.label_for_query(subquery) {
                    Some(label) => format!("EXISTS(Operation {label})"),
                    None => format!("EXISTS({subquery})"),
                };
                if *negated {
                    format!("(NOT {exists})")
                } else {
                    exists
                }
            }
            Expr::Subquery(subquery) => match self.label_for_query(subquery) {
                Some(label) => format!("(Operation {label})"),
                None => self.fallback(expr),
            },
            Expr::Extract { field, expr, .. } => {
                format!("EXTRACT({} FROM {})", field, self.render_expr(expr, next))
            }
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                let mut args = vec![self.render_expr(expr, next)];
                if let Some(from) = substring_from {
                    args.push(self.render_expr(from, next));
                }
                if let Some(length) = substring_for {
                    args.push(self.render_expr(length, next));
                }
                format!("SUBSTR({})", args.join(", "))
            }
            Expr::Trim {
                expr: inner,
                trim_where: None,
                trim_what: None,
                ..
            } => format!("TRIM({})", self.render_expr(inner, next)),
            Expr::Cast {
                kind: CastKind::Cast,
                expr: inner,
                data_type,
                ..
            } => {
                if super::predicates::literal_scalar(expr).is_some() {
                    expr.to_string()
                } else {
                    format!("CAST({} AS {})", self.render_expr(inner, next), data_type)
                }
            }
            Expr::Function(function) => self.render_function(expr, function, next),
            Expr::Tuple(exprs) => {
                let rendered: Vec<String> =
                    exprs.iter().map(|item| self.render_expr(item, next)).collect();
                format!("({})", rendered.join(", "))
            }
            _ => self.fallback(expr),
        }
    }

    fn render_function(
        &self,
        expr: &Expr,
        function: &sqlparser::ast::Function,
        depth: usize,
    ) -> String {
        // Windowed calls keep their full SQL; the OVER clause has no
        // pseudocode form.
        if function.over.is_some() {
            return self.fallback(expr);
        }
        let name = canonical_function_name(&function.name.to_string());
        match &function.args {
            FunctionArguments::None => name,
            FunctionArguments::Subquery(_) => self.fallback(expr),
            FunctionArguments::List(list) => {
                if renders_without_parens(&name) && list.args.is_empty() {
                    return name;
                }
                let mut rendered = Vec::new();
                for arg in &list.args {
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(e),
                            ..
                        } => rendered.push(self.render_expr(e, depth)),
                        FunctionArg::Unnamed(FunctionArgExpr::Wildcard)
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Wildcard,
                            ..
                        } => rendered.push("*".to_string()),
                        FunctionArg::Unnamed(FunctionArgExpr::QualifiedWildcard(n))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::QualifiedWildcard(n),
                            ..
                        } => rendered.push(format!("{n}.*")),
                    }
                }
                let distinct = match list.duplicate_treatment {
                    Some(DuplicateTreatment::Distinct) => "DISTINCT ",
                    _ => "",
                };
                format!("{}({}{})", name, distinct, rendered.join(", "))
            }
        }
    }

    fn render_unqualified(&self, ident: &Ident) -> String {
        match self.stack.resolve_unqualified() {
            UnqualifiedResolution::Unique(base) => format!("{}.{}", base, ident.value),
            _ => ident.value.clone(),
        }
    }

    /// Columns render fully qualified. When resolution fails the visible
    /// qualifier is kept; a qualified reference never loses its prefix.
    fn render_qualified(&self, parts: &[Ident]) -> String {
        let Some(column) = parts.last() else {
            return String::new();
        };
        let qualifier: Vec<&str> = parts[..parts.len() - 1]
            .iter()
            .map(|ident| ident.value.as_str())
            .collect();
        let full = qualifier.join(".");
        let last = qualifier.last().copied().unwrap_or("");
        match self.stack.resolve_qualifier(&full, last, &column.value) {
            Some(resolution) => format!("{}.{}", resolution.base(), column.value),
            None => format!("{}.{}", full, column.value),
        }
    }

    fn label_for_query(&self, query: &Query) -> Option<&str> {
        first_select_of(query).and_then(|select| self.labels.get(select))
    }

    /// Last resort: the node's own SQL with alias.column occurrences
    /// rewritten to base.column.
    fn fallback(&self, expr: &Expr) -> String {
        let mut text = expr.to_string();
        for (alias, base) in self.stack.substitution_pairs() {
            let pattern = format!(r"(?i)(^|[^.\w]){}\.", regex::escape(&alias));
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            let replacement = format!("${{1}}{base}.");
            text = re.replace_all(&text, replacement.as_str()).into_owned();
        }
        text
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Number(text, _) => text.clone(),
        Value::SingleQuotedString(text) | Value::DoubleQuotedString(text) => {
            format!("'{text}'")
        }
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

fn combine(conditions: Vec<String>) -> String {
    match conditions.len() {
        0 => String::new(),
        1 => conditions.into_iter().next().unwrap(),
        _ => format!("({})", conditions.join(") AND (")),
    }
}
