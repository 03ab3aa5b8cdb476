//! Visitor trait for whole-statement AST traversal.
//!
//! The default methods perform a full recursive descent, including into
//! subqueries; statement-wide collectors (CTE names, table references,
//! function inventory) override the nodes they care about and delegate to
//! the `walk_*` functions for the rest.
//!
//! Scope-sensitive walks (column attribution, predicate classification)
//! do not use this trait: they stop at subquery boundaries and live with
//! their owners.

use sqlparser::ast::{
    Cte, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Join, JoinConstraint,
    JoinOperator, MergeAction, MergeInsertKind, Query, Select, SelectItem, SetExpr, Statement,
    TableFactor, TableWithJoins, Values, WindowType,
};

pub(crate) trait Visitor: Sized {
    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    fn visit_query(&mut self, query: &Query) {
        walk_query(self, query);
    }

    fn visit_cte(&mut self, cte: &Cte) {
        walk_cte(self, cte);
    }

    fn visit_set_expr(&mut self, set_expr: &SetExpr) {
        walk_set_expr(self, set_expr);
    }

    fn visit_select(&mut self, select: &Select) {
        walk_select(self, select);
    }

    fn visit_table_with_joins(&mut self, table: &TableWithJoins) {
        walk_table_with_joins(self, table);
    }

    fn visit_table_factor(&mut self, table: &TableFactor) {
        walk_table_factor(self, table);
    }

    fn visit_join(&mut self, join: &Join) {
        walk_join(self, join);
    }

    fn visit_values(&mut self, values: &Values) {
        walk_values(self, values);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub(crate) fn walk_statement<V: Visitor>(v: &mut V, statement: &Statement) {
    match statement {
        Statement::Query(query) => v.visit_query(query),
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                v.visit_query(source);
            }
        }
        Statement::CreateTable(create) => {
            if let Some(query) = &create.query {
                v.visit_query(query);
            }
        }
        Statement::CreateView { query, .. } => v.visit_query(query),
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => {
            v.visit_table_with_joins(table);
            if let Some(from) = from {
                v.visit_table_with_joins(from);
            }
            for assignment in assignments {
                v.visit_expr(&assignment.value);
            }
            if let Some(selection) = selection {
                v.visit_expr(selection);
            }
        }
        Statement::Delete(delete) => {
            let tables = match &delete.from {
                sqlparser::ast::FromTable::WithFromKeyword(tables)
                | sqlparser::ast::FromTable::WithoutKeyword(tables) => tables,
            };
            for table in tables {
                v.visit_table_with_joins(table);
            }
            if let Some(using) = &delete.using {
                for table in using {
                    v.visit_table_with_joins(table);
                }
            }
            if let Some(selection) = &delete.selection {
                v.visit_expr(selection);
            }
        }
        Statement::Merge {
            table,
            source,
            on,
            clauses,
            ..
        } => {
            v.visit_table_factor(table);
            v.visit_table_factor(source);
            v.visit_expr(on);
            for clause in clauses {
                if let Some(predicate) = &clause.predicate {
                    v.visit_expr(predicate);
                }
                match &clause.action {
                    MergeAction::Insert(insert) => {
                        if let MergeInsertKind::Values(values) = &insert.kind {
                            v.visit_values(values);
                        }
                    }
                    MergeAction::Update { assignments } => {
                        for assignment in assignments {
                            v.visit_expr(&assignment.value);
                        }
                    }
                    MergeAction::Delete => {}
                }
            }
        }
        Statement::Call(function) => {
            if let FunctionArguments::List(list) = &function.args {
                for arg in &list.args {
                    if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(expr),
                        ..
                    } = arg
                    {
                        v.visit_expr(expr);
                    }
                }
            }
        }
        _ => {}
    }
}

pub(crate) fn walk_query<V: Visitor>(v: &mut V, query: &Query) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            v.visit_cte(cte);
        }
    }
    v.visit_set_expr(&query.body);
    if let Some(order_by) = &query.order_by {
        for order in &order_by.exprs {
            v.visit_expr(&order.expr);
        }
    }
}

pub(crate) fn walk_cte<V: Visitor>(v: &mut V, cte: &Cte) {
    v.visit_query(&cte.query);
}

pub(crate) fn walk_set_expr<V: Visitor>(v: &mut V, set_expr: &SetExpr) {
    match set_expr {
        SetExpr::Select(select) => v.visit_select(select),
        SetExpr::Query(query) => v.visit_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            v.visit_set_expr(left);
            v.visit_set_expr(right);
        }
        SetExpr::Values(values) => v.visit_values(values),
        SetExpr::Insert(statement) => v.visit_statement(statement),
        _ => {}
    }
}

pub(crate) fn walk_select<V: Visitor>(v: &mut V, select: &Select) {
    for table in &select.from {
        v.visit_table_with_joins(table);
    }
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                v.visit_expr(expr);
            }
            SelectItem::QualifiedWildcard(..) | SelectItem::Wildcard(_) => {}
        }
    }
    if let Some(selection) = &select.selection {
        v.visit_expr(selection);
    }
    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        for expr in exprs {
            v.visit_expr(expr);
        }
    }
    if let Some(having) = &select.having {
        v.visit_expr(having);
    }
    if let Some(qualify) = &select.qualify {
        v.visit_expr(qualify);
    }
}

pub(crate) fn walk_table_with_joins<V: Visitor>(v: &mut V, table: &TableWithJoins) {
    v.visit_table_factor(&table.relation);
    for join in &table.joins {
        v.visit_join(join);
    }
}

pub(crate) fn walk_table_factor<V: Visitor>(v: &mut V, table: &TableFactor) {
    match table {
        TableFactor::Derived { subquery, .. } => v.visit_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => v.visit_table_with_joins(table_with_joins),
        _ => {}
    }
}

pub(crate) fn walk_join<V: Visitor>(v: &mut V, join: &Join) {
    v.visit_table_factor(&join.relation);
    if let Some(JoinConstraint::On(expr)) = join_constraint(&join.join_operator) {
        v.visit_expr(expr);
    }
}

pub(crate) fn walk_values<V: Visitor>(v: &mut V, values: &Values) {
    for row in &values.rows {
        for expr in row {
            v.visit_expr(expr);
        }
    }
}

/// Returns the constraint of a join operator, when it carries one.
pub(crate) fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Inner(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint) => Some(constraint),
        _ => None,
    }
}

pub(crate) fn walk_expr<V: Visitor>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::UnaryOp { expr, .. } => v.visit_expr(expr),
        Expr::Nested(expr) => v.visit_expr(expr),
        Expr::IsNull(expr) | Expr::IsNotNull(expr) => v.visit_expr(expr),
        Expr::InList { expr, list, .. } => {
            v.visit_expr(expr);
            for item in list {
                v.visit_expr(item);
            }
        }
        Expr::InSubquery {
            expr, subquery, ..
        } => {
            v.visit_expr(expr);
            v.visit_query(subquery);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            v.visit_expr(expr);
            v.visit_expr(low);
            v.visit_expr(high);
        }
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            v.visit_expr(expr);
            v.visit_expr(pattern);
        }
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            if let Some(operand) = operand {
                v.visit_expr(operand);
            }
            for condition in conditions {
                v.visit_expr(condition);
            }
            for result in results {
                v.visit_expr(result);
            }
            if let Some(else_result) = else_result {
                v.visit_expr(else_result);
            }
        }
        Expr::Cast { expr, .. } => v.visit_expr(expr),
        Expr::Extract { expr, .. } => v.visit_expr(expr),
        Expr::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => {
            v.visit_expr(expr);
            if let Some(from) = substring_from {
                v.visit_expr(from);
            }
            if let Some(length) = substring_for {
                v.visit_expr(length);
            }
        }
        Expr::Trim {
            expr, trim_what, ..
        } => {
            v.visit_expr(expr);
            if let Some(what) = trim_what {
                v.visit_expr(what);
            }
        }
        Expr::Position { expr, r#in } => {
            v.visit_expr(expr);
            v.visit_expr(r#in);
        }
        Expr::Ceil { expr, .. } | Expr::Floor { expr, .. } => v.visit_expr(expr),
        Expr::Function(function) => {
            if let FunctionArguments::List(list) = &function.args {
                for arg in &list.args {
                    if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(expr),
                        ..
                    } = arg
                    {
                        v.visit_expr(expr);
                    }
                }
            }
            if let FunctionArguments::Subquery(query) = &function.args {
                v.visit_query(query);
            }
            if let Some(filter) = &function.filter {
                v.visit_expr(filter);
            }
            if let Some(WindowType::WindowSpec(spec)) = &function.over {
                for expr in &spec.partition_by {
                    v.visit_expr(expr);
                }
                for order in &spec.order_by {
                    v.visit_expr(&order.expr);
                }
            }
        }
        Expr::Tuple(exprs) => {
            for expr in exprs {
                v.visit_expr(expr);
            }
        }
        Expr::Subquery(query) => v.visit_query(query),
        Expr::Exists { subquery, .. } => v.visit_query(subquery),
        _ => {}
    }
}
