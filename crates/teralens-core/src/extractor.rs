//! The semantic extractor.
//!
//! Extraction runs in two phases over the parsed statements. The
//! structural pass collects CTE names, created objects, temp flags, and
//! DML write targets from every statement first, so the exclusion rules
//! applied at assembly are global. The semantic pass then records table
//! references, the function inventory, and visits every SELECT: building
//! its scope, attributing columns, classifying predicates, and rendering
//! pseudocode, with ancestor scopes kept on a stack for correlated
//! references.

use crate::error::ExtractError;
use crate::parser::parse_sql_with_dialect;
use crate::types::{
    Condition, Dialect, FunctionKind, FunctionRef, PseudocodeEntry, QualifiedName, Report,
    ReportMeta,
};
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, JoinConstraint, OrderBy,
    Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

mod collect;
mod columns;
mod functions;
mod predicates;
mod render;
mod scope;
mod visitor;


use collect::{Structural, StructuralCollector, TableRefCollector};
use columns::ColumnAttributor;
use functions::FunctionInventory;
use predicates::PredicateClassifier;
use render::Renderer;
use scope::{build_select_scope, ScopeStack};
use visitor::{join_constraint, Visitor};

/// Recursion guard for expression walks. Exceeding it degrades to the
/// fallback paths instead of overflowing the stack.
pub(crate) const MAX_RECURSION_DEPTH: usize = 100;

/// Maximum SQL input size (10MB) to prevent memory exhaustion.
const MAX_SQL_LENGTH: usize = 10 * 1024 * 1024;

/// One extraction request.
#[derive(Debug, Clone, Default)]
pub struct ExtractRequest {
    pub sql: String,
    pub dialect: Dialect,
}

impl ExtractRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            dialect: Dialect::default(),
        }
    }
}

/// Main entry point: parses the input and produces the aggregated report.
///
/// This is the strict error surface; soft mode is layered on top by the
/// caller via [`ExtractError::envelope`].
pub fn extract(request: &ExtractRequest) -> Result<Report, ExtractError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("extract", dialect = request.dialect.as_str()).entered();

    if request.sql.len() > MAX_SQL_LENGTH {
        return Err(ExtractError::Runtime(format!(
            "SQL exceeds maximum length of {} bytes ({} bytes provided)",
            MAX_SQL_LENGTH,
            request.sql.len()
        )));
    }

    let statements = parse_sql_with_dialect(&request.sql, request.dialect)?;
    let mut extractor = Extractor::new(request.dialect);
    extractor.run(&statements);
    Ok(extractor.into_report(statements.len()))
}

/// Operation labels keyed by SELECT node identity.
///
/// The AST is immutable and outlives the whole run, so node addresses are
/// stable identities; this stands in for an arena of parent-linked nodes.
#[derive(Debug, Default)]
pub(crate) struct SelectLabels {
    labels: HashMap<usize, String>,
}

impl SelectLabels {
    fn key(select: &Select) -> usize {
        select as *const Select as usize
    }

    fn insert(&mut self, select: &Select, label: String) {
        self.labels.insert(Self::key(select), label);
    }

    pub(crate) fn get(&self, select: &Select) -> Option<&str> {
        self.labels.get(&Self::key(select)).map(String::as_str)
    }
}

struct Extractor {
    dialect: Dialect,
    structural: Structural,
    tables: HashSet<QualifiedName>,
    variables: HashMap<QualifiedName, BTreeSet<String>>,
    values: HashMap<QualifiedName, HashMap<String, Vec<Condition>>>,
    functions: Vec<FunctionRef>,
    functions_seen: HashSet<(String, FunctionKind)>,
    pseudocode: BTreeMap<String, Vec<PseudocodeEntry>>,
    warnings: Vec<String>,
    labels: SelectLabels,
    next_operation: usize,
}

impl Extractor {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            structural: Structural::default(),
            tables: HashSet::new(),
            variables: HashMap::new(),
            values: HashMap::new(),
            functions: Vec::new(),
            functions_seen: HashSet::new(),
            pseudocode: BTreeMap::new(),
            warnings: Vec::new(),
            labels: SelectLabels::default(),
            next_operation: 1,
        }
    }

    fn run(&mut self, statements: &[Statement]) {
        // Structural pass over everything first: exclusion rules must not
        // depend on statement order.
        for statement in statements {
            StructuralCollector {
                acc: &mut self.structural,
            }
            .visit_statement(statement);
        }

        for statement in statements {
            TableRefCollector {
                tables: &mut self.tables,
            }
            .visit_statement(statement);
            FunctionInventory {
                functions: &mut self.functions,
                seen: &mut self.functions_seen,
            }
            .collect(statement);
        }

        for statement in statements {
            self.assign_statement_labels(statement);
            self.process_statement(statement);
        }
    }

    /// Assigns operation labels to every SELECT of the statement before
    /// any rendering, so `EXISTS(Operation x.y)` always resolves.
    fn assign_statement_labels(&mut self, statement: &Statement) {
        for query in root_queries(statement) {
            for select in collect_top_selects(query) {
                let label = self.next_operation.to_string();
                self.next_operation += 1;
                self.assign_select_labels(select, label);
            }
        }
    }

    fn assign_select_labels(&mut self, select: &Select, label: String) {
        self.labels.insert(select, label.clone());
        let mut child_index = 0usize;
        for query in clause_queries(select) {
            for child in collect_top_selects(query) {
                child_index += 1;
                self.assign_select_labels(child, format!("{label}.{child_index}"));
            }
        }
    }

    fn process_statement(&mut self, statement: &Statement) {
        for query in root_queries(statement) {
            let mut stack = ScopeStack::new();
            self.process_query(query, &mut stack);
        }
    }

    fn process_query(&mut self, query: &Query, stack: &mut ScopeStack) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                // CTE bodies cannot correlate outward; they resolve in a
                // fresh scope.
                let mut cte_stack = ScopeStack::new();
                self.process_query(&cte.query, &mut cte_stack);
            }
        }
        self.process_set_expr(&query.body, stack, query.order_by.as_ref());
    }

    fn process_set_expr(&mut self, set_expr: &SetExpr, stack: &mut ScopeStack, order_by: Option<&OrderBy>) {
        match set_expr {
            SetExpr::Select(select) => self.process_select(select, stack, order_by),
            SetExpr::Query(query) => self.process_query(query, stack),
            SetExpr::SetOperation { left, right, .. } => {
                self.process_set_expr(left, stack, None);
                self.process_set_expr(right, stack, None);
            }
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for expr in row {
                        let mut queries = Vec::new();
                        queries_in_expr(expr, &mut queries);
                        for query in queries {
                            self.process_query(query, stack);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn process_select(&mut self, select: &Select, stack: &mut ScopeStack, order_by: Option<&OrderBy>) {
        stack.push(build_select_scope(select));

        ColumnAttributor::new(stack, &mut self.variables, &mut self.warnings)
            .record_select(select, order_by.map(|order| order.exprs.as_slice()));

        PredicateClassifier {
            stack,
            values: &mut self.values,
            variables: &mut self.variables,
        }
        .scan_select(select);

        if let Some(label) = self.labels.get(select).map(str::to_string) {
            let renderer = Renderer {
                stack,
                labels: &self.labels,
            };
            let entry = PseudocodeEntry {
                join: renderer.render_joins(select),
                where_clause: renderer.render_where(select),
                having: renderer.render_having(select),
            };
            self.pseudocode.insert(format!("Operation {label}"), vec![entry]);
        }

        for query in clause_queries(select) {
            self.process_query(query, stack);
        }

        stack.pop();
    }

    fn into_report(mut self, statement_count: usize) -> Report {
        // A name recorded as temp never counts as a plain created object.
        let temp_tables = std::mem::take(&mut self.structural.temp_tables);
        self.structural
            .created_objects
            .retain(|name| !temp_tables.contains(name));
        self.structural.temp_tables = temp_tables;

        let mut tables: Vec<String> = self
            .tables
            .iter()
            .filter(|name| !self.structural.excludes(name))
            .map(ToString::to_string)
            .collect();
        tables.sort();
        tables.dedup();
        let table_set: BTreeSet<&str> = tables.iter().map(String::as_str).collect();

        let mut variables = BTreeMap::new();
        for (name, columns) in &self.variables {
            let key = name.to_string();
            if table_set.contains(key.as_str()) {
                variables.insert(key, columns.iter().cloned().collect::<Vec<_>>());
            }
        }

        let mut values = BTreeMap::new();
        for (name, columns) in &self.values {
            let key = name.to_string();
            if !table_set.contains(key.as_str()) {
                continue;
            }
            let mut sorted_columns = BTreeMap::new();
            for (column, conditions) in columns {
                let mut conditions = conditions.clone();
                conditions.sort_by_key(Condition::sort_key);
                sorted_columns.insert(column.clone(), conditions);
            }
            values.insert(key, sorted_columns);
        }

        Report {
            tables,
            variables,
            values,
            temp_tables: sorted_names(&self.structural.temp_tables),
            ctes: self.structural.ctes.iter().cloned().collect(),
            functions: self.functions,
            created_objects: sorted_names(&self.structural.created_objects),
            write_targets: sorted_names(&self.structural.write_targets),
            pseudocode: self.pseudocode,
            warnings: self.warnings,
            meta: ReportMeta {
                statements: statement_count,
                dialect: self.dialect.as_str().to_string(),
            },
        }
    }
}

fn sorted_names(names: &HashSet<QualifiedName>) -> Vec<String> {
    let mut out: Vec<String> = names.iter().map(ToString::to_string).collect();
    out.sort();
    out.dedup();
    out
}

/// Queries that root a SELECT forest within a statement: plain queries,
/// DML sources, CTAS/CREATE VIEW bodies, and subqueries inside DML
/// predicates.
fn root_queries(statement: &Statement) -> Vec<&Query> {
    match statement {
        Statement::Query(query) => vec![query.as_ref()],
        Statement::Insert(insert) => insert.source.iter().map(|query| &**query).collect(),
        Statement::CreateTable(create) => create.query.iter().map(|query| &**query).collect(),
        Statement::CreateView { query, .. } => vec![query.as_ref()],
        Statement::Update {
            assignments,
            selection,
            ..
        } => {
            let mut queries = Vec::new();
            for assignment in assignments {
                queries_in_expr(&assignment.value, &mut queries);
            }
            if let Some(selection) = selection {
                queries_in_expr(selection, &mut queries);
            }
            queries
        }
        Statement::Delete(delete) => {
            let mut queries = Vec::new();
            if let Some(selection) = &delete.selection {
                queries_in_expr(selection, &mut queries);
            }
            queries
        }
        Statement::Merge { source, .. } => match source {
            TableFactor::Derived { subquery, .. } => vec![subquery.as_ref()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// The SELECTs of a query that have no enclosing SELECT within it: CTE
/// bodies first (their WITH clause precedes the body in source order),
/// then the body sides of any set operation.
fn collect_top_selects(query: &Query) -> Vec<&Select> {
    let mut out = Vec::new();
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            out.extend(collect_top_selects(&cte.query));
        }
    }
    top_selects_of_set_expr(&query.body, &mut out);
    out
}

fn top_selects_of_set_expr<'a>(set_expr: &'a SetExpr, out: &mut Vec<&'a Select>) {
    match set_expr {
        SetExpr::Select(select) => out.push(select),
        SetExpr::Query(query) => out.extend(collect_top_selects(query)),
        SetExpr::SetOperation { left, right, .. } => {
            top_selects_of_set_expr(left, out);
            top_selects_of_set_expr(right, out);
        }
        SetExpr::Values(values) => {
            for row in &values.rows {
                for expr in row {
                    let mut queries = Vec::new();
                    queries_in_expr(expr, &mut queries);
                    for query in queries {
                        out.extend(collect_top_selects(query));
                    }
                }
            }
        }
        _ => {}
    }
}

/// Directly-nested queries of one SELECT, in clause order: projection,
/// FROM/JOIN (derived tables, then ON expressions), WHERE, GROUP BY,
/// HAVING, QUALIFY.
fn clause_queries(select: &Select) -> Vec<&Query> {
    let mut out = Vec::new();
    for item in &select.projection {
        if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
            queries_in_expr(expr, &mut out);
        }
    }
    for table in &select.from {
        table_with_joins_queries(table, &mut out);
    }
    if let Some(selection) = &select.selection {
        queries_in_expr(selection, &mut out);
    }
    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        for expr in exprs {
            queries_in_expr(expr, &mut out);
        }
    }
    if let Some(having) = &select.having {
        queries_in_expr(having, &mut out);
    }
    if let Some(qualify) = &select.qualify {
        queries_in_expr(qualify, &mut out);
    }
    out
}

fn table_with_joins_queries<'a>(table: &'a TableWithJoins, out: &mut Vec<&'a Query>) {
    table_factor_queries(&table.relation, out);
    for join in &table.joins {
        table_factor_queries(&join.relation, out);
        if let Some(JoinConstraint::On(on)) = join_constraint(&join.join_operator) {
            queries_in_expr(on, out);
        }
    }
}

fn table_factor_queries<'a>(factor: &'a TableFactor, out: &mut Vec<&'a Query>) {
    match factor {
        TableFactor::Derived { subquery, .. } => out.push(subquery.as_ref()),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_queries(table_with_joins, out),
        _ => {}
    }
}

/// Topmost queries inside an expression; the walk does not descend into
/// the queries it finds.
fn queries_in_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a Query>) {
    match expr {
        Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => out.push(query.as_ref()),
        Expr::InSubquery {
            expr: col,
            subquery,
            ..
        } => {
            queries_in_expr(col, out);
            out.push(subquery.as_ref());
        }
        Expr::BinaryOp { left, right, .. } => {
            queries_in_expr(left, out);
            queries_in_expr(right, out);
        }
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => queries_in_expr(inner, out),
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => queries_in_expr(inner, out),
        Expr::InList {
            expr: inner, list, ..
        } => {
            queries_in_expr(inner, out);
            for item in list {
                queries_in_expr(item, out);
            }
        }
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            queries_in_expr(inner, out);
            queries_in_expr(low, out);
            queries_in_expr(high, out);
        }
        Expr::Like {
            expr: inner,
            pattern,
            ..
        }
        | Expr::ILike {
            expr: inner,
            pattern,
            ..
        } => {
            queries_in_expr(inner, out);
            queries_in_expr(pattern, out);
        }
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            if let Some(operand) = operand {
                queries_in_expr(operand, out);
            }
            for condition in conditions {
                queries_in_expr(condition, out);
            }
            for result in results {
                queries_in_expr(result, out);
            }
            if let Some(else_result) = else_result {
                queries_in_expr(else_result, out);
            }
        }
        Expr::Cast { expr: inner, .. }
        | Expr::Extract { expr: inner, .. }
        | Expr::Ceil { expr: inner, .. }
        | Expr::Floor { expr: inner, .. } => queries_in_expr(inner, out),
        Expr::Substring {
            expr: inner,
            substring_from,
            substring_for,
            ..
        } => {
            queries_in_expr(inner, out);
            if let Some(from) = substring_from {
                queries_in_expr(from, out);
            }
            if let Some(length) = substring_for {
                queries_in_expr(length, out);
            }
        }
        Expr::Trim {
            expr: inner,
            trim_what,
            ..
        } => {
            queries_in_expr(inner, out);
            if let Some(what) = trim_what {
                queries_in_expr(what, out);
            }
        }
        Expr::Position { expr: inner, r#in } => {
            queries_in_expr(inner, out);
            queries_in_expr(r#in, out);
        }
        Expr::Function(function) => {
            match &function.args {
                FunctionArguments::List(list) => {
                    for arg in &list.args {
                        if let FunctionArg::Unnamed(FunctionArgExpr::Expr(inner))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(inner),
                            ..
                        } = arg
                        {
                            queries_in_expr(inner, out);
                        }
                    }
                }
                FunctionArguments::Subquery(query) => out.push(query.as_ref()),
                FunctionArguments::None => {}
            }
            if let Some(filter) = &function.filter {
                queries_in_expr(filter, out);
            }
        }
        Expr::Tuple(exprs) => {
            for item in exprs {
                queries_in_expr(item, out);
            }
        }
        _ => {}
    }
}
