//! Per-SELECT scope construction and qualifier resolution.
//!
//! Each SELECT visit builds one [`SelectScope`] from its FROM/JOIN subtree:
//! an alias map for physical tables, an output-column map for each aliased
//! derived table, and a single-base shortcut when a derived table draws
//! from exactly one base table. Scopes are pushed onto a [`ScopeStack`] so
//! correlated references resolve through ancestor SELECTs; lookups run
//! innermost-first and local entries always win.

use crate::types::QualifiedName;
use sqlparser::ast::{
    Expr, Query, Select, SelectItem, SetExpr, TableFactor,
};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub(crate) struct SelectScope {
    /// Normalized alias (or base name) -> base table. Alias entries win
    /// over base-name fallback entries for the same key.
    pub(crate) aliases: HashMap<String, QualifiedName>,
    /// Derived-table alias -> { output column name -> base table }.
    pub(crate) subquery_columns: HashMap<String, HashMap<String, QualifiedName>>,
    /// Derived-table alias -> base table, when the subquery draws from
    /// exactly one base.
    pub(crate) subquery_single_base: HashMap<String, QualifiedName>,
}

/// How a qualified reference was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Through the alias map: the qualifier names a physical table.
    Table(QualifiedName),
    /// Through a derived table's output-column map.
    DerivedColumn(QualifiedName),
    /// Through a derived table's single-base shortcut.
    DerivedSingle(QualifiedName),
}

impl Resolution {
    pub(crate) fn base(&self) -> &QualifiedName {
        match self {
            Resolution::Table(q) | Resolution::DerivedColumn(q) | Resolution::DerivedSingle(q) => q,
        }
    }
}

/// Outcome of resolving an unqualified column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnqualifiedResolution {
    Unique(QualifiedName),
    Ambiguous,
    NoTables,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    scopes: Vec<SelectScope>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, scope: SelectScope) {
        self.scopes.push(scope);
    }

    pub(crate) fn pop(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn local(&self) -> Option<&SelectScope> {
        self.scopes.last()
    }

    /// Resolves a `qualifier.column` reference. The full dotted qualifier
    /// is tried first, then its last segment, so `db.tbl.col` still finds
    /// the base-name entry for `tbl`. Scopes are searched innermost-first.
    pub(crate) fn resolve_qualifier(
        &self,
        qualifier_full: &str,
        qualifier_last: &str,
        column: &str,
    ) -> Option<Resolution> {
        let full = qualifier_full.to_lowercase();
        let last = qualifier_last.to_lowercase();
        for scope in self.scopes.iter().rev() {
            for key in [full.as_str(), last.as_str()] {
                if let Some(base) = scope.aliases.get(key) {
                    return Some(Resolution::Table(base.clone()));
                }
                if let Some(base) = scope
                    .subquery_columns
                    .get(key)
                    .and_then(|columns| columns.get(column))
                {
                    return Some(Resolution::DerivedColumn(base.clone()));
                }
                if let Some(base) = scope.subquery_single_base.get(key) {
                    return Some(Resolution::DerivedSingle(base.clone()));
                }
            }
        }
        None
    }

    /// Resolves an unqualified column: the nearest scope with tables in
    /// its FROM decides; a unique base attributes, several are ambiguous.
    pub(crate) fn resolve_unqualified(&self) -> UnqualifiedResolution {
        for scope in self.scopes.iter().rev() {
            let bases: BTreeSet<&QualifiedName> = scope.aliases.values().collect();
            match bases.len() {
                0 => continue,
                1 => {
                    return UnqualifiedResolution::Unique((*bases.iter().next().unwrap()).clone())
                }
                _ => return UnqualifiedResolution::Ambiguous,
            }
        }
        UnqualifiedResolution::NoTables
    }

    /// Distinct base tables of the local scope, in name order. Used for
    /// bare-star attribution.
    pub(crate) fn local_bases(&self) -> Vec<QualifiedName> {
        let Some(scope) = self.local() else {
            return Vec::new();
        };
        let mut bases: Vec<QualifiedName> = scope
            .aliases
            .values()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        bases.sort_by_key(|q| q.to_string());
        bases
    }

    /// Alias substitution pairs for fallback rendering, innermost scope
    /// first; the first binding of a key wins.
    pub(crate) fn substitution_pairs(&self) -> Vec<(String, QualifiedName)> {
        let mut seen = BTreeSet::new();
        let mut pairs = Vec::new();
        for scope in self.scopes.iter().rev() {
            let mut keys: Vec<&String> = scope.aliases.keys().collect();
            keys.sort();
            for key in keys {
                if seen.insert(key.clone()) {
                    pairs.push((key.clone(), scope.aliases[key].clone()));
                }
            }
        }
        pairs
    }
}

/// Builds the scope for one SELECT from its FROM/JOIN subtree.
pub(crate) fn build_select_scope(select: &Select) -> SelectScope {
    let mut scope = SelectScope::default();
    for table in &select.from {
        add_relation(&mut scope, &table.relation);
        for join in &table.joins {
            add_relation(&mut scope, &join.relation);
        }
    }
    scope
}

fn add_relation(scope: &mut SelectScope, factor: &TableFactor) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let Some(base) = QualifiedName::from_object_name(name) else {
                return;
            };
            if let Some(alias) = alias {
                scope
                    .aliases
                    .insert(alias.name.value.to_lowercase(), base.clone());
            }
            scope
                .aliases
                .entry(base.base.to_lowercase())
                .or_insert(base);
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            let Some(alias) = alias else {
                return;
            };
            let Some(inner) = first_select_of(subquery) else {
                return;
            };
            let key = alias.name.value.to_lowercase();
            let inner_scope = build_select_scope(inner);
            let bases = base_set(inner);
            if bases.len() == 1 {
                scope
                    .subquery_single_base
                    .insert(key.clone(), bases.iter().next().unwrap().clone());
            }
            let columns = output_column_map(inner, &inner_scope, &bases);
            if !columns.is_empty() {
                scope.subquery_columns.insert(key, columns);
            }
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            add_relation(scope, &table_with_joins.relation);
            for join in &table_with_joins.joins {
                add_relation(scope, &join.relation);
            }
        }
        _ => {}
    }
}

/// The first plain SELECT of a query body, looking through parentheses.
/// Set operations have no single projection to map and yield nothing.
pub(crate) fn first_select_of(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(inner) => first_select_of(inner),
        _ => None,
    }
}

/// All base tables a SELECT draws from, transitively through nested
/// derived tables.
pub(crate) fn base_set(select: &Select) -> BTreeSet<QualifiedName> {
    let mut bases = BTreeSet::new();
    for table in &select.from {
        collect_bases(&table.relation, &mut bases);
        for join in &table.joins {
            collect_bases(&join.relation, &mut bases);
        }
    }
    bases
}

fn collect_bases(factor: &TableFactor, bases: &mut BTreeSet<QualifiedName>) {
    match factor {
        TableFactor::Table { name, .. } => {
            if let Some(base) = QualifiedName::from_object_name(name) {
                bases.insert(base);
            }
        }
        TableFactor::Derived { subquery, .. } => {
            if let Some(inner) = first_select_of(subquery) {
                bases.extend(base_set(inner));
            }
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_bases(&table_with_joins.relation, bases);
            for join in &table_with_joins.joins {
                collect_bases(&join.relation, bases);
            }
        }
        _ => {}
    }
}

/// Maps a derived table's output column names to base tables.
///
/// Direct column references resolve through the inner alias map when
/// qualified, or through the unique inner base when not. Any named output
/// whose expression cannot be attributed falls back to the single base
/// when the subquery has exactly one.
fn output_column_map(
    inner: &Select,
    inner_scope: &SelectScope,
    bases: &BTreeSet<QualifiedName>,
) -> HashMap<String, QualifiedName> {
    let single = if bases.len() == 1 {
        bases.iter().next().cloned()
    } else {
        None
    };

    let mut columns = HashMap::new();
    for item in &inner.projection {
        let (output_name, expr) = match item {
            SelectItem::UnnamedExpr(expr) => match expr {
                Expr::Identifier(ident) => (ident.value.clone(), expr),
                Expr::CompoundIdentifier(parts) => match parts.last() {
                    Some(last) => (last.value.clone(), expr),
                    None => continue,
                },
                _ => continue,
            },
            SelectItem::ExprWithAlias { expr, alias } => (alias.value.clone(), expr),
            _ => continue,
        };

        let resolved = match expr {
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let qualifier = parts[parts.len() - 2].value.to_lowercase();
                inner_scope.aliases.get(&qualifier).cloned()
            }
            Expr::Identifier(_) => single.clone(),
            _ => None,
        };

        if let Some(base) = resolved.or_else(|| single.clone()) {
            columns.insert(output_name, base);
        }
    }
    columns
}
