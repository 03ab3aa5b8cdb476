//! Structural collectors: CTE names, created objects and temp flags, DML
//! write targets, and physical table references.
//!
//! The structural pass runs over every statement before any semantic work
//! so the exclusion rules applied at assembly time are global, not
//! order-dependent.

use super::visitor::{walk_query, walk_statement, walk_table_factor, Visitor};
use crate::types::QualifiedName;
use sqlparser::ast::{FromTable, Query, Statement, TableFactor};
use std::collections::{BTreeSet, HashSet};

/// Tokens whose presence in a rendered CREATE statement marks the target
/// as a temporary table.
const TEMP_TOKENS: &[&str] = &["volatile", "global temporary", "temporary"];

#[derive(Debug, Default)]
pub(crate) struct Structural {
    pub(crate) ctes: BTreeSet<String>,
    pub(crate) created_objects: HashSet<QualifiedName>,
    pub(crate) temp_tables: HashSet<QualifiedName>,
    pub(crate) write_targets: HashSet<QualifiedName>,
}

impl Structural {
    /// True when `name` should be excluded from `_tables`: it shadows a
    /// CTE (by base name), or it is a created object or write target.
    pub(crate) fn excludes(&self, name: &QualifiedName) -> bool {
        self.ctes.contains(&name.base)
            || self.created_objects.contains(name)
            || self.write_targets.contains(name)
    }
}

/// Visitor recording CTE names, CREATE targets, and DML write targets.
pub(crate) struct StructuralCollector<'a> {
    pub(crate) acc: &'a mut Structural,
}

impl StructuralCollector<'_> {
    fn record_create(&mut self, create: &sqlparser::ast::CreateTable) {
        let Some(name) = QualifiedName::from_object_name(&create.name) else {
            return;
        };
        if is_temp_create(create) {
            self.acc.temp_tables.insert(name);
        } else {
            self.acc.created_objects.insert(name);
        }
    }

    fn record_write_target(&mut self, name: Option<QualifiedName>) {
        if let Some(name) = name {
            self.acc.write_targets.insert(name);
        }
    }
}

fn is_temp_create(create: &sqlparser::ast::CreateTable) -> bool {
    if create.temporary || create.global == Some(true) {
        return true;
    }
    // Dialect spellings that survive only in the rendered form
    // (VOLATILE and friends) are caught by token scan.
    let rendered = create.to_string().to_lowercase();
    TEMP_TOKENS.iter().any(|token| rendered.contains(token))
}

fn factor_name(factor: &TableFactor) -> Option<QualifiedName> {
    match factor {
        TableFactor::Table { name, .. } => QualifiedName::from_object_name(name),
        _ => None,
    }
}

impl Visitor for StructuralCollector<'_> {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::CreateTable(create) => self.record_create(create),
            Statement::Insert(insert) => {
                // The target is the direct subject; tables inside the
                // source query are collected as reads, not targets.
                self.record_write_target(QualifiedName::from_object_name(&insert.table_name));
            }
            Statement::Update { table, .. } => {
                self.record_write_target(factor_name(&table.relation));
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        tables
                    }
                };
                for table in tables {
                    self.record_write_target(factor_name(&table.relation));
                }
            }
            Statement::Merge { table, .. } => {
                self.record_write_target(factor_name(table));
            }
            _ => {}
        }
        walk_statement(self, statement);
    }

    fn visit_query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.acc.ctes.insert(cte.alias.name.value.clone());
            }
        }
        walk_query(self, query);
    }
}

/// Visitor recording every physical table reference in a statement.
pub(crate) struct TableRefCollector<'a> {
    pub(crate) tables: &'a mut HashSet<QualifiedName>,
}

impl Visitor for TableRefCollector<'_> {
    fn visit_table_factor(&mut self, factor: &TableFactor) {
        if let Some(name) = factor_name(factor) {
            self.tables.insert(name);
        }
        walk_table_factor(self, factor);
    }
}
