//! Referential integrity report.
//!
//! Foreign keys are declared on every source schema but not enforced at
//! load time. This pass counts, for each declared key, the child rows whose
//! key tuple has no parent row. Orphans are reported and never fail a run.

use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use wholesale_schema::{Dataset, TableName, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanCount {
    pub table: String,
    /// Rendered key, e.g. `(l_partkey, l_suppkey) -> partsupp(ps_partkey, ps_suppkey)`
    pub foreign_key: String,
    pub orphans: usize,
}

/// Count orphan rows for every declared foreign key, in table load order.
/// Keys whose parent table is not loaded are skipped.
pub fn check_foreign_keys(dataset: &Dataset) -> Vec<OrphanCount> {
    let mut report = Vec::new();
    for table in TableName::all() {
        let Some(child) = dataset.relations.get(&table) else {
            continue;
        };
        for fk in &child.schema.foreign_keys {
            let Some(parent) = fk
                .references
                .parse::<TableName>()
                .ok()
                .and_then(|name| dataset.relations.get(&name))
            else {
                continue;
            };
            let (Some(child_keys), Some(parent_keys)) = (
                child.project(&fk.columns),
                parent.project(&fk.referenced_columns),
            ) else {
                continue;
            };
            let parents: HashSet<Vec<&Value>> = parent_keys.collect();
            let orphans = child_keys
                .filter(|key| !key.iter().any(|v| v.is_null()) && !parents.contains(key))
                .count();
            if orphans > 0 {
                warn!(
                    table = %table,
                    foreign_key = %fk,
                    orphans,
                    "Unresolved foreign keys"
                );
            }
            report.push(OrphanCount {
                table: table.to_string(),
                foreign_key: fk.to_string(),
                orphans,
            });
        }
    }
    report
}
