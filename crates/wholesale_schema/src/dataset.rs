//! The full set of eight source relations for one run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::loader::{load_file, LoadError, Relation};
use crate::records::{
    Customer, LineItem, Nation, Order, Part, PartSupp, Region, Supplier, TableRecord,
};
use crate::tables::TableName;

/// Where and how to read the source files.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub extension: String,
    /// Per-table file name overrides, relative to the input directory.
    pub file_names: BTreeMap<TableName, String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: wholesale_protocol::defaults::DEFAULT_INPUT_DELIMITER,
            extension: wholesale_protocol::defaults::DEFAULT_INPUT_EXTENSION.to_string(),
            file_names: BTreeMap::new(),
        }
    }
}

impl LoadOptions {
    pub fn path_for(&self, dir: &Path, table: TableName) -> PathBuf {
        match self.file_names.get(&table) {
            Some(name) => dir.join(name),
            None => dir.join(table.file_name(&self.extension)),
        }
    }
}

/// Validated source relations plus their typed records.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub regions: Vec<Region>,
    pub nations: Vec<Nation>,
    pub parts: Vec<Part>,
    pub suppliers: Vec<Supplier>,
    pub partsupps: Vec<PartSupp>,
    pub customers: Vec<Customer>,
    pub orders: Vec<Order>,
    pub lineitems: Vec<LineItem>,
    /// Raw validated relations, kept for persisting source tables as loaded.
    pub relations: BTreeMap<TableName, Relation>,
}

impl Dataset {
    /// Load and validate all eight tables from `dir`. Fails on the first
    /// violation in any table.
    pub fn load_dir(dir: &Path, options: &LoadOptions) -> Result<Self, LoadError> {
        let mut relations = BTreeMap::new();
        for table in TableName::all() {
            let path = options.path_for(dir, table);
            let relation = load_file(&table.schema(), &path, options.delimiter)?;
            relations.insert(table, relation);
        }
        let dataset = Self::from_relations(relations)?;
        info!(
            lineitems = dataset.lineitems.len(),
            orders = dataset.orders.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Build typed records from already validated relations. Missing tables
    /// are treated as empty.
    pub fn from_relations(relations: BTreeMap<TableName, Relation>) -> Result<Self, LoadError> {
        Ok(Self {
            regions: records(&relations)?,
            nations: records(&relations)?,
            parts: records(&relations)?,
            suppliers: records(&relations)?,
            partsupps: records(&relations)?,
            customers: records(&relations)?,
            orders: records(&relations)?,
            lineitems: records(&relations)?,
            relations,
        })
    }

    pub fn row_count(&self, table: TableName) -> usize {
        match table {
            TableName::Region => self.regions.len(),
            TableName::Nation => self.nations.len(),
            TableName::Part => self.parts.len(),
            TableName::Supplier => self.suppliers.len(),
            TableName::Partsupp => self.partsupps.len(),
            TableName::Customer => self.customers.len(),
            TableName::Orders => self.orders.len(),
            TableName::Lineitem => self.lineitems.len(),
        }
    }

    /// Row counts for every table, parents first.
    pub fn row_counts(&self) -> Vec<(TableName, usize)> {
        TableName::all()
            .into_iter()
            .map(|t| (t, self.row_count(t)))
            .collect()
    }
}

fn records<T: TableRecord>(relations: &BTreeMap<TableName, Relation>) -> Result<Vec<T>, LoadError> {
    match relations.get(&T::TABLE) {
        Some(relation) => Ok(T::from_relation(relation)?),
        None => Ok(Vec::new()),
    }
}
