//! Pipeline orchestration.
//!
//! Stages run strictly in order: load -> geo enrich -> queries ->
//! denormalize -> persist. Every output of a run is handed to the table
//! store in a single call, so a failure at any stage leaves the previously
//! committed tables untouched.

use arrow::array::RecordBatch;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

use wholesale_schema::{Dataset, Relation, TableName};
use wholesale_sinks::{TableArtifact, TableStore, TableWrite};

use crate::config::PipelineConfig;
use crate::convert::{relation_to_batch, tabular_to_batch, Tabular};
use crate::denorm::{denormalize, Denormalized, JoinDrops};
use crate::error::Result;
use crate::geo::{enrich_nations, CountryCodes, GeoOutcome};
use crate::integrity::{check_foreign_keys, OrphanCount};
use crate::queries::{
    cheapest_suppliers_per_part, run_queries, top_active_customers, top_suppliers_by_balance,
    ActiveCustomer, CheapestSupplier, QueryKind, QueryResults, TopSupplier,
};

/// Row count of one relation produced (or read) by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub table: String,
    pub rows: usize,
}

impl StageCount {
    fn new(table: impl Into<String>, rows: usize) -> Self {
        Self {
            table: table.into(),
            rows,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoSummary {
    pub nations: usize,
    pub matched: usize,
    pub unmatched: Vec<String>,
    /// Reference names that mapped to more than one code
    pub ambiguous_reference_names: Vec<String>,
    pub skipped_reference_rows: usize,
}

impl GeoSummary {
    fn new(outcome: &GeoOutcome, codes: &CountryCodes) -> Self {
        Self {
            nations: outcome.rows.len(),
            matched: outcome.matched,
            unmatched: outcome.unmatched.clone(),
            ambiguous_reference_names: codes.ambiguous.clone(),
            skipped_reference_rows: codes.skipped_rows,
        }
    }
}

/// Outcome of `check`: the inputs load and validate.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub sources: Vec<StageCount>,
    pub integrity: Vec<OrphanCount>,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub sources: Vec<StageCount>,
    pub geo: GeoSummary,
    pub queries: Vec<StageCount>,
    pub derived: Vec<StageCount>,
    pub drops: JoinDrops,
    pub integrity: Vec<OrphanCount>,
    pub artifacts: Vec<TableArtifact>,
    pub duration_ms: u64,
}

/// Rows of one analytical query.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    ActiveCustomers(Vec<ActiveCustomer>),
    TopSuppliers(Vec<TopSupplier>),
    CheapestSuppliers(Vec<CheapestSupplier>),
}

impl QueryOutput {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryOutput::ActiveCustomers(_) => QueryKind::ActiveCustomers,
            QueryOutput::TopSuppliers(_) => QueryKind::TopSuppliers,
            QueryOutput::CheapestSuppliers(_) => QueryKind::CheapestSuppliers,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryOutput::ActiveCustomers(rows) => rows.len(),
            QueryOutput::TopSuppliers(rows) => rows.len(),
            QueryOutput::CheapestSuppliers(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_batch(&self) -> Result<RecordBatch> {
        match self {
            QueryOutput::ActiveCustomers(rows) => tabular_to_batch(rows),
            QueryOutput::TopSuppliers(rows) => tabular_to_batch(rows),
            QueryOutput::CheapestSuppliers(rows) => tabular_to_batch(rows),
        }
    }
}

fn source_counts(dataset: &Dataset) -> Vec<StageCount> {
    dataset
        .row_counts()
        .into_iter()
        .map(|(table, rows)| StageCount::new(table.as_str(), rows))
        .collect()
}

pub struct Pipeline {
    config: PipelineConfig,
    store: TableStore,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let store = TableStore::new(config.store.root.clone());
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Load and validate all eight source tables.
    pub fn load(&self) -> Result<Dataset> {
        let options = self.config.input.load_options()?;
        Ok(Dataset::load_dir(&self.config.input.dir, &options)?)
    }

    pub fn load_reference(&self) -> Result<CountryCodes> {
        CountryCodes::load(
            &self.config.input.reference_path(),
            self.config.input.reference_delimiter_byte()?,
        )
    }

    /// Load and validate without writing anything.
    pub fn check(&self) -> Result<CheckReport> {
        let dataset = self.load()?;
        let report = CheckReport {
            sources: source_counts(&dataset),
            integrity: check_foreign_keys(&dataset),
        };
        info!(tables = report.sources.len(), "Inputs are valid");
        Ok(report)
    }

    /// Run one analytical query over freshly loaded inputs. Nothing is written.
    pub fn query(&self, kind: QueryKind) -> Result<QueryOutput> {
        let dataset = self.load()?;
        let q = &self.config.queries;
        let output = match kind {
            QueryKind::ActiveCustomers => QueryOutput::ActiveCustomers(top_active_customers(
                &dataset.orders,
                &dataset.customers,
                q.active_window_days,
                q.top_customers,
            )),
            QueryKind::TopSuppliers => QueryOutput::TopSuppliers(top_suppliers_by_balance(
                &dataset.suppliers,
                &dataset.nations,
                q.top_suppliers,
            )),
            QueryKind::CheapestSuppliers => QueryOutput::CheapestSuppliers(
                cheapest_suppliers_per_part(&dataset.partsupps, q.cheapest_per_part),
            ),
        };
        info!(query = kind.table_name(), rows = output.len(), "Ran query");
        Ok(output)
    }

    /// The full pipeline. Either every output table is committed or none is.
    pub fn run(&self) -> Result<RunReport> {
        let started = Instant::now();

        let dataset = self.load()?;
        let integrity = check_foreign_keys(&dataset);

        let codes = self.load_reference()?;
        let geo = enrich_nations(&dataset.nations, &codes);

        let results = run_queries(
            &dataset.orders,
            &dataset.customers,
            &dataset.suppliers,
            &dataset.nations,
            &dataset.partsupps,
            &self.config.queries,
        );

        let denorm = denormalize(&dataset, &geo.rows);

        let writes = self.plan_writes(&dataset, &geo, &results, &denorm)?;
        let artifacts = self.store.write_tables(&writes)?;

        let report = RunReport {
            sources: source_counts(&dataset),
            geo: GeoSummary::new(&geo, &codes),
            queries: vec![
                StageCount::new(
                    QueryKind::ActiveCustomers.table_name(),
                    results.active_customers.len(),
                ),
                StageCount::new(QueryKind::TopSuppliers.table_name(), results.top_suppliers.len()),
                StageCount::new(
                    QueryKind::CheapestSuppliers.table_name(),
                    results.cheapest_suppliers.len(),
                ),
            ],
            derived: vec![
                StageCount::new("nation_mapped", geo.rows.len()),
                StageCount::new("cust_geo", denorm.cust_geo.len()),
                StageCount::new("supp_geo", denorm.supp_geo.len()),
                StageCount::new("order_lineitem", denorm.order_lineitem.len()),
                StageCount::new("part_partsupp", denorm.part_partsupp.len()),
                StageCount::new("fact_table", denorm.fact_table.len()),
            ],
            drops: denorm.drops,
            integrity,
            artifacts,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            tables = report.artifacts.len(),
            fact_rows = denorm.fact_table.len(),
            duration_ms = report.duration_ms,
            "Pipeline run complete"
        );
        Ok(report)
    }

    fn plan_writes(
        &self,
        dataset: &Dataset,
        geo: &GeoOutcome,
        results: &QueryResults,
        denorm: &Denormalized,
    ) -> Result<Vec<TableWrite>> {
        let export_csv = self.config.output.export_csv;
        let mut writes = Vec::new();

        for table in TableName::all() {
            let empty;
            let relation = match dataset.relations.get(&table) {
                Some(relation) => relation,
                None => {
                    empty = Relation::empty(table.schema());
                    &empty
                }
            };
            writes.push(self.relation_write(relation)?);
        }

        writes.push(self.tabular_write(&geo.rows, false)?);
        writes.push(self.tabular_write(&results.active_customers, export_csv)?);
        writes.push(self.tabular_write(&results.top_suppliers, export_csv)?);
        writes.push(self.tabular_write(&results.cheapest_suppliers, export_csv)?);
        if self.config.output.persist_intermediates {
            writes.push(self.tabular_write(&denorm.cust_geo, false)?);
            writes.push(self.tabular_write(&denorm.supp_geo, false)?);
            writes.push(self.tabular_write(&denorm.order_lineitem, false)?);
            writes.push(self.tabular_write(&denorm.part_partsupp, false)?);
        }
        writes.push(self.tabular_write(&denorm.fact_table, export_csv)?);
        Ok(writes)
    }

    fn relation_write(&self, relation: &Relation) -> Result<TableWrite> {
        let batch = relation_to_batch(relation)?;
        Ok(
            TableWrite::from_batch(self.config.store.table_ref(relation.name()), batch)
                .with_schema_hash(relation.schema.content_hash.clone()),
        )
    }

    fn tabular_write<T: Tabular>(&self, rows: &[T], export_csv: bool) -> Result<TableWrite> {
        let contract = T::contract();
        let batch = tabular_to_batch(rows)?;
        Ok(
            TableWrite::from_batch(self.config.store.table_ref(&contract.name), batch)
                .with_csv_export(export_csv)
                .with_schema_hash(contract.content_hash),
        )
    }
}
