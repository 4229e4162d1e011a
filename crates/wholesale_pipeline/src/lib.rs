//! The wholesale ETL pipeline.
//!
//! Loads the eight TPC-H source tables, maps nations to ISO3 country codes,
//! runs three analytical queries and builds the denormalized fact table.
//! All outputs of one run are committed to the table store together.
//!
//! ```no_run
//! use wholesale_pipeline::{Pipeline, PipelineConfig};
//!
//! let mut config = PipelineConfig::default();
//! config.input.dir = "data/tpch".into();
//! let report = Pipeline::new(config)?.run()?;
//! println!("{} fact rows", report.derived.last().map(|c| c.rows).unwrap_or(0));
//! # Ok::<(), wholesale_pipeline::PipelineError>(())
//! ```

pub mod config;
pub mod convert;
pub mod denorm;
pub mod error;
pub mod geo;
pub mod integrity;
pub mod queries;
pub mod run;

pub use config::{InputConfig, OutputConfig, PipelineConfig, QueryConfig, StoreConfig};
pub use convert::{arrow_schema, relation_to_batch, rows_to_batch, tabular_to_batch, Tabular};
pub use denorm::{
    denormalize, CustGeo, Denormalized, FactRow, Geo, JoinDrops, OrderLineitem, PartPartsupp,
    SuppGeo,
};
pub use error::{PipelineError, Result, Stage};
pub use geo::{enrich_nations, normalize_name, CountryCodes, GeoOutcome, NationMapped};
pub use integrity::{check_foreign_keys, OrphanCount};
pub use queries::{
    cheapest_suppliers_per_part, run_queries, top_active_customers, top_suppliers_by_balance,
    ActiveCustomer, CheapestSupplier, QueryKind, QueryResults, TopSupplier,
};
pub use run::{CheckReport, GeoSummary, Pipeline, QueryOutput, RunReport, StageCount};
