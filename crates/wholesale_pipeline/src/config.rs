//! Run configuration. One value is built per run and handed to every stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use wholesale_protocol::defaults::{
    DEFAULT_ACTIVE_WINDOW_DAYS, DEFAULT_CATALOG, DEFAULT_CHEAPEST_PER_PART,
    DEFAULT_INPUT_EXTENSION, DEFAULT_SCHEMA, DEFAULT_TOP_CUSTOMERS, DEFAULT_TOP_SUPPLIERS,
};
use wholesale_protocol::paths::WholesalePaths;
use wholesale_protocol::TableRef;
use wholesale_schema::{LoadOptions, TableName};

use crate::error::{PipelineError, Result};

pub const DEFAULT_REFERENCE_FILE: &str = "country_codes.csv";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub store: StoreConfig,
    pub queries: QueryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory holding the eight `<table>.tbl` files
    pub dir: PathBuf,
    pub delimiter: char,
    pub extension: String,
    /// Per-table file name overrides, e.g. `lineitem = "lineitem_sf1.tbl"`
    pub files: BTreeMap<TableName, String>,
    /// Country-code reference file; defaults to `<dir>/country_codes.csv`
    pub reference_file: Option<PathBuf>,
    pub reference_delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            delimiter: '|',
            extension: DEFAULT_INPUT_EXTENSION.to_string(),
            files: BTreeMap::new(),
            reference_file: None,
            reference_delimiter: ',',
        }
    }
}

impl InputConfig {
    pub fn reference_path(&self) -> PathBuf {
        self.reference_file
            .clone()
            .unwrap_or_else(|| self.dir.join(DEFAULT_REFERENCE_FILE))
    }

    pub fn load_options(&self) -> Result<LoadOptions> {
        Ok(LoadOptions {
            delimiter: delimiter_byte("input.delimiter", self.delimiter)?,
            extension: self.extension.clone(),
            file_names: self.files.clone(),
        })
    }

    pub fn reference_delimiter_byte(&self) -> Result<u8> {
        delimiter_byte("input.reference_delimiter", self.reference_delimiter)
    }
}

fn delimiter_byte(key: &str, c: char) -> Result<u8> {
    if c.is_ascii() && c != '\n' && c != '\r' {
        Ok(c as u8)
    } else {
        Err(PipelineError::Config(format!(
            "{} must be a single ASCII character other than a line break, got {:?}",
            key, c
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub catalog: String,
    pub schema: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: WholesalePaths::resolve().store_root,
            catalog: DEFAULT_CATALOG.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn table_ref(&self, table: &str) -> TableRef {
        TableRef::new(&self.catalog, &self.schema, table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub active_window_days: u32,
    pub top_customers: usize,
    pub top_suppliers: usize,
    pub cheapest_per_part: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            active_window_days: DEFAULT_ACTIVE_WINDOW_DAYS,
            top_customers: DEFAULT_TOP_CUSTOMERS,
            top_suppliers: DEFAULT_TOP_SUPPLIERS,
            cheapest_per_part: DEFAULT_CHEAPEST_PER_PART,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Also write a CSV next to each query result and the fact table
    pub export_csv: bool,
    /// Also persist cust_geo, supp_geo, order_lineitem and part_partsupp
    pub persist_intermediates: bool,
}

impl PipelineConfig {
    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        self.input.load_options()?;
        self.input.reference_delimiter_byte()?;
        if self.input.extension.trim().is_empty() {
            return Err(PipelineError::Config(
                "input.extension must not be empty".to_string(),
            ));
        }
        if self.store.catalog.trim().is_empty() || self.store.schema.trim().is_empty() {
            return Err(PipelineError::Config(
                "store.catalog and store.schema must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.queries.active_window_days, 30);
        assert_eq!(config.queries.top_customers, 50);
        assert_eq!(config.queries.top_suppliers, 10);
        assert_eq!(config.queries.cheapest_per_part, 3);
        assert_eq!(
            config.input.reference_path(),
            PathBuf::from("data").join("country_codes.csv")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"queries": {"top_customers": 5}, "input": {"files": {"orders": "o.tbl"}}}"#)
                .unwrap();
        assert_eq!(config.queries.top_customers, 5);
        assert_eq!(config.queries.top_suppliers, 10);
        assert_eq!(
            config.input.files.get(&TableName::Orders).map(String::as_str),
            Some("o.tbl")
        );
    }

    #[test]
    fn test_rejects_multibyte_delimiter() {
        let mut config = PipelineConfig::default();
        config.input.delimiter = '¦';
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("input.delimiter"));
    }

    #[test]
    fn test_table_ref_uses_store_location() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.store.table_ref("fact_table").to_string(),
            "wholesale.tpch.fact_table"
        );
    }
}
