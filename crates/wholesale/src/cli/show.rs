//! `wholesale show` - read a committed table back from the store.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use wholesale_protocol::TableRef;
use wholesale_sinks::{SinkError, TableStore};

use crate::cli::config::{resolve, Overrides};
use crate::cli::error::HelpfulError;
use crate::cli::output::{batch_json_rows, print_batches};

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// `table`, `schema.table` or `catalog.schema.table`
    pub table: String,

    /// Number of rows to print
    #[arg(short = 'n', long, default_value = "20")]
    pub rows: usize,

    /// Table store root (default: ~/.wholesale/warehouse)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    table: String,
    total_rows: usize,
    blake3: Option<String>,
    rows: Vec<serde_json::Value>,
}

pub fn run(args: ShowArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve(
        config_path,
        &Overrides {
            store: args.store,
            ..Overrides::default()
        },
    )?;
    let table = TableRef::parse(&args.table, &config.store.catalog, &config.store.schema)
        .with_context(|| format!("Invalid table reference '{}'", args.table))?;
    let store = TableStore::new(config.store.root.clone());

    let batches = match store.read_table(&table) {
        Ok(batches) => batches,
        Err(SinkError::TableNotFound(name)) => {
            let available: Vec<String> = store
                .list_tables(&table.catalog, &table.schema)?
                .into_iter()
                .map(|t| t.table)
                .collect();
            return Err(HelpfulError::table_not_found(&name, &available).into());
        }
        Err(err) => return Err(err.into()),
    };
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();

    if args.json {
        let manifest = store.manifest(&table.catalog, &table.schema)?;
        let output = ShowOutput {
            table: table.to_string(),
            total_rows,
            blake3: manifest.tables.get(&table.table).map(|e| e.blake3.clone()),
            rows: batch_json_rows(&batches, args.rows)?,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_batches(&batches, args.rows)?;
    println!(
        "{}: showing {} of {} rows",
        table,
        total_rows.min(args.rows),
        total_rows
    );
    Ok(())
}
