//! `wholesale query` - run one analytical query over the input files.

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};

use wholesale_pipeline::{Pipeline, QueryKind};

use crate::cli::config::{resolve, Overrides};
use crate::cli::output::print_batches;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryName {
    /// Customers with the most orders in the trailing window
    ActiveCustomers,
    /// Suppliers with the highest account balance
    TopSuppliers,
    /// Lowest-cost suppliers for every part
    CheapestSuppliers,
}

impl From<QueryName> for QueryKind {
    fn from(name: QueryName) -> Self {
        match name {
            QueryName::ActiveCustomers => QueryKind::ActiveCustomers,
            QueryName::TopSuppliers => QueryKind::TopSuppliers,
            QueryName::CheapestSuppliers => QueryKind::CheapestSuppliers,
        }
    }
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(value_enum)]
    pub query: QueryName,

    /// Directory holding the eight .tbl files
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Override the result limit of the chosen query
    #[arg(long)]
    pub limit: Option<usize>,

    /// Trailing window in days for active-customers
    #[arg(long)]
    pub window_days: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: QueryArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = resolve(
        config_path,
        &Overrides {
            input: args.input,
            ..Overrides::default()
        },
    )?;
    if let Some(days) = args.window_days {
        config.queries.active_window_days = days;
    }
    if let Some(limit) = args.limit {
        match args.query {
            QueryName::ActiveCustomers => config.queries.top_customers = limit,
            QueryName::TopSuppliers => config.queries.top_suppliers = limit,
            QueryName::CheapestSuppliers => config.queries.cheapest_per_part = limit,
        }
    }

    let output = Pipeline::new(config)?.query(args.query.into())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    let batch = output.to_batch()?;
    print_batches(&[batch], usize::MAX)?;
    println!("{} rows ({})", output.len(), output.kind().table_name());
    Ok(())
}
