//! `wholesale run` - the full pipeline.
//!
//! ```bash
//! wholesale run --input ./data/sf1
//! wholesale run --input ./data/sf1 --reference ./ref/iso3.csv --store ./warehouse --json
//! ```

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

use wholesale_pipeline::{Pipeline, RunReport, StageCount};

use crate::cli::config::{resolve, Overrides};
use crate::cli::output::print_table;

/// Arguments for the `run` command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory holding the eight .tbl files
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Country-code reference CSV (default: <input>/country_codes.csv)
    #[arg(long, value_name = "FILE")]
    pub reference: Option<PathBuf>,

    /// Table store root (default: ~/.wholesale/warehouse)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Also export query results and the fact table as CSV
    #[arg(long)]
    pub export_csv: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve(
        config_path,
        &Overrides {
            input: args.input,
            reference: args.reference,
            store: args.store,
            export_csv: args.export_csv,
        },
    )?;

    let report = Pipeline::new(config)?.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn count_rows(counts: &[StageCount]) -> Vec<Vec<String>> {
    counts
        .iter()
        .map(|c| vec![c.table.clone(), c.rows.to_string()])
        .collect()
}

fn print_report(report: &RunReport) {
    println!("Sources");
    print_table(&["TABLE", "ROWS"], count_rows(&report.sources));

    println!("\nDerived");
    print_table(&["TABLE", "ROWS"], count_rows(&report.derived));

    println!("\nQueries");
    print_table(&["RESULT", "ROWS"], count_rows(&report.queries));

    let drops = &report.drops;
    println!("\nRows dropped by inner joins");
    print_table(
        &["JOIN", "DROPPED"],
        vec![
            vec![
                "lineitem -> orders".to_string(),
                drops.lineitems_without_order.to_string(),
            ],
            vec![
                "part -> partsupp".to_string(),
                drops.parts_without_supply.to_string(),
            ],
            vec![
                "partsupp -> part".to_string(),
                drops.partsupps_without_part.to_string(),
            ],
            vec![
                "order_lineitem -> part_partsupp".to_string(),
                drops.lines_without_supply.to_string(),
            ],
        ],
    );

    println!(
        "\nGeo: {}/{} nations matched an ISO3 code",
        report.geo.matched, report.geo.nations
    );
    if !report.geo.unmatched.is_empty() {
        println!("  unmatched: {}", report.geo.unmatched.join(", "));
    }

    let orphans: Vec<Vec<String>> = report
        .integrity
        .iter()
        .filter(|o| o.orphans > 0)
        .map(|o| vec![o.table.clone(), o.foreign_key.clone(), o.orphans.to_string()])
        .collect();
    if !orphans.is_empty() {
        println!("\nUnresolved foreign keys");
        print_table(&["TABLE", "FOREIGN KEY", "ORPHANS"], orphans);
    }

    let location = report
        .artifacts
        .first()
        .and_then(|a| a.path.parent())
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!(
        "\nCommitted {} tables to {} in {} ms",
        report.artifacts.len(),
        location,
        report.duration_ms
    );
}
