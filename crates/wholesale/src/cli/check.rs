//! `wholesale check` - load and validate inputs; nothing is written.

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

use wholesale_pipeline::Pipeline;

use crate::cli::config::{resolve, Overrides};
use crate::cli::output::print_table;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Directory holding the eight .tbl files
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CheckArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve(
        config_path,
        &Overrides {
            input: args.input,
            ..Overrides::default()
        },
    )?;
    let report = Pipeline::new(config)?.check()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let rows = report
        .sources
        .iter()
        .map(|c| {
            let orphans: usize = report
                .integrity
                .iter()
                .filter(|o| o.table == c.table)
                .map(|o| o.orphans)
                .sum();
            vec![c.table.clone(), c.rows.to_string(), orphans.to_string()]
        })
        .collect();
    print_table(&["TABLE", "ROWS", "ORPHAN KEYS"], rows);
    println!("All tables valid");
    Ok(())
}
