//! Wholesale ETL launcher
//!
//! Loads the TPC-H flat files, enriches nations with ISO3 codes, runs the
//! analytical queries and builds the fact table. Each subcommand is a
//! standalone, run-to-completion operation.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use wholesale_logging::{init_logging, LogConfig};
use wholesale_pipeline::PipelineError;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "wholesale", version, about = "TPC-H wholesale ETL pipeline")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Configuration file (default: ./wholesale.toml when present)
    #[arg(long, global = true, env = "WHOLESALE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline and commit every output table
    Run(cli::run::RunArgs),

    /// Load and validate the input files without writing anything
    Check(cli::check::CheckArgs),

    /// Run one analytical query and print the result
    Query(cli::query::QueryArgs),

    /// Read a stored table back
    Show(cli::show::ShowArgs),

    /// Print declared table schemas
    Schema(cli::schema::SchemaArgs),

    /// Print the resolved configuration and paths
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Run(args) => args.json,
        Commands::Check(args) => args.json,
        Commands::Query(args) => args.json,
        Commands::Show(args) => args.json,
        Commands::Schema(args) => args.json,
        Commands::Config { json } => *json,
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => cli::run::run(args, config_path),
        Commands::Check(args) => cli::check::run(args, config_path),
        Commands::Query(args) => cli::query::run(args, config_path),
        Commands::Show(args) => cli::show::run(args, config_path),
        Commands::Schema(args) => cli::schema::run(args),
        Commands::Config { json } => cli::config::run(json, config_path),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    if let Err(err) = init_logging(LogConfig {
        app_name: "wholesale",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
                eprint!("{}", cli::error::HelpfulError::from_pipeline(pipeline_err));
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
