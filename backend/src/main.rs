//! DMF CLI - map and validate template workbooks
//!
//! A workbook is a directory holding one CSV file per sheet
//! (`Template.csv`, `Parameters.csv`, `ValidationRules.csv`, reference sheets).
//!
//! # Commands
//!
//! ```bash
//! dmf map input/customers                 # Write customers_result.csv
//! dmf validate input/customers            # Write "customers review.csv" + summary
//! dmf validate input/customers --rules rules.json
//! dmf markers                             # Show mapping rule markers
//! dmf serve                               # Start HTTP server (port 3000)
//! ```
//!
//! # Batch protocol
//!
//! On success `map` and `validate` print `RESULT:<file name>` then
//! `INFO:<summary>` on stdout. On failure they print `ERROR:<message>` on
//! stderr and exit with status 1. Logs go to stderr.

use clap::{Parser, Subcommand};
use dmf::config::ServerConfig;
use dmf::error::RunResult;
use dmf::pipeline::{
    mapping_overrides, read_rules_file, run_mapping, run_validation, validation_overrides, RunOptions,
};
use dmf::workbook::CsvDirSource;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dmf")]
#[command(about = "Map and validate DMF template workbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive output columns from the Parameters rules
    Map {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Check every Template row against the ValidationRules
    Validate {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Show mapping rule markers
    Markers,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: DMF_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Workbook directory (one CSV file per sheet)
    input: PathBuf,

    /// JSON rule override replacing the rules sheet
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,

    /// Output file name (".csv" appended if missing)
    #[arg(short, long)]
    output: Option<String>,
}

impl RunArgs {
    fn options(&self) -> RunOptions {
        let options = RunOptions::new(&self.output_dir);
        match &self.output {
            Some(name) => options.with_output_name(name),
            None => options,
        }
    }

    fn input_name(&self) -> String {
        workbook_name(&self.input)
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Map { run } => report(cmd_map(&run)),
        Commands::Validate { run } => report(cmd_validate(&run)),
        Commands::Markers => println!("{}", dmf::mapping::markers_description()),
        Commands::Serve { port } => {
            if let Err(e) = cmd_serve(port).await {
                eprintln!("ERROR:{}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Print the batch protocol lines for a run.
fn report(result: RunResult<(String, String)>) {
    match result {
        Ok((name, info)) => {
            println!("RESULT:{}", name);
            println!("INFO:{}", info);
        }
        Err(e) => {
            eprintln!("ERROR:{}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_map(run: &RunArgs) -> RunResult<(String, String)> {
    let overrides = match &run.rules {
        Some(path) => Some(mapping_overrides(&read_rules_file(path)?)?),
        None => None,
    };

    let source = CsvDirSource::new(&run.input);
    let outcome = run_mapping(&source, &run.input_name(), overrides.as_deref(), &run.options())?;
    let info = outcome.info_line();
    Ok((outcome.output_name, info))
}

fn cmd_validate(run: &RunArgs) -> RunResult<(String, String)> {
    let overrides = match &run.rules {
        Some(path) => Some(validation_overrides(&read_rules_file(path)?)?),
        None => None,
    };

    let source = CsvDirSource::new(&run.input);
    let outcome = run_validation(&source, &run.input_name(), overrides.as_deref(), &run.options())?;
    let info = outcome.info_line();
    Ok((outcome.report_name, info))
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = port {
        config = config.with_port(port);
    }
    dmf::server::start_server(config).await
}

/// Workbook name used for output files: the directory name.
fn workbook_name(input: &Path) -> String {
    input
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .unwrap_or_else(|| "workbook".to_string())
}
