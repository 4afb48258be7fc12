use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{
    ExportArgs, OpenArgs, RepairArgs, SourcesArgs, ValidateArgs, run_export, run_open, run_repair,
    run_sources, run_validate,
};
use crate::error::Result;
use crate::logging;
use crate::util::load_config;

#[derive(Debug, Parser)]
#[command(
    name = "maputnik",
    about = "Validate, repair, export, and open MapLibre style documents",
    version
)]
pub struct Cli {
    /// Editor configuration (TOML, or JSON with a .json extension).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long = "log-json", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check a style document and list its errors.
    Validate(ValidateArgs),

    /// Remove invalid properties from a style document.
    Repair(RepairArgs),

    /// Export a style as clean JSON or a standalone HTML page.
    Export(ExportArgs),

    /// Resolve the vector layers of every source.
    Sources(SourcesArgs),

    /// Load a style through the editor store and persist it.
    Open(OpenArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_output(cli, &mut out)
}

pub fn run_with_output(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Validate(args) => run_validate(args, &config, out),
        Commands::Repair(args) => run_repair(args, &config, out),
        Commands::Export(args) => run_export(args, &config, out),
        Commands::Sources(args) => run_sources(args, &config, out),
        Commands::Open(args) => run_open(args, &config, out),
    }
}
