use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    build::BuildArgs, catalog::CatalogArgs, collect::CollectArgs, execute::ExecuteArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "csdata",
    version,
    about = "Build, run and collect CyberShake data requests"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub temp_dir: Option<PathBuf>,

    /// Emit debug diagnostics on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the available filters, data products and models.
    Catalog(CatalogArgs),
    /// Turn a request document into a query file.
    Build(BuildArgs),
    /// Run a query file against the configured database.
    Execute(ExecuteArgs),
    /// Extract requested seismograms from downloaded containers.
    Collect(CollectArgs),
}
