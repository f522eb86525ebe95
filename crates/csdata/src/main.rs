#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use csdata::catalog::{Catalog, CatalogError, FilterError};
use csdata::cli::app::{Cli, Command, RuntimeArgs};
use csdata::cli::commands;
use csdata::config::RuntimePaths;
use csdata::extract::MissingRecordsError;
use csdata::query::QueryBuildError;
use csdata::request::RequestError;
use csdata::results::StorageLimitExceeded;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_CATALOG_DEFECT: i32 = 3;
const EXIT_MISSING_RECORDS: i32 = 4;
const EXIT_STORAGE_LIMIT: i32 = 5;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing(cli.runtime.debug);
    let command_name = command_name(&cli.command);
    println!("csdata: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("csdata: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("csdata: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let catalog = Catalog::load()?;
    match cli.command {
        Command::Catalog(args) => commands::catalog::run(&args, &catalog),
        Command::Build(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::build::run(&args, &runtime_paths, &catalog)
        }
        Command::Execute(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::execute::run(&args, &runtime_paths, &catalog)
        }
        Command::Collect(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::collect::run(&args, &runtime_paths)
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("csdata=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<RequestError>().is_some()
        || error.downcast_ref::<FilterError>().is_some()
    {
        EXIT_VALIDATION_FAILURE
    } else if error.downcast_ref::<CatalogError>().is_some()
        || error.downcast_ref::<QueryBuildError>().is_some()
    {
        EXIT_CATALOG_DEFECT
    } else if error.downcast_ref::<MissingRecordsError>().is_some() {
        EXIT_MISSING_RECORDS
    } else if error.downcast_ref::<StorageLimitExceeded>().is_some() {
        EXIT_STORAGE_LIMIT
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Catalog(_) => "catalog",
        Command::Build(_) => "build",
        Command::Execute(_) => "execute",
        Command::Collect(_) => "collect",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    csdata::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        args.out_dir.as_deref(),
        args.temp_dir.as_deref(),
    )
}
