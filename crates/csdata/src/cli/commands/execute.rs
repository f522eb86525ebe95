use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::catalog::Catalog;
use crate::catalog::products::SEISMOGRAMS;
use crate::config::{DatabaseConfig, RuntimePaths};
use crate::query::QueryFile;
use crate::results::{
    StorageEstimate, plan_seismograms, url_list_path, write_csv, write_url_list,
};
use crate::sqlite::execute_query_file;

#[derive(Debug, Clone, Args)]
pub struct ExecuteArgs {
    #[arg(long, value_name = "PATH")]
    pub query: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

pub fn run(args: &ExecuteArgs, runtime_paths: &RuntimePaths, catalog: &Catalog) -> Result<()> {
    let query_path = runtime_paths.resolve(&args.query)?;
    let config_path = runtime_paths.resolve(&args.config)?;
    let output = match &args.output {
        Some(path) => runtime_paths.resolve(path)?,
        None => default_results_path(&runtime_paths.out_dir, &query_path),
    };

    let query = QueryFile::read(&query_path)?;
    let config = DatabaseConfig::read(&config_path)?;
    println!(
        "execute: start query={} product={:?} backend={} output={}",
        query_path.display(),
        query.data_product,
        config.describe(),
        output.display()
    );

    let results = execute_query_file(&config, &query)?;
    write_csv(&results, &output)?;
    println!(
        "execute: results rows={} columns={} output={}",
        results.len(),
        results.columns.len(),
        output.display()
    );

    if query.data_product == SEISMOGRAMS {
        println!("execute: stage storage_preflight");
        let plan = plan_seismograms(&results, catalog, &config.seismogram_url_prefix)?;
        let estimate = StorageEstimate::for_plan(&plan);
        if let Err(exceeded) = estimate.check(config.max_temp_bytes, config.max_output_bytes) {
            eprintln!(
                "execute: refused records={} required_bytes={} limit_bytes={} storage={}",
                plan.records,
                exceeded.required_bytes,
                exceeded.limit_bytes,
                exceeded.kind.key()
            );
            return Err(exceeded.into());
        }

        let url_list = url_list_path(&output);
        write_url_list(&plan.containers, &url_list)?;
        println!(
            "execute: urls containers={} records={} temp_bytes={} output_bytes={} urls={}",
            plan.containers.len(),
            plan.records,
            estimate.temp_bytes,
            estimate.output_bytes,
            url_list.display()
        );
    }

    println!("execute: complete next=review {}", output.display());
    Ok(())
}

/// `<out_dir>/<query stem>.data`.
fn default_results_path(out_dir: &Path, query_path: &Path) -> PathBuf {
    let stem = query_path
        .file_stem()
        .map_or_else(|| "csdata".into(), |stem| stem.to_string_lossy());
    out_dir.join(format!("{stem}.data"))
}
