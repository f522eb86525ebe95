use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::catalog::Catalog;
use crate::config::RuntimePaths;
use crate::query::{QueryFile, build_query};
use crate::request::{RequestDocument, resolve_request};

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    #[arg(long, value_name = "PATH")]
    pub request: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Label used in default file names; defaults to the current time.
    #[arg(long, value_name = "LABEL")]
    pub label: Option<String>,
}

pub fn run(args: &BuildArgs, runtime_paths: &RuntimePaths, catalog: &Catalog) -> Result<()> {
    let request_path = runtime_paths.resolve(&args.request)?;
    let output = match &args.output {
        Some(path) => runtime_paths.resolve(path)?,
        None => default_query_path(&runtime_paths.out_dir, args.label.as_deref()),
    };
    println!(
        "build: start request={} output={}",
        request_path.display(),
        output.display()
    );

    let document = RequestDocument::read(&request_path)?;
    println!("build: stage resolve_request");
    let request = resolve_request(catalog, &document)?;
    println!(
        "build: resolved model={:?} product={:?} filters={} events={}",
        request.model.name,
        request.product.name,
        request.filters.len(),
        request.events.as_ref().map_or(0, Vec::len)
    );

    println!("build: stage build_query");
    let query = build_query(
        request.model,
        request.product,
        &request.filters,
        request.events.as_deref(),
    )?;
    let query_file = QueryFile::from_query(
        &query,
        &request_path.display().to_string(),
        &request.product.name,
    );
    query_file.write(&output)?;
    println!(
        "build: complete tables={} predicates={} query={}",
        query.tables().len(),
        query.predicates().len(),
        output.display()
    );

    Ok(())
}

fn default_query_path(out_dir: &Path, label: Option<&str>) -> PathBuf {
    let label = label.map_or_else(
        || crate::utils::time::request_label(crate::utils::time::now_local()),
        str::to_string,
    );
    out_dir.join(format!("csdata.{label}.query"))
}
