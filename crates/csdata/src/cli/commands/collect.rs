use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::RuntimePaths;
use crate::extract::{ByteOrder, ContainerLayout, collect};
use crate::results::parse_url_list;

#[derive(Debug, Clone, Args)]
pub struct CollectArgs {
    #[arg(long, value_name = "PATH")]
    pub urls: PathBuf,

    #[arg(long, default_value_t = false)]
    pub keep_temp: bool,

    /// Byte order of the container header fields.
    #[arg(long, value_enum, default_value_t = ByteOrder::Little)]
    pub byte_order: ByteOrder,
}

pub fn run(args: &CollectArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let urls_path = runtime_paths.resolve(&args.urls)?;
    let input = std::fs::read_to_string(&urls_path)
        .with_context(|| format!("failed to read url list: {}", urls_path.display()))?;
    let requests = parse_url_list(&input)
        .with_context(|| format!("failed to parse url list: {}", urls_path.display()))?;
    println!(
        "collect: start urls={} containers={} temp_dir={} out_dir={}",
        urls_path.display(),
        requests.len(),
        runtime_paths.temp_dir.display(),
        runtime_paths.out_dir.display()
    );

    let layout = ContainerLayout::default().with_byte_order(args.byte_order);
    let summary = collect(
        &requests,
        &layout,
        &runtime_paths.temp_dir,
        &runtime_paths.out_dir,
        args.keep_temp,
        |index, total, request| {
            println!("collect: container {index} of {total} url={}", request.url);
        },
    )?;

    println!(
        "collect: complete containers={} records={} removed_temp={} out_dir={}",
        summary.containers,
        summary.outputs.len(),
        summary.removed_containers.len(),
        runtime_paths.out_dir.display()
    );
    Ok(())
}
