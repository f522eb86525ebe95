use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use super::{
    ContainerLayout, RecordNaming, extract_records, parse_container_name, record_ids,
    remove_outputs,
};
use crate::results::ContainerRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub containers: usize,
    pub outputs: Vec<PathBuf>,
    pub removed_containers: Vec<PathBuf>,
}

/// Local path of an already downloaded container: `<temp>/<site>/<run>/<file>`.
pub fn local_container_path(request: &ContainerRequest, temp_dir: &Path) -> Result<PathBuf> {
    let (site, run, basename) = request.location()?;
    Ok(temp_dir.join(site).join(run).join(basename))
}

/// Extracts every requested record from containers already present under
/// `temp_dir`. Any failure removes all outputs written by this call. The
/// containers are deleted once every record is out, unless `keep_temp`.
pub fn collect(
    requests: &[ContainerRequest],
    layout: &ContainerLayout,
    temp_dir: &Path,
    out_dir: &Path,
    keep_temp: bool,
    mut progress: impl FnMut(usize, usize, &ContainerRequest),
) -> Result<CollectSummary> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory: {}", out_dir.display()))?;

    let mut summary = CollectSummary::default();
    let mut containers = Vec::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        progress(index + 1, requests.len(), request);
        match collect_one(request, layout, temp_dir, out_dir) {
            Ok((container, outputs)) => {
                summary.outputs.extend(outputs);
                containers.push(container);
            }
            Err(error) => {
                remove_outputs(&summary.outputs);
                return Err(error);
            }
        }
    }
    summary.containers = containers.len();

    if !keep_temp {
        for container in containers {
            std::fs::remove_file(&container).with_context(|| {
                format!("failed to remove temporary container: {}", container.display())
            })?;
            summary.removed_containers.push(container);
        }
    }
    Ok(summary)
}

fn collect_one(
    request: &ContainerRequest,
    layout: &ContainerLayout,
    temp_dir: &Path,
    out_dir: &Path,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    let (site, run, basename) = request.location()?;
    let container = local_container_path(request, temp_dir)?;
    if !container.is_file() {
        bail!(
            "container {} has not been downloaded from {}",
            container.display(),
            request.url
        );
    }
    let (source_id, rupture_id) = parse_container_name(site, basename)?;
    let naming = RecordNaming {
        site: site.to_string(),
        run: run.to_string(),
        source_id,
        rupture_id,
    };
    let wanted = record_ids(&request.rupture_variations)?;
    debug!(container = %container.display(), wanted = wanted.len(), "extracting container");

    let outputs = extract_records(&container, &wanted, layout, &naming, out_dir)
        .with_context(|| format!("failed to extract records for {}", request.url))?;
    Ok((container, outputs))
}
