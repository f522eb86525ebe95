pub mod collect;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use tracing::{debug, trace};

use crate::catalog::models::{
    SEISMOGRAM_COMPONENTS, SEISMOGRAM_HEADER_BYTES, SEISMOGRAM_SAMPLE_BYTES,
};

pub use collect::{CollectSummary, collect};

pub const RECORD_ID_OFFSET: usize = 32;
pub const SAMPLE_COUNT_OFFSET: usize = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Fixed record layout of a seismogram container: a header carrying the
/// record id and per-channel sample count, then the interleaved float
/// payload. Records are packed back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLayout {
    pub header_bytes: usize,
    pub id_offset: usize,
    pub count_offset: usize,
    pub channels: u64,
    pub bytes_per_sample: u64,
    pub byte_order: ByteOrder,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        Self {
            header_bytes: SEISMOGRAM_HEADER_BYTES as usize,
            id_offset: RECORD_ID_OFFSET,
            count_offset: SAMPLE_COUNT_OFFSET,
            channels: SEISMOGRAM_COMPONENTS,
            bytes_per_sample: SEISMOGRAM_SAMPLE_BYTES,
            byte_order: ByteOrder::Little,
        }
    }
}

impl ContainerLayout {
    #[must_use]
    pub const fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    fn field(&self, header: &[u8], offset: usize) -> Result<i32> {
        let bytes: [u8; 4] = header
            .get(offset..offset + 4)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| anyhow!("header field at offset {offset} is outside the header"))?;
        Ok(match self.byte_order {
            ByteOrder::Little => i32::from_le_bytes(bytes),
            ByteOrder::Big => i32::from_be_bytes(bytes),
        })
    }

    fn payload_bytes(&self, sample_count: i32) -> Result<u64> {
        let samples = u64::try_from(sample_count)
            .map_err(|_| anyhow!("negative sample count {sample_count} in record header"))?;
        Ok(self.channels * self.bytes_per_sample * samples)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRecordsError {
    pub container: PathBuf,
    pub remaining_ids: Vec<i32>,
}

impl Display for MissingRecordsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ids = self
            .remaining_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "couldn't find rupture variation(s) {ids} in container {}",
            self.container.display()
        )
    }
}

impl std::error::Error for MissingRecordsError {}

/// Identifies the site, run and rupture a container belongs to, which the
/// container itself does not record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNaming {
    pub site: String,
    pub run: String,
    pub source_id: i64,
    pub rupture_id: i64,
}

impl RecordNaming {
    #[must_use]
    pub fn file_name(&self, record_id: i32) -> String {
        format!(
            "Seismogram_{}_{}_{}_{}_{record_id}.grm",
            self.site, self.run, self.source_id, self.rupture_id
        )
    }
}

/// Copies the wanted records out of one container, each to its own file in
/// `out_dir`. Every wanted id must be present; otherwise nothing is left
/// behind and [`MissingRecordsError`] is returned.
pub fn extract_records(
    container: &Path,
    wanted_ids: &BTreeSet<i32>,
    layout: &ContainerLayout,
    naming: &RecordNaming,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let outcome = extract_into(container, wanted_ids, layout, naming, out_dir, &mut written);
    if outcome.is_err() {
        remove_outputs(&written);
        written.clear();
    }
    outcome.map(|()| written)
}

fn extract_into(
    container: &Path,
    wanted_ids: &BTreeSet<i32>,
    layout: &ContainerLayout,
    naming: &RecordNaming,
    out_dir: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let file = File::open(container)
        .with_context(|| format!("failed to open container: {}", container.display()))?;
    let mut reader = BufReader::new(file);
    let mut remaining = wanted_ids.clone();
    let mut header = vec![0_u8; layout.header_bytes];

    while !remaining.is_empty() {
        let read = read_full(&mut reader, &mut header)
            .with_context(|| format!("failed to read container: {}", container.display()))?;
        if read < header.len() {
            return Err(MissingRecordsError {
                container: container.to_path_buf(),
                remaining_ids: remaining.into_iter().collect(),
            }
            .into());
        }

        let record_id = layout.field(&header, layout.id_offset)?;
        let sample_count = layout.field(&header, layout.count_offset)?;
        let payload_bytes = layout.payload_bytes(sample_count)?;

        if remaining.remove(&record_id) {
            let output = out_dir.join(naming.file_name(record_id));
            let file = File::create(&output)
                .with_context(|| format!("failed to create record: {}", output.display()))?;
            written.push(output.clone());

            let mut writer = BufWriter::new(file);
            writer
                .write_all(&header)
                .with_context(|| format!("failed to write record: {}", output.display()))?;
            let copied = std::io::copy(&mut (&mut reader).take(payload_bytes), &mut writer)
                .with_context(|| format!("failed to write record: {}", output.display()))?;
            if copied < payload_bytes {
                bail!(
                    "container {} is truncated inside record {record_id}",
                    container.display()
                );
            }
            writer
                .flush()
                .with_context(|| format!("failed to flush record: {}", output.display()))?;
            debug!(record_id, sample_count, output = %output.display(), "extracted record");
        } else {
            let skip = i64::try_from(payload_bytes)
                .map_err(|_| anyhow!("record {record_id} payload is too large"))?;
            reader
                .seek_relative(skip)
                .with_context(|| format!("failed to seek in container: {}", container.display()))?;
            trace!(record_id, sample_count, "skipped record");
        }
    }
    Ok(())
}

/// Reads until `buffer` is full or the input ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
    Ok(filled)
}

pub(crate) fn remove_outputs(paths: &[PathBuf]) {
    for path in paths {
        if let Err(error) = std::fs::remove_file(path) {
            debug!(path = %path.display(), %error, "could not remove partial output");
        }
    }
}

/// Converts rupture variation ids from a url list to header ids.
pub fn record_ids(ids: &[i64]) -> Result<BTreeSet<i32>> {
    ids.iter()
        .map(|id| {
            i32::try_from(*id).map_err(|_| anyhow!("rupture variation id {id} is out of range"))
        })
        .collect()
}

/// Parses `Seismogram_<site>_<source>_<rupture>[_suffix].grm` into
/// `(source, rupture)`.
pub fn parse_container_name(site: &str, basename: &str) -> Result<(i64, i64)> {
    let Some(rest) = basename
        .strip_prefix("Seismogram_")
        .and_then(|rest| rest.strip_prefix(site))
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        bail!("container name {basename:?} does not start with Seismogram_{site}_");
    };
    let stem = rest.split('.').next().unwrap_or(rest);
    let mut pieces = stem.split('_');
    let (Some(source), Some(rupture)) = (pieces.next(), pieces.next()) else {
        bail!("container name {basename:?} has no source and rupture ids");
    };
    let source = source
        .parse::<i64>()
        .with_context(|| format!("container name {basename:?} has a non-numeric source id"))?;
    let rupture = rupture
        .parse::<i64>()
        .with_context(|| format!("container name {basename:?} has a non-numeric rupture id"))?;
    Ok((source, rupture))
}

#[cfg(test)]
mod tests {
    use super::{ByteOrder, ContainerLayout, parse_container_name, read_full};

    #[test]
    fn reads_header_fields_in_either_byte_order() {
        let mut header = vec![0_u8; 56];
        header[32..36].copy_from_slice(&[0, 0, 0, 5]);
        header[40..44].copy_from_slice(&[0, 0, 0, 2]);

        let big = ContainerLayout::default().with_byte_order(ByteOrder::Big);
        assert_eq!(big.field(&header, 32).expect("id should parse"), 5);
        assert_eq!(big.payload_bytes(2).expect("size should compute"), 16);

        let little = ContainerLayout::default();
        assert_eq!(little.field(&header, 32).expect("id should parse"), 0x0500_0000);
    }

    #[test]
    fn rejects_negative_sample_counts() {
        let layout = ContainerLayout::default();
        assert!(layout.payload_bytes(-1).is_err());
    }

    #[test]
    fn read_full_reports_short_reads() {
        let mut input: &[u8] = &[1, 2, 3];
        let mut buffer = [0_u8; 8];
        assert_eq!(read_full(&mut input, &mut buffer).expect("read should work"), 3);
    }

    #[test]
    fn parses_low_and_broadband_container_names() {
        assert_eq!(
            parse_container_name("USC", "Seismogram_USC_124_262.grm").expect("name should parse"),
            (124, 262)
        );
        assert_eq!(
            parse_container_name("s_1", "Seismogram_s_1_12_0_bb.grm").expect("name should parse"),
            (12, 0)
        );
        assert!(parse_container_name("USC", "Seismogram_PAS_1_2.grm").is_err());
    }
}
