use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use csv::{QuoteStyle, WriterBuilder};
use rusqlite::types::Value as SqlValue;

use crate::catalog::Catalog;
use crate::sqlite::ResultSet;

pub const SEISMOGRAM_FILE_EXTENSION: &str = ".grm";

/// Display names for result columns.
#[must_use]
pub fn field_alias(column: &str) -> &str {
    match column {
        "CS_Short_Name" => "Site_Name",
        "CS_Site_Name" => "Site_Long_Name",
        "CS_Site_Lon" => "Site_Longitude",
        "CS_Site_Lat" => "Site_Latitude",
        "Prob" => "Rupture_Probability",
        "Mag" => "Magnitude",
        "IM_Type_Value" => "Period",
        "IM_Type_Component" => "Component",
        "Rup_Var_ID" => "Rupture_Variation_ID",
        "Target_Vs30" => "Thompson_Vs30",
        "Model_Vs30" => "3D_CVM_Vs30",
        "Z1_0" => "Z1.0",
        "Z2_5" => "Z2.5",
        other => other,
    }
}

pub fn write_csv(results: &ResultSet, path: &Path) -> Result<()> {
    create_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create results file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    render_csv(results, &mut writer)
        .with_context(|| format!("failed to write results file: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush results file: {}", path.display()))
}

/// Header of display aliases, then one line per row. Text is quoted and
/// numbers are bare.
pub fn render_csv<W: Write>(results: &ResultSet, writer: &mut W) -> csv::Result<()> {
    let mut header = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(&mut *writer);
    header.write_record(results.columns.iter().map(|column| field_alias(column)))?;
    header.flush()?;
    drop(header);

    let mut rows = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(writer);
    for row in &results.rows {
        rows.write_record(row.iter().map(csv_field))?;
    }
    rows.flush()?;
    Ok(())
}

fn csv_field(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        SqlValue::Integer(value) => value.to_string(),
        SqlValue::Real(value) => format!("{value:?}"),
        SqlValue::Text(value) => value.clone(),
        SqlValue::Blob(value) => format!("blob:{} bytes", value.len()),
    }
}

/// One remote container file and the rupture variations wanted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub url: String,
    pub rupture_variations: Vec<i64>,
}

impl ContainerRequest {
    #[must_use]
    pub fn render(&self) -> String {
        let ids = self
            .rupture_variations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{} {ids}", self.url)
    }

    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let (Some(url), Some(ids), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("expected `<url> <ids>`, got {line:?}"));
        };
        let rupture_variations = ids
            .split(',')
            .map(|id| {
                id.trim()
                    .parse::<i64>()
                    .with_context(|| format!("invalid rupture variation id {id:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            url: url.to_string(),
            rupture_variations,
        })
    }

    /// `(site, run, file name)` taken from the last three URL segments.
    pub fn location(&self) -> Result<(&str, &str, &str)> {
        let mut segments = self.url.rsplit('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(basename), Some(run), Some(site))
                if !basename.is_empty() && !run.is_empty() && !site.is_empty() =>
            {
                Ok((site, run, basename))
            }
            _ => Err(anyhow!(
                "container url must end in <site>/<run>/<file>: {}",
                self.url
            )),
        }
    }
}

pub fn render_url_list(requests: &[ContainerRequest]) -> String {
    requests
        .iter()
        .map(|request| format!("{}\n", request.render()))
        .collect()
}

pub fn parse_url_list(input: &str) -> Result<Vec<ContainerRequest>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            ContainerRequest::parse(line).with_context(|| format!("url list line {}", index + 1))
        })
        .collect()
}

/// Container requests and the total size of the records they will yield.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeismogramPlan {
    pub containers: Vec<ContainerRequest>,
    pub records: u64,
    pub record_bytes: u64,
}

/// Groups seismogram result rows by container file, in first-seen order.
pub fn plan_seismograms(
    results: &ResultSet,
    catalog: &Catalog,
    url_prefix: &str,
) -> Result<SeismogramPlan> {
    let column = |name: &str| {
        results
            .column_index(name)
            .ok_or_else(|| anyhow!("seismogram results have no {name} column"))
    };
    let study = column("Study_Name")?;
    let site = column("CS_Short_Name")?;
    let run = column("Run_ID")?;
    let source = column("Source_ID")?;
    let rupture = column("Rupture_ID")?;
    let rupture_variation = column("Rup_Var_ID")?;

    let mut plan = SeismogramPlan::default();
    let mut by_url: HashMap<String, usize> = HashMap::new();
    for (index, row) in results.rows.iter().enumerate() {
        let text = |position: usize| {
            sql_text(&row[position]).with_context(|| format!("result row {}", index + 1))
        };
        let integer = |position: usize| {
            sql_integer(&row[position]).with_context(|| format!("result row {}", index + 1))
        };

        let study_name = text(study)?;
        let model = catalog
            .model(&study_name)
            .ok_or_else(|| anyhow!("result row {} names unknown study {study_name:?}", index + 1))?;
        let site_name = text(site)?;
        let url = format!(
            "{url_prefix}/{site_name}/{}/Seismogram_{site_name}_{}_{}{}{SEISMOGRAM_FILE_EXTENSION}",
            integer(run)?,
            integer(source)?,
            integer(rupture)?,
            model.seismogram_suffix,
        );
        let rupture_variation = integer(rupture_variation)?;

        match by_url.entry(url) {
            Entry::Occupied(slot) => plan.containers[*slot.get()]
                .rupture_variations
                .push(rupture_variation),
            Entry::Vacant(slot) => {
                plan.containers.push(ContainerRequest {
                    url: slot.key().clone(),
                    rupture_variations: vec![rupture_variation],
                });
                slot.insert(plan.containers.len() - 1);
            }
        }
        plan.records += 1;
        plan.record_bytes += model.seismogram_record_bytes();
    }
    Ok(plan)
}

fn sql_text(value: &SqlValue) -> Result<String> {
    match value {
        SqlValue::Text(text) => Ok(text.clone()),
        SqlValue::Integer(value) => Ok(value.to_string()),
        other => Err(anyhow!("expected text, got {other:?}")),
    }
}

fn sql_integer(value: &SqlValue) -> Result<i64> {
    match value {
        SqlValue::Integer(value) => Ok(*value),
        SqlValue::Text(text) => text
            .trim()
            .parse::<i64>()
            .with_context(|| format!("expected integer, got {text:?}")),
        other => Err(anyhow!("expected integer, got {other:?}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Temporary,
    Output,
}

impl StorageKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Output => "output",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLimitExceeded {
    pub required_bytes: u64,
    pub limit_bytes: u64,
    pub kind: StorageKind,
}

impl Display for StorageLimitExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "seismogram retrieval needs at least {} bytes of {} storage, but the limit is {} bytes",
            self.required_bytes,
            self.kind.key(),
            self.limit_bytes
        )
    }
}

impl std::error::Error for StorageLimitExceeded {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub temp_bytes: u64,
    pub output_bytes: u64,
}

impl StorageEstimate {
    /// Each container holds at least the records requested from it, so the
    /// temporary estimate is a lower bound.
    #[must_use]
    pub const fn for_plan(plan: &SeismogramPlan) -> Self {
        Self {
            temp_bytes: plan.record_bytes,
            output_bytes: plan.record_bytes,
        }
    }

    pub fn check(
        self,
        max_temp_bytes: Option<u64>,
        max_output_bytes: Option<u64>,
    ) -> Result<(), StorageLimitExceeded> {
        let checks = [
            (self.temp_bytes, max_temp_bytes, StorageKind::Temporary),
            (self.output_bytes, max_output_bytes, StorageKind::Output),
        ];
        for (required_bytes, limit, kind) in checks {
            if let Some(limit_bytes) = limit
                && required_bytes > limit_bytes
            {
                return Err(StorageLimitExceeded {
                    required_bytes,
                    limit_bytes,
                    kind,
                });
            }
        }
        Ok(())
    }
}

/// `<stem>.urls` next to the results file.
#[must_use]
pub fn url_list_path(results_path: &Path) -> PathBuf {
    results_path.with_extension("urls")
}

pub fn write_url_list(requests: &[ContainerRequest], path: &Path) -> Result<()> {
    create_parent_dir(path)?;
    std::fs::write(path, render_url_list(requests))
        .with_context(|| format!("failed to write url list: {}", path.display()))
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{StorageEstimate, StorageKind, field_alias, plan_seismograms, render_csv};
    use crate::catalog::Catalog;
    use crate::sqlite::ResultSet;
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn aliases_known_fields_and_passes_others_through() {
        assert_eq!(field_alias("CS_Short_Name"), "Site_Name");
        assert_eq!(field_alias("Model_Vs30"), "3D_CVM_Vs30");
        assert_eq!(field_alias("Hypocenter_Lat"), "Hypocenter_Lat");
    }

    #[test]
    fn renders_csv_with_quoted_text_and_bare_numbers() {
        let results = ResultSet {
            columns: vec!["CS_Short_Name".into(), "Mag".into(), "Rup_Var_ID".into()],
            rows: vec![
                vec![
                    SqlValue::Text("say \"hi\", USC".into()),
                    SqlValue::Real(7.0),
                    SqlValue::Integer(42),
                ],
                vec![SqlValue::Text("PAS".into()), SqlValue::Real(6.55), SqlValue::Integer(7)],
            ],
        };

        let mut output = Vec::new();
        render_csv(&results, &mut output).expect("csv should render");

        assert_eq!(
            String::from_utf8(output).expect("csv should be utf-8"),
            "Site_Name,Magnitude,Rupture_Variation_ID\n\"say \"\"hi\"\", USC\",7.0,42\n\"PAS\",6.55,7\n"
        );
    }

    #[test]
    fn groups_interleaved_rows_by_container_in_first_seen_order() {
        let catalog = Catalog::load().expect("catalog should load");
        let row = |site: &str, run: i64, source: i64, rupture_variation: i64| {
            vec![
                SqlValue::Text("Study 22.12 LF".into()),
                SqlValue::Text(site.into()),
                SqlValue::Integer(run),
                SqlValue::Integer(source),
                SqlValue::Integer(0),
                SqlValue::Integer(rupture_variation),
            ]
        };
        let results = ResultSet {
            columns: ["Study_Name", "CS_Short_Name", "Run_ID", "Source_ID", "Rupture_ID", "Rup_Var_ID"]
                .map(String::from)
                .to_vec(),
            rows: vec![
                row("USC", 9306, 12, 1),
                row("PAS", 9307, 12, 4),
                row("USC", 9306, 12, 2),
                row("USC", 9306, 13, 3),
                row("PAS", 9307, 12, 5),
            ],
        };

        let plan = plan_seismograms(&results, &catalog, "https://host/cs").expect("plan should build");

        let containers = plan
            .containers
            .iter()
            .map(|container| container.render())
            .collect::<Vec<_>>();
        assert_eq!(
            containers,
            vec![
                "https://host/cs/USC/9306/Seismogram_USC_12_0.grm 1,2",
                "https://host/cs/PAS/9307/Seismogram_PAS_12_0.grm 4,5",
                "https://host/cs/USC/9306/Seismogram_USC_13_0.grm 3",
            ]
        );
        assert_eq!(plan.records, 5);
    }

    #[test]
    fn storage_check_reports_the_first_exceeded_ceiling() {
        let estimate = StorageEstimate {
            temp_bytes: 500,
            output_bytes: 500,
        };
        assert!(estimate.check(None, None).is_ok());
        assert!(estimate.check(Some(500), Some(500)).is_ok());

        let exceeded = estimate
            .check(Some(1000), Some(499))
            .expect_err("output ceiling should be exceeded");
        assert_eq!(exceeded.kind, StorageKind::Output);
        assert_eq!(exceeded.required_bytes, 500);
        assert_eq!(exceeded.limit_bytes, 499);
    }
}
