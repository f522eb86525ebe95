use std::collections::BTreeMap;

use super::filters::FilterValue;
use super::products::{EVENT_INFO, INTENSITY_MEASURES, SEISMOGRAMS, SITE_INFO};

pub const STUDY_22_12_LF: &str = "Study 22.12 LF";
pub const STUDY_22_12_BB: &str = "Study 22.12 BB";
pub const STUDIES_TABLE: &str = "Studies";

pub const SEISMOGRAM_HEADER_BYTES: u64 = 56;
pub const SEISMOGRAM_COMPONENTS: u64 = 2;
pub const SEISMOGRAM_SAMPLE_BYTES: u64 = 4;

/// One versioned run of the simulation dataset. Every query is scoped to
/// exactly one study.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    /// Valid values for the intensity measure period filter.
    pub periods: Vec<FilterValue>,
    pub products: Vec<String>,
    /// Standard table name to study-specific physical table name.
    pub table_remap: BTreeMap<String, String>,
    /// Samples per component in each seismogram record.
    pub seismogram_samples: u64,
    pub seismogram_suffix: String,
}

impl Model {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            periods: Vec::new(),
            products: Vec::new(),
            table_remap: BTreeMap::new(),
            seismogram_samples: 0,
            seismogram_suffix: String::new(),
        }
    }

    #[must_use]
    pub fn with_periods(mut self, periods: Vec<FilterValue>) -> Self {
        self.periods = periods;
        self
    }

    #[must_use]
    pub fn with_products(mut self, products: &[&str]) -> Self {
        self.products = products.iter().map(|name| (*name).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_table_remap(mut self, standard: &str, physical: &str) -> Self {
        self.table_remap
            .insert(standard.to_string(), physical.to_string());
        self
    }

    #[must_use]
    pub fn with_seismograms(mut self, samples: u64, suffix: &str) -> Self {
        self.seismogram_samples = samples;
        self.seismogram_suffix = suffix.to_string();
        self
    }

    /// The table and predicate that scope a query to this study.
    #[must_use]
    pub fn scope(&self) -> (String, String) {
        (
            STUDIES_TABLE.to_string(),
            format!("{STUDIES_TABLE}.Study_Name=\"{}\"", self.name),
        )
    }

    #[must_use]
    pub fn supports(&self, product: &str) -> bool {
        self.products.iter().any(|name| name == product)
    }

    /// Size of one extracted seismogram file: header plus two float channels.
    #[must_use]
    pub const fn seismogram_record_bytes(&self) -> u64 {
        SEISMOGRAM_HEADER_BYTES
            + SEISMOGRAM_COMPONENTS * SEISMOGRAM_SAMPLE_BYTES * self.seismogram_samples
    }
}

fn periods(values: &[f64], measures: &[&str]) -> Vec<FilterValue> {
    values
        .iter()
        .map(|value| FilterValue::number(*value))
        .chain(measures.iter().map(|measure| FilterValue::text(*measure)))
        .collect()
}

pub(crate) fn create_models() -> Vec<Model> {
    let all_products = [SITE_INFO, SEISMOGRAMS, INTENSITY_MEASURES, EVENT_INFO];
    vec![
        Model::new(STUDY_22_12_LF)
            .with_periods(periods(&[2.0, 3.0, 4.0, 5.0, 7.5, 10.0], &["PGV"]))
            .with_products(&all_products)
            .with_seismograms(8_000, ""),
        Model::new(STUDY_22_12_BB)
            .with_periods(periods(
                &[
                    0.01, 0.02, 0.03, 0.04, 0.05, 0.075, 0.1, 0.2, 0.3, 0.4, 0.5, 0.75, 1.0, 2.0,
                    3.0, 4.0, 5.0, 7.5, 10.0,
                ],
                &["PGV", "PGA"],
            ))
            .with_products(&all_products)
            .with_seismograms(40_000, "_bb"),
    ]
}
