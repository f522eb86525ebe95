use super::filters::FilterCategory;

pub const SITE_INFO: &str = "Site Info";
pub const SEISMOGRAMS: &str = "Seismograms";
pub const INTENSITY_MEASURES: &str = "Intensity Measures";
pub const EVENT_INFO: &str = "Event Info";

/// A requestable category of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataProduct {
    pub name: String,
    /// Retrieval needs the follow-on container extraction step.
    pub requires_files: bool,
    pub select: Vec<String>,
    pub tables: Vec<String>,
    pub metadata_select: Vec<String>,
    pub metadata_tables: Vec<String>,
    pub categories: Vec<FilterCategory>,
    pub distinct: bool,
    pub help: String,
}

impl DataProduct {
    #[must_use]
    pub fn new(name: &str, categories: &[FilterCategory]) -> Self {
        Self {
            name: name.to_string(),
            requires_files: false,
            select: Vec::new(),
            tables: Vec::new(),
            metadata_select: Vec::new(),
            metadata_tables: Vec::new(),
            categories: categories.to_vec(),
            distinct: false,
            help: String::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, columns: &[&str], tables: &[&str]) -> Self {
        self.select.extend(owned(columns));
        self.tables.extend(owned(tables));
        self
    }

    #[must_use]
    pub fn with_metadata_query(mut self, columns: &[&str], tables: &[&str]) -> Self {
        self.metadata_select.extend(owned(columns));
        self.metadata_tables.extend(owned(tables));
        self
    }

    #[must_use]
    pub fn requiring_files(mut self) -> Self {
        self.requires_files = true;
        self
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    #[must_use]
    pub fn accepts(&self, category: FilterCategory) -> bool {
        self.categories.contains(&category)
    }
}

fn owned<'a>(items: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    items.iter().map(|item| (*item).to_string())
}

pub(crate) fn create_data_products() -> Vec<DataProduct> {
    use FilterCategory::{Events, Ims, Sites};

    vec![
        DataProduct::new(SITE_INFO, &[Sites])
            .with_query(
                &[
                    "CyberShake_Sites.CS_Short_Name",
                    "CyberShake_Sites.CS_Site_Name",
                    "CyberShake_Runs.Target_Vs30",
                    "CyberShake_Runs.Model_Vs30",
                    "CyberShake_Runs.Z1_0",
                    "CyberShake_Runs.Z2_5",
                ],
                &["CyberShake_Sites", "CyberShake_Runs"],
            )
            .with_metadata_query(
                &["CyberShake_Sites.CS_Site_Lat", "CyberShake_Sites.CS_Site_Lon"],
                &["CyberShake_Sites"],
            )
            .with_help("Site name, location, and velocity parameters."),
        DataProduct::new(SEISMOGRAMS, &[Sites, Events, Ims])
            .requiring_files()
            .with_query(
                &[
                    "CyberShake_Runs.Run_ID",
                    "CyberShake_Sites.CS_Short_Name",
                    "CyberShake_Site_Ruptures.Source_ID",
                    "CyberShake_Site_Ruptures.Rupture_ID",
                    "Rupture_Variations.Rup_Var_ID",
                    "Studies.Study_Name",
                ],
                &[
                    "CyberShake_Runs",
                    "CyberShake_Sites",
                    "CyberShake_Site_Ruptures",
                    "Rupture_Variations",
                    "Studies",
                ],
            )
            .with_metadata_query(
                &[
                    "CyberShake_Sites.CS_Short_Name",
                    "CyberShake_Runs.Run_ID",
                    "Ruptures.Mag",
                    "Ruptures.Prob",
                    "Ruptures.Source_Name",
                    "Rupture_Variations.Hypocenter_Lat",
                    "Rupture_Variations.Hypocenter_Lon",
                    "Rupture_Variations.Hypocenter_Depth",
                ],
                &[
                    "CyberShake_Sites",
                    "CyberShake_Runs",
                    "Ruptures",
                    "Rupture_Variations",
                ],
            )
            .with_help("Velocity seismogram files."),
        DataProduct::new(INTENSITY_MEASURES, &[Sites, Events, Ims])
            .with_query(&["PeakAmplitudes.IM_Value"], &["PeakAmplitudes"])
            .with_metadata_query(
                &[
                    "CyberShake_Sites.CS_Short_Name",
                    "PeakAmplitudes.Run_ID",
                    "PeakAmplitudes.Source_ID",
                    "PeakAmplitudes.Rupture_ID",
                    "PeakAmplitudes.Rup_Var_ID",
                    "Ruptures.Mag",
                    "Ruptures.Prob",
                    "Ruptures.Source_Name",
                    "IM_Types.IM_Type_Value",
                    "IM_Types.IM_Type_Component",
                    "IM_Types.Units",
                    "Rupture_Variations.Hypocenter_Lat",
                    "Rupture_Variations.Hypocenter_Lon",
                    "Rupture_Variations.Hypocenter_Depth",
                ],
                &[
                    "CyberShake_Sites",
                    "PeakAmplitudes",
                    "Ruptures",
                    "IM_Types",
                    "Rupture_Variations",
                ],
            )
            .with_help("RotD50 intensity measure data."),
        DataProduct::new(EVENT_INFO, &[Sites, Events])
            .distinct()
            .with_metadata_query(
                &[
                    "Ruptures.Source_ID",
                    "Ruptures.Rupture_ID",
                    "Ruptures.Source_Name",
                    "Ruptures.Mag",
                    "Ruptures.Prob",
                    "Ruptures.Start_Lat",
                    "Ruptures.Start_Lon",
                    "Ruptures.End_Lat",
                    "Ruptures.End_Lon",
                    "Rupture_Variations.Rup_Var_ID",
                    "Rupture_Variations.Hypocenter_Lat",
                    "Rupture_Variations.Hypocenter_Lon",
                    "Rupture_Variations.Hypocenter_Depth",
                ],
                &["Ruptures", "Rupture_Variations", "CyberShake_Site_Ruptures"],
            )
            .with_help("Metadata about individual events."),
    ]
}
