use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PERIOD_FILTER: &str = "Intensity Measure Period";
pub const IM_VALUE_FILTER: &str = "Intensity Measure Value";
pub const MAGNITUDE_FILTER: &str = "Magnitude";
pub const SITE_NAME_FILTER: &str = "Site Name";
pub const SITE_RUPTURE_DISTANCE_FILTER: &str = "Site-Rupture Distance";
pub const SOURCE_NAME_FILTER: &str = "Source Name";

/// Which family of data products a filter constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilterCategory {
    Events,
    Sites,
    Ims,
}

impl FilterCategory {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Sites => "sites",
            Self::Ims => "IMs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Numeric,
    Text,
}

/// A user-supplied filter value. Numbers keep their JSON spelling so that
/// `6.0` renders as `6.0` in generated SQL.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FilterValue {
    Number(#[schemars(with = "f64")] serde_json::Number),
    Text(String),
}

impl FilterValue {
    #[must_use]
    pub fn number(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or_else(|| Self::Text(value.to_string()), Self::Number)
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::Number(serde_json::Number::from(value))
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => number.as_f64(),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }
}

impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left.as_f64() == right.as_f64(),
            (Self::Text(left), Self::Text(right)) => left == right,
            _ => false,
        }
    }
}

impl Display for FilterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    None,
    Range { min: f64, max: f64 },
    Enumerated(Vec<FilterValue>),
}

/// How the values of a filter are to be interpreted. The numeric codes are
/// the `filter_params` values of the request document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SelectionKind {
    Single,
    Multiple,
    Range,
}

impl SelectionKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Single => "single value",
            Self::Multiple => "multiple values",
            Self::Range => "range of values",
        }
    }
}

impl TryFrom<u8> for SelectionKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Single),
            2 => Ok(Self::Multiple),
            3 => Ok(Self::Range),
            other => Err(format!("unknown filter_params value {other}; expected 1, 2 or 3")),
        }
    }
}

impl From<SelectionKind> for u8 {
    fn from(kind: SelectionKind) -> Self {
        match kind {
            SelectionKind::Single => 1,
            SelectionKind::Multiple => 2,
            SelectionKind::Range => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    Unset,
    Single(FilterValue),
    Multiple(Vec<FilterValue>),
    Range { min: FilterValue, max: FilterValue },
}

impl Selection {
    #[must_use]
    pub const fn kind(&self) -> Option<SelectionKind> {
        match self {
            Self::Unset => None,
            Self::Single(_) => Some(SelectionKind::Single),
            Self::Multiple(_) => Some(SelectionKind::Multiple),
            Self::Range { .. } => Some(SelectionKind::Range),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Maps the request document's signed sort flag; zero means unsorted.
    #[must_use]
    pub const fn from_sign(sign: i64) -> Option<Self> {
        if sign > 0 {
            Some(Self::Ascending)
        } else if sign < 0 {
            Some(Self::Descending)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    OutOfRange {
        filter: String,
        value: String,
        min: f64,
        max: f64,
    },
    NotEnumerated {
        filter: String,
        value: String,
    },
    NonNumeric {
        filter: String,
        value: String,
    },
    WrongValueCount {
        filter: String,
        kind: SelectionKind,
        given: usize,
    },
    RangeOnText {
        filter: String,
    },
    InvertedRange {
        filter: String,
        min: String,
        max: String,
    },
    SingleValueOnly {
        filter: String,
        value: String,
    },
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange {
                filter,
                value,
                min,
                max,
            } => write!(
                f,
                "the {filter} filter can only take values [{min}, {max}], got {value}"
            ),
            Self::NotEnumerated { filter, value } => {
                write!(f, "{value} isn't a possible value for the {filter} filter")
            }
            Self::NonNumeric { filter, value } => {
                write!(f, "the {filter} filter expects a number, got {value:?}")
            }
            Self::WrongValueCount {
                filter,
                kind,
                given,
            } => {
                let expected = match kind {
                    SelectionKind::Single => "exactly 1 value",
                    SelectionKind::Multiple => "at least 2 values",
                    SelectionKind::Range => "exactly 2 values",
                };
                write!(
                    f,
                    "the {filter} filter specifies {}, so {expected} must be given (got {given})",
                    kind.key()
                )
            }
            Self::RangeOnText { filter } => {
                write!(f, "a range can't be specified for the non-numeric {filter} filter")
            }
            Self::InvertedRange { filter, min, max } => write!(
                f,
                "maximum value {max} for the {filter} filter needs to be greater than or equal to the minimum value {min}"
            ),
            Self::SingleValueOnly { filter, value } => write!(
                f,
                "{value} can only be given as a single value for the {filter} filter"
            ),
        }
    }
}

impl std::error::Error for FilterError {}

/// One user-selectable predicate. Identity and metadata are fixed when the
/// catalog is built; the selection is set once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub value_type: ValueType,
    pub category: FilterCategory,
    pub where_columns: Vec<String>,
    pub tables: Vec<String>,
    pub contains: bool,
    pub units: Option<String>,
    pub validation: Validation,
    pub requires: Vec<String>,
    pub help: String,
    selection: Selection,
    sort: Option<SortOrder>,
}

impl Filter {
    #[must_use]
    pub fn new(name: &str, value_type: ValueType, category: FilterCategory) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            category,
            where_columns: Vec::new(),
            tables: Vec::new(),
            contains: false,
            units: None,
            validation: Validation::None,
            requires: Vec::new(),
            help: String::new(),
            selection: Selection::Unset,
            sort: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, columns: &[&str], tables: &[&str]) -> Self {
        self.where_columns
            .extend(columns.iter().map(|column| (*column).to_string()));
        self.tables.extend(tables.iter().map(|table| (*table).to_string()));
        self
    }

    #[must_use]
    pub fn matching_contains(mut self) -> Self {
        self.contains = true;
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.validation = Validation::Range { min, max };
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: Vec<FilterValue>) -> Self {
        self.validation = Validation::Enumerated(values);
        self
    }

    #[must_use]
    pub fn requiring(mut self, filter_name: &str) -> Self {
        self.requires.push(filter_name.to_string());
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    /// Replaces the enumerated value list; used to bind model-specific periods.
    pub fn bind_values(&mut self, values: &[FilterValue]) {
        self.validation = Validation::Enumerated(values.to_vec());
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self.value_type, ValueType::Numeric)
    }

    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub const fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    pub fn set_sort(&mut self, sort: Option<SortOrder>) {
        self.sort = sort;
    }

    pub fn clear(&mut self) {
        self.selection = Selection::Unset;
        self.sort = None;
    }

    pub fn set_single(&mut self, value: FilterValue) -> Result<(), FilterError> {
        self.check_value(&value)?;
        self.selection = Selection::Single(value);
        Ok(())
    }

    pub fn set_multiple(&mut self, values: Vec<FilterValue>) -> Result<(), FilterError> {
        if values.len() < 2 {
            return Err(FilterError::WrongValueCount {
                filter: self.name.clone(),
                kind: SelectionKind::Multiple,
                given: values.len(),
            });
        }
        for value in &values {
            self.check_value(value)?;
            // Text values on a numeric filter address a different column family.
            if self.is_numeric() && !value.is_number() {
                return Err(FilterError::SingleValueOnly {
                    filter: self.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        self.selection = Selection::Multiple(values);
        Ok(())
    }

    pub fn set_range(&mut self, min: FilterValue, max: FilterValue) -> Result<(), FilterError> {
        if !self.is_numeric() {
            return Err(FilterError::RangeOnText {
                filter: self.name.clone(),
            });
        }
        let (Some(low), Some(high)) = (min.as_f64(), max.as_f64()) else {
            let offending = if min.is_number() { &max } else { &min };
            return Err(FilterError::NonNumeric {
                filter: self.name.clone(),
                value: offending.to_string(),
            });
        };
        if low > high {
            return Err(FilterError::InvertedRange {
                filter: self.name.clone(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        if let Validation::Range {
            min: lower,
            max: upper,
        } = self.validation
        {
            if low < lower || high > upper {
                let value = if low < lower { &min } else { &max };
                return Err(FilterError::OutOfRange {
                    filter: self.name.clone(),
                    value: value.to_string(),
                    min: lower,
                    max: upper,
                });
            }
        }
        self.selection = Selection::Range { min, max };
        Ok(())
    }

    fn check_value(&self, value: &FilterValue) -> Result<(), FilterError> {
        match &self.validation {
            Validation::Enumerated(allowed) => {
                if !allowed.contains(value) {
                    return Err(FilterError::NotEnumerated {
                        filter: self.name.clone(),
                        value: value.to_string(),
                    });
                }
                Ok(())
            }
            Validation::Range { min, max } => {
                let number = self.numeric_value(value)?;
                if number < *min || number > *max {
                    return Err(FilterError::OutOfRange {
                        filter: self.name.clone(),
                        value: value.to_string(),
                        min: *min,
                        max: *max,
                    });
                }
                Ok(())
            }
            Validation::None => {
                if self.is_numeric() {
                    self.numeric_value(value)?;
                }
                Ok(())
            }
        }
    }

    fn numeric_value(&self, value: &FilterValue) -> Result<f64, FilterError> {
        value.as_f64().ok_or_else(|| FilterError::NonNumeric {
            filter: self.name.clone(),
            value: value.to_string(),
        })
    }

    /// Help text including the valid values, as shown by `catalog filters`.
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut text = self.help.clone();
        match &self.validation {
            Validation::Range { min, max } => {
                text.push_str(&format!("  Valid values are [{min}, {max}]."));
            }
            Validation::Enumerated(values) if !values.is_empty() => {
                let listed = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                text.push_str(&format!("  Possible values: {listed}"));
            }
            _ => {}
        }
        if let Some(units) = &self.units {
            text.push_str(&format!("  Units: {units}."));
        }
        text
    }

    /// Short `name: values` description of the current selection.
    #[must_use]
    pub fn describe_selection(&self) -> String {
        match &self.selection {
            Selection::Unset => format!("{}: <unset>", self.name),
            Selection::Single(value) => format!("{}: {value}", self.name),
            Selection::Multiple(values) => format!(
                "{}: {}",
                self.name,
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Selection::Range { min, max } => format!("{}: [{min},{max}]", self.name),
        }
    }
}

pub(crate) fn create_filters() -> Vec<Filter> {
    vec![
        Filter::new(PERIOD_FILTER, ValueType::Numeric, FilterCategory::Ims)
            .with_query(&["IM_Types.IM_Type_Value"], &["IM_Types"])
            .with_values(Vec::new())
            .with_help("Type of intensity measure."),
        Filter::new(IM_VALUE_FILTER, ValueType::Numeric, FilterCategory::Ims)
            .with_query(&["PeakAmplitudes.IM_Value"], &["PeakAmplitudes"])
            .with_range(0.0, 10000.0)
            .with_units("cm/sec2")
            .requiring(PERIOD_FILTER)
            .with_help("Value of intensity measure, in cm/s2."),
        Filter::new(MAGNITUDE_FILTER, ValueType::Numeric, FilterCategory::Events)
            .with_query(&["Ruptures.Mag"], &["Ruptures"])
            .with_range(5.0, 8.5)
            .with_help("Magnitude of the earthquake."),
        Filter::new(SITE_NAME_FILTER, ValueType::Text, FilterCategory::Sites)
            .with_query(&["CyberShake_Sites.CS_Short_Name"], &["CyberShake_Sites"])
            .with_help("3-5 character site name."),
        Filter::new(
            SITE_RUPTURE_DISTANCE_FILTER,
            ValueType::Numeric,
            FilterCategory::Events,
        )
        .with_query(
            &["CyberShake_Site_Ruptures.Site_Rupture_Dist"],
            &["CyberShake_Site_Ruptures"],
        )
        .with_range(0.0, 200.0)
        .with_units("km")
        .requiring(SITE_NAME_FILTER)
        .with_help(
            "Site-rupture distance, the minimum distance between the site and any point on the rupture surface.",
        ),
        Filter::new(SOURCE_NAME_FILTER, ValueType::Text, FilterCategory::Events)
            .with_query(&["Ruptures.Source_Name"], &["Ruptures"])
            .matching_contains()
            .with_help("Name of the source. Any sources which contain this string will be selected."),
    ]
}
