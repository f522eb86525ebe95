use std::fmt::{Display, Formatter};
use std::path::Path;

use anyhow::{Context, Result};
use schemars::{JsonSchema, Schema};
use serde::{Deserialize, Serialize};

use crate::catalog::filters::PERIOD_FILTER;
use crate::catalog::{
    Catalog, DataProduct, Filter, FilterError, FilterValue, Model, SelectionKind, SortOrder,
};
use crate::query::EventTriple;

/// Longer event lists make the generated statement too long for the server.
pub const MAX_EVENT_LIST_LENGTH: usize = 120_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamedEntry {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestFilter {
    pub name: String,
    #[schemars(with = "u8")]
    pub filter_params: SelectionKind,
    pub values: Vec<FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,
}

/// The persisted description of one data request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestDocument {
    pub model: NamedEntry,
    pub products: NamedEntry,
    #[serde(default)]
    pub filters: Vec<RequestFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_list: Option<Vec<[i64; 3]>>,
}

impl RequestDocument {
    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("request document is not valid")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file: {}", path.display()))?;
        Self::parse(&input)
            .with_context(|| format!("failed to parse request file: {}", path.display()))
    }
}

/// JSON Schema describing [`RequestDocument`].
#[must_use]
pub fn json_schema() -> Schema {
    schemars::schema_for!(RequestDocument)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    UnknownModel { name: String },
    UnknownProduct { name: String },
    UnknownFilter { name: String },
    UnsupportedProduct { model: String, product: String },
    FilterNotAccepted { filter: String, product: String },
    DuplicateFilter { name: String },
    MissingRequiredFilter { filter: String, required: String },
    EventListTooLong { given: usize },
    Filter(FilterError),
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModel { name } => write!(f, "unknown model {name:?}"),
            Self::UnknownProduct { name } => write!(f, "unknown data product {name:?}"),
            Self::UnknownFilter { name } => write!(f, "unknown filter {name:?}"),
            Self::UnsupportedProduct { model, product } => {
                write!(f, "{model} does not provide the {product} data product")
            }
            Self::FilterNotAccepted { filter, product } => {
                write!(f, "the {filter} filter does not apply to the {product} data product")
            }
            Self::DuplicateFilter { name } => {
                write!(f, "the {name} filter is given more than once")
            }
            Self::MissingRequiredFilter { filter, required } => {
                write!(f, "the {filter} filter also requires the {required} filter")
            }
            Self::EventListTooLong { given } => write!(
                f,
                "event list has {given} entries; at most {MAX_EVENT_LIST_LENGTH} are supported"
            ),
            Self::Filter(error) => Display::fmt(error, f),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Filter(error) => std::error::Error::source(error),
            _ => None,
        }
    }
}

impl From<FilterError> for RequestError {
    fn from(error: FilterError) -> Self {
        Self::Filter(error)
    }
}

/// A request document checked against the catalog, ready for the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest<'a> {
    pub model: &'a Model,
    pub product: &'a DataProduct,
    pub filters: Vec<Filter>,
    pub events: Option<Vec<EventTriple>>,
}

pub fn resolve_request<'a>(
    catalog: &'a Catalog,
    document: &RequestDocument,
) -> Result<ResolvedRequest<'a>, RequestError> {
    let model = catalog
        .model(&document.model.name)
        .ok_or_else(|| RequestError::UnknownModel {
            name: document.model.name.clone(),
        })?;
    let product = catalog
        .product(&document.products.name)
        .ok_or_else(|| RequestError::UnknownProduct {
            name: document.products.name.clone(),
        })?;
    if !model.supports(&product.name) {
        return Err(RequestError::UnsupportedProduct {
            model: model.name.clone(),
            product: product.name.clone(),
        });
    }

    let mut filters: Vec<Filter> = Vec::with_capacity(document.filters.len());
    for requested in &document.filters {
        let template = catalog
            .filter(&requested.name)
            .ok_or_else(|| RequestError::UnknownFilter {
                name: requested.name.clone(),
            })?;
        if filters.iter().any(|filter| filter.name == template.name) {
            return Err(RequestError::DuplicateFilter {
                name: template.name.clone(),
            });
        }
        if !product.accepts(template.category) {
            return Err(RequestError::FilterNotAccepted {
                filter: template.name.clone(),
                product: product.name.clone(),
            });
        }

        let mut filter = template.clone();
        if filter.name == PERIOD_FILTER {
            filter.bind_values(&model.periods);
        }
        apply_selection(&mut filter, requested)?;
        filter.set_sort(requested.sort.and_then(SortOrder::from_sign));
        filters.push(filter);
    }

    for filter in &filters {
        for required in &filter.requires {
            if !filters.iter().any(|selected| &selected.name == required) {
                return Err(RequestError::MissingRequiredFilter {
                    filter: filter.name.clone(),
                    required: required.clone(),
                });
            }
        }
    }

    let events = match &document.event_list {
        Some(list) if list.len() > MAX_EVENT_LIST_LENGTH => {
            return Err(RequestError::EventListTooLong { given: list.len() });
        }
        Some(list) if !list.is_empty() => {
            Some(list.iter().copied().map(EventTriple::from).collect())
        }
        _ => None,
    };

    Ok(ResolvedRequest {
        model,
        product,
        filters,
        events,
    })
}

fn apply_selection(filter: &mut Filter, requested: &RequestFilter) -> Result<(), FilterError> {
    let values = &requested.values;
    let name = filter.name.clone();
    let wrong_count = || FilterError::WrongValueCount {
        filter: name.clone(),
        kind: requested.filter_params,
        given: values.len(),
    };
    match requested.filter_params {
        SelectionKind::Single => {
            let [value] = values.as_slice() else {
                return Err(wrong_count());
            };
            filter.set_single(value.clone())
        }
        SelectionKind::Multiple => filter.set_multiple(values.clone()),
        SelectionKind::Range => {
            let [min, max] = values.as_slice() else {
                return Err(wrong_count());
            };
            filter.set_range(min.clone(), max.clone())
        }
    }
}
