use std::fmt::{Display, Formatter};

use tracing::debug;

use super::{EventTriple, Query, connect_tables};
use crate::catalog::filters::PERIOD_FILTER;
use crate::catalog::{
    CatalogError, DataProduct, Filter, FilterCategory, FilterValue, Model, Selection,
};

pub const IM_TYPES_TABLE: &str = "IM_Types";
pub const RUPTURE_VARIATIONS_TABLE: &str = "Rupture_Variations";
pub const ROTD50_PREDICATE: &str = "IM_Types.IM_Type_Component='RotD50'";
pub const IM_MEASURE_COLUMN: &str = "IM_Types.IM_Type_Measure";
pub const IM_PERIOD_COLUMNS: &[&str] = &["IM_Types.IM_Type_Value", "IM_Types.IM_Type_Component"];

/// Period values stored as measures rather than RotD50 periods.
pub const MEASURE_PERIODS: &[&str] = &["PGA", "PGV"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryBuildError {
    UnsetSelection { filter: String },
    Catalog(CatalogError),
}

impl Display for QueryBuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsetSelection { filter } => {
                write!(f, "filter {filter} reached the query builder without a selection")
            }
            Self::Catalog(error) => Display::fmt(error, f),
        }
    }
}

impl std::error::Error for QueryBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnsetSelection { .. } => None,
            Self::Catalog(error) => std::error::Error::source(error),
        }
    }
}

impl From<CatalogError> for QueryBuildError {
    fn from(error: CatalogError) -> Self {
        Self::Catalog(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentRestriction {
    Unrestricted,
    RotD50,
    Measure,
}

/// Builds the query for one request. Pure: filter values were validated when
/// their selections were set, so the only failures are caller or catalog
/// defects.
pub fn build_query(
    model: &Model,
    product: &DataProduct,
    filters: &[Filter],
    events: Option<&[EventTriple]>,
) -> Result<Query, QueryBuildError> {
    let mut query = Query::new();

    let (scope_table, scope_predicate) = model.scope();
    query.add_tables([scope_table]);
    query.add_predicates([scope_predicate]);
    query.set_table_remap(model.table_remap.clone());

    query.add_select(product.select.iter().cloned());
    query.add_tables(product.tables.iter().cloned());
    if product.distinct {
        query.set_distinct(true);
    }
    query.add_select(product.metadata_select.iter().cloned());
    query.add_tables(product.metadata_tables.iter().cloned());

    let mut component = ComponentRestriction::Unrestricted;
    if query.has_table(IM_TYPES_TABLE) {
        query.add_predicates([ROTD50_PREDICATE]);
        component = ComponentRestriction::RotD50;
    }

    for filter in filters {
        let column = filter
            .where_columns
            .first()
            .ok_or_else(|| CatalogError::NoWhereColumn {
                filter: filter.name.clone(),
            })?;
        debug!(filter = %filter.name, selection = %filter.describe_selection(), "merging filter");

        let measure = measure_override(filter);
        if filter.category == FilterCategory::Ims {
            if let Some(measure) = measure {
                query.add_tables([IM_TYPES_TABLE]);
                query.remove_predicate(ROTD50_PREDICATE);
                query.remove_select(IM_PERIOD_COLUMNS);
                query.add_select([IM_MEASURE_COLUMN]);
                query.add_predicates([format!("{IM_MEASURE_COLUMN}='{measure}'")]);
                component = ComponentRestriction::Measure;
            } else if component == ComponentRestriction::Unrestricted {
                query.add_tables([IM_TYPES_TABLE]);
                query.add_predicates([ROTD50_PREDICATE]);
                component = ComponentRestriction::RotD50;
            }
        }

        query.add_tables(filter.tables.iter().cloned());

        if measure.is_none() {
            let predicate = match filter.selection() {
                Selection::Unset => {
                    return Err(QueryBuildError::UnsetSelection {
                        filter: filter.name.clone(),
                    });
                }
                Selection::Single(value) => value_predicate(filter, column, value),
                Selection::Multiple(values) => format!(
                    "({})",
                    values
                        .iter()
                        .map(|value| value_predicate(filter, column, value))
                        .collect::<Vec<_>>()
                        .join(" or ")
                ),
                Selection::Range { min, max } => format!(
                    "{column}>={} and {column}<={}",
                    sql_literal(filter, min),
                    sql_literal(filter, max)
                ),
            };
            query.add_predicates([predicate]);
        }

        // Only one sort clause is supported; the last sorted filter wins.
        if let Some(order) = filter.sort() {
            query.set_sort(format!("order by {column} {}", order.keyword()));
        }
    }

    if let Some(events) = events.filter(|events| !events.is_empty()) {
        query.add_tables([RUPTURE_VARIATIONS_TABLE]);
        let pinned = events
            .iter()
            .map(|event| {
                format!(
                    "({table}.Source_ID={} and {table}.Rupture_ID={} and {table}.Rup_Var_ID={})",
                    event.source_id,
                    event.rupture_id,
                    event.rupture_variation_id,
                    table = RUPTURE_VARIATIONS_TABLE
                )
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        query.add_predicates([format!("({pinned})")]);
    }

    connect_tables(&mut query)?;
    Ok(query)
}

/// `PGA`/`PGV` chosen as the single period value select a measure column
/// instead of a RotD50 period.
fn measure_override(filter: &Filter) -> Option<&str> {
    if filter.name != PERIOD_FILTER {
        return None;
    }
    match filter.selection() {
        Selection::Single(FilterValue::Text(value))
            if MEASURE_PERIODS.contains(&value.as_str()) =>
        {
            Some(value.as_str())
        }
        _ => None,
    }
}

fn value_predicate(filter: &Filter, column: &str, value: &FilterValue) -> String {
    if filter.contains {
        format!("{column} LIKE '%{}%'", escape_text(&value.to_string()))
    } else {
        format!("{column}={}", sql_literal(filter, value))
    }
}

fn sql_literal(filter: &Filter, value: &FilterValue) -> String {
    match value {
        FilterValue::Number(number) if filter.is_numeric() => number.to_string(),
        other => format!("'{}'", escape_text(&other.to_string())),
    }
}

fn escape_text(value: &str) -> String {
    value.replace('\'', "''")
}
