pub mod builder;
pub mod file;
pub mod joins;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

pub use builder::{QueryBuildError, ROTD50_PREDICATE, build_query};
pub use file::QueryFile;
pub use joins::{JOIN_GRAPH, JoinEntry, connect_tables, join_entry};

/// Preferred column order for rendering, matched on the column name with the
/// table qualifier stripped.
pub const FIELD_ORDER: &[&str] = &[
    "Study_Name",
    "Run_ID",
    "CS_Short_Name",
    "CS_Site_Name",
    "CS_Site_Lon",
    "CS_Site_Lat",
    "Target_Vs30",
    "Model_Vs30",
    "Z1_0",
    "Z2_5",
    "Source_ID",
    "Rupture_ID",
    "Rup_Var_ID",
    "Source_Name",
    "Mag",
    "Prob",
    "IM_Type_Value",
    "IM_Type_Component",
    "IM_Type_Measure",
    "IM_Value",
    "Units",
    "Start_Lat",
    "Start_Lon",
    "End_Lat",
    "End_Lon",
    "Hypocenter_Lat",
    "Hypocenter_Lon",
    "Hypocenter_Depth",
];

/// One rupture variation, pinned by an explicit event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTriple {
    pub source_id: i64,
    pub rupture_id: i64,
    pub rupture_variation_id: i64,
}

impl From<[i64; 3]> for EventTriple {
    fn from([source_id, rupture_id, rupture_variation_id]: [i64; 3]) -> Self {
        Self {
            source_id,
            rupture_id,
            rupture_variation_id,
        }
    }
}

/// Accumulates select columns, tables and predicates as unordered sets; all
/// ordering is applied when rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    select: HashSet<String>,
    tables: HashSet<String>,
    predicates: HashSet<String>,
    sort: Option<String>,
    distinct: bool,
    table_remap: BTreeMap<String, String>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_select<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
    }

    pub fn remove_select(&mut self, columns: &[&str]) {
        for column in columns {
            self.select.remove(*column);
        }
    }

    pub fn add_tables<I, S>(&mut self, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(tables.into_iter().map(Into::into));
    }

    pub fn add_predicates<I, S>(&mut self, predicates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates
            .extend(predicates.into_iter().map(Into::into));
    }

    pub fn remove_predicate(&mut self, predicate: &str) {
        self.predicates.remove(predicate);
    }

    pub fn set_sort(&mut self, sort: impl Into<String>) {
        self.sort = Some(sort.into());
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn set_table_remap(&mut self, remap: BTreeMap<String, String>) {
        self.table_remap = remap;
    }

    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    #[must_use]
    pub fn has_select(&self, column: &str) -> bool {
        self.select.contains(column)
    }

    #[must_use]
    pub fn has_predicate(&self, predicate: &str) -> bool {
        self.predicates.contains(predicate)
    }

    #[must_use]
    pub const fn distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn sort_string(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    #[must_use]
    pub fn tables(&self) -> Vec<&str> {
        let mut tables = self.tables.iter().map(String::as_str).collect::<Vec<_>>();
        tables.sort_unstable();
        tables
    }

    #[must_use]
    pub fn predicates(&self) -> Vec<&str> {
        let mut predicates = self
            .predicates
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        predicates.sort_unstable();
        predicates
    }

    /// Select columns in preference order. Columns sharing a name are ordered
    /// by table; columns not in [`FIELD_ORDER`] follow alphabetically.
    #[must_use]
    pub fn select_columns(&self) -> Vec<&str> {
        let mut remaining = self.select.iter().map(String::as_str).collect::<Vec<_>>();
        remaining.sort_unstable();
        let mut ordered = Vec::with_capacity(remaining.len());
        for field in FIELD_ORDER {
            remaining.retain(|column| {
                if column_name(column).eq_ignore_ascii_case(field) {
                    ordered.push(*column);
                    false
                } else {
                    true
                }
            });
        }
        ordered.extend(remaining);
        ordered
    }

    #[must_use]
    pub fn select_string(&self) -> String {
        let columns = self.select_columns().join(",");
        if self.distinct {
            format!("distinct {columns}")
        } else {
            columns
        }
    }

    #[must_use]
    pub fn from_string(&self) -> String {
        self.tables()
            .into_iter()
            .map(|table| match self.table_remap.get(table) {
                Some(physical) => format!("{physical} AS {table}"),
                None => table.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    #[must_use]
    pub fn where_string(&self) -> String {
        self.predicates().join(" and ")
    }

    /// The complete statement, ready to execute.
    #[must_use]
    pub fn statement(&self) -> String {
        compose_statement(
            &self.select_string(),
            &self.from_string(),
            &self.where_string(),
            self.sort_string(),
        )
    }
}

#[must_use]
pub fn compose_statement(select: &str, from: &str, where_clause: &str, sort: Option<&str>) -> String {
    let mut statement = format!("select {select} from {from}");
    if !where_clause.is_empty() {
        statement.push_str(&format!(" where {where_clause}"));
    }
    if let Some(sort) = sort.filter(|sort| !sort.is_empty()) {
        statement.push(' ');
        statement.push_str(sort);
    }
    statement
}

/// Column name without its table qualifier.
#[must_use]
pub fn column_name(column: &str) -> &str {
    column.rsplit_once('.').map_or(column, |(_, name)| name)
}
