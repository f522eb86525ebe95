use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace};

use super::Query;
use crate::catalog::CatalogError;

/// Join predicates for one unordered table pair. `left` sorts before `right`.
/// A non-empty `bridge` names tables that must be pulled in because the pair
/// has no direct join; such entries apply only while the pair is still
/// disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinEntry {
    pub left: &'static str,
    pub right: &'static str,
    pub predicates: &'static [&'static str],
    pub bridge: &'static [&'static str],
}

pub const KNOWN_TABLES: &[&str] = &[
    "CyberShake_Runs",
    "CyberShake_Site_Ruptures",
    "CyberShake_Sites",
    "IM_Types",
    "PeakAmplitudes",
    "Rupture_Variations",
    "Ruptures",
    "Studies",
];

pub const JOIN_GRAPH: &[JoinEntry] = &[
    JoinEntry {
        left: "CyberShake_Runs",
        right: "CyberShake_Sites",
        predicates: &["CyberShake_Runs.Site_ID=CyberShake_Sites.CS_Site_ID"],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Runs",
        right: "PeakAmplitudes",
        predicates: &["CyberShake_Runs.Run_ID=PeakAmplitudes.Run_ID"],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Runs",
        right: "Rupture_Variations",
        predicates: &[
            "CyberShake_Runs.ERF_ID=Rupture_Variations.ERF_ID",
            "CyberShake_Runs.Rup_Var_Scenario_ID=Rupture_Variations.Rup_Var_Scenario_ID",
        ],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Runs",
        right: "Ruptures",
        predicates: &["CyberShake_Runs.ERF_ID=Ruptures.ERF_ID"],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Runs",
        right: "Studies",
        predicates: &["CyberShake_Runs.Study_ID=Studies.Study_ID"],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Site_Ruptures",
        right: "CyberShake_Sites",
        predicates: &["CyberShake_Site_Ruptures.CS_Site_ID=CyberShake_Sites.CS_Site_ID"],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Site_Ruptures",
        right: "Ruptures",
        predicates: &[
            "CyberShake_Site_Ruptures.ERF_ID=Ruptures.ERF_ID",
            "CyberShake_Site_Ruptures.Source_ID=Ruptures.Source_ID",
            "CyberShake_Site_Ruptures.Rupture_ID=Ruptures.Rupture_ID",
        ],
        bridge: &[],
    },
    JoinEntry {
        left: "CyberShake_Sites",
        right: "Studies",
        predicates: &[
            "CyberShake_Runs.Site_ID=CyberShake_Sites.CS_Site_ID",
            "CyberShake_Runs.Study_ID=Studies.Study_ID",
        ],
        bridge: &["CyberShake_Runs"],
    },
    JoinEntry {
        left: "IM_Types",
        right: "PeakAmplitudes",
        predicates: &["IM_Types.IM_Type_ID=PeakAmplitudes.IM_Type_ID"],
        bridge: &[],
    },
    JoinEntry {
        left: "IM_Types",
        right: "Rupture_Variations",
        predicates: &[
            "IM_Types.IM_Type_ID=PeakAmplitudes.IM_Type_ID",
            "Rupture_Variations.Source_ID=PeakAmplitudes.Source_ID",
            "Rupture_Variations.Rupture_ID=PeakAmplitudes.Rupture_ID",
            "Rupture_Variations.Rup_Var_ID=PeakAmplitudes.Rup_Var_ID",
        ],
        bridge: &["PeakAmplitudes"],
    },
    JoinEntry {
        left: "PeakAmplitudes",
        right: "Rupture_Variations",
        predicates: &[
            "Rupture_Variations.Source_ID=PeakAmplitudes.Source_ID",
            "Rupture_Variations.Rupture_ID=PeakAmplitudes.Rupture_ID",
            "Rupture_Variations.Rup_Var_ID=PeakAmplitudes.Rup_Var_ID",
        ],
        bridge: &[],
    },
    JoinEntry {
        left: "PeakAmplitudes",
        right: "Ruptures",
        predicates: &[
            "Ruptures.Source_ID=PeakAmplitudes.Source_ID",
            "Ruptures.Rupture_ID=PeakAmplitudes.Rupture_ID",
        ],
        bridge: &[],
    },
    JoinEntry {
        left: "PeakAmplitudes",
        right: "Studies",
        predicates: &[
            "CyberShake_Runs.Run_ID=PeakAmplitudes.Run_ID",
            "CyberShake_Runs.Study_ID=Studies.Study_ID",
        ],
        bridge: &["CyberShake_Runs"],
    },
    JoinEntry {
        left: "Rupture_Variations",
        right: "Ruptures",
        predicates: &[
            "Rupture_Variations.ERF_ID=Ruptures.ERF_ID",
            "Rupture_Variations.Source_ID=Ruptures.Source_ID",
            "Rupture_Variations.Rupture_ID=Ruptures.Rupture_ID",
        ],
        bridge: &[],
    },
    JoinEntry {
        left: "Rupture_Variations",
        right: "Studies",
        predicates: &[
            "CyberShake_Runs.ERF_ID=Rupture_Variations.ERF_ID",
            "CyberShake_Runs.Rup_Var_Scenario_ID=Rupture_Variations.Rup_Var_Scenario_ID",
            "CyberShake_Runs.Study_ID=Studies.Study_ID",
        ],
        bridge: &["CyberShake_Runs"],
    },
    JoinEntry {
        left: "Ruptures",
        right: "Studies",
        predicates: &[
            "CyberShake_Runs.ERF_ID=Ruptures.ERF_ID",
            "CyberShake_Runs.Study_ID=Studies.Study_ID",
        ],
        bridge: &["CyberShake_Runs"],
    },
];

/// Looks up the entry for a pair in either order.
#[must_use]
pub fn join_entry(first: &str, second: &str) -> Option<&'static JoinEntry> {
    let (left, right) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    JOIN_GRAPH
        .iter()
        .find(|entry| entry.left == left && entry.right == right)
}

/// Adds join predicates until every table in the query is connected.
///
/// Tables are settled in sorted order. Each newly settled table receives the
/// direct joins it has with every previously settled table; bridge entries are
/// applied only when the pair is not already connected. Tables pulled in by a
/// bridge are settled in turn, so the pass ends once the from-set stops
/// growing.
pub fn connect_tables(query: &mut Query) -> Result<(), CatalogError> {
    let mut settled: Vec<String> = Vec::new();

    while let Some(table) = next_unsettled(query, &settled) {
        for previous in &settled {
            let Some(entry) = join_entry(previous, &table) else {
                continue;
            };
            if entry.bridge.is_empty() {
                trace!(left = entry.left, right = entry.right, "adding direct join");
                query.add_predicates(entry.predicates.iter().copied());
            } else if !TableGraph::from_query(query).connected(previous, &table) {
                debug!(
                    left = entry.left,
                    right = entry.right,
                    bridge = ?entry.bridge,
                    "bridging disconnected tables"
                );
                query.add_tables(entry.bridge.iter().copied());
                query.add_predicates(entry.predicates.iter().copied());
            }
        }
        settled.push(table);
    }

    let graph = TableGraph::from_query(query);
    let tables = query.tables();
    let Some(root) = tables.first() else {
        return Ok(());
    };
    let disconnected = tables
        .iter()
        .filter(|table| !graph.connected(root, table))
        .map(|table| (*table).to_string())
        .collect::<Vec<_>>();
    if disconnected.is_empty() {
        Ok(())
    } else {
        let mut involved = vec![(*root).to_string()];
        involved.extend(disconnected);
        Err(CatalogError::MissingJoin { tables: involved })
    }
}

fn next_unsettled(query: &Query, settled: &[String]) -> Option<String> {
    query
        .tables()
        .into_iter()
        .find(|table| !settled.iter().any(|done| done == table))
        .map(str::to_string)
}

/// Connectivity between from-tables induced by column-to-column join
/// predicates. Filter predicates compare a column with a literal and never
/// link tables, whatever text the literal holds.
#[derive(Debug, Default)]
pub struct TableGraph {
    parent: BTreeMap<String, String>,
}

impl TableGraph {
    #[must_use]
    pub fn from_query(query: &Query) -> Self {
        let mut graph = Self::default();
        for table in query.tables() {
            graph
                .parent
                .insert(table.to_string(), table.to_string());
        }
        for predicate in query.predicates() {
            if let Some((left, right)) = joined_tables(predicate) {
                graph.union(left, right);
            }
        }
        graph
    }

    #[must_use]
    pub fn connected(&self, left: &str, right: &str) -> bool {
        match (self.root(left), self.root(right)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    fn root(&self, table: &str) -> Option<&str> {
        let mut current = self.parent.get_key_value(table)?.0.as_str();
        loop {
            let parent = self.parent.get(current)?.as_str();
            if parent == current {
                return Some(current);
            }
            current = parent;
        }
    }

    fn union(&mut self, left: &str, right: &str) {
        let (Some(left), Some(right)) = (
            self.root(left).map(str::to_string),
            self.root(right).map(str::to_string),
        ) else {
            return;
        };
        if left != right {
            let (keep, attach) = if left < right {
                (left, right)
            } else {
                (right, left)
            };
            self.parent.insert(attach, keep);
        }
    }
}

/// The two tables of a `Table.column=Table.column` join predicate.
#[must_use]
pub fn joined_tables(predicate: &str) -> Option<(&str, &str)> {
    let captures = join_predicate_regex().captures(predicate)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

fn join_predicate_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.[A-Za-z_][A-Za-z0-9_]*=([A-Za-z_][A-Za-z0-9_]*)\.[A-Za-z_][A-Za-z0-9_]*$")
            .expect("join predicate regex should compile")
    })
}
