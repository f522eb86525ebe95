use csdata::catalog::filters::{
    IM_VALUE_FILTER, MAGNITUDE_FILTER, PERIOD_FILTER, SITE_NAME_FILTER,
    SITE_RUPTURE_DISTANCE_FILTER, SOURCE_NAME_FILTER,
};
use csdata::catalog::{Catalog, CatalogError, Filter, FilterValue};
use std::collections::BTreeMap;

use csdata::query::joins::{KNOWN_TABLES, joined_tables};
use csdata::query::{JOIN_GRAPH, Query, build_query, connect_tables};

/// One filter per catalog entry, each with a valid selection for `model`.
fn selected_filters(catalog: &Catalog, model: &str) -> Vec<Filter> {
    let model = catalog.model(model).expect("model should exist");
    catalog
        .filters
        .iter()
        .map(|template| {
            let mut filter = template.clone();
            match filter.name.as_str() {
                PERIOD_FILTER => {
                    filter.bind_values(&model.periods);
                    filter.set_single(FilterValue::number(3.0))
                }
                IM_VALUE_FILTER => {
                    filter.set_range(FilterValue::number(10.0), FilterValue::number(200.0))
                }
                MAGNITUDE_FILTER => {
                    filter.set_range(FilterValue::number(6.0), FilterValue::number(7.0))
                }
                SITE_NAME_FILTER => filter.set_single(FilterValue::text("USC")),
                SITE_RUPTURE_DISTANCE_FILTER => {
                    filter.set_range(FilterValue::number(0.0), FilterValue::number(50.0))
                }
                SOURCE_NAME_FILTER => filter.set_single(FilterValue::text("Andreas")),
                other => panic!("no sample selection for filter {other}"),
            }
            .expect("sample selection should be valid");
            filter
        })
        .collect()
}

/// Table components reachable through predicates copied from the join graph.
fn join_components(query: &Query) -> BTreeMap<String, usize> {
    let tables = query.tables();
    let mut component = tables
        .iter()
        .enumerate()
        .map(|(index, table)| ((*table).to_string(), index))
        .collect::<BTreeMap<_, _>>();
    let edges = query
        .predicates()
        .into_iter()
        .filter(|predicate| {
            JOIN_GRAPH
                .iter()
                .flat_map(|entry| entry.predicates.iter())
                .any(|known| known == predicate)
        })
        .map(|predicate| {
            let (left, right) = predicate
                .split_once('=')
                .expect("join predicates compare two columns");
            let table = |side: &str| {
                side.split_once('.')
                    .expect("join columns are qualified")
                    .0
                    .to_string()
            };
            (table(left), table(right))
        })
        .collect::<Vec<_>>();

    let mut changed = true;
    while changed {
        changed = false;
        for (left, right) in &edges {
            let (Some(&a), Some(&b)) = (component.get(left), component.get(right)) else {
                continue;
            };
            if a != b {
                let (keep, replace) = (a.min(b), a.max(b));
                for value in component.values_mut() {
                    if *value == replace {
                        *value = keep;
                    }
                }
                changed = true;
            }
        }
    }
    component
}

fn assert_connected(query: &Query, context: &str) {
    let components = join_components(query);
    let tables = query.tables();
    for table in &tables {
        assert_eq!(
            components.get(*table),
            components.get(tables[0]),
            "{context}: {table} is disconnected from {}",
            tables[0]
        );
    }
}

#[test]
fn every_product_and_filter_subset_is_connected() {
    let catalog = Catalog::load().expect("catalog should load");

    for model in &catalog.models {
        let filters = selected_filters(&catalog, &model.name);
        for product in &catalog.products {
            let accepted = filters
                .iter()
                .filter(|filter| product.accepts(filter.category))
                .collect::<Vec<_>>();
            for mask in 0u32..(1 << accepted.len()) {
                let subset = accepted
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| mask & (1 << index) != 0)
                    .map(|(_, filter)| (*filter).clone())
                    .collect::<Vec<_>>();
                let context = format!(
                    "{} / {} / [{}]",
                    model.name,
                    product.name,
                    subset
                        .iter()
                        .map(|filter| filter.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );

                let query = build_query(model, product, &subset, None)
                    .unwrap_or_else(|error| panic!("{context}: {error}"));
                assert_connected(&query, &context);
                for table in query.tables() {
                    assert!(
                        KNOWN_TABLES.contains(&table),
                        "{context}: unexpected table {table}"
                    );
                }
            }
        }
    }
}

#[test]
fn unknown_table_reports_missing_join() {
    let mut query = Query::new();
    query.add_tables(["Studies", "Mystery_Table"]);

    let error = connect_tables(&mut query).expect_err("unknown table cannot be joined");
    assert_eq!(
        error,
        CatalogError::MissingJoin {
            tables: vec!["Mystery_Table".to_string(), "Studies".to_string()],
        }
    );
}

#[test]
fn bridge_entries_pull_in_the_bridge_table() {
    let mut query = Query::new();
    query.add_tables(["CyberShake_Sites", "Studies"]);

    connect_tables(&mut query).expect("sites and studies should connect");

    assert!(query.has_table("CyberShake_Runs"));
    assert!(query.has_predicate("CyberShake_Runs.Site_ID=CyberShake_Sites.CS_Site_ID"));
    assert!(query.has_predicate("CyberShake_Runs.Study_ID=Studies.Study_ID"));
    assert_connected(&query, "sites/studies");
}

#[test]
fn direct_joins_need_no_extra_tables() {
    let mut query = Query::new();
    query.add_tables(["PeakAmplitudes", "Ruptures", "Rupture_Variations"]);

    connect_tables(&mut query).expect("amplitudes and ruptures should connect");

    assert_eq!(
        query.tables(),
        vec!["PeakAmplitudes", "Rupture_Variations", "Ruptures"]
    );
    assert_connected(&query, "amplitudes/ruptures");
}

#[test]
fn join_graph_entries_are_well_formed() {
    for entry in JOIN_GRAPH {
        assert!(entry.left < entry.right, "{} / {}", entry.left, entry.right);
        assert!(KNOWN_TABLES.contains(&entry.left));
        assert!(KNOWN_TABLES.contains(&entry.right));
        assert!(!entry.predicates.is_empty());

        let mentioned = entry
            .predicates
            .iter()
            .map(|predicate| {
                joined_tables(predicate)
                    .unwrap_or_else(|| panic!("{predicate} is not a column join"))
            })
            .flat_map(|(left, right)| [left, right])
            .collect::<Vec<_>>();
        for table in [entry.left, entry.right]
            .into_iter()
            .chain(entry.bridge.iter().copied())
        {
            assert!(
                mentioned.contains(&table),
                "{} / {} never references {table}",
                entry.left,
                entry.right
            );
        }
    }
}

#[test]
fn table_names_inside_filter_values_do_not_count_as_joins() {
    let catalog = Catalog::load().expect("catalog should load");
    let model = catalog.model("Study 22.12 LF").expect("model should exist");
    let product = catalog.product("Event Info").expect("product should exist");
    let mut source = catalog
        .filter(SOURCE_NAME_FILTER)
        .expect("filter should exist")
        .clone();
    source
        .set_single(FilterValue::text("Rupture_Variations.a Studies.b"))
        .expect("any text is a valid source name");

    let query = build_query(model, product, &[source], None).expect("query should build");

    assert!(query.has_table("CyberShake_Runs"));
    assert!(query.has_predicate("CyberShake_Runs.Study_ID=Studies.Study_ID"));
    assert_connected(&query, "source name naming tables");
}

#[test]
fn only_column_equalities_are_joins() {
    assert_eq!(
        joined_tables("CyberShake_Runs.Study_ID=Studies.Study_ID"),
        Some(("CyberShake_Runs", "Studies"))
    );
    assert_eq!(joined_tables("Studies.Study_Name=\"Study 22.12 LF\""), None);
    assert_eq!(
        joined_tables("Ruptures.Source_Name like '%Rupture_Variations.a=Studies.b%'"),
        None
    );
    assert_eq!(joined_tables("Ruptures.Mag>=6.0 and Ruptures.Mag<=7.0"), None);
}
