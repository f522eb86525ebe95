use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::catalog::{Catalog, DataProduct, Filter, Model, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogListing {
    Filters,
    Products,
    Models,
    Schema,
}

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    #[arg(value_enum, value_name = "LISTING")]
    pub listing: CatalogListing,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterEntry {
    pub name: String,
    pub category: &'static str,
    pub value_type: ValueType,
    pub units: Option<String>,
    pub requires: Vec<String>,
    pub help: String,
}

impl From<&Filter> for FilterEntry {
    fn from(filter: &Filter) -> Self {
        Self {
            name: filter.name.clone(),
            category: filter.category.key(),
            value_type: filter.value_type,
            units: filter.units.clone(),
            requires: filter.requires.clone(),
            help: filter.help_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductEntry {
    pub name: String,
    pub requires_files: bool,
    pub categories: Vec<&'static str>,
    pub help: String,
}

impl From<&DataProduct> for ProductEntry {
    fn from(product: &DataProduct) -> Self {
        Self {
            name: product.name.clone(),
            requires_files: product.requires_files,
            categories: product
                .categories
                .iter()
                .map(|category| category.key())
                .collect(),
            help: product.help.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub periods: Vec<String>,
    pub products: Vec<String>,
    pub seismogram_record_bytes: u64,
}

impl From<&Model> for ModelEntry {
    fn from(model: &Model) -> Self {
        Self {
            name: model.name.clone(),
            periods: model.periods.iter().map(ToString::to_string).collect(),
            products: model.products.clone(),
            seismogram_record_bytes: model.seismogram_record_bytes(),
        }
    }
}

pub fn run(args: &CatalogArgs, catalog: &Catalog) -> Result<()> {
    let rendered = match (args.listing, args.json) {
        (CatalogListing::Schema, _) => serde_json::to_string_pretty(&crate::request::json_schema())
            .context("failed to render request schema")?,
        (CatalogListing::Filters, true) => to_json(catalog.filters.iter().map(FilterEntry::from))?,
        (CatalogListing::Products, true) => {
            to_json(catalog.products.iter().map(ProductEntry::from))?
        }
        (CatalogListing::Models, true) => to_json(catalog.models.iter().map(ModelEntry::from))?,
        (CatalogListing::Filters, false) => render_filters(catalog),
        (CatalogListing::Products, false) => render_products(catalog),
        (CatalogListing::Models, false) => render_models(catalog),
    };
    println!("{rendered}");
    Ok(())
}

#[must_use]
pub fn render_filters(catalog: &Catalog) -> String {
    let mut rendered = String::from("Filters:");
    for filter in &catalog.filters {
        rendered.push_str(&format!("\n  {}: {}", filter.name, filter.help_text()));
    }
    rendered
}

#[must_use]
pub fn render_products(catalog: &Catalog) -> String {
    let mut rendered = String::from("Data products:");
    for product in &catalog.products {
        rendered.push_str(&format!("\n  {}: {}", product.name, product.help));
    }
    rendered
}

#[must_use]
pub fn render_models(catalog: &Catalog) -> String {
    let mut rendered = String::from("Models:");
    for model in &catalog.models {
        let entry = ModelEntry::from(model);
        rendered.push_str(&format!(
            "\n  {}: periods {}; products {}",
            entry.name,
            entry.periods.join(", "),
            entry.products.join(", ")
        ));
    }
    rendered
}

fn to_json<T: Serialize>(entries: impl Iterator<Item = T>) -> Result<String> {
    serde_json::to_string_pretty(&entries.collect::<Vec<_>>())
        .context("failed to render catalog listing")
}
