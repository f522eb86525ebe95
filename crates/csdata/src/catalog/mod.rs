pub mod filters;
pub mod models;
pub mod products;

use std::fmt::{Display, Formatter};

pub use filters::{
    Filter, FilterCategory, FilterError, FilterValue, Selection, SelectionKind, SortOrder,
    Validation, ValueType,
};
pub use models::Model;
pub use products::DataProduct;

/// Authoring defects in the fixed catalogs or join graph. These are bugs in
/// the tool, never a consequence of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Empty {
        kind: &'static str,
    },
    MissingJoin {
        tables: Vec<String>,
    },
    NoWhereColumn {
        filter: String,
    },
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { kind } => write!(f, "no {kind} available in the catalog"),
            Self::MissingJoin { tables } => write!(
                f,
                "no join path is declared to connect tables {}",
                tables.join(", ")
            ),
            Self::NoWhereColumn { filter } => {
                write!(f, "filter {filter} declares no column to filter on")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// The fixed sets of filters, data products and models, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub filters: Vec<Filter>,
    pub products: Vec<DataProduct>,
    pub models: Vec<Model>,
}

impl Catalog {
    pub fn load() -> Result<Self, CatalogError> {
        Self::from_parts(
            filters::create_filters(),
            products::create_data_products(),
            models::create_models(),
        )
    }

    pub fn from_parts(
        filters: Vec<Filter>,
        products: Vec<DataProduct>,
        models: Vec<Model>,
    ) -> Result<Self, CatalogError> {
        if models.is_empty() {
            return Err(CatalogError::Empty { kind: "models" });
        }
        if products.is_empty() {
            return Err(CatalogError::Empty {
                kind: "data products",
            });
        }
        if filters.is_empty() {
            return Err(CatalogError::Empty { kind: "filters" });
        }
        Ok(Self {
            filters,
            products,
            models,
        })
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|filter| filter.name == name)
    }

    #[must_use]
    pub fn product(&self, name: &str) -> Option<&DataProduct> {
        self.products.iter().find(|product| product.name == name)
    }

    #[must_use]
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.name == name)
    }
}
