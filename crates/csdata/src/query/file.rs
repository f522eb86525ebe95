use std::path::Path;

use anyhow::{Context, Result, bail};

use super::{Query, column_name, compose_statement};

const DISTINCT_PREFIX: &str = "distinct ";

/// The intermediate `key = value` query document handed to the execution
/// stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFile {
    pub select: String,
    pub from: String,
    pub where_clause: String,
    pub sort: Option<String>,
    pub data_request_file: String,
    pub data_product: String,
}

impl QueryFile {
    #[must_use]
    pub fn from_query(query: &Query, data_request_file: &str, data_product: &str) -> Self {
        Self {
            select: query.select_string(),
            from: query.from_string(),
            where_clause: query.where_string(),
            sort: query.sort_string().map(str::to_string),
            data_request_file: data_request_file.to_string(),
            data_product: data_product.to_string(),
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = format!(
            "select = {}\nfrom = {}\nwhere = {}\n",
            self.select, self.from, self.where_clause
        );
        if let Some(sort) = &self.sort {
            rendered.push_str(&format!("sort = {sort}\n"));
        }
        rendered.push_str(&format!(
            "data_request_file = {}\ndata_product = {}\n",
            self.data_request_file, self.data_product
        ));
        rendered
    }

    /// Parses a rendered query file. Values may themselves contain `=`, so
    /// each line splits on the first one only.
    pub fn parse(input: &str) -> Result<Self> {
        let mut select = None;
        let mut from = None;
        let mut where_clause = None;
        let mut sort = None;
        let mut data_request_file = None;
        let mut data_product = None;

        for (index, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("query file line {} has no `=`: {line}", index + 1);
            };
            let value = value.trim().to_string();
            match key.trim() {
                "select" => select = Some(value),
                "from" => from = Some(value),
                "where" => where_clause = Some(value),
                "sort" => sort = Some(value).filter(|sort| !sort.is_empty()),
                "data_request_file" => data_request_file = Some(value),
                "data_product" => data_product = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            select: select.context("query file is missing `select`")?,
            from: from.context("query file is missing `from`")?,
            where_clause: where_clause.unwrap_or_default(),
            sort,
            data_request_file: data_request_file.unwrap_or_default(),
            data_product: data_product.context("query file is missing `data_product`")?,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read query file: {}", path.display()))?;
        Self::parse(&input)
            .with_context(|| format!("failed to parse query file: {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("failed to write query file: {}", path.display()))
    }

    #[must_use]
    pub fn statement(&self) -> String {
        compose_statement(
            &self.select,
            &self.from,
            &self.where_clause,
            self.sort.as_deref(),
        )
    }

    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.select.starts_with(DISTINCT_PREFIX)
    }

    /// Qualified select columns in rendered order.
    #[must_use]
    pub fn select_columns(&self) -> Vec<&str> {
        self.select
            .strip_prefix(DISTINCT_PREFIX)
            .unwrap_or(&self.select)
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .collect()
    }

    /// Position of the first select column with the given unqualified name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.select_columns()
            .iter()
            .position(|column| column_name(column) == name)
    }
}
