//! Bulk import planning.
//!
//! The import source is a static JSON array of candidate products packaged
//! with the crate. Planning is pure: it compares the source against one
//! snapshot of the catalog and returns the records that should be created.
//! Executing the writes is the caller's job.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::types::{Product, ProductRecord};

/// The import list bundled with the application.
const BUNDLED_SOURCE: &str = include_str!("../data/import_products.json");

/// Errors loading an import source.
#[derive(Debug, Error)]
pub enum ImportSourceError {
    /// The source is not a JSON array of product entries.
    #[error("invalid import source: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A candidate product from the import source.
///
/// Prices and stock counts may be written as JSON numbers or strings; both
/// are carried as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default)]
    pub category: Option<String>,
    /// A numeric zero counts as no stock figure and is stored as `""`.
    #[serde(default, deserialize_with = "stock_figure")]
    pub stock: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ImportItem {
    /// The entry's name, if present and non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Build the record to create, defaulting absent fields to `""`.
    #[must_use]
    pub fn to_record(&self) -> ProductRecord {
        ProductRecord {
            name: self.name.clone().unwrap_or_default(),
            price: self.price.clone(),
            category: self.category.clone().unwrap_or_default(),
            stock: self.stock.clone(),
            unit: self.unit.clone().unwrap_or_default(),
            image_url: self.image_url.clone().unwrap_or_default(),
        }
    }
}

/// Parse an import source from JSON text.
///
/// # Errors
///
/// Returns [`ImportSourceError::Parse`] if the text is not a JSON array of
/// objects.
pub fn parse_source(json: &str) -> Result<Vec<ImportItem>, ImportSourceError> {
    Ok(serde_json::from_str(json)?)
}

/// The import list packaged with the application.
///
/// # Errors
///
/// Returns an error only if the bundled file is malformed.
pub fn bundled_source() -> Result<Vec<ImportItem>, ImportSourceError> {
    parse_source(BUNDLED_SOURCE)
}

/// Select the source entries that are not yet in the catalog.
///
/// Existing names are collected once, lowercased, from `existing`. Entries
/// without a name, or whose lowercased name is in that set, are skipped.
/// The set is not updated while planning, so two source entries with the
/// same new name are both returned.
#[must_use]
pub fn plan_import(existing: &[Product], source: &[ImportItem]) -> Vec<ProductRecord> {
    let existing_names: HashSet<String> = existing
        .iter()
        .map(|product| product.name().to_lowercase())
        .collect();

    source
        .iter()
        .filter(|item| {
            item.name()
                .is_some_and(|name| !existing_names.contains(&name.to_lowercase()))
        })
        .map(ImportItem::to_record)
        .collect()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn stock_figure<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) if n.as_f64().is_some_and(|v| v.abs() > 0.0) => {
            n.to_string()
        }
        Some(serde_json::Value::Bool(true)) => true.to_string(),
        _ => String::new(),
    })
}
