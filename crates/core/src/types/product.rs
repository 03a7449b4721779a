//! Product catalog types.
//!
//! A product document stores six string fields. Only `name` and `price`
//! are required; every other field is stored as an empty string when
//! absent so documents always carry the same shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;

/// The stored fields of a product document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: String,
    /// Numeric string, kept as entered.
    pub price: String,
    #[serde(default)]
    pub category: String,
    /// Numeric string, kept as entered.
    #[serde(default)]
    pub stock: String,
    /// Unit of sale, e.g. `sak` or `batang`.
    #[serde(default)]
    pub unit: String,
    /// Public URL of the product image, set only after an upload.
    #[serde(default)]
    pub image_url: String,
}

/// A product record with its backend-assigned identifier attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(flatten)]
    pub record: ProductRecord,
}

impl Product {
    /// Attach an identifier to a stored record.
    #[must_use]
    pub const fn new(id: ProductId, record: ProductRecord) -> Self {
        Self { id, record }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// Validation failure for the product form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProductFormError {
    /// Name or price is blank.
    #[error("Product name and price are required")]
    MissingRequired,
}

/// The five editable fields of the create/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
    pub category: String,
    pub stock: String,
    pub unit: String,
}

impl ProductForm {
    /// Prefill the form from an existing product for editing.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        let record = &product.record;
        Self {
            name: record.name.clone(),
            price: record.price.clone(),
            category: record.category.clone(),
            stock: record.stock.clone(),
            unit: record.unit.clone(),
        }
    }

    /// Check that the required fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`ProductFormError::MissingRequired`] if name or price is
    /// empty or whitespace-only.
    pub fn validate(&self) -> Result<(), ProductFormError> {
        if self.name.trim().is_empty() || self.price.trim().is_empty() {
            return Err(ProductFormError::MissingRequired);
        }
        Ok(())
    }

    /// Build the stored record from the form and the resolved image URL.
    ///
    /// Field values are stored as typed; pass an empty string when no image
    /// was uploaded.
    #[must_use]
    pub fn into_record(self, image_url: String) -> ProductRecord {
        ProductRecord {
            name: self.name,
            price: self.price,
            category: self.category,
            stock: self.stock,
            unit: self.unit,
            image_url,
        }
    }
}
