//! Client-side catalog search.

use crate::types::Product;

/// Return the products whose name contains `query`, ignoring case.
///
/// Order is preserved and the input is not modified. An empty query
/// matches every product.
#[must_use]
pub fn filter_by_name<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    let needle = query.to_lowercase();
    products
        .iter()
        .filter(|product| product.name().to_lowercase().contains(&needle))
        .collect()
}
