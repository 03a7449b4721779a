//! Product listing command.

use secrecy::SecretString;

use bangun_rumah_core::{Product, filter_by_name, format_rupiah};

use super::{CommandError, connect, sign_in};

/// One output line for a product.
fn line(product: &Product) -> String {
    let record = &product.record;
    let mut out = format!("{}\t{}\t{}", product.id, record.name, format_rupiah(&record.price));
    if !record.unit.is_empty() {
        out.push_str(" /");
        out.push_str(&record.unit);
    }
    if !record.stock.is_empty() {
        out.push_str("\tstock ");
        out.push_str(&record.stock);
    }
    out
}

/// Print the catalog, optionally filtered by name.
///
/// # Errors
///
/// Returns the backend error if sign-in or the catalog read fails.
#[allow(clippy::print_stdout)]
pub async fn list(
    email: &str,
    password: &SecretString,
    search: Option<&str>,
) -> Result<(), CommandError> {
    let backend = connect()?;
    let (session, _) = sign_in(&backend, email, password).await?;

    let products = backend.products.list(&session.id_token).await?;
    let visible = filter_by_name(&products, search.unwrap_or_default());
    for product in &visible {
        println!("{}", line(product));
    }
    tracing::info!(shown = visible.len(), total = products.len(), "Listed products");

    backend.auth.sign_out(&session).await?;
    Ok(())
}
