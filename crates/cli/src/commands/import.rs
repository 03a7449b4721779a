//! Bulk import command.

use std::path::Path;

use secrecy::SecretString;

use bangun_rumah_app::services::run_import;
use bangun_rumah_core::{ImportItem, bundled_source, parse_source};

use super::{CommandError, connect, sign_in};

/// Load an import list from a file, or the bundled one.
fn load_source(path: Option<&Path>) -> Result<Vec<ImportItem>, CommandError> {
    let Some(path) = path else {
        return Ok(bundled_source()?);
    };
    let json = std::fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_source(&json)?)
}

/// Import every entry whose name is not yet in the catalog.
///
/// # Errors
///
/// Returns `CommandError::NotAdmin` if the account lacks the admin role, or
/// the backend error that stopped the import. Products created before a
/// failure are kept.
pub async fn run(
    email: &str,
    password: &SecretString,
    source: Option<&Path>,
) -> Result<(), CommandError> {
    let items = load_source(source)?;
    let backend = connect()?;
    let (session, role) = sign_in(&backend, email, password).await?;
    if !role.is_admin() {
        return Err(CommandError::NotAdmin(email.to_string()));
    }

    let report = run_import(backend.products.as_ref(), &session.id_token, &items).await?;
    tracing::info!(
        imported = report.imported,
        skipped = report.skipped,
        "{} products imported",
        report.imported
    );

    backend.auth.sign_out(&session).await?;
    Ok(())
}
