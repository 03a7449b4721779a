//! Admin registration command.

use secrecy::SecretString;

use bangun_rumah_app::services::register_admin_account;

use super::{CommandError, connect};

/// Create an account and give it the admin role.
///
/// # Errors
///
/// Returns `CommandError::Catalog` if either value is empty, the account
/// cannot be created, or the role record cannot be written.
pub async fn admin(email: &str, password: &SecretString) -> Result<(), CommandError> {
    let backend = connect()?;
    let uid = register_admin_account(&backend, email, password).await?;

    tracing::info!(%uid, email, "Admin account created");
    Ok(())
}
