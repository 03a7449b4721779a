//! CLI commands.
//!
//! Every command talks to the hosted backend configured by the `FIREBASE_*`
//! environment variables and acts as the account given on the command line.

pub mod import;
pub mod products;
pub mod register;

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use bangun_rumah_app::backend::{AuthSession, Backend, BackendError};
use bangun_rumah_app::config::{ConfigError, FirebaseConfig};
use bangun_rumah_app::firebase::FirebaseClient;
use bangun_rumah_core::{ImportSourceError, Role};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("import source error: {0}")]
    ImportSource(#[from] ImportSourceError),

    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] bangun_rumah_app::services::CatalogError),

    /// The signed-in account lacks the admin role.
    #[error("{0} is not an admin")]
    NotAdmin(String),
}

/// Connect to the configured Firebase project.
fn connect() -> Result<Backend, CommandError> {
    let config = FirebaseConfig::from_env()?;
    let client = FirebaseClient::new(&config)?;
    tracing::debug!(project = %config.project_id, "Connected");
    Ok(Backend::from_shared(Arc::new(client)))
}

/// Sign in and resolve the account's role.
async fn sign_in(
    backend: &Backend,
    email: &str,
    password: &SecretString,
) -> Result<(AuthSession, Role), CommandError> {
    let session = backend.auth.sign_in(email, password).await?;
    let record = backend
        .users
        .get(&session.id_token, &session.user.uid)
        .await?;
    let role = Role::resolve(record.as_ref());
    tracing::info!(email, %role, "Signed in");
    Ok((session, role))
}
