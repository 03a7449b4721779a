//! Firebase REST backend.
//!
//! # Architecture
//!
//! - Plain `reqwest` calls against the public REST APIs; no SDK
//! - Firebase is the source of truth - no local sync, no caching
//! - Every document/object call is authorized with the caller's id token
//!
//! # APIs
//!
//! - Identity Toolkit: `accounts:signInWithPassword`, `accounts:signUp`
//! - Secure Token: id token refresh
//! - Firestore documents API: `products` and `users` collections
//! - Storage `v0`: media upload and download-token URL resolution

mod auth;
mod firestore;
mod storage;

use reqwest::{Response, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::backend::BackendError;
use crate::config::FirebaseConfig;

/// Base URLs of the REST APIs.
///
/// Overridable so the client can target the local emulator suite.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
    pub firestore: String,
    pub storage: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: "https://identitytoolkit.googleapis.com/v1".to_string(),
            secure_token: "https://securetoken.googleapis.com/v1".to_string(),
            firestore: "https://firestore.googleapis.com/v1".to_string(),
            storage: "https://firebasestorage.googleapis.com/v0".to_string(),
        }
    }
}

/// Firebase client implementing every backend capability.
#[derive(Clone)]
pub struct FirebaseClient {
    client: reqwest::Client,
    api_key: SecretString,
    project_id: String,
    storage_bucket: String,
    endpoints: Endpoints,
}

impl FirebaseClient {
    /// Create a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, BackendError> {
        Self::with_endpoints(config, Endpoints::default())
    }

    /// Create a client against non-default API hosts.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_endpoints(
        config: &FirebaseConfig,
        endpoints: Endpoints,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bangun-rumah/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
            storage_bucket: config.storage_bucket.clone(),
            endpoints,
        })
    }

    /// Root of the default database's document tree.
    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.endpoints.firestore.trim_end_matches('/'),
            self.project_id
        )
    }

    fn parse_url(raw: &str) -> Result<Url, BackendError> {
        Url::parse(raw).map_err(|e| BackendError::Malformed(format!("invalid URL {raw}: {e}")))
    }
}

/// Error envelope shared by the Google REST APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Extract the service's error message from a response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map a failed document/object response onto [`BackendError`].
fn classify(status: StatusCode, body: &str) -> BackendError {
    let message = error_message(body);
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::PermissionDenied(message),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Turn a non-success response into an error, passing successes through.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &body))
}
