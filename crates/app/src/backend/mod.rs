//! Backend capability contracts.
//!
//! Persistence, authentication and file storage are delegated to a hosted
//! backend. The application depends only on the narrow traits in this
//! module:
//!
//! - [`ProductStore`] - the `products` document collection
//! - [`UserStore`] - the `users` document collection (role records)
//! - [`AuthService`] - email/password identities and sessions
//! - [`FileStore`] - product image uploads
//!
//! Two implementations exist: [`memory::MemoryBackend`] for local runs and
//! tests, and [`crate::firebase::FirebaseClient`] for the hosted service.
//!
//! Every store call is made on behalf of a signed-in identity and carries
//! its [`Token`]. Writes are last-write-wins; nothing here coordinates
//! concurrent writers.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use bangun_rumah_core::{Product, ProductId, ProductRecord, UserId, UserRecord};

pub use memory::MemoryBackend;

/// Errors reported by a backend call.
///
/// Messages from the hosted service are kept verbatim so they can be shown
/// to the user as-is.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Authentication rejected (bad credentials, existing email, weak password).
    #[error("{0}")]
    Auth(String),

    /// The caller's token is missing, expired, or lacks access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The addressed document or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A response or document could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// An opaque bearer credential issued by the authentication service.
///
/// Serializable so it can live in the HTTP session; `Debug` is redacted.
#[derive(Clone)]
pub struct Token(SecretString);

impl Token {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// The raw token value, for building request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// The signed-in identity as reported by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: String,
}

/// A live session: identity plus the tokens needed to act as it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    pub id_token: Token,
    pub refresh_token: Token,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the id token expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - margin <= now
    }
}

/// Handle to an uploaded object, resolved to a URL by [`FileStore::public_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Object path inside the bucket.
    pub path: String,
    /// Download token issued with the upload, when the store uses one.
    pub download_token: Option<String>,
}

/// The `products` collection.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Read every product document, in backend order.
    async fn list(&self, token: &Token) -> Result<Vec<Product>, BackendError>;

    /// Create a document and return its assigned id.
    async fn create(&self, token: &Token, record: &ProductRecord)
    -> Result<ProductId, BackendError>;

    /// Overwrite the fields of an existing document.
    ///
    /// Fails with [`BackendError::NotFound`] if the document is gone.
    async fn update(
        &self,
        token: &Token,
        id: &ProductId,
        record: &ProductRecord,
    ) -> Result<(), BackendError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, token: &Token, id: &ProductId) -> Result<(), BackendError>;
}

/// The `users` collection, keyed by authentication subject id.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Read a user record; `None` if no document exists.
    async fn get(&self, token: &Token, uid: &UserId) -> Result<Option<UserRecord>, BackendError>;

    /// Create or overwrite a user record.
    async fn put(&self, token: &Token, uid: &UserId, record: &UserRecord)
    -> Result<(), BackendError>;
}

/// Email/password authentication.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials for a session.
    async fn sign_in(&self, email: &str, password: &SecretString)
    -> Result<AuthSession, BackendError>;

    /// Create a new identity and return its first session.
    async fn sign_up(&self, email: &str, password: &SecretString)
    -> Result<AuthSession, BackendError>;

    /// Trade the refresh token for a fresh id token.
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, BackendError>;

    /// End the session.
    async fn sign_out(&self, session: &AuthSession) -> Result<(), BackendError>;
}

/// Object storage for product images.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` at `path`.
    async fn upload(
        &self,
        token: &Token,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredFile, BackendError>;

    /// Resolve an uploaded object to a publicly fetchable URL.
    async fn public_url(&self, token: &Token, file: &StoredFile) -> Result<String, BackendError>;
}

/// The four capabilities bundled together.
#[derive(Clone)]
pub struct Backend {
    pub products: Arc<dyn ProductStore>,
    pub users: Arc<dyn UserStore>,
    pub auth: Arc<dyn AuthService>,
    pub files: Arc<dyn FileStore>,
}

impl Backend {
    /// Use one implementation for all four capabilities.
    pub fn from_shared<T>(backend: Arc<T>) -> Self
    where
        T: ProductStore + UserStore + AuthService + FileStore + 'static,
    {
        Self {
            products: backend.clone(),
            users: backend.clone(),
            auth: backend.clone(),
            files: backend,
        }
    }
}
