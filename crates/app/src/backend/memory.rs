//! In-process backend.
//!
//! Implements every capability over locked maps so the application can run
//! without the hosted service (`APP_BACKEND=memory`) and so handlers can be
//! tested end to end. Error texts follow the hosted authentication service
//! so the user-facing messages read the same.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use uuid::Uuid;

use bangun_rumah_core::{Product, ProductId, ProductRecord, UserId, UserRecord};

use super::{
    AuthService, AuthSession, AuthUser, BackendError, FileStore, ProductStore, StoredFile, Token,
    UserStore,
};

/// Lifetime of an issued id token.
const TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Minimum password length accepted at sign-up.
const MIN_PASSWORD_LENGTH: usize = 6;

const PERMISSION_DENIED: &str = "Missing or insufficient permissions.";

struct Account {
    uid: UserId,
    password: String,
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct MemoryState {
    products: Vec<Product>,
    users: HashMap<UserId, UserRecord>,
    accounts: HashMap<String, Account>,
    id_tokens: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, UserId>,
    files: HashMap<String, StoredObject>,
    product_write_budget: Option<usize>,
}

impl MemoryState {
    fn authorize(&self, token: &Token) -> Result<UserId, BackendError> {
        self.id_tokens
            .get(token.expose())
            .cloned()
            .ok_or_else(|| BackendError::PermissionDenied(PERMISSION_DENIED.to_string()))
    }

    fn charge_product_write(&mut self) -> Result<(), BackendError> {
        match self.product_write_budget {
            Some(0) => Err(BackendError::Api {
                status: 503,
                message: "UNAVAILABLE".to_string(),
            }),
            Some(remaining) => {
                self.product_write_budget = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn issue_session(&mut self, uid: UserId, email: String) -> AuthSession {
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.refresh_tokens.insert(refresh_token.clone(), uid.clone());
        self.issue_id_token(uid, email, refresh_token)
    }

    /// Mint an id token for an existing refresh token.
    fn issue_id_token(&mut self, uid: UserId, email: String, refresh_token: String) -> AuthSession {
        let id_token = Uuid::new_v4().simple().to_string();
        self.id_tokens.insert(id_token.clone(), uid.clone());

        AuthSession {
            user: AuthUser { uid, email },
            id_token: Token::new(id_token),
            refresh_token: Token::new(refresh_token),
            expires_at: Utc::now() + Duration::minutes(TOKEN_LIFETIME_MINUTES),
        }
    }

    fn email_of(&self, uid: &UserId) -> Option<String> {
        self.accounts
            .iter()
            .find(|(_, account)| &account.uid == uid)
            .map(|(email, _)| email.clone())
    }
}

/// A complete backend held in memory.
pub struct MemoryBackend {
    public_base_url: String,
    state: RwLock<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory://bangun-rumah")
    }
}

impl MemoryBackend {
    /// Create an empty backend. Uploaded files resolve to
    /// `{public_base_url}/{path}`.
    #[must_use]
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Let `n` more product writes succeed, then fail every following one.
    /// `None` removes the limit.
    pub async fn reject_product_writes_after(&self, n: Option<usize>) {
        self.state.write().await.product_write_budget = n;
    }

    /// Paths of every stored object.
    #[cfg(test)]
    pub async fn stored_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.read().await.files.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Bytes and content type of an uploaded object, for serving it back.
    pub async fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.state
            .read()
            .await
            .files
            .get(path)
            .map(|object| (object.bytes.clone(), object.content_type.clone()))
    }
}

#[async_trait]
impl ProductStore for MemoryBackend {
    async fn list(&self, token: &Token) -> Result<Vec<Product>, BackendError> {
        let state = self.state.read().await;
        state.authorize(token)?;
        Ok(state.products.clone())
    }

    async fn create(
        &self,
        token: &Token,
        record: &ProductRecord,
    ) -> Result<ProductId, BackendError> {
        let mut state = self.state.write().await;
        state.authorize(token)?;
        state.charge_product_write()?;

        let id = ProductId::new(Uuid::new_v4().simple().to_string());
        state.products.push(Product::new(id.clone(), record.clone()));
        Ok(id)
    }

    async fn update(
        &self,
        token: &Token,
        id: &ProductId,
        record: &ProductRecord,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.authorize(token)?;

        if !state.products.iter().any(|p| &p.id == id) {
            return Err(BackendError::NotFound(format!("products/{id}")));
        }
        state.charge_product_write()?;

        if let Some(product) = state.products.iter_mut().find(|p| &p.id == id) {
            product.record = record.clone();
        }
        Ok(())
    }

    async fn delete(&self, token: &Token, id: &ProductId) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.authorize(token)?;
        state.products.retain(|p| &p.id != id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryBackend {
    async fn get(&self, token: &Token, uid: &UserId) -> Result<Option<UserRecord>, BackendError> {
        let state = self.state.read().await;
        state.authorize(token)?;
        Ok(state.users.get(uid).cloned())
    }

    async fn put(
        &self,
        token: &Token,
        uid: &UserId,
        record: &UserRecord,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.authorize(token)?;
        state.users.insert(uid.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        if !email.contains('@') {
            return Err(BackendError::Auth("INVALID_EMAIL".to_string()));
        }
        if password.expose_secret().is_empty() {
            return Err(BackendError::Auth("MISSING_PASSWORD".to_string()));
        }

        let mut state = self.state.write().await;
        let uid = match state.accounts.get(email) {
            Some(account) if account.password == password.expose_secret() => account.uid.clone(),
            _ => return Err(BackendError::Auth("INVALID_LOGIN_CREDENTIALS".to_string())),
        };
        Ok(state.issue_session(uid, email.to_string()))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        if !email.contains('@') {
            return Err(BackendError::Auth("INVALID_EMAIL".to_string()));
        }
        if password.expose_secret().len() < MIN_PASSWORD_LENGTH {
            return Err(BackendError::Auth(format!(
                "WEAK_PASSWORD : Password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let mut state = self.state.write().await;
        if state.accounts.contains_key(email) {
            return Err(BackendError::Auth("EMAIL_EXISTS".to_string()));
        }

        let uid = UserId::new(Uuid::new_v4().simple().to_string());
        state.accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.expose_secret().to_string(),
            },
        );
        Ok(state.issue_session(uid, email.to_string()))
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        let mut state = self.state.write().await;
        // Refresh tokens stay valid until sign-out, and earlier id tokens
        // until they expire, so concurrent refreshes of one session all succeed.
        let uid = state
            .refresh_tokens
            .get(session.refresh_token.expose())
            .cloned()
            .ok_or_else(|| BackendError::Auth("INVALID_REFRESH_TOKEN".to_string()))?;

        let email = state
            .email_of(&uid)
            .unwrap_or_else(|| session.user.email.clone());
        Ok(state.issue_id_token(
            uid,
            email,
            session.refresh_token.expose().to_string(),
        ))
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.id_tokens.remove(session.id_token.expose());
        state.refresh_tokens.remove(session.refresh_token.expose());
        Ok(())
    }
}

#[async_trait]
impl FileStore for MemoryBackend {
    async fn upload(
        &self,
        token: &Token,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredFile, BackendError> {
        let mut state = self.state.write().await;
        state.authorize(token)?;
        state.files.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredFile {
            path: path.to_string(),
            download_token: None,
        })
    }

    async fn public_url(&self, token: &Token, file: &StoredFile) -> Result<String, BackendError> {
        let state = self.state.read().await;
        state.authorize(token)?;
        if !state.files.contains_key(&file.path) {
            return Err(BackendError::NotFound(file.path.clone()));
        }
        Ok(format!("{}/{}", self.public_base_url, file.path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn password(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn record(name: &str) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            price: "1000".to_string(),
            ..ProductRecord::default()
        }
    }

    async fn signed_up(backend: &MemoryBackend) -> AuthSession {
        backend
            .sign_up("admin@toko.id", &password("rahasia1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let backend = MemoryBackend::default();
        let created = signed_up(&backend).await;

        let session = backend
            .sign_in("admin@toko.id", &password("rahasia1"))
            .await
            .unwrap();
        assert_eq!(session.user.uid, created.user.uid);
        assert_eq!(session.user.email, "admin@toko.id");
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password_reports_service_text() {
        let backend = MemoryBackend::default();
        signed_up(&backend).await;

        let err = backend
            .sign_in("admin@toko.id", &password("salah"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "INVALID_LOGIN_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_sign_up_rejects_duplicates_and_weak_passwords() {
        let backend = MemoryBackend::default();
        signed_up(&backend).await;

        let dup = backend
            .sign_up("admin@toko.id", &password("rahasia1"))
            .await
            .unwrap_err();
        assert_eq!(dup.to_string(), "EMAIL_EXISTS");

        let weak = backend
            .sign_up("other@toko.id", &password("123"))
            .await
            .unwrap_err();
        assert!(weak.to_string().starts_with("WEAK_PASSWORD"));
    }

    #[tokio::test]
    async fn test_store_calls_require_a_live_token() {
        let backend = MemoryBackend::default();
        let session = signed_up(&backend).await;

        assert!(backend.list(&session.id_token).await.is_ok());

        backend.sign_out(&session).await.unwrap();
        let err = backend.list(&session.id_token).await.unwrap_err();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_products_keep_insertion_order() {
        let backend = MemoryBackend::default();
        let token = signed_up(&backend).await.id_token;

        for name in ["Semen", "Pasir", "Bata"] {
            backend.create(&token, &record(name)).await.unwrap();
        }
        let names: Vec<String> = backend
            .list(&token)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.record.name)
            .collect();
        assert_eq!(names, vec!["Semen", "Pasir", "Bata"]);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let backend = MemoryBackend::default();
        let token = signed_up(&backend).await.id_token;

        let err = backend
            .update(&token, &ProductId::new("gone"), &record("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_write_budget_rejects_after_limit() {
        let backend = MemoryBackend::default();
        let token = signed_up(&backend).await.id_token;
        backend.reject_product_writes_after(Some(1)).await;

        assert!(backend.create(&token, &record("a")).await.is_ok());
        assert!(backend.create(&token, &record("b")).await.is_err());
        assert_eq!(backend.list(&token).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_issues_new_id_token() {
        let backend = MemoryBackend::default();
        let first = signed_up(&backend).await;
        let second = backend.refresh(&first).await.unwrap();

        assert_ne!(second.id_token.expose(), first.id_token.expose());
        assert_eq!(second.refresh_token.expose(), first.refresh_token.expose());
        assert!(backend.list(&second.id_token).await.is_ok());

        // The same refresh token can be used again
        let third = backend.refresh(&first).await.unwrap();
        assert!(backend.list(&third.id_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_refresh_token() {
        let backend = MemoryBackend::default();
        let session = signed_up(&backend).await;
        backend.sign_out(&session).await.unwrap();

        assert!(matches!(
            backend.refresh(&session).await,
            Err(BackendError::Auth(m)) if m == "INVALID_REFRESH_TOKEN"
        ));
    }

    #[tokio::test]
    async fn test_upload_resolves_to_public_url() {
        let backend = MemoryBackend::new("http://localhost:3000/files/");
        let token = signed_up(&backend).await.id_token;

        let file = backend
            .upload(&token, "product-images/semen.jpg-1", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        let url = backend.public_url(&token, &file).await.unwrap();

        assert_eq!(url, "http://localhost:3000/files/product-images/semen.jpg-1");
        assert_eq!(
            backend.object("product-images/semen.jpg-1").await,
            Some((vec![1, 2, 3], "image/jpeg".to_string()))
        );
    }
}
