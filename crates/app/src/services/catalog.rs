//! Catalog action handlers.
//!
//! Each handler takes the view's state by `&mut`, performs its backend calls
//! in order, and records the outcome through [`Action`]s. Failures are
//! returned to the caller untouched; nothing is retried and nothing that
//! completed before a failure is undone.

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use bangun_rumah_core::{
    Credentials, CredentialsError, ImportItem, ProductForm, ProductFormError, ProductId, Role,
    UserId, UserRecord, plan_import,
};

use crate::backend::{AuthSession, Backend, BackendError, ProductStore, Token};
use crate::view::{Action, Notice, ViewState};

/// How long before expiry an id token is refreshed.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Folder for uploaded product images.
const IMAGE_FOLDER: &str = "product-images";

/// Errors returned by catalog handlers.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A write was attempted by a session without the admin role.
    #[error("Only admins can change the catalog")]
    Forbidden,

    /// The product form is incomplete. No backend call was made.
    #[error(transparent)]
    Invalid(#[from] ProductFormError),

    /// Registration was submitted without an email or password.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The addressed product is not in the loaded catalog.
    #[error("Product {0} is not in the catalog")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Login failed: {0}")]
    SignIn(#[source] BackendError),

    #[error("Admin registration failed: {0}")]
    Registration(#[source] BackendError),

    /// A bulk import stopped part way; `imported` records were created.
    #[error("Import stopped after {imported} products: {source}")]
    ImportInterrupted {
        imported: usize,
        #[source]
        source: BackendError,
    },
}

/// An image file submitted with the product form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Object path: the file name suffixed with the current Unix time in
    /// milliseconds. Two uploads of the same name in the same millisecond
    /// collide.
    fn storage_path(&self) -> String {
        format!(
            "{IMAGE_FOLDER}/{}-{}",
            self.file_name,
            Utc::now().timestamp_millis()
        )
    }
}

/// Outcome of a completed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Create every source entry whose name is not yet in the catalog.
///
/// Existing names are read once before any write. Entries are written one at
/// a time in source order.
///
/// # Errors
///
/// Returns `CatalogError::Backend` if the catalog cannot be read, and
/// `CatalogError::ImportInterrupted` if a write fails. Records created before
/// the failure remain.
#[instrument(skip_all, fields(source_len = source.len()))]
pub async fn run_import(
    store: &dyn ProductStore,
    token: &Token,
    source: &[ImportItem],
) -> Result<ImportReport, CatalogError> {
    let existing = store.list(token).await?;
    let planned = plan_import(&existing, source);
    let skipped = source.len() - planned.len();

    let mut imported = 0;
    for record in &planned {
        if let Err(source) = store.create(token, record).await {
            tracing::warn!(imported, error = %source, "Import interrupted");
            return Err(CatalogError::ImportInterrupted { imported, source });
        }
        imported += 1;
    }

    tracing::info!(imported, skipped, "Import finished");
    Ok(ImportReport { imported, skipped })
}

/// Create an identity and write its admin role record.
///
/// The registration session is ended before returning; the account is not
/// left signed in.
///
/// # Errors
///
/// Returns `CatalogError::Credentials` if either field is empty, and
/// `CatalogError::Registration` if the identity or its role record cannot be
/// created.
#[instrument(skip(backend, password))]
pub async fn register_admin_account(
    backend: &Backend,
    email: &str,
    password: &SecretString,
) -> Result<UserId, CatalogError> {
    let credentials = Credentials::new(email, password.expose_secret())?;

    let session = backend
        .auth
        .sign_up(credentials.email(), password)
        .await
        .map_err(CatalogError::Registration)?;
    backend
        .users
        .put(
            &session.id_token,
            &session.user.uid,
            &UserRecord::admin(credentials.email()),
        )
        .await
        .map_err(CatalogError::Registration)?;

    if let Err(e) = backend.auth.sign_out(&session).await {
        tracing::warn!(error = %e, "Could not end registration session");
    }
    Ok(session.user.uid)
}

/// Handlers for every catalog and authentication action.
#[derive(Clone)]
pub struct CatalogService {
    backend: Backend,
    import_source: Arc<[ImportItem]>,
}

impl CatalogService {
    #[must_use]
    pub fn new(backend: Backend, import_source: Vec<ImportItem>) -> Self {
        Self {
            backend,
            import_source: import_source.into(),
        }
    }

    fn ensure_admin(view: &ViewState) -> Result<(), CatalogError> {
        if view.can_manage_catalog() {
            Ok(())
        } else {
            Err(CatalogError::Forbidden)
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Bring the view in line with the current session.
    ///
    /// With a session, the role is read from the user record (missing record
    /// or role means viewer) and the catalog is reloaded. Without one, all
    /// user-scoped state is dropped.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if the role or catalog read fails.
    #[instrument(skip_all, fields(uid = ?session.map(|s| &s.user.uid)))]
    pub async fn session_changed(
        &self,
        view: &mut ViewState,
        session: Option<&AuthSession>,
    ) -> Result<(), CatalogError> {
        let Some(session) = session else {
            if view.is_signed_in() {
                view.apply(Action::SignedOut);
            }
            return Ok(());
        };

        let record = self
            .backend
            .users
            .get(&session.id_token, &session.user.uid)
            .await?;
        let role = Role::resolve(record.as_ref());
        tracing::debug!(%role, "Resolved role");

        view.apply(Action::SignedIn {
            user: session.user.clone(),
            role,
        });
        self.load_products(view, session).await
    }

    /// Replace the view's product list with the backend's.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if the read fails.
    pub async fn load_products(
        &self,
        view: &mut ViewState,
        session: &AuthSession,
    ) -> Result<(), CatalogError> {
        let products = self.backend.products.list(&session.id_token).await?;
        view.apply(Action::ProductsLoaded(products));
        Ok(())
    }

    /// Refresh the session if its id token expires within five minutes.
    ///
    /// Returns the new session, or `None` if the current one is still fresh.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if the refresh is rejected.
    pub async fn ensure_fresh(
        &self,
        session: &AuthSession,
    ) -> Result<Option<AuthSession>, CatalogError> {
        let margin = chrono::Duration::minutes(REFRESH_MARGIN_MINUTES);
        if !session.expires_within(margin, Utc::now()) {
            return Ok(None);
        }
        let refreshed = self.backend.auth.refresh(session).await?;
        tracing::debug!(uid = %refreshed.user.uid, "Refreshed id token");
        Ok(Some(refreshed))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Sign in and load the signed-in view.
    ///
    /// On failure the submitted email is kept in the login form.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::SignIn` carrying the service's message.
    #[instrument(skip(self, view, password))]
    pub async fn login(
        &self,
        view: &mut ViewState,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, CatalogError> {
        let session = match self.backend.auth.sign_in(email, password).await {
            Ok(session) => session,
            Err(e) => {
                view.apply(Action::LoginEmailChanged(email.to_string()));
                return Err(CatalogError::SignIn(e));
            }
        };

        self.session_changed(view, Some(&session)).await?;
        view.apply(Action::Notify(Notice::success("Login successful")));
        tracing::info!(uid = %session.user.uid, "User signed in");
        Ok(session)
    }

    /// Create an identity and give it the admin role.
    ///
    /// The new account is not signed in; the user logs in afterwards.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Credentials` if either field is empty, and
    /// `CatalogError::Registration` if the identity or its role record
    /// cannot be created.
    #[instrument(skip(self, view, password))]
    pub async fn register_admin(
        &self,
        view: &mut ViewState,
        email: &str,
        password: &SecretString,
    ) -> Result<(), CatalogError> {
        view.apply(Action::LoginEmailChanged(email.to_string()));
        let uid = register_admin_account(&self.backend, email, password).await?;

        view.apply(Action::LoginEmailChanged(String::new()));
        view.apply(Action::Notify(Notice::success(
            "Admin account created. Please log in.",
        )));
        tracing::info!(%uid, "Registered admin");
        Ok(())
    }

    /// End the session and drop all user-scoped state.
    ///
    /// Failing to reach the authentication service does not keep the user
    /// signed in locally.
    pub async fn logout(&self, view: &mut ViewState, session: Option<&AuthSession>) {
        if let Some(session) = session {
            if let Err(e) = self.backend.auth.sign_out(session).await {
                tracing::warn!(error = %e, "Sign-out call failed");
            }
            tracing::info!(uid = %session.user.uid, "User signed out");
        }
        view.apply(Action::SignedOut);
        view.apply(Action::Notify(Notice::success("Logout successful")));
    }

    // =========================================================================
    // Catalog writes
    // =========================================================================

    /// Create a product, or update the edit target if one is set.
    ///
    /// The image, if any, is uploaded before the record is written. If the
    /// write then fails, the uploaded object stays in storage.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-admins and
    /// `CatalogError::Invalid` for a blank name or price, both before any
    /// backend call. Returns `CatalogError::Backend` if the upload, the write
    /// or the reload fails.
    #[instrument(skip_all, fields(editing = view.is_editing(), has_image = image.is_some()))]
    pub async fn submit_product(
        &self,
        view: &mut ViewState,
        session: &AuthSession,
        form: ProductForm,
        image: Option<ImageUpload>,
    ) -> Result<(), CatalogError> {
        Self::ensure_admin(view)?;
        view.apply(Action::FormEdited(form.clone()));
        form.validate()?;

        let token = &session.id_token;
        let uploaded_path = match &image {
            Some(image) => Some(self.upload_image(token, image).await?),
            None => None,
        };
        let image_url = uploaded_path
            .as_ref()
            .map(|(_, url)| url.clone())
            .unwrap_or_default();
        let record = form.into_record(image_url);

        let written = match view.edit_target.clone() {
            Some(id) => self
                .backend
                .products
                .update(token, &id, &record)
                .await
                .map(|()| "Product updated!"),
            None => self
                .backend
                .products
                .create(token, &record)
                .await
                .map(|_| "Product added!"),
        };
        let message = match written {
            Ok(message) => message,
            Err(e) => {
                if let Some((path, _)) = &uploaded_path {
                    tracing::warn!(%path, "Product write failed; uploaded image is orphaned");
                }
                return Err(e.into());
            }
        };

        view.apply(Action::FormReset);
        view.apply(Action::Notify(Notice::success(message)));
        self.load_products(view, session).await
    }

    async fn upload_image(
        &self,
        token: &Token,
        image: &ImageUpload,
    ) -> Result<(String, String), CatalogError> {
        let path = image.storage_path();
        let stored = self
            .backend
            .files
            .upload(token, &path, image.bytes.clone(), &image.content_type)
            .await?;
        let url = self.backend.files.public_url(token, &stored).await?;
        Ok((stored.path, url))
    }

    /// Load a listed product into the form for editing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-admins and
    /// `CatalogError::UnknownProduct` if the id is not in the loaded list.
    pub fn start_edit(&self, view: &mut ViewState, id: &ProductId) -> Result<(), CatalogError> {
        Self::ensure_admin(view)?;
        let product = view
            .products
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownProduct(id.clone()))?;
        view.apply(Action::EditStarted(product));
        Ok(())
    }

    /// Clear the form and leave edit mode.
    pub fn cancel_edit(&self, view: &mut ViewState) {
        view.apply(Action::FormReset);
    }

    /// Ask for confirmation before deleting a listed product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-admins and
    /// `CatalogError::UnknownProduct` if the id is not in the loaded list.
    pub fn request_delete(&self, view: &mut ViewState, id: &ProductId) -> Result<(), CatalogError> {
        Self::ensure_admin(view)?;
        if !view.products.iter().any(|p| &p.id == id) {
            return Err(CatalogError::UnknownProduct(id.clone()));
        }
        view.apply(Action::DeleteRequested(id.clone()));
        Ok(())
    }

    pub fn cancel_delete(&self, view: &mut ViewState) {
        view.apply(Action::DeleteCancelled);
    }

    /// Delete a product and reload the catalog. Any stored image is kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-admins and
    /// `CatalogError::Backend` if the delete or reload fails.
    #[instrument(skip(self, view, session))]
    pub async fn confirm_delete(
        &self,
        view: &mut ViewState,
        session: &AuthSession,
        id: &ProductId,
    ) -> Result<(), CatalogError> {
        Self::ensure_admin(view)?;
        view.apply(Action::DeleteCancelled);
        self.backend.products.delete(&session.id_token, id).await?;

        if view.edit_target.as_ref() == Some(id) {
            view.apply(Action::FormReset);
        }
        view.apply(Action::Notify(Notice::success("Product deleted")));
        self.load_products(view, session).await
    }

    /// Import the configured source list and reload the catalog.
    ///
    /// The catalog is reloaded even when the import stops part way, so the
    /// records that were created show up.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-admins, otherwise the
    /// errors of [`run_import`].
    pub async fn import_products(
        &self,
        view: &mut ViewState,
        session: &AuthSession,
    ) -> Result<ImportReport, CatalogError> {
        Self::ensure_admin(view)?;
        let result = run_import(
            self.backend.products.as_ref(),
            &session.id_token,
            &self.import_source,
        )
        .await;

        if let Ok(report) = &result {
            view.apply(Action::Notify(Notice::success(format!(
                "{} products imported",
                report.imported
            ))));
        }
        self.load_products(view, session).await?;
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bangun_rumah_core::parse_source;

    use super::*;
    use crate::backend::{AuthService, MemoryBackend, UserStore as _};
    use crate::view::NoticeKind;

    const SOURCE: &str = r#"[
        {"name": "Semen Tiga Roda 50kg", "price": 68000, "category": "Semen", "stock": 200, "unit": "sak"},
        {"name": "Pasir Beton", "price": "350000", "unit": "m3"},
        {"name": "Bata Merah", "price": 900},
        {"name": "", "price": 1}
    ]"#;

    fn pw(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn form(name: &str, price: &str) -> ProductForm {
        ProductForm {
            name: name.to_string(),
            price: price.to_string(),
            ..ProductForm::default()
        }
    }

    fn image(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    fn setup() -> (Arc<MemoryBackend>, CatalogService) {
        let memory = Arc::new(MemoryBackend::new("http://localhost:3000/files"));
        let service = CatalogService::new(
            Backend::from_shared(memory.clone()),
            parse_source(SOURCE).unwrap(),
        );
        (memory, service)
    }

    async fn admin(service: &CatalogService, view: &mut ViewState) -> AuthSession {
        service
            .register_admin(view, "a@b.com", &pw("secret1"))
            .await
            .unwrap();
        service.login(view, "a@b.com", &pw("secret1")).await.unwrap()
    }

    async fn viewer(
        memory: &MemoryBackend,
        service: &CatalogService,
        view: &mut ViewState,
    ) -> AuthSession {
        memory.sign_up("v@b.com", &pw("secret1")).await.unwrap();
        service.login(view, "v@b.com", &pw("secret1")).await.unwrap()
    }

    #[tokio::test]
    async fn test_session_without_role_record_is_viewer() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        viewer(&memory, &service, &mut view).await;

        assert_eq!(view.role, Some(Role::Viewer));
        assert!(!view.can_manage_catalog());
    }

    #[tokio::test]
    async fn test_register_admin_writes_admin_role_record() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        service
            .register_admin(&mut view, "a@b.com", &pw("secret1"))
            .await
            .unwrap();

        // Registration does not sign in.
        assert!(!view.is_signed_in());
        assert_eq!(view.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Success));

        let session = memory.sign_in("a@b.com", &pw("secret1")).await.unwrap();
        let record = memory
            .get(&session.id_token, &session.user.uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.role.as_deref(), Some("admin"));
        assert_eq!(record.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_register_requires_both_fields() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let err = service
            .register_admin(&mut view, "a@b.com", &pw(""))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email and password are required");
    }

    #[tokio::test]
    async fn test_register_account_checks_credentials_before_sign_up() {
        let (memory, _) = setup();
        let backend = Backend::from_shared(memory.clone());

        let err = register_admin_account(&backend, "", &pw("secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Credentials(_)));

        let uid = register_admin_account(&backend, "ops@b.com", &pw("secret1"))
            .await
            .unwrap();
        let session = memory.sign_in("ops@b.com", &pw("secret1")).await.unwrap();
        assert_eq!(session.user.uid, uid);
    }

    #[tokio::test]
    async fn test_register_reports_service_text() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let err = service
            .register_admin(&mut view, "a@b.com", &pw("123"))
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Admin registration failed: WEAK_PASSWORD")
        );
    }

    #[tokio::test]
    async fn test_login_failure_keeps_email_and_message() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let err = service
            .login(&mut view, "nobody@b.com", &pw("secret1"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Login failed: INVALID_LOGIN_CREDENTIALS");
        assert_eq!(view.login_email, "nobody@b.com");
        assert!(!view.is_signed_in());
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_backend_call() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        // Any product write would now fail with an API error instead.
        memory.reject_product_writes_after(Some(0)).await;

        let err = service
            .submit_product(&mut view, &session, form("  ", "1000"), Some(image("a.jpg")))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Invalid(_)));
        assert!(view.products.is_empty());
        assert!(memory.stored_paths().await.is_empty());
        assert_eq!(view.form.price, "1000");
    }

    #[tokio::test]
    async fn test_create_adds_exactly_one_record() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;

        let mut submitted = form("Semen Gresik 40kg", "62000");
        submitted.unit = "sak".to_string();
        service
            .submit_product(&mut view, &session, submitted, None)
            .await
            .unwrap();

        assert_eq!(view.products.len(), 1);
        let product = &view.products[0];
        assert_eq!(product.record.name, "Semen Gresik 40kg");
        assert_eq!(product.record.price, "62000");
        assert_eq!(product.record.unit, "sak");
        assert_eq!(product.record.image_url, "");
        assert_eq!(view.form, ProductForm::default());
        assert_eq!(
            view.notice.as_ref().map(|n| n.message.as_str()),
            Some("Product added!")
        );
    }

    #[tokio::test]
    async fn test_image_is_uploaded_under_timestamped_name() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;

        service
            .submit_product(&mut view, &session, form("Keramik", "55000"), Some(image("keramik.jpg")))
            .await
            .unwrap();

        let paths = memory.stored_paths().await;
        assert_eq!(paths.len(), 1);
        assert!(paths[0].starts_with("product-images/keramik.jpg-"));
        assert_eq!(
            view.products[0].record.image_url,
            format!("http://localhost:3000/files/{}", paths[0])
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_uploaded_image() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        memory.reject_product_writes_after(Some(0)).await;

        let err = service
            .submit_product(&mut view, &session, form("Keramik", "55000"), Some(image("k.jpg")))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Backend(BackendError::Api { .. })));
        assert_eq!(memory.stored_paths().await.len(), 1);
        assert!(memory.list(&session.id_token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_overwrites_target() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        service
            .submit_product(&mut view, &session, form("Cat Tembok", "150000"), None)
            .await
            .unwrap();
        let id = view.products[0].id.clone();

        service.start_edit(&mut view, &id).unwrap();
        assert_eq!(view.form.name, "Cat Tembok");

        service
            .submit_product(&mut view, &session, form("Cat Tembok 5kg", "155000"), None)
            .await
            .unwrap();

        assert_eq!(view.products.len(), 1);
        assert_eq!(view.products[0].id, id);
        assert_eq!(view.products[0].record.name, "Cat Tembok 5kg");
        assert!(!view.is_editing());
    }

    #[tokio::test]
    async fn test_edit_of_deleted_product_is_not_found() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        service
            .submit_product(&mut view, &session, form("Paku", "25000"), None)
            .await
            .unwrap();
        let id = view.products[0].id.clone();
        service.start_edit(&mut view, &id).unwrap();

        memory.delete(&session.id_token, &id).await.unwrap();
        let err = service
            .submit_product(&mut view, &session, form("Paku 5cm", "26000"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Backend(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_confirmed_delete_removes_record() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        for name in ["Semen", "Pasir"] {
            service
                .submit_product(&mut view, &session, form(name, "1000"), None)
                .await
                .unwrap();
        }
        let id = view.products[0].id.clone();

        service.request_delete(&mut view, &id).unwrap();
        assert_eq!(view.pending_delete, Some(id.clone()));

        service.confirm_delete(&mut view, &session, &id).await.unwrap();
        assert!(view.products.iter().all(|p| p.id != id));
        assert_eq!(view.products.len(), 1);
        assert!(view.pending_delete.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_delete_keeps_record() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        service
            .submit_product(&mut view, &session, form("Semen", "1000"), None)
            .await
            .unwrap();
        let id = view.products[0].id.clone();

        service.request_delete(&mut view, &id).unwrap();
        service.cancel_delete(&mut view);

        assert!(view.pending_delete.is_none());
        assert_eq!(view.products.len(), 1);
    }

    #[tokio::test]
    async fn test_import_twice_creates_no_duplicates() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        service
            .submit_product(&mut view, &session, form("PASIR BETON", "340000"), None)
            .await
            .unwrap();

        let first = service.import_products(&mut view, &session).await.unwrap();
        assert_eq!(first, ImportReport { imported: 2, skipped: 2 });

        let second = service.import_products(&mut view, &session).await.unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(view.products.len(), 3);
        assert_eq!(
            view.notice.as_ref().map(|n| n.message.as_str()),
            Some("0 products imported")
        );
    }

    #[tokio::test]
    async fn test_interrupted_import_keeps_created_records() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;
        memory.reject_product_writes_after(Some(1)).await;

        let err = service
            .import_products(&mut view, &session)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::ImportInterrupted { imported: 1, .. }));
        assert_eq!(view.products.len(), 1);
        assert_eq!(view.products[0].record.name, "Semen Tiga Roda 50kg");
    }

    #[tokio::test]
    async fn test_viewer_cannot_write() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = viewer(&memory, &service, &mut view).await;

        let err = service
            .submit_product(&mut view, &session, form("Semen", "1000"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden));

        assert!(matches!(
            service.import_products(&mut view, &session).await,
            Err(CatalogError::Forbidden)
        ));
        assert!(matches!(
            service
                .confirm_delete(&mut view, &session, &ProductId::new("p1"))
                .await,
            Err(CatalogError::Forbidden)
        ));
        assert!(memory.list(&session.id_token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_viewer_sees_admin_products() {
        let (memory, service) = setup();
        let mut admin_view = ViewState::default();
        let session = admin(&service, &mut admin_view).await;
        service
            .import_products(&mut admin_view, &session)
            .await
            .unwrap();

        let mut view = ViewState::default();
        viewer(&memory, &service, &mut view).await;
        assert_eq!(view.products.len(), 3);
        assert!(!view.can_manage_catalog());
    }

    #[tokio::test]
    async fn test_logout_clears_view_and_token() {
        let (memory, service) = setup();
        let mut view = ViewState::default();
        let session = admin(&service, &mut view).await;

        service.logout(&mut view, Some(&session)).await;

        assert!(!view.is_signed_in());
        assert!(view.role.is_none());
        assert!(view.products.is_empty());
        assert!(memory.list(&session.id_token).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_fresh_refreshes_near_expiry() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let mut session = admin(&service, &mut view).await;

        assert!(service.ensure_fresh(&session).await.unwrap().is_none());

        session.expires_at = Utc::now() + chrono::Duration::minutes(2);
        let refreshed = service.ensure_fresh(&session).await.unwrap().unwrap();
        assert_eq!(refreshed.user.uid, session.user.uid);
        assert!(refreshed.expires_at > session.expires_at);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_of_one_session_all_succeed() {
        let (_, service) = setup();
        let mut view = ViewState::default();
        let mut session = admin(&service, &mut view).await;
        session.expires_at = Utc::now() + chrono::Duration::minutes(2);

        let (first, second) = tokio::join!(
            service.ensure_fresh(&session),
            service.ensure_fresh(&session)
        );
        let first = first.unwrap().unwrap();
        let second = second.unwrap().unwrap();

        assert!(service.load_products(&mut view, &first).await.is_ok());
        assert!(service.load_products(&mut view, &second).await.is_ok());
    }
}
