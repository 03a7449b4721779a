//! Integration tests for BangunRumah.
//!
//! Each test spawns the full application on an ephemeral port, backed by
//! the in-memory backend, and drives it over HTTP like a browser would:
//! a cookie-keeping client that follows redirects.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bangun-rumah-integration-tests
//! ```

use std::sync::Arc;

use reqwest::{Client, Response, multipart};
use tokio::net::TcpListener;

use bangun_rumah_app::backend::memory::MemoryBackend;
use bangun_rumah_app::config::AppConfig;
use bangun_rumah_app::routes::build_router;
use bangun_rumah_app::state::{AppState, FILES_PATH};
use bangun_rumah_core::ImportItem;

/// A running application and a browser-like client for it.
pub struct TestApp {
    pub base_url: String,
    pub backend: Arc<MemoryBackend>,
    pub client: Client,
}

impl TestApp {
    /// Start the application with `import_source` as the import list.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn(import_source: Vec<ImportItem>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let base_url = format!("http://{addr}");

        let backend = Arc::new(MemoryBackend::new(format!("{base_url}{FILES_PATH}")));
        let state = AppState::with_memory(
            AppConfig::memory(base_url.clone()),
            backend.clone(),
            import_source,
        );
        let app = build_router(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            client: browser(),
            base_url,
            backend,
        }
    }

    /// Absolute URL of `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Render the catalog view.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn page(&self) -> String {
        self.get("/").await.text().await.expect("Failed to read page")
    }

    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// Submit a button-only form.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post(&self, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST failed")
    }

    /// Submit the login form's credentials to `path`.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn submit_credentials(&self, path: &str, email: &str, password: &str) -> String {
        self.client
            .post(self.url(path))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("Credentials POST failed")
            .text()
            .await
            .expect("Failed to read page")
    }

    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn login(&self, email: &str, password: &str) -> String {
        self.submit_credentials("/auth/login", email, password).await
    }

    /// Register an admin account and sign in with it.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn login_as_new_admin(&self, email: &str, password: &str) -> String {
        self.submit_credentials("/auth/register", email, password)
            .await;
        self.login(email, password).await
    }

    /// Submit the product form.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn submit_product(&self, product: &ProductInput<'_>) -> Response {
        let mut form = multipart::Form::new()
            .text("name", product.name.to_string())
            .text("price", product.price.to_string())
            .text("category", product.category.to_string())
            .text("stock", product.stock.to_string())
            .text("unit", product.unit.to_string());
        if let Some((file_name, bytes)) = &product.image {
            let part = multipart::Part::bytes(bytes.clone())
                .file_name((*file_name).to_string())
                .mime_str("image/jpeg")
                .expect("Invalid mime type");
            form = form.part("image", part);
        }

        self.client
            .post(self.url("/products"))
            .multipart(form)
            .send()
            .await
            .expect("Product POST failed")
    }
}

/// Values typed into the product form.
#[derive(Debug, Clone, Default)]
pub struct ProductInput<'a> {
    pub name: &'a str,
    pub price: &'a str,
    pub category: &'a str,
    pub stock: &'a str,
    pub unit: &'a str,
    pub image: Option<(&'a str, Vec<u8>)>,
}

/// A client that keeps cookies, like a browser tab.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Ids of the products listed with management links, in page order.
#[must_use]
pub fn product_ids(html: &str) -> Vec<String> {
    html.split("href=\"/products/")
        .skip(1)
        .filter_map(|rest| rest.split_once('"'))
        .filter_map(|(link, _)| link.strip_suffix("/edit#product-form"))
        .map(str::to_string)
        .collect()
}

/// Value of the first `src` attribute of an image.
#[must_use]
pub fn image_src(html: &str) -> Option<String> {
    let (_, rest) = html.split_once("<img src=\"")?;
    rest.split_once('"').map(|(src, _)| src.to_string())
}

/// Import entries for a fixed set of products.
#[must_use]
pub fn import_items(names: &[&str]) -> Vec<ImportItem> {
    names
        .iter()
        .map(|name| ImportItem {
            name: Some((*name).to_string()),
            price: "10000".to_string(),
            unit: Some("sak".to_string()),
            ..ImportItem::default()
        })
        .collect()
}
