//! The catalog view.
//!
//! `GET /` is the application's load: it resolves the role of the stored
//! session, reloads the catalog, and renders either the login form or the
//! catalog.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bangun_rumah_core::{Product, ProductForm, format_rupiah};

use super::notify_failure;
use crate::error::Result;
use crate::middleware::{OptionalAuth, load_view, save_view};
use crate::state::AppState;
use crate::view::{Action, Notice, NoticeKind, ViewState};

/// Query parameters of the view.
#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    /// New search text; absent keeps the current one.
    pub q: Option<String>,
}

/// A product as displayed in the list.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    /// Price in rupiah with the unit, e.g. `Rp68.000 /sak`.
    pub price_label: String,
    pub category: String,
    /// Stock with its unit; empty when no stock is recorded.
    pub stock_label: String,
    pub image_url: String,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        let record = &product.record;
        let mut price_label = format_rupiah(&record.price);
        if !record.unit.is_empty() {
            price_label.push_str(" /");
            price_label.push_str(&record.unit);
        }
        let stock_label = if record.stock.is_empty() {
            String::new()
        } else {
            format!("{} {}", record.stock, record.unit).trim_end().to_string()
        };

        Self {
            id: product.id.to_string(),
            name: record.name.clone(),
            price_label,
            category: record.category.clone(),
            stock_label,
            image_url: record.image_url.clone(),
        }
    }
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub notice: Option<Notice>,
    pub user_email: Option<String>,
    pub role: String,
    pub login_email: String,
    pub can_manage: bool,
    pub editing: bool,
    pub form: ProductForm,
    pub search: String,
    pub products: Vec<ProductCard>,
    pub total: usize,
    pub confirm_delete: Option<ProductCard>,
}

impl IndexTemplate {
    /// Render `view`, consuming its notice.
    #[must_use]
    pub fn from_view(view: &mut ViewState) -> Self {
        let notice = view.take_notice();
        Self {
            notice,
            user_email: view.current_user.as_ref().map(|u| u.email.clone()),
            role: view.role.unwrap_or_default().to_string(),
            login_email: view.login_email.clone(),
            can_manage: view.can_manage_catalog(),
            editing: view.is_editing(),
            form: view.form.clone(),
            search: view.search.clone(),
            products: view
                .visible_products()
                .into_iter()
                .map(ProductCard::from)
                .collect(),
            total: view.products.len(),
            confirm_delete: view.pending_delete_product().map(ProductCard::from),
        }
    }

    /// CSS class of the notice banner.
    #[must_use]
    pub fn notice_class(&self) -> &'static str {
        match self.notice.as_ref().map(|n| n.kind) {
            Some(NoticeKind::Error) => "notice notice-error",
            _ => "notice notice-success",
        }
    }
}

/// Display the catalog view.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Query(query): Query<IndexQuery>,
) -> Result<Response> {
    let mut view = load_view(&session).await?;

    if let Err(e) = state.catalog().session_changed(&mut view, auth.as_ref()).await {
        notify_failure(&mut view, e)?;
    }
    if let Some(q) = query.q {
        view.apply(Action::SearchChanged(q));
    }

    let page = IndexTemplate::from_view(&mut view);
    save_view(&session, &view).await?;
    Ok(page.into_response())
}
