//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Health check
//! GET  /                          - The catalog view (login form when signed out)
//! GET  /?q=...                    - Same, with the search text updated
//!
//! # Auth
//! POST /auth/login                - Sign in
//! POST /auth/register             - Self-register an admin account
//! POST /auth/logout               - Sign out
//!
//! # Products (admin only)
//! POST /products                  - Create, or update the edit target (multipart)
//! POST /products/cancel           - Leave edit mode
//! GET  /products/{id}/edit        - Load a product into the form
//! GET  /products/{id}/delete      - Ask for delete confirmation
//! POST /products/{id}/delete      - Confirmed delete
//! POST /products/delete/cancel    - Dismiss the confirmation
//! POST /products/import           - Bulk import from the import source
//!
//! # Files (memory backend only)
//! GET  /files/{*path}             - Serve an uploaded image
//! ```
//!
//! Every POST answers with a redirect back to `/`; outcomes are carried to
//! the next render as a notice in the view state.

pub mod auth;
pub mod files;
pub mod page;
pub mod products;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::create_session_layer;
use crate::services::CatalogError;
use crate::state::{AppState, FILES_PATH};
use crate::view::{Action, Notice, ViewState};

/// Largest accepted product form, image included.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(products::submit).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/cancel", post(products::cancel_edit))
        .route("/import", post(products::import))
        .route("/delete/cancel", post(products::cancel_delete))
        .route("/{id}/edit", get(products::edit))
        .route(
            "/{id}/delete",
            get(products::request_delete).post(products::confirm_delete),
        )
}

/// Create all application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(page::index))
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .route(&format!("{FILES_PATH}/{{*path}}"), get(files::serve))
}

/// Build the complete application: routes, sessions and request tracing.
///
/// Sentry layers are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Show a failed action to the user as an error notice.
///
/// A write attempted without the admin role is not a user mistake the view
/// can explain; it is answered with 403 instead.
fn notify_failure(view: &mut ViewState, err: CatalogError) -> Result<(), AppError> {
    if matches!(err, CatalogError::Forbidden) {
        return Err(err.into());
    }
    tracing::warn!(error = %err, "Action failed");
    view.apply(Action::Notify(Notice::error(err.to_string())));
    Ok(())
}
