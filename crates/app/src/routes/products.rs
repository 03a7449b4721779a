//! Product route handlers (admin only).
//!
//! Each handler loads the view state, runs one catalog action, stores the
//! state again and redirects back to `/`.

use axum::{
    extract::{Multipart, Path, State},
    response::Redirect,
};
use tower_sessions::Session;
use tracing::instrument;

use bangun_rumah_core::{ProductForm, ProductId};

use super::notify_failure;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, load_view, save_view};
use crate::services::ImageUpload;
use crate::state::AppState;

/// Content type assumed when the browser sends none.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Read the product form and its optional image from a multipart body.
///
/// An empty file field counts as no image.
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(ProductForm, Option<ImageUpload>)> {
    let mut form = ProductForm::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().map(base_name).unwrap_or_default();
            let content_type = field
                .content_type()
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            if !file_name.is_empty() && !bytes.is_empty() {
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "name" => form.name = value,
            "price" => form.price = value,
            "category" => form.category = value,
            "stock" => form.stock = value,
            "unit" => form.unit = value,
            _ => {}
        }
    }

    Ok((form, image))
}

/// Last path component of a client-supplied file name.
fn base_name(file_name: &str) -> String {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Create a product, or save the product being edited.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    multipart: Multipart,
) -> Result<Redirect> {
    let (form, image) = read_submission(multipart).await?;
    let mut view = load_view(&session).await?;

    if let Err(e) = state
        .catalog()
        .submit_product(&mut view, &auth, form, image)
        .await
    {
        notify_failure(&mut view, e)?;
    }

    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Leave edit mode without saving.
pub async fn cancel_edit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_): RequireAuth,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    state.catalog().cancel_edit(&mut view);
    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Load a product into the form.
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_): RequireAuth,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    if let Err(e) = state.catalog().start_edit(&mut view, &ProductId::new(id)) {
        notify_failure(&mut view, e)?;
    }
    save_view(&session, &view).await?;
    Ok(Redirect::to("/#product-form"))
}

/// Ask for confirmation before deleting.
pub async fn request_delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_): RequireAuth,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    if let Err(e) = state
        .catalog()
        .request_delete(&mut view, &ProductId::new(id))
    {
        notify_failure(&mut view, e)?;
    }
    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Delete after confirmation.
#[instrument(skip(state, session, auth))]
pub async fn confirm_delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    if let Err(e) = state
        .catalog()
        .confirm_delete(&mut view, &auth, &ProductId::new(id))
        .await
    {
        notify_failure(&mut view, e)?;
    }
    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Dismiss the delete confirmation.
pub async fn cancel_delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_): RequireAuth,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    state.catalog().cancel_delete(&mut view);
    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Run the bulk import.
#[instrument(skip_all)]
pub async fn import(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    if let Err(e) = state.catalog().import_products(&mut view, &auth).await {
        notify_failure(&mut view, e)?;
    }
    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}
