//! Uploaded images of the memory backend.
//!
//! The hosted backend serves its own download URLs; this route only exists
//! so locally uploaded images display.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Serve a stored object by path.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response> {
    let memory = state
        .memory()
        .ok_or_else(|| AppError::NotFound(path.clone()))?;
    let (bytes, content_type) = memory
        .object(&path)
        .await
        .ok_or(AppError::NotFound(path))?;

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
