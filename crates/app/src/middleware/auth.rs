//! Authentication extractors and session helpers.
//!
//! The signed-in identity's [`AuthSession`] is stored in the HTTP session.
//! The extractors refresh its id token when it is about to expire, so
//! handlers always receive a usable token.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::backend::AuthSession;
use crate::state::AppState;
use crate::view::ViewState;

/// Keys of the values kept in the HTTP session.
pub mod session_keys {
    /// The signed-in identity and its tokens.
    pub const AUTH_SESSION: &str = "auth_session";
    /// The view's [`ViewState`](crate::view::ViewState).
    pub const VIEW: &str = "view";
}

/// Extractor that requires a signed-in identity.
///
/// Without one, the request is redirected to the login form at `/`.
pub struct RequireAuth(pub AuthSession);

/// Error returned when a signed-in identity is required but absent.
pub enum AuthRejection {
    /// Redirect to the login form.
    RedirectToLogin,
    /// The session layer is missing.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        current_session(session, state)
            .await
            .map(Self)
            .ok_or(AuthRejection::RedirectToLogin)
    }
}

/// Extractor that optionally gets the signed-in identity.
pub struct OptionalAuth(pub Option<AuthSession>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = match parts.extensions.get::<Session>() {
            Some(session) => current_session(session, state).await,
            None => None,
        };
        Ok(Self(auth))
    }
}

/// Read the stored identity, refreshing its token if it is close to expiry.
///
/// A refresh that fails ends the session.
async fn current_session(session: &Session, state: &AppState) -> Option<AuthSession> {
    let auth: AuthSession = session
        .get(session_keys::AUTH_SESSION)
        .await
        .ok()
        .flatten()?;

    match state.catalog().ensure_fresh(&auth).await {
        Ok(None) => Some(auth),
        Ok(Some(fresh)) => {
            if let Err(e) = set_current_session(session, &fresh).await {
                tracing::warn!(error = %e, "Could not store refreshed session");
            }
            Some(fresh)
        }
        Err(e) => {
            tracing::warn!(error = %e, uid = %auth.user.uid, "Token refresh failed; signing out");
            if let Err(e) = clear_current_session(session).await {
                tracing::warn!(error = %e, "Could not clear session");
            }
            None
        }
    }
}

/// Helper to store the signed-in identity in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_session(
    session: &Session,
    auth: &AuthSession,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::AUTH_SESSION, auth).await
}

/// Helper to clear the signed-in identity from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_session(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<AuthSession>(session_keys::AUTH_SESSION)
        .await?;
    Ok(())
}

/// Load the view state, or a fresh one for a new session.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load_view(session: &Session) -> Result<ViewState, tower_sessions::session::Error> {
    Ok(session
        .get::<ViewState>(session_keys::VIEW)
        .await?
        .unwrap_or_default())
}

/// Store the view state.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_view(
    session: &Session,
    view: &ViewState,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::VIEW, view).await
}
