//! Authentication route handlers.
//!
//! Login and admin self-registration share one form; logout is a plain POST.

use axum::{
    Form,
    extract::State,
    response::Redirect,
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::notify_failure;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    OptionalAuth, clear_current_session, load_view, save_view, set_current_session,
};
use crate::state::AppState;

/// Login and registration form data.
#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    let password = SecretString::from(form.password);

    match state.catalog().login(&mut view, &form.email, &password).await {
        Ok(auth) => {
            session.cycle_id().await?;
            set_current_session(&session, &auth).await?;
            set_sentry_user(&auth.user.uid, Some(&auth.user.email));
        }
        Err(e) => notify_failure(&mut view, e)?,
    }

    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Handle admin registration.
///
/// The account is created with the admin role but not signed in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;
    let password = SecretString::from(form.password);

    if let Err(e) = state
        .catalog()
        .register_admin(&mut view, &form.email, &password)
        .await
    {
        notify_failure(&mut view, e)?;
    }

    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Redirect> {
    let mut view = load_view(&session).await?;

    state.catalog().logout(&mut view, auth.as_ref()).await;
    clear_current_session(&session).await?;
    clear_sentry_user();

    save_view(&session, &view).await?;
    Ok(Redirect::to("/"))
}
