//! Email/password authentication via the Identity Toolkit REST API.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use bangun_rumah_core::UserId;

use super::{FirebaseClient, error_message};
use crate::backend::{AuthService, AuthSession, AuthUser, BackendError, Token};

/// Response of `accounts:signInWithPassword` and `accounts:signUp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    refresh_token: String,
    /// Seconds, as a decimal string.
    expires_in: String,
}

/// Response of the secure token refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

fn expiry(expires_in: &str) -> Result<chrono::DateTime<Utc>, BackendError> {
    let seconds: i64 = expires_in
        .parse()
        .map_err(|_| BackendError::Malformed(format!("expiresIn is not a number: {expires_in}")))?;
    Ok(Utc::now() + Duration::seconds(seconds))
}

impl AccountResponse {
    fn into_session(self, fallback_email: &str) -> Result<AuthSession, BackendError> {
        let email = if self.email.is_empty() {
            fallback_email.to_string()
        } else {
            self.email
        };
        Ok(AuthSession {
            user: AuthUser {
                uid: UserId::new(self.local_id),
                email,
            },
            id_token: Token::new(self.id_token),
            refresh_token: Token::new(self.refresh_token),
            expires_at: expiry(&self.expires_in)?,
        })
    }
}

impl FirebaseClient {
    /// POST credentials to an `accounts:*` endpoint.
    async fn account_call(
        &self,
        method: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let mut url = Self::parse_url(&format!(
            "{}/accounts:{method}",
            self.endpoints.identity_toolkit.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());

        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Auth(error_message(&text)));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        account.into_session(email)
    }
}

#[async_trait]
impl AuthService for FirebaseClient {
    #[instrument(skip(self, password))]
    async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.account_call("signInWithPassword", email, password).await
    }

    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.account_call("signUp", email, password).await
    }

    #[instrument(skip(self, session), fields(uid = %session.user.uid))]
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        let mut url = Self::parse_url(&format!(
            "{}/token",
            self.endpoints.secure_token.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", session.refresh_token.expose()),
        ];
        let response = self.client.post(url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Auth(error_message(&text)));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        Ok(AuthSession {
            user: AuthUser {
                uid: UserId::new(refreshed.user_id),
                email: session.user.email.clone(),
            },
            id_token: Token::new(refreshed.id_token),
            refresh_token: Token::new(refreshed.refresh_token),
            expires_at: expiry(&refreshed.expires_in)?,
        })
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), BackendError> {
        // The REST API keeps no server-side session; dropping the tokens is
        // the whole sign-out.
        tracing::debug!(uid = %session.user.uid, "Signed out locally");
        Ok(())
    }
}
