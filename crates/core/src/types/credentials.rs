//! Email/password credentials submitted by the login and registration forms.
//!
//! Only presence is checked here. Format and strength rules belong to the
//! authentication backend, which reports its own error text.

use thiserror::Error;

/// Errors from [`Credentials::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("Email and password are required")]
    Missing,
}

/// A checked registration form. The password is handed to the
/// authentication backend separately and is not kept here.
#[derive(Debug, Clone)]
pub struct Credentials {
    email: String,
}

impl Credentials {
    /// # Errors
    ///
    /// Returns [`CredentialsError::Missing`] if either value is empty.
    pub fn new(email: impl Into<String>, password: &str) -> Result<Self, CredentialsError> {
        let email = email.into();
        if email.is_empty() || password.is_empty() {
            return Err(CredentialsError::Missing);
        }
        Ok(Self { email })
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}
