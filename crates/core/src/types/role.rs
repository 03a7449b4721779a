//! Roles and user records.

use serde::{Deserialize, Serialize};

/// Role string that grants write access to the catalog.
pub const ADMIN_ROLE: &str = "admin";

/// Access level of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Create, edit, delete and import products.
    Admin,
    /// Read-only access to the catalog.
    #[default]
    Viewer,
}

impl Role {
    /// Derive the effective role from a user record.
    ///
    /// Only a record whose role is exactly `"admin"` yields [`Role::Admin`].
    /// A missing record, a missing role field, or any other value is a
    /// viewer.
    #[must_use]
    pub fn resolve(record: Option<&UserRecord>) -> Self {
        match record.and_then(|r| r.role.as_deref()) {
            Some(ADMIN_ROLE) => Self::Admin,
            _ => Self::Viewer,
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document stored in the `users` collection, keyed by subject id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserRecord {
    /// Record written by self-registration. Every self-registered account
    /// is an admin.
    #[must_use]
    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: Some(ADMIN_ROLE.to_string()),
        }
    }
}
