//! Core types for the BangunRumah catalog.
//!
//! This module provides type-safe wrappers for the catalog's domain concepts.

pub mod credentials;
pub mod id;
pub mod price;
pub mod product;
pub mod role;

pub use credentials::{Credentials, CredentialsError};
pub use id::*;
pub use price::{CURRENCY_PREFIX, format_rupiah};
pub use product::{Product, ProductForm, ProductFormError, ProductRecord};
pub use role::{ADMIN_ROLE, Role, UserRecord};
