//! Business logic services.
//!
//! # Services
//!
//! - `catalog` - Session/role resolution, product writes, delete
//!   confirmation, bulk import, login, admin registration and logout

pub mod catalog;

pub use catalog::{
    CatalogError, CatalogService, ImageUpload, ImportReport, register_admin_account, run_import,
};
