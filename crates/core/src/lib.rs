//! BangunRumah Core - Shared domain types for the catalog.
//!
//! This crate provides the types used by every BangunRumah component:
//! - `app` - Catalog web application (server-rendered view + backend access)
//! - `cli` - Operator commands (bulk import, admin registration)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no backend access. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, products, roles, credentials, price display
//! - [`search`] - Case-insensitive name filter
//! - [`import`] - Bundled import list and dedup planning

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod import;
pub mod search;
pub mod types;

pub use import::{ImportItem, ImportSourceError, bundled_source, parse_source, plan_import};
pub use search::filter_by_name;
pub use types::*;
