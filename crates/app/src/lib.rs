//! BangunRumah catalog application library.
//!
//! This crate provides the web application as a library, allowing it to be
//! tested end to end and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod firebase;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod view;
