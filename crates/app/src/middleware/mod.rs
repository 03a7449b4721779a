//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with the in-memory store)

pub mod auth;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAuth, clear_current_session, load_view, save_view, session_keys,
    set_current_session,
};
pub use session::create_session_layer;
