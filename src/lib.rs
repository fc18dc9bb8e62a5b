//! Resolves a post URL to its media and relays the file back as a download.
//!
//! The request path is `resolver` → `provider` for `/api/metadata`, and
//! `token` → `proxy` for `/api/stream`. `routes` composes both.

pub mod config;
pub mod error;
pub mod provider;
pub mod proxy;
pub mod resolver;
pub mod routes;
pub mod token;

pub use config::Config;
pub use error::AppError;
pub use routes::{AppState, api_router, build_router};
