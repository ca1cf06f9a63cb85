//! HTTP API: axum routes over the clinic services.

pub mod error;
pub mod handlers_auth;
pub mod handlers_unauth;
pub mod middlewares;
pub mod models;
pub mod router;
