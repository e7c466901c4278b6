//! HTTP middleware components.
//!
//! Middleware run before route handlers and can short-circuit a request.

/// Client authentication and rate limiting middleware
pub mod auth;
