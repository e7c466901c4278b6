//! HTTP request handlers (route handlers).
//!
//! Business endpoints live downstream; these are the gateway's own routes.

/// Public liveness endpoint
pub mod health;
/// Authenticated identity echo
pub mod whoami;
