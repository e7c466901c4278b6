//! Request authentication and rate-control gateway.
//!
//! Guards a multi-tenant HTTP API by deciding, per inbound request, whether
//! to admit it. Admitted requests carry the authenticated client identity
//! to downstream handlers.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum middleware in front of protected routes
//! - **Client Directory**: PostgreSQL (sqlx) or a JSON file, read-only
//! - **Authentication**: HMAC-SHA256 signed requests, or a shared secret outside strict mode
//! - **Replay Protection**: in-memory nonce store with a background sweep
//! - **Throughput**: per-client token buckets

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
