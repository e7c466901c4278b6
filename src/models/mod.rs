//! Data models consulted by the gateway.

/// API client record, status and secret versions
pub mod client;
