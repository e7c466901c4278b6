//! Request authentication and rate control.
//!
//! Signature checks, replay protection, source allowlisting and per-client
//! quotas, composed by [`AuthGateway`].

pub mod canonical;
pub mod gateway;
pub mod ip_allowlist;
pub mod nonce_store;
pub mod rate_limiter;
pub mod signature;

pub use gateway::{AuthContext, AuthGateway, AuthMode};
pub use nonce_store::{NonceStore, NonceSweeper};
pub use rate_limiter::RateLimiterRegistry;
pub use signature::{RequestSigner, SignedHeaders};
