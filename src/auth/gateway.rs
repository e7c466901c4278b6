//! Request authentication pipeline.
//!
//! A request moves through these stages, and any of them may reject it:
//!
//! 1. resolve the client from `X-Client-Id`
//! 2. check the source address against the client's allowlist
//! 3. authenticate, either with an HMAC signature (`X-Signature`) or, outside
//!    strict mode, with the raw shared secret (`X-Client-Secret`)
//! 4. charge the client's rate limit
//!
//! A request that passes every stage is admitted with an [`AuthContext`].

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, request::Parts},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;

use super::{
    canonical::{CanonicalRequest, EMPTY_BODY_SHA256},
    ip_allowlist::{ip_allowed, remote_ip},
    nonce_store::{NonceStore, NonceSweeper},
    rate_limiter::RateLimiterRegistry,
    signature,
};
use crate::{
    config::{GatewayConfig, positive_rate},
    error::AuthError,
    services::directory::ClientDirectory,
};

pub const HEADER_CLIENT_ID: &str = "X-Client-Id";
pub const HEADER_KEY_VERSION: &str = "X-Key-Version";
pub const HEADER_DATE: &str = "X-Date";
pub const HEADER_NONCE: &str = "X-Nonce";
pub const HEADER_SIGNATURE: &str = "X-Signature";
pub const HEADER_CLIENT_SECRET: &str = "X-Client-Secret";

/// How the client proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Signed,
    SharedSecret,
}

/// Authentication context attached to admitted requests.
///
/// Inserted into the request's extensions; handlers read it with
/// `Extension<AuthContext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub client_id: String,

    /// Secret version the request was authenticated with.
    pub key_version: String,

    pub mode: AuthMode,
}

/// Admission gate combining client lookup, allowlisting, signature
/// verification, replay protection and rate limiting.
pub struct AuthGateway {
    config: GatewayConfig,
    directory: Arc<dyn ClientDirectory>,
    nonces: Arc<NonceStore>,
    rates: RateLimiterRegistry,
}

impl AuthGateway {
    /// Create a gateway with fresh nonce and rate limit state.
    pub fn new(config: GatewayConfig, directory: Arc<dyn ClientDirectory>) -> Self {
        let nonces = Arc::new(NonceStore::new(config.nonce_ttl));
        let rates = RateLimiterRegistry::new(config.default_rate_per_minute);
        Self::with_stores(config, directory, nonces, rates)
    }

    /// Create a gateway around existing stores.
    pub fn with_stores(
        config: GatewayConfig,
        directory: Arc<dyn ClientDirectory>,
        nonces: Arc<NonceStore>,
        rates: RateLimiterRegistry,
    ) -> Self {
        Self {
            config,
            directory,
            nonces,
            rates,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn nonces(&self) -> &Arc<NonceStore> {
        &self.nonces
    }

    /// Start purging expired nonces at the configured interval.
    pub fn spawn_nonce_sweeper(&self) -> NonceSweeper {
        self.nonces.spawn_sweeper(self.config.nonce_sweep_interval)
    }

    /// Decide whether to admit a request, judging `X-Date` against `now`.
    ///
    /// Only the request head is inspected. The body is never read, so signed
    /// requests are verified against the digest of an empty body.
    pub async fn authenticate(
        &self,
        request: &Parts,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        let result = self.evaluate(request, now).await;
        match &result {
            Ok(ctx) => tracing::debug!(
                client_id = %ctx.client_id,
                key_version = %ctx.key_version,
                mode = ?ctx.mode,
                "Request admitted"
            ),
            Err(err) => tracing::warn!(
                client_id = header(&request.headers, HEADER_CLIENT_ID),
                method = %request.method,
                path = request.uri.path(),
                reason = err.kind(),
                "Request rejected"
            ),
        }
        result
    }

    async fn evaluate(
        &self,
        request: &Parts,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        let headers = &request.headers;

        // Start -> ClientResolved
        let client_id = header(headers, HEADER_CLIENT_ID);
        if client_id.is_empty() {
            return Err(AuthError::MissingClientId);
        }

        let client = match self.directory.lookup(client_id).await {
            Ok(Some(client)) if client.is_active() => client,
            Ok(_) => return Err(AuthError::UnknownOrDisabledClient),
            Err(err) => {
                tracing::error!(client_id, error = %err, "Client directory lookup failed");
                return Err(AuthError::UnknownOrDisabledClient);
            }
        };

        // ClientResolved -> IPChecked
        let peer = request
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let remote = remote_ip(headers, peer).unwrap_or_default();
        if !ip_allowed(&remote, &client.allowed_sources) {
            return Err(AuthError::IpNotAllowed);
        }

        // IPChecked -> SignedPath | SharedSecretPath
        let signature_enc = header(headers, HEADER_SIGNATURE);
        if self.config.strict_mode && signature_enc.is_empty() {
            return Err(AuthError::SignatureRequired);
        }

        let secret = client
            .find_secret(header(headers, HEADER_KEY_VERSION))
            .ok_or(AuthError::UnknownOrInactiveKeyVersion)?;

        let mode = if signature_enc.is_empty() {
            let provided = header(headers, HEADER_CLIENT_SECRET);
            let matches: bool = provided
                .as_bytes()
                .ct_eq(secret.secret_enc.as_bytes())
                .into();
            if provided.is_empty() || !matches {
                return Err(AuthError::BadClientSecret);
            }
            AuthMode::SharedSecret
        } else {
            let date = header(headers, HEADER_DATE);
            let nonce = header(headers, HEADER_NONCE);
            if date.is_empty() || nonce.is_empty() {
                return Err(AuthError::MissingDateOrNonce);
            }

            let signed_at = parse_date(date).ok_or(AuthError::BadDate)?;
            let skew_ms = (now - signed_at).num_milliseconds().unsigned_abs();
            if u128::from(skew_ms) > self.config.date_skew.as_millis() {
                return Err(AuthError::DateSkewTooLarge);
            }

            if !self.nonces.add_once(&client.client_id, nonce) {
                return Err(AuthError::ReplayDetected);
            }

            let message = CanonicalRequest::from_parts(
                request,
                EMPTY_BODY_SHA256,
                date,
                nonce,
                &secret.version,
            )
            .to_message();
            tracing::trace!(len = message.len(), "Canonical request built");

            if let Err(err) = signature::verify(&secret.secret_enc, &message, signature_enc) {
                tracing::warn!(
                    client_id = %client.client_id,
                    key_version = %secret.version,
                    reason = %err,
                    "Signature verification failed"
                );
                return Err(AuthError::SignatureMismatch);
            }
            AuthMode::Signed
        };

        // -> RateChecked
        let rate = positive_rate(client.rate_per_minute)
            .unwrap_or(self.config.default_rate_per_minute);
        if !self.rates.allow(&client.client_id, i64::from(rate)) {
            return Err(AuthError::RateLimited);
        }

        // -> Admitted
        Ok(AuthContext {
            client_id: client.client_id.clone(),
            key_version: secret.version.clone(),
            mode,
        })
    }
}

/// Trimmed header value, or `""` when absent or not visible ASCII.
fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

/// Parse `X-Date` as RFC 3339 or as integer epoch seconds.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
