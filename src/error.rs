//! Error types and HTTP error response handling.
//!
//! This module defines every way the gateway can refuse a request and how each
//! refusal is rendered as an HTTP response with a status code and JSON body.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Seconds a rate-limited client is told to wait before retrying.
pub const RETRY_AFTER_SECS: u64 = 60;

/// Reasons the gateway rejects a request.
///
/// Every variant is terminal for the request: the gateway never retries or
/// re-challenges, it answers immediately.
///
/// # Error Categories
///
/// - **Identity**: missing, unknown or disabled client, bad shared secret
/// - **Network**: source address outside the client's allowlist
/// - **Signing**: malformed date/nonce, clock skew, replays, signature failures
/// - **Throughput**: per-client quota exhausted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing X-Client-Id")]
    MissingClientId,

    /// Lookup failed, the client does not exist, or it is disabled.
    #[error("unknown or disabled client")]
    UnknownOrDisabledClient,

    #[error("source IP not allowed")]
    IpNotAllowed,

    /// Strict mode is on and the request carries no `X-Signature`.
    #[error("signature required (strict mode)")]
    SignatureRequired,

    #[error("unknown or inactive key version")]
    UnknownOrInactiveKeyVersion,

    #[error("bad client secret")]
    BadClientSecret,

    #[error("missing X-Date or X-Nonce")]
    MissingDateOrNonce,

    #[error("bad X-Date")]
    BadDate,

    #[error("date skew too large")]
    DateSkewTooLarge,

    #[error("nonce already used")]
    ReplayDetected,

    /// Any verifier failure. The precise [`SignatureError`] is only logged.
    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("rate limit exceeded")]
    RateLimited,
}

impl AuthError {
    /// Stable machine-readable identifier placed in the `error` field of the body.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingClientId => "missing_client_id",
            AuthError::UnknownOrDisabledClient => "unknown_or_disabled_client",
            AuthError::IpNotAllowed => "ip_not_allowed",
            AuthError::SignatureRequired => "signature_required",
            AuthError::UnknownOrInactiveKeyVersion => "unknown_or_inactive_key_version",
            AuthError::BadClientSecret => "bad_client_secret",
            AuthError::MissingDateOrNonce => "missing_date_or_nonce",
            AuthError::BadDate => "bad_date",
            AuthError::DateSkewTooLarge => "date_skew_too_large",
            AuthError::ReplayDetected => "replay_detected",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::RateLimited => "rate_limited",
        }
    }

    /// HTTP status for this rejection.
    ///
    /// - identity, signature and secret failures → 401 Unauthorized
    /// - `IpNotAllowed` → 403 Forbidden
    /// - malformed or stale date/nonce → 400 Bad Request
    /// - `RateLimited` → 429 Too Many Requests
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::IpNotAllowed => StatusCode::FORBIDDEN,
            AuthError::MissingDateOrNonce | AuthError::BadDate | AuthError::DateSkewTooLarge => {
                StatusCode::BAD_REQUEST
            }
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Convert AuthError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": "rate_limited",
///   "message": "rate limit exceeded"
/// }
/// ```
///
/// 429 responses also carry `Retry-After: 60`.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));

        if self == AuthError::RateLimited {
            return (
                self.status(),
                [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                body,
            )
                .into_response();
        }

        (self.status(), body).into_response()
    }
}

/// Failures while verifying an HMAC request signature.
///
/// Callers of the gateway see all of these as [`AuthError::SignatureMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("bad secret encoding")]
    BadSecretEncoding,

    #[error("bad signature encoding")]
    BadSignatureEncoding,

    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Faults raised by a client directory backend.
///
/// The gateway never exposes these to callers; it fails closed with
/// [`AuthError::UnknownOrDisabledClient`].
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid client data: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::MissingClientId.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ReplayDetected.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::SignatureMismatch.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::IpNotAllowed.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::BadDate.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::DateSkewTooLarge.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let response = AuthError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "60"
        );
    }

    #[test]
    fn other_responses_have_no_retry_hint() {
        let response = AuthError::BadClientSecret.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
