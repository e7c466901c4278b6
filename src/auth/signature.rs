//! HMAC-SHA256 request signing and verification.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::canonical::{CanonicalRequest, body_digest};
use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Verify a base64 signature over a canonical message.
///
/// # Process
///
/// 1. Decode the base64 secret into the HMAC key
/// 2. Compute HMAC-SHA256 over the message
/// 3. Decode the base64 signature
/// 4. Compare in constant time
pub fn verify(
    secret_enc: &str,
    canonical_message: &str,
    signature_enc: &str,
) -> Result<(), SignatureError> {
    let secret = STANDARD
        .decode(secret_enc)
        .map_err(|_| SignatureError::BadSecretEncoding)?;

    let mut mac =
        HmacSha256::new_from_slice(&secret).map_err(|_| SignatureError::BadSecretEncoding)?;
    mac.update(canonical_message.as_bytes());

    let signature = STANDARD
        .decode(signature_enc)
        .map_err(|_| SignatureError::BadSignatureEncoding)?;

    // verify_slice compares in constant time
    mac.verify_slice(&signature)
        .map_err(|_| SignatureError::SignatureMismatch)
}

/// Compute the base64 HMAC-SHA256 of a canonical message.
pub fn sign(secret_enc: &str, canonical_message: &str) -> Result<String, SignatureError> {
    let secret = STANDARD
        .decode(secret_enc)
        .map_err(|_| SignatureError::BadSecretEncoding)?;

    let mut mac =
        HmacSha256::new_from_slice(&secret).map_err(|_| SignatureError::BadSecretEncoding)?;
    mac.update(canonical_message.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Header values a client attaches to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub nonce: String,
    pub key_version: String,
    pub signature: String,
}

/// Client-side signer producing `X-Date`, `X-Nonce`, `X-Key-Version` and `X-Signature`.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    secret_enc: String,
    key_version: String,
}

impl RequestSigner {
    pub fn new(secret_enc: impl Into<String>, key_version: impl Into<String>) -> Self {
        Self {
            secret_enc: secret_enc.into(),
            key_version: key_version.into(),
        }
    }

    /// Sign a request dated `date` with a fresh random nonce.
    ///
    /// `path_and_query` is the request target as sent, e.g. `/items?page=2`.
    pub fn sign(
        &self,
        method: &str,
        path_and_query: &str,
        body: &[u8],
        date: DateTime<Utc>,
    ) -> Result<SignedHeaders, SignatureError> {
        let nonce = Uuid::new_v4().to_string();
        self.sign_with(method, path_and_query, body, &date.timestamp().to_string(), &nonce)
    }

    /// Sign with an explicit `X-Date` string and nonce.
    pub fn sign_with(
        &self,
        method: &str,
        path_and_query: &str,
        body: &[u8],
        date: &str,
        nonce: &str,
    ) -> Result<SignedHeaders, SignatureError> {
        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));
        let digest = body_digest(body);

        let message = CanonicalRequest {
            method,
            path,
            query,
            body_digest: &digest,
            date,
            nonce,
            key_version: &self.key_version,
        }
        .to_message();

        Ok(SignedHeaders {
            date: date.to_string(),
            nonce: nonce.to_string(),
            key_version: self.key_version.clone(),
            signature: sign(&self.secret_enc, &message)?,
        })
    }
}
