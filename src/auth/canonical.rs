//! Canonical request serialization.
//!
//! The canonical form is the exact byte string both sides feed into HMAC-SHA256:
//!
//! ```text
//! <METHOD>
//! <escaped path>
//! <canonical query>
//! <lowercase hex sha256(body)>
//! <X-Date>
//! <X-Nonce>
//! <X-Key-Version>
//! ```
//!
//! Lines are joined with `\n` and there is no trailing newline.
//!
//! # Query encoding
//!
//! The canonical query re-encodes every key and value byte by byte. ASCII
//! letters, digits and `-_.~` stay literal, a space becomes `+`, and every
//! other byte becomes `%XX` with uppercase hex. This means `*` is sent as
//! `%2A` and `~` is left alone, the same as Go's `url.Values.Encode`.
//! It differs from the WHATWG form serializer, which does the reverse for
//! those two characters.
//!
//! Decoded values are compared as raw bytes, so escapes that do not form
//! valid UTF-8 (`%FF`) keep their identity instead of collapsing to U+FFFD.

use std::collections::BTreeMap;

use axum::http::request::Parts;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode, percent_encode};
use sha2::{Digest, Sha256};

/// SHA-256 of the empty byte sequence, used for requests whose body is not signed.
pub const EMPTY_BODY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Lowercase hex SHA-256 of a request body.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Fields that make up a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Raw query string, without the leading `?`.
    pub query: &'a str,
    pub body_digest: &'a str,
    pub date: &'a str,
    pub nonce: &'a str,
    pub key_version: &'a str,
}

impl<'a> CanonicalRequest<'a> {
    /// Take method, path and query from an inbound request head as received.
    ///
    /// The path keeps its percent-encoding and case.
    pub fn from_parts(
        request: &'a Parts,
        body_digest: &'a str,
        date: &'a str,
        nonce: &'a str,
        key_version: &'a str,
    ) -> Self {
        Self {
            method: request.method.as_str(),
            path: request.uri.path(),
            query: request.uri.query().unwrap_or(""),
            body_digest,
            date,
            nonce,
            key_version,
        }
    }

    /// Serialize into the message that gets signed.
    pub fn to_message(&self) -> String {
        let query = canonical_query(self.query);
        let body_digest = self.body_digest.to_ascii_lowercase();

        [
            self.method,
            self.path,
            query.as_str(),
            body_digest.as_str(),
            self.date,
            self.nonce,
            self.key_version,
        ]
        .join("\n")
    }
}

/// Order-insensitive query canonicalization.
///
/// Keys are sorted, the values of each key are sorted by their decoded
/// bytes, and pairs are re-encoded as described in the module docs.
/// A query that fails to parse canonicalizes to the empty string.
pub fn canonical_query(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let Some(mut values) = parse_query(raw) else {
        tracing::debug!("unparsable query string, canonicalizing as empty");
        return String::new();
    };

    let mut pairs = Vec::new();
    for (key, vals) in values.iter_mut() {
        vals.sort();
        let key = encode_component(key);
        for value in vals.iter() {
            pairs.push(format!("{key}={}", encode_component(value)));
        }
    }
    pairs.join("&")
}

/// Bytes left unescaped in a canonical query component, plus space which
/// is rewritten to `+` afterwards.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b' ');

/// Bytes outside ASCII are always escaped.
fn encode_component(bytes: &[u8]) -> String {
    percent_encode(bytes, QUERY_COMPONENT)
        .to_string()
        .replace(' ', "+")
}

/// Decode one form component: `+` is a space, then `%XX` escapes apply.
fn decode_component(raw: &str) -> Vec<u8> {
    let plus_as_space = raw.replace('+', " ");
    percent_decode(plus_as_space.as_bytes()).collect()
}

/// Strict multi-valued query parse.
///
/// Rejects segments containing `;` and malformed percent escapes,
/// which lenient form decoding would otherwise pass through.
fn parse_query(raw: &str) -> Option<BTreeMap<Vec<u8>, Vec<Vec<u8>>>> {
    let mut values: BTreeMap<Vec<u8>, Vec<Vec<u8>>> = BTreeMap::new();

    for segment in raw.split('&') {
        if segment.contains(';') || !escapes_well_formed(segment) {
            return None;
        }
        if segment.is_empty() {
            continue;
        }
        let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
        values
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }

    Some(values)
}

fn escapes_well_formed(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}
