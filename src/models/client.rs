//! API client model consulted by the gateway.
//!
//! Client records are owned by an external directory. The gateway only reads
//! them, once per request, to learn the client's status, network allowlist,
//! quota and signing secrets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Disabled,
}

impl FromStr for ClientStatus {
    type Err = std::convert::Infallible;

    /// Anything other than `"active"` is treated as disabled.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => ClientStatus::Active,
            _ => ClientStatus::Disabled,
        })
    }
}

/// One version of a client's shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
    /// Version label sent by clients in `X-Key-Version` (e.g. "v1").
    pub version: String,

    /// Base64 encoding of the raw HMAC key.
    ///
    /// In shared-secret mode clients send this exact string in `X-Client-Secret`.
    pub secret_enc: String,

    /// Inactive versions are never accepted, in either auth mode.
    pub active: bool,
}

/// Represents an API client record from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,

    pub status: ClientStatus,

    /// IP literals and CIDR ranges the client may call from; empty means unrestricted.
    #[serde(default)]
    pub allowed_sources: Vec<String>,

    /// Requests per minute; zero or negative defers to the gateway default.
    #[serde(default)]
    pub rate_per_minute: i64,

    /// Secret versions in priority order.
    #[serde(default)]
    pub secrets: Vec<SecretVersion>,
}

impl ClientRecord {
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }

    /// Resolve the secret to authenticate with.
    ///
    /// A non-empty `requested` version must match an active secret exactly.
    /// An empty one selects the first active secret in record order.
    pub fn find_secret(&self, requested: &str) -> Option<&SecretVersion> {
        if requested.is_empty() {
            return self.secrets.iter().find(|s| s.active);
        }
        self.secrets
            .iter()
            .find(|s| s.active && s.version == requested)
    }
}
