//! Client directory lookups.
//!
//! The gateway never owns client records. It asks a [`ClientDirectory`] for
//! the record behind an `X-Client-Id` on every request. Two backends exist:
//! a static in-memory map (optionally loaded from a JSON file) and a
//! read-only PostgreSQL adapter.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;

use crate::{
    db::DbPool,
    error::DirectoryError,
    models::client::{ClientRecord, ClientStatus, SecretVersion},
};

/// Source of client records.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Fetch the record for `client_id`, or `None` if it does not exist.
    async fn lookup(&self, client_id: &str) -> Result<Option<ClientRecord>, DirectoryError>;
}

/// Directory backed by a fixed set of records.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    clients: HashMap<String, ClientRecord>,
}

impl InMemoryDirectory {
    pub fn new(records: impl IntoIterator<Item = ClientRecord>) -> Self {
        Self {
            clients: records
                .into_iter()
                .map(|record| (record.client_id.clone(), record))
                .collect(),
        }
    }

    /// Load a JSON array of client records.
    ///
    /// ```json
    /// [
    ///   {
    ///     "client_id": "c1",
    ///     "status": "active",
    ///     "allowed_sources": ["10.0.0.0/8"],
    ///     "rate_per_minute": 29,
    ///     "secrets": [{ "version": "v1", "secret_enc": "c2VjcmV0", "active": true }]
    ///   }
    /// ]
    /// ```
    pub fn from_json_file(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<ClientRecord> = serde_json::from_str(&raw)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientDirectory for InMemoryDirectory {
    async fn lookup(&self, client_id: &str) -> Result<Option<ClientRecord>, DirectoryError> {
        Ok(self.clients.get(client_id).cloned())
    }
}

/// Row of the `api_clients` table.
#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    client_id: String,
    status: String,
    allowed_sources: Vec<String>,
    rate_per_minute: i32,
}

/// Row of the `api_client_secrets` table.
#[derive(Debug, sqlx::FromRow)]
struct SecretRow {
    version: String,
    secret_enc: String,
    active: bool,
}

/// Secrets in their configured order. `position` may tie (it defaults to 0),
/// so `version` breaks ties to keep "first active secret" stable.
const SECRETS_IN_ORDER: &str = r#"
    SELECT version, secret_enc, active
    FROM api_client_secrets
    WHERE client_id = $1
    ORDER BY position ASC, version ASC
"#;

/// Read-only directory over the `api_clients` and `api_client_secrets` tables.
#[derive(Debug, Clone)]
pub struct PgClientDirectory {
    pool: DbPool,
}

impl PgClientDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientDirectory for PgClientDirectory {
    async fn lookup(&self, client_id: &str) -> Result<Option<ClientRecord>, DirectoryError> {
        let Some(row) = sqlx::query_as::<_, ClientRow>(
            r#"
            SELECT client_id, status, allowed_sources, rate_per_minute
            FROM api_clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        // Secret order decides which version an unversioned request uses
        let secrets = sqlx::query_as::<_, SecretRow>(SECRETS_IN_ORDER)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        let status = row
            .status
            .parse::<ClientStatus>()
            .unwrap_or(ClientStatus::Disabled);

        Ok(Some(ClientRecord {
            client_id: row.client_id,
            status,
            allowed_sources: row.allowed_sources,
            rate_per_minute: i64::from(row.rate_per_minute),
            secrets: secrets
                .into_iter()
                .map(|s| SecretVersion {
                    version: s.version,
                    secret_enc: s.secret_enc,
                    active: s.active,
                })
                .collect(),
        }))
    }
}
