//! Remembered sign-in settings.
//!
//! The tenant and client id of the last successful sign-in live in a small
//! SQLite table, so the next run does not need the same flags again. Values
//! are bincode-encoded and cached in memory after the first read.

use std::path::Path;
use std::sync::Arc;

use async_sqlite::Client;
use async_sqlite::ClientBuilder;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Setting keys.
pub mod keys {
    /// Prefix shared by every Azure sign-in setting.
    pub const AZURE_PREFIX: &str = "azure.";
    pub const TENANT: &str = "azure.tenant";
    pub const CLIENT_ID: &str = "azure.client_id";
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("database error: {0}")]
    Database(#[from] async_sqlite::Error),
    #[error("failed to encode {key}: {source}")]
    Encode { key: String, source: bincode::Error },
    #[error("failed to decode {key}: {source}")]
    Decode { key: String, source: bincode::Error },
}

#[derive(Clone)]
pub struct SettingsProvider {
    db: Client,
    cache: Arc<DashMap<String, Vec<u8>>>,
}

impl SettingsProvider {
    /// Opens (or creates) the settings database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::with_builder(ClientBuilder::new().path(path)).await
    }

    /// Settings that are gone when the process exits (`--no-persist`).
    pub async fn in_memory() -> Result<Self, SettingsError> {
        Self::with_builder(ClientBuilder::new()).await
    }

    async fn with_builder(builder: ClientBuilder) -> Result<Self, SettingsError> {
        let db = builder.open().await?;
        db.conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS sign_in (
                    name TEXT PRIMARY KEY,
                    data BLOB NOT NULL
                )",
                [],
            )
        })
        .await?;

        Ok(Self {
            db,
            cache: Arc::new(DashMap::new()),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SettingsError> {
        let Some(bytes) = self.load(key).await? else {
            return Ok(None);
        };
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|source| SettingsError::Decode {
                key: key.to_string(),
                source,
            })
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        let bytes = bincode::serialize(value).map_err(|source| SettingsError::Encode {
            key: key.to_string(),
            source,
        })?;

        let name = key.to_string();
        let data = bytes.clone();
        self.db
            .conn(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO sign_in (name, data) VALUES (?1, ?2)",
                    rusqlite::params![name, data],
                )
            })
            .await?;

        self.cache.insert(key.to_string(), bytes);
        Ok(())
    }

    /// Tenant of the last successful sign-in.
    pub async fn last_tenant(&self) -> Result<Option<String>, SettingsError> {
        self.get(keys::TENANT).await
    }

    /// Client id of the last successful sign-in.
    pub async fn last_client_id(&self) -> Result<Option<String>, SettingsError> {
        self.get(keys::CLIENT_ID).await
    }

    /// Records the tenant and client id a sign-in succeeded with.
    pub async fn remember_sign_in(&self, tenant: &str, client_id: &str) -> Result<(), SettingsError> {
        self.set(keys::TENANT, &tenant).await?;
        self.set(keys::CLIENT_ID, &client_id).await?;
        log::debug!("Remembered sign-in for tenant {}", tenant);
        Ok(())
    }

    /// Drops every remembered Azure setting and returns the keys removed, in
    /// key order.
    pub async fn forget_sign_in(&self) -> Result<Vec<String>, SettingsError> {
        let pattern = format!("{}%", keys::AZURE_PREFIX);
        let removed = self
            .db
            .conn(move |conn| {
                let names = conn
                    .prepare("SELECT name FROM sign_in WHERE name LIKE ?1 ORDER BY name")?
                    .query_map([&pattern], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                conn.execute("DELETE FROM sign_in WHERE name LIKE ?1", [&pattern])?;
                Ok(names)
            })
            .await?;

        for name in &removed {
            self.cache.remove(name);
        }
        Ok(removed)
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SettingsError> {
        if let Some(bytes) = self.cache.get(key) {
            return Ok(Some(bytes.clone()));
        }

        let name = key.to_string();
        let stored: Option<Vec<u8>> = self
            .db
            .conn(move |conn| {
                let mut stmt = conn.prepare("SELECT data FROM sign_in WHERE name = ?1")?;
                let mut rows = stmt.query([&name])?;
                rows.next()?.map(|row| row.get(0)).transpose()
            })
            .await?;

        if let Some(bytes) = &stored {
            self.cache.insert(key.to_string(), bytes.clone());
        }
        Ok(stored)
    }
}
