use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::db::{with_conn, DbPool};
use crate::error::AppError;
use crate::utils::now_millis;

pub const DEFAULT_PREFIX: &str = "@diotrix:";

/// Namespaced key-value store over the `kv_store` table. Values are JSON
/// documents; reads are lenient, so an unreadable value degrades to `None`
/// instead of erroring.
#[derive(Clone)]
pub struct KvStore {
    pool: DbPool,
    prefix: String,
}

impl KvStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_prefix(pool, DEFAULT_PREFIX)
    }

    pub fn with_prefix(pool: DbPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let namespaced = self.namespaced(key);
        let serialized = serde_json::to_string(value)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize value: {}", e)))?;
        with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![namespaced, serialized, now_millis() as i64],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_item<T>(&self, key: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let namespaced = self.namespaced(key);
        let raw: Option<String> = with_conn(&self.pool, move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![namespaced],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await?;

        Ok(raw.and_then(|value| match serde_json::from_str::<T>(&value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding unreadable stored value");
                None
            }
        }))
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), AppError> {
        let namespaced = self.namespaced(key);
        with_conn(&self.pool, move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![namespaced])?;
            Ok(())
        })
        .await
    }

    /// Remove every key under this store's namespace.
    pub async fn clear_by_prefix(&self) -> Result<(), AppError> {
        let pattern = format!("{}%", self.prefix);
        with_conn(&self.pool, move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key LIKE ?1", params![pattern])?;
            Ok(())
        })
        .await
    }
}
