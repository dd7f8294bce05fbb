use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::db::{with_conn, DbPool};
use crate::error::AppError;
use crate::image_generator::AspectRatio;

/// Structured metadata stored alongside each generated image. Known fields
/// are typed; everything else (style descriptors, resolution tier, person
/// policy, negative prompt) rides in the open `extras` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub extras: JsonMap<String, JsonValue>,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        Self {
            aspect_ratio: None,
            guidance_scale: None,
            model: None,
            seed: None,
            extras: JsonMap::new(),
        }
    }
}

/// One row of the `generated_images` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: i64,
    pub uri: String,
    pub prompt: String,
    pub metadata: Option<ImageMetadata>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateImageRecord {
    pub uri: String,
    pub prompt: String,
    pub metadata: Option<ImageMetadata>,
}

/// Partial update. `metadata` distinguishes "leave untouched" (`None`) from
/// "set to this value, possibly null" (`Some(..)`).
#[derive(Debug, Clone, Default)]
pub struct UpdateImageRecord {
    pub uri: Option<String>,
    pub prompt: Option<String>,
    pub metadata: Option<Option<ImageMetadata>>,
}

/// Durable record of every generated image's provenance. Does not touch the
/// blob files its rows point at; that coordination lives in the gallery
/// orchestrator.
#[derive(Clone)]
pub struct MetadataStore {
    pool: DbPool,
}

impl MetadataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateImageRecord) -> Result<ImageRecord, AppError> {
        let serialized = serialize_metadata(input.metadata.as_ref());
        with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO generated_images (uri, prompt, metadata) VALUES (?1, ?2, ?3)",
                params![input.uri, input.prompt, serialized],
            )?;
            let id = conn.last_insert_rowid();
            get_row_by_id(conn, id)?.ok_or_else(|| {
                AppError::Persistence(format!("Inserted image record {} could not be read back", id))
            })
        })
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<ImageRecord, AppError> {
        with_conn(&self.pool, move |conn| {
            get_row_by_id(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("Image record with id {} not found.", id)))
        })
        .await
    }

    /// Full gallery listing, newest first. Equal timestamps fall back to
    /// insertion order, so the most recently inserted row still wins.
    pub async fn list(&self) -> Result<Vec<ImageRecord>, AppError> {
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, uri, prompt, metadata, created_at FROM generated_images
                 ORDER BY datetime(created_at) DESC, id DESC",
            )?;
            let rows = stmt.query_map([], map_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn update(&self, id: i64, updates: UpdateImageRecord) -> Result<ImageRecord, AppError> {
        with_conn(&self.pool, move |conn| {
            let mut fields: Vec<&str> = Vec::new();
            let mut values: Vec<rusqlite::types::Value> = Vec::new();

            if let Some(uri) = updates.uri {
                fields.push("uri = ?");
                values.push(uri.into());
            }
            if let Some(prompt) = updates.prompt {
                fields.push("prompt = ?");
                values.push(prompt.into());
            }
            if let Some(metadata) = updates.metadata {
                fields.push("metadata = ?");
                match serialize_metadata(metadata.as_ref()) {
                    Some(text) => values.push(text.into()),
                    None => values.push(rusqlite::types::Value::Null),
                }
            }

            if fields.is_empty() {
                return get_row_by_id(conn, id)?.ok_or_else(|| {
                    AppError::NotFound(format!("Image record with id {} not found.", id))
                });
            }

            values.push(id.into());
            let sql = format!(
                "UPDATE generated_images SET {} WHERE id = ?",
                fields.join(", ")
            );
            conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;

            get_row_by_id(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("Image record with id {} not found.", id)))
        })
        .await
    }

    /// Delete by id, returning a snapshot of the removed row so the caller
    /// can clean up the associated blob. Missing ids are a quiet `None`.
    pub async fn delete_by_id(&self, id: i64) -> Result<Option<ImageRecord>, AppError> {
        with_conn(&self.pool, move |conn| {
            let Some(record) = get_row_by_id(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM generated_images WHERE id = ?1", params![id])?;
            Ok(Some(record))
        })
        .await
    }

    pub async fn delete_all(&self) -> Result<(), AppError> {
        with_conn(&self.pool, move |conn| {
            conn.execute("DELETE FROM generated_images", [])?;
            Ok(())
        })
        .await
    }
}

fn get_row_by_id(conn: &Connection, id: i64) -> Result<Option<ImageRecord>, AppError> {
    let row = conn
        .query_row(
            "SELECT id, uri, prompt, metadata, created_at FROM generated_images WHERE id = ?1",
            params![id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    let raw_metadata: Option<String> = row.get(3)?;
    Ok(ImageRecord {
        id: row.get(0)?,
        uri: row.get(1)?,
        prompt: row.get(2)?,
        metadata: parse_metadata(raw_metadata),
        created_at: row.get(4)?,
    })
}

/// Lenient decode: a corrupt metadata blob degrades to `None` instead of
/// failing the row it belongs to.
fn parse_metadata(raw: Option<String>) -> Option<ImageMetadata> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ImageMetadata>(&raw) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse stored image metadata");
            None
        }
    }
}

fn serialize_metadata(metadata: Option<&ImageMetadata>) -> Option<String> {
    let metadata = metadata?;
    match serde_json::to_string(metadata) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize image metadata");
            None
        }
    }
}
