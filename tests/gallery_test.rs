use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde_json::Map as JsonMap;
use tempfile::TempDir;

use diotrix_core::{
    AspectRatio, GalleryService, ImageMetadata, SaveGeneratedImage, StorageConfig, StorageManager,
};

fn setup() -> (TempDir, StorageConfig, StorageManager, GalleryService) {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::new(dir.path());
    let storage = StorageManager::open(&config).unwrap();
    let gallery = GalleryService::new(storage.records.clone(), storage.media.clone());
    (dir, config, storage, gallery)
}

fn save_input(prompt: &str, bytes: &[u8]) -> SaveGeneratedImage {
    SaveGeneratedImage {
        prompt: prompt.to_string(),
        base64_data: general_purpose::STANDARD.encode(bytes),
        extension: Some("png".to_string()),
        file_name: None,
        metadata: None,
    }
}

fn gallery_files(config: &StorageConfig) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(config.gallery_dir())
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}

#[tokio::test]
async fn saved_image_round_trips_bytes_and_prompt() -> Result<()> {
    let (_dir, config, _storage, gallery) = setup();
    let bytes = b"\x89PNG fake image payload";

    let record = gallery
        .save_generated_image(save_input("a lighthouse at dusk", bytes))
        .await?;

    assert_eq!(record.prompt, "a lighthouse at dusk");
    let files = gallery_files(&config);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0])?, bytes);
    assert!(record.uri.ends_with(files[0].file_name().unwrap().to_str().unwrap()));

    let snapshot = gallery.snapshot().await;
    assert!(snapshot.has_images());
    assert!(!snapshot.saving);
    assert_eq!(snapshot.error, None);
    Ok(())
}

#[tokio::test]
async fn list_returns_newest_first() -> Result<()> {
    let (_dir, _config, storage, gallery) = setup();

    for i in 0..3 {
        gallery
            .save_generated_image(save_input(&format!("prompt {}", i), b"data"))
            .await?;
    }

    let listed = storage.records.list().await?;
    assert_eq!(listed.len(), 3);
    assert!(listed[0].id > listed[1].id && listed[1].id > listed[2].id);

    let newest = gallery
        .save_generated_image(save_input("prompt 3", b"data"))
        .await?;
    let listed = storage.records.list().await?;
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0].id, newest.id);
    Ok(())
}

#[tokio::test]
async fn delete_removes_row_and_blob_and_is_idempotent() -> Result<()> {
    let (_dir, config, storage, gallery) = setup();

    let record = gallery
        .save_generated_image(save_input("to be deleted", b"bytes"))
        .await?;
    assert_eq!(gallery_files(&config).len(), 1);

    gallery.delete_image(record.id).await?;
    assert!(storage.records.list().await?.is_empty());
    assert!(gallery_files(&config).is_empty());
    assert!(!gallery.snapshot().await.has_images());

    // Deleting the same id again is a quiet no-op.
    gallery.delete_image(record.id).await?;
    assert_eq!(gallery.snapshot().await.error, None);
    Ok(())
}

#[tokio::test]
async fn delete_by_id_on_missing_row_returns_none() -> Result<()> {
    let (_dir, _config, storage, _gallery) = setup();
    assert!(storage.records.delete_by_id(12345).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn corrupt_metadata_degrades_to_null_without_blocking_neighbors() -> Result<()> {
    let (_dir, _config, storage, gallery) = setup();

    let mut extras = JsonMap::new();
    extras.insert("styleId".into(), "digital".into());
    let mut input = save_input("valid metadata", b"bytes");
    input.metadata = Some(ImageMetadata {
        aspect_ratio: Some(AspectRatio::Wide),
        guidance_scale: Some(7.0),
        model: Some("imagen-4.0-generate-001".into()),
        seed: Some(7),
        extras,
    });
    let valid = gallery.save_generated_image(input).await?;

    let conn = storage.pool().get()?;
    conn.execute(
        "INSERT INTO generated_images (uri, prompt, metadata) VALUES (?1, ?2, ?3)",
        rusqlite::params!["file:///nowhere.png", "corrupt row", "{{{ not json"],
    )?;
    drop(conn);

    let listed = storage.records.list().await?;
    assert_eq!(listed.len(), 2);
    let corrupt = listed.iter().find(|r| r.prompt == "corrupt row").unwrap();
    assert_eq!(corrupt.metadata, None);

    let fetched = storage.records.get_by_id(valid.id).await?;
    let metadata = fetched.metadata.expect("valid metadata survives");
    assert_eq!(metadata.aspect_ratio, Some(AspectRatio::Wide));
    assert_eq!(
        metadata.extras.get("styleId").and_then(|v| v.as_str()),
        Some("digital")
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_saves_produce_distinct_records_and_files() -> Result<()> {
    let (_dir, config, storage, gallery) = setup();

    let (a, b) = tokio::join!(
        gallery.save_generated_image(save_input("first", b"aaaa")),
        gallery.save_generated_image(save_input("second", b"bbbb"))
    );
    let (a, b) = (a?, b?);

    assert_ne!(a.id, b.id);
    assert_ne!(a.uri, b.uri);
    assert_eq!(gallery_files(&config).len(), 2);
    assert_eq!(storage.records.list().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn clear_gallery_empties_rows_and_directory() -> Result<()> {
    let (_dir, config, storage, gallery) = setup();

    gallery.save_generated_image(save_input("one", b"1")).await?;
    gallery.save_generated_image(save_input("two", b"2")).await?;

    gallery.clear_gallery().await?;

    assert!(storage.records.list().await?.is_empty());
    assert!(config.gallery_dir().exists());
    assert!(gallery_files(&config).is_empty());
    assert!(!gallery.snapshot().await.has_images());
    Ok(())
}

#[tokio::test]
async fn refresh_failure_keeps_previous_list_and_sets_error() -> Result<()> {
    let (_dir, _config, storage, gallery) = setup();

    gallery.save_generated_image(save_input("kept", b"k")).await?;
    gallery.refresh().await?;
    assert_eq!(gallery.snapshot().await.images.len(), 1);

    let conn = storage.pool().get()?;
    conn.execute_batch("DROP TABLE generated_images;")?;
    drop(conn);

    assert!(gallery.refresh().await.is_err());
    let snapshot = gallery.snapshot().await;
    assert_eq!(snapshot.images.len(), 1, "stale list must survive a failed refresh");
    assert!(snapshot.error.is_some());
    assert!(!snapshot.loading);
    Ok(())
}

#[tokio::test]
async fn empty_payload_is_rejected_before_any_write() -> Result<()> {
    let (_dir, config, storage, gallery) = setup();

    let mut input = save_input("prompt", b"");
    input.base64_data = String::new();
    let err = gallery.save_generated_image(input).await.unwrap_err();
    assert!(matches!(err, diotrix_core::AppError::Validation(_)));

    assert!(storage.records.list().await?.is_empty());
    assert!(gallery_files(&config).is_empty());
    let snapshot = gallery.snapshot().await;
    assert!(snapshot.error.is_some());
    assert!(!snapshot.saving);
    Ok(())
}

#[tokio::test]
async fn explicit_file_names_are_slugified() -> Result<()> {
    let (_dir, config, _storage, gallery) = setup();

    let mut input = save_input("named", b"bytes");
    input.file_name = Some("My Neon City!".to_string());
    let record = gallery.save_generated_image(input).await?;

    assert!(record.uri.ends_with("my-neon-city.png"));
    let files = gallery_files(&config);
    assert_eq!(files[0].file_name().unwrap().to_str().unwrap(), "my-neon-city.png");
    Ok(())
}

#[tokio::test]
async fn schema_init_is_idempotent_across_reopens() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::new(dir.path());

    {
        let storage = StorageManager::open(&config).unwrap();
        let gallery = GalleryService::new(storage.records.clone(), storage.media.clone());
        gallery.save_generated_image(save_input("persisted", b"p")).await?;
    }

    let storage = StorageManager::open(&config).unwrap();
    let listed = storage.records.list().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].prompt, "persisted");
    Ok(())
}

#[tokio::test]
async fn reset_database_removes_the_file() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::new(dir.path());

    {
        let storage = StorageManager::open(&config).unwrap();
        let gallery = GalleryService::new(storage.records.clone(), storage.media.clone());
        gallery.save_generated_image(save_input("gone soon", b"g")).await?;
    }

    StorageManager::reset_database(&config)?;
    assert!(!config.database_path().exists());

    let storage = StorageManager::open(&config).unwrap();
    assert!(storage.records.list().await?.is_empty());
    Ok(())
}
