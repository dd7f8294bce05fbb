use std::path::PathBuf;

use crate::error::AppError;
use crate::utils::default_data_dir;

pub mod db;
pub mod kv;
pub mod media;
pub mod records;
pub mod settings;

pub use kv::KvStore;
pub use media::{MediaStore, SavedImage};
pub use records::{
    CreateImageRecord, ImageMetadata, ImageRecord, MetadataStore, UpdateImageRecord,
};
pub use settings::{SettingsStore, SettingsUpdate, StoredSettings, ThemePreference};

/// Where the database file and gallery directory live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(db::DATABASE_FILE)
    }

    pub fn gallery_dir(&self) -> PathBuf {
        self.data_dir.join("gallery")
    }
}

/// Composition root for the persistence layer. Built once at application
/// start and passed by reference to whatever needs it.
pub struct StorageManager {
    pool: db::DbPool,
    pub records: MetadataStore,
    pub media: MediaStore,
    pub settings: SettingsStore,
}

impl StorageManager {
    pub fn open(config: &StorageConfig) -> Result<Self, AppError> {
        let pool = db::create_pool(&config.database_path())?;
        let records = MetadataStore::new(pool.clone());
        let media = MediaStore::new(config.gallery_dir());
        let settings = SettingsStore::new(KvStore::new(pool.clone()));
        Ok(Self {
            pool,
            records,
            media,
            settings,
        })
    }

    pub fn pool(&self) -> &db::DbPool {
        &self.pool
    }

    pub fn kv_with_prefix(&self, prefix: impl Into<String>) -> KvStore {
        KvStore::with_prefix(self.pool.clone(), prefix)
    }

    /// Remove the database file entirely, for the "reset experience" flow.
    /// Any [`StorageManager`] holding the database open must be dropped
    /// before calling this.
    pub fn reset_database(config: &StorageConfig) -> Result<(), AppError> {
        db::delete_database_files(&config.database_path())
    }
}
