use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::AppError;
use crate::storage_manager::media::MediaStore;
use crate::storage_manager::records::{
    CreateImageRecord, ImageMetadata, ImageRecord, MetadataStore,
};

/// Reactive projection of the gallery for presentation layers. The
/// in-memory list is a cache over the metadata store: saves and deletes
/// patch it optimistically and `refresh` reconciles it with the database,
/// so it can lag briefly behind disk.
#[derive(Debug, Clone, Default)]
pub struct GallerySnapshot {
    pub images: Vec<ImageRecord>,
    pub loading: bool,
    pub saving: bool,
    pub error: Option<String>,
}

impl GallerySnapshot {
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SaveGeneratedImage {
    pub prompt: String,
    pub base64_data: String,
    pub extension: Option<String>,
    pub file_name: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

/// Coordinates the blob store and metadata store into gallery-level
/// operations. Sole writer of image-record lifecycle transitions.
pub struct GalleryService {
    records: MetadataStore,
    media: MediaStore,
    state: RwLock<GallerySnapshot>,
    refresh_generation: AtomicU64,
}

impl GalleryService {
    pub fn new(records: MetadataStore, media: MediaStore) -> Self {
        Self {
            records,
            media,
            state: RwLock::new(GallerySnapshot::default()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> GallerySnapshot {
        self.state.read().await.clone()
    }

    /// Reload the in-memory list from the metadata store. On failure the
    /// previous list is left untouched and the error is surfaced in the
    /// snapshot. Overlapping refreshes are resolved by a generation stamp:
    /// a result that finishes after a newer attempt started is discarded.
    pub async fn refresh(&self) -> Result<Vec<ImageRecord>, AppError> {
        let generation = self.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        match self.records.list().await {
            Ok(images) => {
                let mut state = self.state.write().await;
                if self.refresh_generation.load(Ordering::SeqCst) == generation {
                    state.images = images.clone();
                }
                state.loading = false;
                Ok(images)
            }
            Err(err) => {
                let mut state = self.state.write().await;
                state.loading = false;
                state.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Trigger a refresh without waiting for it. Failures are logged and
    /// reflected in the snapshot's error field, nothing else.
    pub fn spawn_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = service.refresh().await {
                tracing::warn!(error = %err, "background gallery refresh failed");
            }
        })
    }

    /// Persist a generated image: blob first, then the metadata row
    /// pointing at it, then an optimistic prepend to the in-memory list.
    /// A blob-write failure stops the operation before any row is created;
    /// a row-create failure after the blob is written leaves the blob
    /// behind as accepted leakage.
    pub async fn save_generated_image(
        &self,
        input: SaveGeneratedImage,
    ) -> Result<ImageRecord, AppError> {
        if input.prompt.trim().is_empty() {
            return Err(AppError::Validation(
                "Prompt must not be empty when saving a generated image.".to_string(),
            ));
        }

        {
            let mut state = self.state.write().await;
            state.saving = true;
            state.error = None;
        }

        let saved = match self
            .media
            .save_image(
                &input.base64_data,
                input.extension.as_deref(),
                input.file_name.as_deref(),
            )
            .await
        {
            Ok(saved) => saved,
            Err(err) => return Err(self.fail_saving(err).await),
        };

        let record = match self
            .records
            .create(CreateImageRecord {
                uri: saved.uri.clone(),
                prompt: input.prompt,
                metadata: input.metadata,
            })
            .await
        {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(
                    uri = %saved.uri,
                    error = %err,
                    "image blob left behind after metadata create failed"
                );
                return Err(self.fail_saving(err).await);
            }
        };

        let mut state = self.state.write().await;
        state.images.insert(0, record.clone());
        state.saving = false;
        Ok(record)
    }

    /// Delete the metadata row first, then best-effort delete its blob.
    /// A missing id and a stubborn file are both quiet successes; the user's
    /// delete intent wins over storage hygiene.
    pub async fn delete_image(&self, id: i64) -> Result<(), AppError> {
        {
            let mut state = self.state.write().await;
            state.saving = true;
            state.error = None;
        }

        let deleted = match self.records.delete_by_id(id).await {
            Ok(deleted) => deleted,
            Err(err) => return Err(self.fail_saving(err).await),
        };

        if let Some(record) = deleted {
            self.media.delete_image(&record.uri).await;
        }

        let mut state = self.state.write().await;
        state.images.retain(|record| record.id != id);
        state.saving = false;
        Ok(())
    }

    /// Clear blob directory and metadata table together. Both halves must
    /// succeed for this destructive bulk action to be reported as a success.
    pub async fn clear_gallery(&self) -> Result<(), AppError> {
        {
            let mut state = self.state.write().await;
            state.saving = true;
            state.error = None;
        }

        let (dir_result, rows_result) =
            tokio::join!(self.media.clear_directory(), self.records.delete_all());
        if let Err(err) = dir_result.and(rows_result) {
            return Err(self.fail_saving(err).await);
        }

        let mut state = self.state.write().await;
        state.images.clear();
        state.saving = false;
        Ok(())
    }

    async fn fail_saving(&self, err: AppError) -> AppError {
        let mut state = self.state.write().await;
        state.saving = false;
        state.error = Some(err.user_message());
        err
    }
}
