//! Persistence, entitlement, and prompt core of the Diotrix AI image
//! gallery app. The UI shell, the network call to the image service, and
//! the purchase SDK live elsewhere; this crate owns local state.

pub mod error;
pub mod gallery;
pub mod generation;
pub mod image_generator;
pub mod prompt;
pub mod storage_manager;
pub mod subscription;
pub mod utils;

pub use error::AppError;
pub use gallery::{GalleryService, GallerySnapshot, SaveGeneratedImage};
pub use generation::{generate_and_save, GenerationOutcome, GenerationRequest};
pub use image_generator::{
    AspectRatio, ImageGenerationClient, ImageGenerationRequest, ImageGenerationResult, ImageSize,
    PersonGeneration,
};
pub use prompt::{compose, ComposedPrompt, PromptStyle, StylePreset, STYLE_PRESETS};
pub use storage_manager::{
    CreateImageRecord, ImageMetadata, ImageRecord, MetadataStore, SettingsStore, SettingsUpdate,
    StorageConfig, StorageManager, StoredSettings, ThemePreference,
};
pub use subscription::{
    is_pro, resolve_generation_authorization, EntitlementProvider, EntitlementTracker,
    GenerationAccess, PRO_ENTITLEMENT,
};
