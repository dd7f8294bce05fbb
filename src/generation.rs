use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::AppError;
use crate::gallery::{GalleryService, SaveGeneratedImage};
use crate::image_generator::{
    AspectRatio, ImageGenerationClient, ImageGenerationRequest, ImageSize, PersonGeneration,
};
use crate::prompt::{compose, find_style_preset, PromptStyle};
use crate::storage_manager::records::{ImageMetadata, ImageRecord};
use crate::subscription::{EntitlementProvider, EntitlementTracker};

/// What the user dialed in on the create screen.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub style_id: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub guidance_scale: f64,
    pub seed: Option<i64>,
    pub image_size: ImageSize,
    pub person_generation: PersonGeneration,
}

#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// No entitlement, no key, no credits. The caller answers with an
    /// upgrade prompt.
    Denied,
    Completed(ImageRecord),
}

/// Run one generation end to end: compose the prompt, authorize the
/// attempt, call the external service, persist the first returned asset,
/// and only then commit any credit decrement.
pub async fn generate_and_save<C, P>(
    client: &C,
    tracker: &EntitlementTracker<P>,
    gallery: &GalleryService,
    request: GenerationRequest,
) -> Result<GenerationOutcome, AppError>
where
    C: ImageGenerationClient,
    P: EntitlementProvider,
{
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation(
            "Enter a prompt to guide Imagen before generating.".to_string(),
        ));
    }

    let style = request
        .style_id
        .as_deref()
        .and_then(find_style_preset)
        .map(PromptStyle::from);

    let extras = vec![
        format!("Aspect ratio {}", request.aspect_ratio.label()),
        format!("Guidance scale {:.1}", request.guidance_scale),
        format!("Resolution {}", request.image_size.as_str()),
    ];
    let composed = compose(
        &request.prompt,
        request.negative_prompt.as_deref(),
        style.as_ref(),
        &extras,
    );

    let access = tracker.authorize_generation().await?;
    if !access.allowed {
        return Ok(GenerationOutcome::Denied);
    }

    let api_request = ImageGenerationRequest {
        prompt: composed.positive.clone(),
        negative_prompt: composed.negative.clone(),
        aspect_ratio: request.aspect_ratio,
        guidance_scale: Some(request.guidance_scale),
        number_of_images: 1,
        seed: request.seed,
        image_size: Some(request.image_size),
        person_generation: Some(request.person_generation),
        api_key_override: access.api_key_override.clone(),
    };

    let result = client.generate(&api_request).await?;
    let Some(asset) = result.assets.first() else {
        return Err(AppError::Persistence(
            "The image service returned an empty response. Try adjusting the prompt.".to_string(),
        ));
    };

    let mut extras_map = JsonMap::new();
    if let Some(style_id) = request.style_id.as_deref() {
        if let Some(preset) = find_style_preset(style_id) {
            extras_map.insert("styleId".into(), JsonValue::String(preset.id.into()));
            extras_map.insert("styleName".into(), JsonValue::String(preset.name.into()));
            extras_map.insert(
                "styleTagline".into(),
                JsonValue::String(preset.tagline.into()),
            );
        }
    }
    extras_map.insert(
        "imageSize".into(),
        JsonValue::String(request.image_size.as_str().into()),
    );
    extras_map.insert(
        "personGeneration".into(),
        JsonValue::String(request.person_generation.as_str().into()),
    );
    if let Some(negative) = composed.negative.as_deref() {
        extras_map.insert("negativePrompt".into(), JsonValue::String(negative.into()));
    }

    let metadata = ImageMetadata {
        aspect_ratio: Some(request.aspect_ratio),
        guidance_scale: Some(request.guidance_scale),
        model: Some(result.metadata.model.clone()),
        seed: result.metadata.seed.or(request.seed),
        extras: extras_map,
    };

    let record = gallery
        .save_generated_image(SaveGeneratedImage {
            prompt: composed.positive,
            base64_data: asset.base64_data.clone(),
            extension: Some(asset.extension().to_string()),
            file_name: asset.file_name.clone(),
            metadata: Some(metadata),
        })
        .await?;

    tracker.commit_credit_use(&access).await?;

    Ok(GenerationOutcome::Completed(record))
}
