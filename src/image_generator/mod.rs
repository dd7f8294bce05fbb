pub mod types;

pub use types::{
    AspectRatio, GeneratedImageAsset, ImageGenerationMetadata, ImageGenerationRequest,
    ImageGenerationResult, ImageSize, PersonGeneration, IMAGEN_MODEL,
};

use crate::error::AppError;

/// The external image generation service. Implementations make the actual
/// network call; the core only depends on this contract.
///
/// Implementations must report bad credentials as
/// [`AppError::InvalidApiKey`] so callers can route the user to key
/// management instead of a generic retry prompt.
pub trait ImageGenerationClient: Send + Sync {
    fn generate(
        &self,
        request: &ImageGenerationRequest,
    ) -> impl std::future::Future<Output = Result<ImageGenerationResult, AppError>> + Send;
}

/// Heuristic classification of provider failures that mean "the API key is
/// bad", from HTTP status, provider error code, or message text.
pub fn is_invalid_api_key_failure(
    status: Option<u16>,
    code: Option<&str>,
    message: &str,
) -> bool {
    if matches!(status, Some(401) | Some(403)) {
        return true;
    }

    if let Some(code) = code {
        let code = code.to_ascii_lowercase();
        if matches!(
            code.as_str(),
            "invalid_api_key" | "permission_denied" | "unauthorized"
        ) {
            return true;
        }
    }

    let message = message.to_ascii_lowercase();
    message.contains("api key")
        && ["invalid", "unauthorized", "missing", "expired", "permission"]
            .iter()
            .any(|needle| message.contains(needle))
}

pub const INVALID_API_KEY_MESSAGE: &str =
    "The provided Google Imagen API key appears to be invalid.";
