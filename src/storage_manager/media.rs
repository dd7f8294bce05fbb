use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use url::Url;

use crate::error::AppError;
use crate::utils::now_millis;

const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub uri: String,
    pub file_name: String,
}

/// Stores binary image assets as files under a dedicated gallery directory.
/// Knows nothing about metadata rows; the orchestrator keeps the two in step.
#[derive(Clone)]
pub struct MediaStore {
    gallery_dir: PathBuf,
}

impl MediaStore {
    pub fn new(gallery_dir: impl Into<PathBuf>) -> Self {
        Self {
            gallery_dir: gallery_dir.into(),
        }
    }

    pub fn gallery_dir(&self) -> &Path {
        &self.gallery_dir
    }

    /// Decode `base64_data` (with or without a `data:` URI prefix) and write
    /// it to a fresh file in the gallery directory.
    pub async fn save_image(
        &self,
        base64_data: &str,
        extension: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<SavedImage, AppError> {
        if base64_data.trim().is_empty() {
            return Err(AppError::Validation(
                "Cannot save an empty image payload.".to_string(),
            ));
        }

        let data = if let Some(comma_idx) = base64_data.find(',') {
            &base64_data[comma_idx + 1..]
        } else {
            base64_data
        };
        let bytes = general_purpose::STANDARD.decode(data.trim())?;

        let resolved_extension = sanitize_extension(extension);
        let resolved_name = resolve_file_name(resolved_extension, file_name);

        tokio::fs::create_dir_all(&self.gallery_dir).await?;
        let path = self.gallery_dir.join(&resolved_name);
        tokio::fs::write(&path, bytes).await?;

        Ok(SavedImage {
            uri: path_to_uri(&path),
            file_name: resolved_name,
        })
    }

    /// Idempotent delete. A missing file is a successful no-op and any other
    /// I/O failure is logged and swallowed so a metadata-row deletion is
    /// never blocked by a stray file.
    pub async fn delete_image(&self, uri: &str) {
        if uri.is_empty() {
            return;
        }
        let path = uri_to_path(uri);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(uri, error = %e, "failed to delete image blob");
            }
        }
    }

    /// Delete and recreate the entire gallery directory. Tolerates the
    /// directory not existing yet.
    pub async fn clear_directory(&self) -> Result<(), AppError> {
        match tokio::fs::remove_dir_all(&self.gallery_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.gallery_dir).await?;
        Ok(())
    }
}

fn sanitize_extension(value: Option<&str>) -> &'static str {
    let normalized = value.map(|v| v.trim().to_ascii_lowercase());
    match normalized.as_deref() {
        Some(ext) => ALLOWED_EXTENSIONS
            .iter()
            .find(|allowed| **allowed == ext)
            .copied()
            .unwrap_or("png"),
        None => "png",
    }
}

/// Slugify an explicit file name, or synthesize a practically unique one
/// from a timestamp and a random suffix.
fn resolve_file_name(extension: &str, explicit: Option<&str>) -> String {
    if let Some(explicit) = explicit {
        let slug = slugify(explicit);
        if !slug.is_empty() {
            return format!("{}.{}", slug, extension);
        }
    }
    format!(
        "diotrix-{}-{}.{}",
        now_millis(),
        uuid::Uuid::new_v4().simple(),
        extension
    )
}

fn slugify(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn path_to_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn uri_to_path(uri: &str) -> PathBuf {
    if uri.starts_with("file:") {
        if let Ok(url) = Url::parse(uri) {
            if let Ok(path) = url.to_file_path() {
                return path;
            }
        }
    }
    PathBuf::from(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_extension_enforces_allow_list() {
        assert_eq!(sanitize_extension(None), "png");
        assert_eq!(sanitize_extension(Some("JPEG")), "jpeg");
        assert_eq!(sanitize_extension(Some("webp")), "webp");
        assert_eq!(sanitize_extension(Some("gif")), "png");
        assert_eq!(sanitize_extension(Some("")), "png");
    }

    #[test]
    fn slugify_strips_and_lowercases() {
        assert_eq!(slugify("My Cool Image!"), "my-cool-image");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("under_score-dash"), "under_score-dash");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn resolve_file_name_prefers_explicit_slug() {
        assert_eq!(resolve_file_name("png", Some("Sunset Glow")), "sunset-glow.png");
        let synthesized = resolve_file_name("jpg", Some("???"));
        assert!(synthesized.starts_with("diotrix-"));
        assert!(synthesized.ends_with(".jpg"));
    }

    #[test]
    fn uri_roundtrip_for_absolute_paths() {
        let path = Path::new("/tmp/diotrix/gallery/test.png");
        let uri = path_to_uri(path);
        assert!(uri.starts_with("file://"));
        assert_eq!(uri_to_path(&uri), path);
        assert_eq!(uri_to_path("/plain/path.png"), PathBuf::from("/plain/path.png"));
    }
}
