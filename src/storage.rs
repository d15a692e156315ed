//! Blob storage for uploaded images.
//!
//! Handlers validate the upload, then hand the bytes to an [`ImageStore`]
//! which returns the public path saved on the entity.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::errors::AppError;

/// Largest accepted upload (1 MiB).
pub const MAX_IMAGE_SIZE: usize = 1024 * 1024;

const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the image and returns the path clients fetch it from.
    async fn put(&self, data: Vec<u8>, extension: &str) -> Result<String, AppError>;

    /// Removes a previously stored image. Unknown paths are ignored.
    async fn delete(&self, public_path: &str) -> Result<(), AppError>;
}

/// Files under `base_path`, served back by `actix-files` at `public_prefix`.
pub struct LocalImageStore {
    base_path: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    pub fn new(base_path: PathBuf, public_prefix: &str) -> Self {
        Self {
            base_path,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Maps a public path back to a file below `base_path`, refusing
    /// anything outside it.
    fn file_for(&self, public_path: &str) -> Option<PathBuf> {
        let name = public_path.strip_prefix(&self.public_prefix)?.trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.base_path.join(name))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, data: Vec<u8>, extension: &str) -> Result<String, AppError> {
        fs::create_dir_all(&self.base_path).await?;
        let name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        fs::write(self.base_path.join(&name), &data).await.map_err(|e| {
            log::error!("Failed to write image {}: {}", name, e);
            AppError::Storage(e.to_string())
        })?;
        Ok(format!("{}/{}", self.public_prefix, name))
    }

    async fn delete(&self, public_path: &str) -> Result<(), AppError> {
        let Some(path) = self.file_for(public_path) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }
}

/// Checks an uploaded image and returns the normalised file extension.
pub fn validate_image(filename: &str, data: &[u8]) -> Result<String, AppError> {
    if data.is_empty() {
        return Err(AppError::Validation("Image is required".to_string()));
    }
    if data.len() > MAX_IMAGE_SIZE {
        return Err(AppError::Validation("File size must be less than 1 MB".to_string()));
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported format: {}. Supported: png, jpg, jpeg, webp, gif",
            ext
        )));
    }

    if image::guess_format(data).is_err() {
        return Err(AppError::Validation("File must be an image".to_string()));
    }
    Ok(ext)
}

/// Best-effort removal of a replaced image; a failure only leaves an orphan file.
pub async fn discard(store: &dyn ImageStore, public_path: &str) {
    if public_path.is_empty() {
        return;
    }
    if let Err(e) = store.delete(public_path).await {
        log::warn!("Failed to delete image {}: {}", public_path, e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    /// Smallest valid PNG header, enough for format sniffing.
    pub const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
    ];
}
