//! Uploaded-file storage on S3 and the shared file-cleanup behavior

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::tokens::{FILE_SUFFIX_LENGTH, random_string};

/// File storage backend for user uploads.
#[derive(Clone)]
pub struct FileStorage {
    client: Client,
    bucket: String,
}

impl FileStorage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a storage handle from the ambient AWS configuration.
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }

    /// Store `bytes` under `key`, returning the stored key.
    pub async fn store(&self, key: &str, bytes: Vec<u8>) -> ApiResult<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to store {}: {}", key, e)))?;

        info!("Stored uploaded file {}", key);
        Ok(key.to_string())
    }

    /// Delete the object stored under `key`.
    pub async fn delete(&self, key: &str) -> ApiResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to delete {}: {}", key, e)))?;

        Ok(())
    }
}

/// Implemented by entities that own uploaded files.
pub trait HasFileFields {
    /// Object keys of every file-backed field, unset fields included.
    fn file_fields(&self) -> Vec<Option<&str>>;
}

/// Best-effort removal of every file owned by `entity`.
///
/// Individual storage failures are logged and swallowed so a backend
/// fault cannot block the row delete that follows.
pub async fn delete_owned_files<E: HasFileFields>(storage: &FileStorage, entity: &E) {
    for key in entity.file_fields().into_iter().flatten() {
        if let Err(e) = storage.delete(key).await {
            warn!("Could not delete uploaded file {}: {}", key, e);
        }
    }
}

/// Append a random suffix to a file name, keeping the extension, so two
/// uploads with the same name never collide.
pub fn path_with_hash(name: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let suffix = random_string(FILE_SUFFIX_LENGTH);

    match path.parent().and_then(|p| p.to_str()).filter(|d| !d.is_empty()) {
        Some(dir) => format!("{dir}/{stem}_{suffix}{ext}"),
        None => format!("{stem}_{suffix}{ext}"),
    }
}

/// Upload path for profile pictures.
pub fn avatar_path(filename: &str) -> String {
    format!("avatars/{}", path_with_hash(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_with_hash_keeps_stem_and_extension() {
        let hashed = path_with_hash("portrait.png");
        assert!(hashed.starts_with("portrait_"));
        assert!(hashed.ends_with(".png"));
        // stem + "_" + 7-char suffix + ".png"
        assert_eq!(hashed.len(), "portrait".len() + 1 + 7 + 4);
    }

    #[test]
    fn test_path_with_hash_keeps_the_directory() {
        let hashed = path_with_hash("uploads/2024/portrait.png");
        assert!(hashed.starts_with("uploads/2024/portrait_"));
        assert!(hashed.ends_with(".png"));
    }

    #[test]
    fn test_path_with_hash_without_extension() {
        let hashed = path_with_hash("portrait");
        assert!(hashed.starts_with("portrait_"));
        assert!(!hashed.contains('.'));
    }

    #[test]
    fn test_avatar_path_is_namespaced() {
        let path = avatar_path("me.jpg");
        assert!(path.starts_with("avatars/me_"));
        assert!(path.ends_with(".jpg"));
    }

    #[test]
    fn test_avatar_paths_do_not_collide() {
        assert_ne!(avatar_path("me.jpg"), avatar_path("me.jpg"));
    }
}
