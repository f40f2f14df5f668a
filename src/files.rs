//! Profile-photo storage on the local filesystem, served under `/uploads`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const PHOTO_SUBDIR: &str = "profile_photos";
/// URL prefix the upload directory is mounted at.
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid file type. Allowed: .jpg, .jpeg, .png, .gif, .webp")]
    InvalidType,
    #[error("File too large. Maximum size: 5MB")]
    TooLarge,
    #[error("No file provided")]
    Missing,
    #[error("upload I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
    base_url: String,
}

impl PhotoStore {
    pub fn new(upload_root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: upload_root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory mounted at `/uploads`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn photo_dir(&self) -> PathBuf {
        self.root.join(PHOTO_SUBDIR)
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}/{}/{}", self.base_url, UPLOADS_ROUTE, PHOTO_SUBDIR, file_name)
    }

    /// Validate and write a photo under a fresh uuid name (original extension kept).
    pub async fn save(
        &self,
        user_id: &str,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredPhoto, UploadError> {
        let ext = validate_image(original_name, content_type)?;
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(UploadError::TooLarge);
        }

        let dir = self.photo_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;

        info!(%user_id, file = %file_name, size = bytes.len(), "profile photo saved");
        Ok(StoredPhoto {
            url: self.url_for(&file_name),
            file_name,
            path,
        })
    }

    /// Map one of our photo URLs back to its file. Foreign URLs give `None`.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        self.path_for_name(self.name_for_url(url)?)
    }

    /// File name behind one of our photo URLs, if it is one.
    pub fn name_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let prefix = format!("{}{}/{}/", self.base_url, UPLOADS_ROUTE, PHOTO_SUBDIR);
        url.trim().strip_prefix(&prefix)
    }

    /// Path of a stored photo by file name. Names that could escape the photo
    /// directory give `None`.
    pub fn path_for_name(&self, name: &str) -> Option<PathBuf> {
        let safe = !name.is_empty()
            && !name.contains(['/', '\\'])
            && !name.starts_with('.');
        safe.then(|| self.photo_dir().join(name))
    }

    /// Best-effort delete; `false` if nothing was removed.
    pub async fn delete(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "profile photo deleted");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "profile photo delete failed");
                false
            }
        }
    }
}

/// Lower-cased extension if both the name and the content type look like an image.
pub fn validate_image(file_name: &str, content_type: Option<&str>) -> Result<String, UploadError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or(UploadError::InvalidType)?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UploadError::InvalidType);
    }
    if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
        return Err(UploadError::InvalidType);
    }
    Ok(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_checks_extension_and_content_type() {
        assert_eq!(validate_image("me.PNG", Some("image/png")).unwrap(), "png");
        assert!(matches!(
            validate_image("me.exe", Some("image/png")),
            Err(UploadError::InvalidType)
        ));
        assert!(matches!(
            validate_image("me.png", Some("text/plain")),
            Err(UploadError::InvalidType)
        ));
        assert!(matches!(validate_image("noext", Some("image/png")), Err(UploadError::InvalidType)));
        assert!(matches!(validate_image("me.jpg", None), Err(UploadError::InvalidType)));
    }

    #[tokio::test]
    async fn save_then_map_url_back_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path(), "http://localhost:8000/");

        let saved = store
            .save("u-1", "avatar.jpg", Some("image/jpeg"), b"\xff\xd8\xff")
            .await
            .unwrap();
        assert!(saved.url.starts_with("http://localhost:8000/uploads/profile_photos/"));
        assert!(saved.url.ends_with(".jpg"));
        assert_eq!(store.path_for_url(&saved.url), Some(saved.path.clone()));
        assert_eq!(store.name_for_url(&saved.url), Some(saved.file_name.as_str()));

        assert!(store.delete(&saved.path).await);
        assert!(!store.delete(&saved.path).await);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path(), "http://x");
        let big = vec![0u8; MAX_PHOTO_BYTES + 1];
        assert!(matches!(
            store.save("u", "a.png", Some("image/png"), &big).await,
            Err(UploadError::TooLarge)
        ));
    }

    #[test]
    fn foreign_or_traversal_urls_do_not_map() {
        let store = PhotoStore::new("/srv/uploads", "http://x");
        assert!(store.path_for_url("https://cdn.example/me.png").is_none());
        assert!(store
            .path_for_url("http://x/uploads/profile_photos/../secret")
            .is_none());
    }
}
