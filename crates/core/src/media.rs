//! Image library: uploaded images kept in one folder of a blob bucket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{with_timeout, BlobStore, ObjectInfo, StoreError};

/// Object some storage consoles create to represent an empty folder.
const FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

/// Most images returned by one listing.
pub const LIST_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub bucket: String,
    /// Folder inside the bucket, without slashes.
    pub folder: String,
    /// Base URL the bucket is served from; public URLs are omitted when unset.
    pub public_base_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    /// Object path inside the bucket, e.g. `public/1714560000000_logo.png`.
    pub path: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("`{0}` is not an image content type")]
    NotAnImage(String),

    #[error("invalid file name `{0}`")]
    InvalidName(String),

    #[error("`{0}` is outside the image folder")]
    OutsideFolder(String),

    #[error("an image named `{0}` already exists")]
    AlreadyExists(String),

    #[error("image `{0}` not found")]
    NotFound(String),

    #[error("image storage unavailable: {0}")]
    Store(StoreError),
}

impl From<StoreError> for MediaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Collision(name) => MediaError::AlreadyExists(name),
            StoreError::ObjectNotFound(name) => MediaError::NotFound(name),
            other => MediaError::Store(other),
        }
    }
}

/// A bare file name: no folders, no leading dot, not empty.
fn check_file_name(name: &str) -> Result<&str, MediaError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control)
    {
        return Err(MediaError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

/// Uploads, lists, renames and deletes images in the configured folder.
#[derive(Clone)]
pub struct ImageLibrary {
    blobs: Arc<dyn BlobStore>,
    settings: ImageSettings,
}

impl ImageLibrary {
    pub fn new(blobs: Arc<dyn BlobStore>, settings: ImageSettings) -> Self {
        Self { blobs, settings }
    }

    pub fn settings(&self) -> &ImageSettings {
        &self.settings
    }

    fn prefix(&self) -> String {
        format!("{}/", self.settings.folder)
    }

    /// Public URL of `path`, if a base URL is configured.
    pub fn public_url(&self, path: &str) -> Option<String> {
        self.settings.public_base_url.as_ref().map(|base| {
            format!(
                "{}/{}/{}",
                base.trim_end_matches('/'),
                self.settings.bucket,
                path
            )
        })
    }

    fn info(&self, object: ObjectInfo) -> ImageInfo {
        ImageInfo {
            url: self.public_url(&object.name),
            path: object.name,
            size: object.size,
            created_at: object.created_at,
        }
    }

    fn ensure_in_folder<'a>(&self, path: &'a str) -> Result<&'a str, MediaError> {
        path.strip_prefix(&self.prefix())
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(|_| path)
            .ok_or_else(|| MediaError::OutsideFolder(path.to_string()))
    }

    /// Store a new image as `<folder>/<unix millis>_<file name>`. Never
    /// overwrites an existing object.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ImageInfo, MediaError> {
        if !content_type.starts_with("image/") {
            return Err(MediaError::NotAnImage(content_type.to_string()));
        }
        let file_name = check_file_name(file_name)?;
        let created_at = Utc::now();
        let path = format!(
            "{}{}_{}",
            self.prefix(),
            created_at.timestamp_millis(),
            file_name
        );
        let size = bytes.len() as u64;

        with_timeout(
            self.settings.timeout,
            self.blobs.upload(&self.settings.bucket, &path, bytes),
        )
        .await?;
        tracing::info!(%path, size, "Image uploaded");

        Ok(ImageInfo {
            url: self.public_url(&path),
            path,
            size,
            created_at,
        })
    }

    /// Images in the folder, newest first, at most [`LIST_LIMIT`].
    pub async fn list(&self) -> Result<Vec<ImageInfo>, MediaError> {
        let prefix = self.prefix();
        let objects = with_timeout(self.settings.timeout, self.blobs.list(&self.settings.bucket)).await?;
        let mut images: Vec<ImageInfo> = objects
            .into_iter()
            .filter(|object| {
                object
                    .name
                    .strip_prefix(&prefix)
                    .is_some_and(|name| !name.is_empty() && !name.contains('/') && name != FOLDER_PLACEHOLDER)
            })
            .map(|object| self.info(object))
            .collect();
        images.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.path.cmp(&a.path))
        });
        images.truncate(LIST_LIMIT);
        Ok(images)
    }

    /// Rename an image, keeping its extension. `new_stem` is the new name
    /// without extension.
    pub async fn rename(&self, path: &str, new_stem: &str) -> Result<ImageInfo, MediaError> {
        let path = self.ensure_in_folder(path)?;
        let stem = check_file_name(new_stem)?;
        let old_name = &path[self.prefix().len()..];
        let extension = old_name.rfind('.').map(|i| &old_name[i..]).unwrap_or("");
        let new_path = format!("{}{}{}", self.prefix(), stem, extension);
        if new_path == path {
            return Err(MediaError::InvalidName(new_stem.to_string()));
        }

        let bucket = &self.settings.bucket;
        let bytes = with_timeout(self.settings.timeout, self.blobs.download(bucket, path)).await?;
        let size = bytes.len() as u64;
        with_timeout(
            self.settings.timeout,
            self.blobs.upload(bucket, &new_path, bytes),
        )
        .await?;
        with_timeout(
            self.settings.timeout,
            self.blobs.delete(bucket, &[path.to_string()]),
        )
        .await?;
        tracing::info!(from = %path, to = %new_path, "Image renamed");

        Ok(ImageInfo {
            url: self.public_url(&new_path),
            path: new_path,
            size,
            created_at: Utc::now(),
        })
    }

    /// Delete one or more images. Every path must lie in the folder; paths
    /// that no longer exist are skipped. Returns the paths removed.
    pub async fn delete(&self, paths: &[String]) -> Result<Vec<String>, MediaError> {
        for path in paths {
            self.ensure_in_folder(path)?;
        }
        let removed = with_timeout(
            self.settings.timeout,
            self.blobs.delete(&self.settings.bucket, paths),
        )
        .await?;
        tracing::info!(requested = paths.len(), removed = removed.len(), "Images deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBlobStore;
    use chrono::TimeZone;

    const BUCKET: &str = "img";

    fn library(blobs: Arc<MemoryBlobStore>) -> ImageLibrary {
        ImageLibrary::new(
            blobs,
            ImageSettings {
                bucket: BUCKET.into(),
                folder: "public".into(),
                public_base_url: Some("https://cdn.example.com/storage/".into()),
                timeout: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn upload_prefixes_timestamp_and_builds_url() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let images = library(blobs.clone());
        let info = images.upload("logo.png", "image/png", b"png".to_vec()).await.unwrap();

        assert!(info.path.starts_with("public/") && info.path.ends_with("_logo.png"));
        assert_eq!(
            info.url.as_deref(),
            Some(format!("https://cdn.example.com/storage/img/{}", info.path).as_str())
        );
        assert_eq!(blobs.download(BUCKET, &info.path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn upload_rejects_non_images_and_paths() {
        let images = library(Arc::new(MemoryBlobStore::new()));
        assert!(matches!(
            images.upload("a.txt", "text/plain", vec![1]).await,
            Err(MediaError::NotAnImage(_))
        ));
        assert!(matches!(
            images.upload("../a.png", "image/png", vec![1]).await,
            Err(MediaError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_newest_first_within_folder() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        blobs.put_at(BUCKET, "public/old.png", vec![1], old).await;
        blobs.put_at(BUCKET, "public/new.png", vec![1], new).await;
        blobs.put_at(BUCKET, "public/.emptyFolderPlaceholder", Vec::new(), new).await;
        blobs.put_at(BUCKET, "private/secret.png", vec![1], new).await;
        blobs.put_at(BUCKET, "public/nested/deep.png", vec![1], new).await;

        let paths: Vec<String> = library(blobs)
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.path)
            .collect();
        assert_eq!(paths, vec!["public/new.png", "public/old.png"]);
    }

    #[tokio::test]
    async fn rename_keeps_extension_and_refuses_collisions() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let at = Utc::now();
        blobs.put_at(BUCKET, "public/a.png", b"a".to_vec(), at).await;
        blobs.put_at(BUCKET, "public/taken.png", b"t".to_vec(), at).await;
        let images = library(blobs.clone());

        let renamed = images.rename("public/a.png", "hero").await.unwrap();
        assert_eq!(renamed.path, "public/hero.png");
        assert_eq!(blobs.download(BUCKET, "public/hero.png").await.unwrap(), b"a");
        assert!(blobs.download(BUCKET, "public/a.png").await.is_err());

        assert!(matches!(
            images.rename("public/hero.png", "taken").await,
            Err(MediaError::AlreadyExists(_))
        ));
        assert!(matches!(
            images.rename("public/hero.png", "x/y").await,
            Err(MediaError::InvalidName(_))
        ));
        assert!(matches!(
            images.rename("public/missing.png", "other").await,
            Err(MediaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_many_stays_inside_folder() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let at = Utc::now();
        blobs.put_at(BUCKET, "public/a.png", vec![1], at).await;
        blobs.put_at(BUCKET, "public/b.png", vec![1], at).await;
        let images = library(blobs.clone());

        assert!(matches!(
            images.delete(&["public/a.png".to_string(), "private/x.png".to_string()]).await,
            Err(MediaError::OutsideFolder(p)) if p == "private/x.png"
        ));
        assert_eq!(blobs.list(BUCKET).await.unwrap().len(), 2);

        let removed = images
            .delete(&["public/a.png".to_string(), "public/b.png".to_string(), "public/gone.png".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, vec!["public/a.png", "public/b.png"]);
        assert!(images.list().await.unwrap().is_empty());
    }
}
