//! Product image storage on the local filesystem.
//!
//! Files land in the configured upload directory under a random name and are
//! served back by `ServeDir` at `/uploads`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::config::UploadConfig;

/// Extensions accepted for product images.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// URL prefix the upload directory is mounted at.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Errors from storing an uploaded image.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file type not allowed; use one of: png, jpg, jpeg, gif, webp")]
    UnsupportedType,

    #[error("file is empty")]
    Empty,

    #[error("file exceeds the {max} byte limit")]
    TooLarge { max: usize },

    #[error("failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes uploaded images to disk.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
        }
    }

    /// Directory the files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Largest accepted file in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store an image and return its public URL path.
    ///
    /// The client-supplied file name only contributes its extension.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` for a missing or disallowed
    /// extension, `UploadError::Empty` or `UploadError::TooLarge` for bad
    /// sizes, and `UploadError::Io` if the write fails.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let extension = allowed_extension(file_name).ok_or(UploadError::UnsupportedType)?;
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max: self.max_bytes,
            });
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!("{}.{extension}", Uuid::new_v4().simple());
        tokio::fs::write(self.dir.join(&name), bytes).await?;

        tracing::debug!(file = %name, size = bytes.len(), "Stored product image");
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }
}

/// Lowercased extension of `file_name` if it is on the allowlist.
fn allowed_extension(file_name: &str) -> Option<String> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(max_bytes: usize) -> ImageStore {
        ImageStore::new(&UploadConfig {
            dir: std::env::temp_dir().join(format!("bazaar-uploads-{}", Uuid::new_v4())),
            max_bytes,
        })
    }

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("lamp.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("a.b.webp").as_deref(), Some("webp"));
        assert_eq!(allowed_extension("script.svg"), None);
        assert_eq!(allowed_extension("noextension"), None);
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let images = store(1024);
        let url = images.save("Lamp.JPG", b"\xff\xd8\xff").await.unwrap();

        let name = url.strip_prefix("/uploads/").unwrap();
        assert!(name.ends_with(".jpg"));
        let written = tokio::fs::read(images.dir().join(name)).await.unwrap();
        assert_eq!(written, b"\xff\xd8\xff");

        tokio::fs::remove_dir_all(images.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_bad_files() {
        let images = store(4);
        assert!(matches!(
            images.save("evil.exe", b"MZ").await,
            Err(UploadError::UnsupportedType)
        ));
        assert!(matches!(
            images.save("empty.png", b"").await,
            Err(UploadError::Empty)
        ));
        assert!(matches!(
            images.save("big.png", b"12345").await,
            Err(UploadError::TooLarge { max: 4 })
        ));
        // Nothing was written
        assert!(!images.dir().exists());
    }
}
