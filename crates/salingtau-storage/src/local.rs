use crate::keys::{content_type_for_key, validate_key};
use crate::traits::{
    ByteReader, ByteStream, FileProperties, FileStorage, StorageError, StorageResult,
    UploadOptions,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path` (e.g. "/var/lib/salingtau/media").
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn upload_file(
        &self,
        path: &str,
        mut reader: ByteReader,
        _options: UploadOptions,
    ) -> StorageResult<u64> {
        let file_path = self.key_to_path(path)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&file_path).await?;

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %file_path.display(),
            key = %path,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(bytes_copied)
    }

    async fn get_file(&self, path: &str) -> StorageResult<Option<ByteStream>> {
        let file_path = self.key_to_path(path)?;

        let file = match fs::File::open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    file_path.display(),
                    e
                )))
            }
        };

        let key = path.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(key = %key, error = %e, "Local storage stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Some(Box::pin(stream)))
    }

    async fn get_file_properties(&self, path: &str) -> StorageResult<Option<FileProperties>> {
        let file_path = self.key_to_path(path)?;

        let metadata = match fs::metadata(&file_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::IoError(e)),
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(FileProperties {
            size: metadata.len(),
            content_type: content_type_for_key(path).map(String::from),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let file_path = self.key_to_path(path)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&file_path).await {
            Ok(()) => {
                tracing::info!(
                    path = %file_path.display(),
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key = %path, "Local storage delete of missing file");
                Ok(())
            }
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                file_path.display(),
                e
            ))),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
