use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked file contents as returned by [`FileStorage::get_file`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Upload source accepted by [`FileStorage::upload_file`].
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: Option<String>,
}

impl UploadOptions {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

/// Metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProperties {
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Path-addressed blob storage
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write everything `reader` yields under `path`, replacing any existing
    /// file. Returns the number of bytes stored.
    async fn upload_file(
        &self,
        path: &str,
        reader: ByteReader,
        options: UploadOptions,
    ) -> StorageResult<u64>;

    /// Open `path` as a stream, or `None` if nothing is stored there.
    async fn get_file(&self, path: &str) -> StorageResult<Option<ByteStream>>;

    async fn get_file_properties(&self, path: &str) -> StorageResult<Option<FileProperties>>;

    /// Remove `path`. Removing a missing file succeeds.
    async fn delete_file(&self, path: &str) -> StorageResult<()>;

    fn backend_type(&self) -> StorageBackend;

    /// Upload an in-memory buffer.
    async fn upload_bytes(
        &self,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StorageResult<u64> {
        self.upload_file(path, Box::pin(std::io::Cursor::new(data)), options)
            .await
    }
}

/// Drain a stream into memory.
pub async fn collect_bytes(mut stream: ByteStream) -> StorageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer)
}
