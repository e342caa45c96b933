//! In-process storage adapter
//!
//! Keeps every file in a map guarded by a mutex. Used by the worker when no
//! durable backend is configured and by the pipeline tests, which also rely on
//! the recorded [`StorageEvent`] log and the failure injection hooks.

use crate::keys::{content_type_for_key, validate_key};
use crate::traits::{
    ByteReader, ByteStream, FileProperties, FileStorage, StorageError, StorageResult,
    UploadOptions,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredFile {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// A mutating operation applied to the store, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    Upload(String),
    Delete(String),
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    events: Vec<StorageEvent>,
    failing_uploads: HashSet<String>,
    failing_deletes: HashSet<String>,
}

/// Storage implementation that keeps files in memory
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic in another holder cannot leave the map half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a file directly, bypassing the event log.
    pub fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) {
        self.lock().files.insert(
            key.to_string(),
            StoredFile {
                data: Bytes::from(data),
                content_type: content_type.map(String::from),
                last_modified: Utc::now(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().files.contains_key(key)
    }

    pub fn get_bytes(&self, key: &str) -> Option<Bytes> {
        self.lock().files.get(key).map(|f| f.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().files.get(key).and_then(|f| f.content_type.clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .files
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<StorageEvent> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Make every upload to `key` fail with [`StorageError::UploadFailed`].
    pub fn fail_uploads_to(&self, key: &str) {
        self.lock().failing_uploads.insert(key.to_string());
    }

    /// Make every delete of `key` fail with [`StorageError::DeleteFailed`].
    pub fn fail_deletes_of(&self, key: &str) {
        self.lock().failing_deletes.insert(key.to_string());
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn upload_file(
        &self,
        path: &str,
        mut reader: ByteReader,
        options: UploadOptions,
    ) -> StorageResult<u64> {
        validate_key(path)?;

        if self.lock().failing_uploads.contains(path) {
            return Err(StorageError::UploadFailed(format!("Injected failure: {}", path)));
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let size = data.len() as u64;

        let mut state = self.lock();
        state.files.insert(
            path.to_string(),
            StoredFile {
                data: Bytes::from(data),
                content_type: options.content_type,
                last_modified: Utc::now(),
            },
        );
        state.events.push(StorageEvent::Upload(path.to_string()));
        drop(state);

        tracing::debug!(key = %path, size_bytes = size, "Memory storage upload successful");
        Ok(size)
    }

    async fn get_file(&self, path: &str) -> StorageResult<Option<ByteStream>> {
        validate_key(path)?;

        let Some(data) = self.get_bytes(path) else {
            return Ok(None);
        };

        let chunks: Vec<Result<Bytes, StorageError>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|offset| Ok(data.slice(offset..(offset + CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok(Some(Box::pin(futures::stream::iter(chunks))))
    }

    async fn get_file_properties(&self, path: &str) -> StorageResult<Option<FileProperties>> {
        validate_key(path)?;

        Ok(self.lock().files.get(path).map(|file| FileProperties {
            size: file.data.len() as u64,
            content_type: file
                .content_type
                .clone()
                .or_else(|| content_type_for_key(path).map(String::from)),
            last_modified: Some(file.last_modified),
        }))
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        validate_key(path)?;

        let mut state = self.lock();
        if state.failing_deletes.contains(path) {
            return Err(StorageError::DeleteFailed(format!("Injected failure: {}", path)));
        }
        state.files.remove(path);
        state.events.push(StorageEvent::Delete(path.to_string()));
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::collect_bytes;

    #[tokio::test]
    async fn upload_then_read_back_in_chunks() {
        let storage = MemoryStorage::new();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        storage
            .upload_bytes("courses/c/lectures/l/original.mp4", data.clone(), UploadOptions::default())
            .await
            .unwrap();

        let stream = storage
            .get_file("courses/c/lectures/l/original.mp4")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(collect_bytes(stream).await.unwrap(), data);
    }

    #[tokio::test]
    async fn empty_file_yields_empty_stream() {
        let storage = MemoryStorage::new();
        storage.put("a/empty.bin", Vec::new(), None);

        let stream = storage.get_file("a/empty.bin").await.unwrap().unwrap();
        assert!(collect_bytes(stream).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn properties_report_declared_content_type() {
        let storage = MemoryStorage::new();
        storage
            .upload_bytes(
                "courses/c/240p/segment-000.ts",
                vec![1, 2, 3],
                UploadOptions::with_content_type("video/mp2t"),
            )
            .await
            .unwrap();

        let properties = storage
            .get_file_properties("courses/c/240p/segment-000.ts")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(properties.size, 3);
        assert_eq!(properties.content_type.as_deref(), Some("video/mp2t"));
        assert!(storage.get_file_properties("missing.ts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn events_record_order_of_mutations() {
        let storage = MemoryStorage::new();
        storage
            .upload_bytes("a/1.png", vec![1], UploadOptions::default())
            .await
            .unwrap();
        storage.delete_file("a/1.png").await.unwrap();
        storage.delete_file("a/missing.png").await.unwrap();

        assert_eq!(
            storage.events(),
            vec![
                StorageEvent::Upload("a/1.png".to_string()),
                StorageEvent::Delete("a/1.png".to_string()),
                StorageEvent::Delete("a/missing.png".to_string()),
            ]
        );
        assert!(!storage.contains("a/1.png"));
    }

    #[tokio::test]
    async fn injected_failures() {
        let storage = MemoryStorage::new();
        storage.put("a/keep.png", vec![1u8], None);
        storage.fail_uploads_to("a/new.png");
        storage.fail_deletes_of("a/keep.png");

        let upload = storage
            .upload_bytes("a/new.png", vec![1], UploadOptions::default())
            .await;
        assert!(matches!(upload, Err(StorageError::UploadFailed(_))));

        let delete = storage.delete_file("a/keep.png").await;
        assert!(matches!(delete, Err(StorageError::DeleteFailed(_))));
        assert!(storage.contains("a/keep.png"));
    }
}
