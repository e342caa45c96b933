use crate::keys::validate_key;
use crate::traits::{
    ByteReader, ByteStream, FileProperties, FileStorage, StorageError, StorageResult,
    UploadOptions,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use tokio::io::AsyncReadExt;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials come from the standard AWS_* environment variables.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn upload_file(
        &self,
        path: &str,
        mut reader: ByteReader,
        options: UploadOptions,
    ) -> StorageResult<u64> {
        validate_key(path)?;
        let start = std::time::Instant::now();

        // Segments and images are small enough to send as a single PUT.
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;
        let size = buffer.len() as u64;

        let mut attributes = Attributes::new();
        if let Some(content_type) = options.content_type {
            attributes.insert(Attribute::ContentType, content_type.into());
        }
        let mut put_options = PutOptions::default();
        put_options.attributes = attributes;

        let location = Path::from(path);
        let result: ObjectResult<_> = object_store::ObjectStore::put_opts(
            &self.store,
            &location,
            PutPayload::from(Bytes::from(buffer)),
            put_options,
        )
        .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(size)
    }

    async fn get_file(&self, path: &str) -> StorageResult<Option<ByteStream>> {
        validate_key(path)?;
        let location = Path::from(path);

        let result: ObjectResult<_> = self.store.get(&location).await;
        let response = match result {
            Ok(response) => response,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %path,
                    "S3 download failed"
                );
                return Err(StorageError::DownloadFailed(e.to_string()));
            }
        };

        let stream = response
            .into_stream()
            .map(|chunk| chunk.map_err(|e| StorageError::DownloadFailed(e.to_string())));

        Ok(Some(Box::pin(stream)))
    }

    async fn get_file_properties(&self, path: &str) -> StorageResult<Option<FileProperties>> {
        validate_key(path)?;
        let location = Path::from(path);

        let mut options = GetOptions::default();
        options.head = true;

        let result: ObjectResult<_> =
            object_store::ObjectStore::get_opts(&self.store, &location, options).await;

        match result {
            Ok(response) => Ok(Some(FileProperties {
                size: response.meta.size as u64,
                content_type: response
                    .attributes
                    .get(&Attribute::ContentType)
                    .map(|value| value.to_string()),
                last_modified: Some(response.meta.last_modified),
            })),
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        validate_key(path)?;
        let location = Path::from(path);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;
        match result {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
