//! Salingtau Storage Library
//!
//! Blob storage addressed by path. The pipeline only needs four operations:
//! upload a stream under a key, open a key as a stream, stat a key and delete
//! it. [`FileStorage`] is that contract; adapters exist for the local
//! filesystem, S3-compatible object stores and an in-process map.
//!
//! Keys are the staged path strings from `salingtau_core::paths` or the
//! published video layout (`courses/{courseId}/{resolution}p/{file}`). Keys
//! must not contain `..` or a leading `/`.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::{MemoryStorage, StorageEvent};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use salingtau_core::StorageBackend;
pub use traits::{
    collect_bytes, ByteReader, ByteStream, FileProperties, FileStorage, StorageError,
    StorageResult, UploadOptions,
};
