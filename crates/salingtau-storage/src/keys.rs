//! Key validation shared by every backend.

use crate::traits::{StorageError, StorageResult};

pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

/// Content type implied by a key's extension, for backends that keep no
/// per-object metadata.
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    let content_type = match extension.as_str() {
        "m3u8" => "application/vnd.apple.mpegurl",
        "ts" => "video/mp2t",
        "mp4" => "video/mp4",
        "avif" => "image/avif",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_absolute_keys() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/courses/a").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("courses/a/240p/index.m3u8").is_ok());
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(
            content_type_for_key("courses/a/240p/index.m3u8"),
            Some("application/vnd.apple.mpegurl")
        );
        assert_eq!(content_type_for_key("courses/a/240p/segment-000.ts"), Some("video/mp2t"));
        assert_eq!(content_type_for_key("users/a/profile-pictures/original.JPG"), Some("image/jpeg"));
        assert_eq!(content_type_for_key("users/a/profile-pictures/original.bin"), None);
    }
}
