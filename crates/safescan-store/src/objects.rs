//! In-memory object storage.

use std::collections::HashMap;

use async_trait::async_trait;
use safescan_core::{Error, ObjectStore, Result};
use tokio::sync::RwLock;

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Object storage held in process memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for `key`.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("object {}", key)))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryObjectStore::new();
        store
            .put("uploads/a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(store.get("uploads/a.png").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(
            store.content_type("uploads/a.png").await.as_deref(),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
