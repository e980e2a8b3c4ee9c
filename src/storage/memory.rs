//! In-memory blob store.
//!
//! Objects are held in a `tokio::sync::RwLock<HashMap<...>>`.  Bodies are
//! buffered in full on put, so this backend suits tests and short-lived
//! deployments where losing everything on restart is acceptable.

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::backend::{
    body_from_bytes, collect_body, BlobStore, ByteStream, CustomMetadata, StoredObject,
};

/// A buffered object.
#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    metadata: CustomMetadata,
}

/// In-memory blob store backed by a hash map.
#[derive(Default)]
pub struct MemoryBackend {
    /// key -> object.
    objects: tokio::sync::RwLock<HashMap<String, MemoryObject>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl BlobStore for MemoryBackend {
    fn has(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.objects.read().await.contains_key(&key)) })
    }

    fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        metadata: CustomMetadata,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let data = collect_body(body).await?;
            tracing::debug!("memory put: key={} size={}", key, data.len());
            self.objects.write().await.insert(
                key,
                MemoryObject {
                    data,
                    content_type,
                    metadata,
                },
            );
            Ok(())
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects.get(&key).map(|obj| StoredObject {
                body: body_from_bytes(obj.data.clone()),
                content_type: Some(obj.content_type.clone()),
                metadata: obj.metadata.clone(),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> CustomMetadata {
        CustomMetadata {
            original_filename: name.to_string(),
            extension: None,
        }
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let backend = MemoryBackend::new();
        backend
            .put(
                "quick-fox",
                body_from_bytes(Bytes::from("hello world")),
                "text/plain",
                meta("hello.txt"),
            )
            .await
            .unwrap();

        let obj = backend.get("quick-fox").await.unwrap().unwrap();
        assert_eq!(obj.content_type.as_deref(), Some("text/plain"));
        assert_eq!(obj.metadata, meta("hello.txt"));
        let data = collect_body(obj.body).await.unwrap();
        assert_eq!(data, Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let backend = MemoryBackend::new();
        assert!(backend.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_has() {
        let backend = MemoryBackend::new();
        assert!(!backend.has("k").await.unwrap());
        backend
            .put("k", body_from_bytes(Bytes::new()), "text/plain", meta("x"))
            .await
            .unwrap();
        assert!(backend.has("k").await.unwrap());
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let backend = MemoryBackend::new();
        backend
            .put("k", body_from_bytes(Bytes::from("one")), "text/plain", meta("a"))
            .await
            .unwrap();
        backend
            .put("k", body_from_bytes(Bytes::from("two")), "image/png", meta("b"))
            .await
            .unwrap();

        let obj = backend.get("k").await.unwrap().unwrap();
        assert_eq!(obj.content_type.as_deref(), Some("image/png"));
        assert_eq!(collect_body(obj.body).await.unwrap(), Bytes::from("two"));
        assert_eq!(backend.len().await, 1);
    }
}
