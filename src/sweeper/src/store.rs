//! Provider-facing storage capability.
//!
//! The engine talks to object storage exclusively through the [`KeyStore`]
//! trait: a lazy key listing per prefix and a per-key delete returning a
//! coarse [`DeleteResult`]. [`ObjectStoreAdapter`] implements the trait for
//! any [`object_store::ObjectStore`], which covers the S3, Azure, GCS, local
//! filesystem, and in-memory backends.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use object_store::{ObjectStore, path::Path as ObjectPath};
use tokio_stream::StreamExt;

/// Identifier of one object in the remote store.
pub type Key = String;

/// Provider-level result of a single delete call.
///
/// The scheduler classifies these into outcomes; the store adapter never
/// decides retry policy itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteResult {
    /// The object was deleted.
    Ok,
    /// The object was already gone. Idempotent deletes treat this as success.
    NotFound,
    /// The provider throttled the call.
    RateLimited,
    /// The call did not complete within the per-call budget.
    Timeout,
    /// 5xx-class provider failure.
    ServerError(u16),
    /// 4xx-class failure other than not-found.
    ClientError(u16),
    /// Authentication or authorization failure.
    Unauthorized,
}

/// Listing failure for one prefix.
///
/// Listing is never retried: an inconsistent partial listing is worse than an
/// explicit abort, so the prefix's stream ends here and the error is carried
/// into the run report.
#[derive(Debug, Clone, thiserror::Error)]
#[error("listing keys under prefix {prefix:?} failed: {cause}")]
pub struct EnumerationError {
    pub prefix: String,
    pub cause: String,
}

/// Capability consumed by the engine: enumerate keys, delete keys.
///
/// Implementations must be shareable across workers.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Lazily list every key whose name starts with `prefix` (leading-character
    /// match; the empty prefix matches all keys). The stream ends after
    /// yielding an error.
    fn list_keys(&self, prefix: &str) -> BoxStream<'static, Result<Key, EnumerationError>>;

    /// Delete one key. Every failure mode is reported as a [`DeleteResult`]
    /// variant.
    async fn delete_key(&self, key: &Key) -> DeleteResult;
}

/// [`KeyStore`] backed by an [`object_store::ObjectStore`] instance.
pub struct ObjectStoreAdapter {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreAdapter {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl KeyStore for ObjectStoreAdapter {
    fn list_keys(&self, prefix: &str) -> BoxStream<'static, Result<Key, EnumerationError>> {
        let store = Arc::clone(&self.inner);
        let prefix = prefix.to_string();

        // Object store listings are path-segment aligned ("a" matches "a/b"
        // but not "ab"), so list from the last segment boundary and filter by
        // leading characters from there.
        let list_root = prefix
            .rsplit_once('/')
            .map(|(dir, _)| ObjectPath::from(dir))
            .filter(|root| !root.as_ref().is_empty());

        Box::pin(async_stream::stream! {
            let mut listing = store.list(list_root.as_ref());
            while let Some(entry) = listing.next().await {
                match entry {
                    Ok(meta) => {
                        if meta.location.as_ref().starts_with(prefix.as_str()) {
                            yield Ok(meta.location.to_string());
                        }
                    }
                    Err(e) => {
                        yield Err(EnumerationError {
                            prefix: prefix.clone(),
                            cause: e.to_string(),
                        });
                        break;
                    }
                }
            }
        })
    }

    async fn delete_key(&self, key: &Key) -> DeleteResult {
        match self.inner.delete(&ObjectPath::from(key.as_str())).await {
            Ok(()) => DeleteResult::Ok,
            Err(e) => map_store_error(e),
        }
    }
}

/// Fold an [`object_store::Error`] into the coarse delete result the
/// scheduler classifies on.
fn map_store_error(err: object_store::Error) -> DeleteResult {
    match err {
        object_store::Error::NotFound { .. } => DeleteResult::NotFound,
        object_store::Error::Unauthenticated { .. }
        | object_store::Error::PermissionDenied { .. } => DeleteResult::Unauthorized,
        object_store::Error::InvalidPath { .. } => DeleteResult::ClientError(400),
        object_store::Error::Precondition { .. } => DeleteResult::ClientError(412),
        object_store::Error::AlreadyExists { .. } => DeleteResult::ClientError(409),
        // Generic transport and provider errors are worth a retry
        _ => DeleteResult::ServerError(500),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    async fn seeded_adapter(keys: &[&str]) -> ObjectStoreAdapter {
        let store = InMemory::new();
        for key in keys {
            store
                .put(
                    &ObjectPath::from(*key),
                    bytes::Bytes::from_static(b"x").into(),
                )
                .await
                .unwrap();
        }
        ObjectStoreAdapter::new(Arc::new(store))
    }

    async fn collect_keys(adapter: &ObjectStoreAdapter, prefix: &str) -> Vec<Key> {
        let mut stream = adapter.list_keys(prefix);
        let mut keys = Vec::new();
        while let Some(entry) = stream.next().await {
            keys.push(entry.unwrap());
        }
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_list_all_keys_with_empty_prefix() {
        let adapter = seeded_adapter(&["a/1", "a/2", "b/1"]).await;
        assert_eq!(collect_keys(&adapter, "").await, vec!["a/1", "a/2", "b/1"]);
    }

    #[tokio::test]
    async fn test_list_segment_prefix() {
        let adapter = seeded_adapter(&["a/1", "a/2", "b/1"]).await;
        assert_eq!(collect_keys(&adapter, "a/").await, vec!["a/1", "a/2"]);
    }

    #[tokio::test]
    async fn test_list_character_prefix() {
        // "a/1" matches keys by leading characters, not only whole segments
        let adapter = seeded_adapter(&["a/10", "a/11", "a/2"]).await;
        assert_eq!(collect_keys(&adapter, "a/1").await, vec!["a/10", "a/11"]);
    }

    #[tokio::test]
    async fn test_list_character_prefix_without_separator() {
        let adapter = seeded_adapter(&["alpha", "alps", "beta"]).await;
        assert_eq!(collect_keys(&adapter, "alp").await, vec!["alpha", "alps"]);
    }

    #[tokio::test]
    async fn test_delete_existing_key() {
        let adapter = seeded_adapter(&["a/1"]).await;

        let result = adapter.delete_key(&"a/1".to_string()).await;
        assert_eq!(result, DeleteResult::Ok);
        assert!(collect_keys(&adapter, "").await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_not_found() {
        let adapter = seeded_adapter(&[]).await;

        let result = adapter.delete_key(&"ghost".to_string()).await;
        assert_eq!(result, DeleteResult::NotFound);
    }
}
