//! Multi-prefix key enumeration.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_stream::StreamExt;

use crate::store::{EnumerationError, Key, KeyStore};

/// Drives listing across the configured prefixes, producing one lazy,
/// deduplicated stream of keys.
///
/// Listing failures are fatal for the prefix that raised them and surface as
/// `Err` items in the stream; the remaining prefixes are still enumerated.
pub struct KeyEnumerator {
    store: Arc<dyn KeyStore>,
    prefixes: Vec<String>,
}

impl KeyEnumerator {
    /// `prefixes` may repeat or overlap; an empty set means every key in the
    /// store.
    pub fn new(store: Arc<dyn KeyStore>, prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            prefixes: normalize_prefixes(prefixes.into_iter().collect()),
        }
    }

    /// Prefixes retained after normalization.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Consume the enumerator into a single key stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Key, EnumerationError>> {
        let Self { store, prefixes } = self;

        Box::pin(async_stream::stream! {
            for prefix in prefixes {
                tracing::debug!(prefix = %prefix, "Enumerating prefix");
                let mut listing = store.list_keys(&prefix);
                while let Some(entry) = listing.next().await {
                    let failed = entry.is_err();
                    yield entry;
                    if failed {
                        // This prefix's listing is unusable past the error;
                        // continue with the next prefix.
                        break;
                    }
                }
            }
        })
    }
}

/// Collapse a prefix set so that no retained prefix extends another.
///
/// Two prefixes matching the same key are always nested, so dropping the
/// extensions leaves pairwise-disjoint prefixes: every key is listed exactly
/// once without tracking a seen-set. An empty input becomes the match-all
/// prefix.
fn normalize_prefixes(mut prefixes: Vec<String>) -> Vec<String> {
    if prefixes.is_empty() {
        return vec![String::new()];
    }

    prefixes.sort();
    prefixes.dedup();

    // Sorted order places every extension somewhere after a prefix of it,
    // with only its extensions in between, so comparing against the last
    // kept entry is enough.
    let mut kept: Vec<String> = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        match kept.last() {
            Some(last) if prefix.starts_with(last.as_str()) => {}
            _ => kept.push(prefix),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectStoreAdapter;
    use object_store::{ObjectStore, memory::InMemory, path::Path as ObjectPath};

    #[test]
    fn test_normalize_empty_means_match_all() {
        assert_eq!(normalize_prefixes(vec![]), vec![String::new()]);
    }

    #[test]
    fn test_normalize_drops_exact_duplicates() {
        assert_eq!(
            normalize_prefixes(vec!["a/".into(), "a/".into()]),
            vec!["a/".to_string()]
        );
    }

    #[test]
    fn test_normalize_drops_nested_prefixes() {
        assert_eq!(
            normalize_prefixes(vec!["a/b".into(), "a/".into(), "c/".into()]),
            vec!["a/".to_string(), "c/".to_string()]
        );
    }

    #[test]
    fn test_normalize_match_all_swallows_everything() {
        assert_eq!(
            normalize_prefixes(vec!["logs/".into(), String::new()]),
            vec![String::new()]
        );
    }

    #[test]
    fn test_normalize_keeps_disjoint_prefixes_sorted() {
        assert_eq!(
            normalize_prefixes(vec!["b/".into(), "a/".into()]),
            vec!["a/".to_string(), "b/".to_string()]
        );
    }

    async fn seeded_enumerator(keys: &[&str], prefixes: &[&str]) -> KeyEnumerator {
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
        KeyEnumerator::new(
            Arc::new(ObjectStoreAdapter::new(Arc::new(store))),
            prefixes.iter().map(|p| p.to_string()),
        )
    }

    async fn collect(enumerator: KeyEnumerator) -> Vec<Key> {
        let mut stream = enumerator.into_stream();
        let mut keys = Vec::new();
        while let Some(entry) = stream.next().await {
            keys.push(entry.unwrap());
        }
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_overlapping_prefixes_emit_each_key_once() {
        let enumerator = seeded_enumerator(&["a/b", "a/c", "d/e"], &["a/", "a/b"]).await;
        assert_eq!(collect(enumerator).await, vec!["a/b", "a/c"]);
    }

    #[tokio::test]
    async fn test_disjoint_prefixes_fan_in() {
        let enumerator = seeded_enumerator(&["a/1", "b/1", "c/1"], &["a/", "b/"]).await;
        assert_eq!(collect(enumerator).await, vec!["a/1", "b/1"]);
    }

    #[tokio::test]
    async fn test_no_prefixes_enumerates_everything() {
        let enumerator = seeded_enumerator(&["a/1", "b/1"], &[]).await;
        assert_eq!(collect(enumerator).await, vec!["a/1", "b/1"]);
    }
}
