//! Per-provider snapshot storage.
//!
//! The resolution manager hands every provider's detail record to a
//! [`SnapshotStore`]. Persistence itself belongs to the storage layer; this
//! module defines the seam and an in-memory implementation.
//!
//! A store keeps at most one snapshot per (media item, provider). Saving a
//! snapshot for a pair that already has one replaces it.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use reelmatch_common::MediaId;

use super::types::{ExternalIds, ProviderSnapshot};

/// Storage for provider snapshots and resolved external ids.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Store `snapshot` for `media_id`, replacing any snapshot from the same
    /// integration.
    async fn save_snapshot(&self, media_id: MediaId, snapshot: ProviderSnapshot) -> Result<()>;

    async fn load_snapshot(&self, media_id: MediaId, integration_id: &str) -> Result<Option<ProviderSnapshot>>;

    /// All snapshots for `media_id`, sorted by integration id.
    async fn load_snapshots(&self, media_id: MediaId) -> Result<Vec<ProviderSnapshot>>;

    /// Merge newly learned ids into the ids stored for `media_id`.
    async fn save_external_ids(&self, media_id: MediaId, ids: &ExternalIds) -> Result<()>;

    async fn load_external_ids(&self, media_id: MediaId) -> Result<Option<ExternalIds>>;
}

/// Process-local [`SnapshotStore`].
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: DashMap<(MediaId, String), ProviderSnapshot>,
    external_ids: DashMap<MediaId, ExternalIds>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots across all media items.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save_snapshot(&self, media_id: MediaId, snapshot: ProviderSnapshot) -> Result<()> {
        self.snapshots
            .insert((media_id, snapshot.integration_id.clone()), snapshot);
        Ok(())
    }

    async fn load_snapshot(&self, media_id: MediaId, integration_id: &str) -> Result<Option<ProviderSnapshot>> {
        Ok(self
            .snapshots
            .get(&(media_id, integration_id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn load_snapshots(&self, media_id: MediaId) -> Result<Vec<ProviderSnapshot>> {
        let mut snapshots: Vec<ProviderSnapshot> = self
            .snapshots
            .iter()
            .filter(|entry| entry.key().0 == media_id)
            .map(|entry| entry.value().clone())
            .collect();
        snapshots.sort_by(|a, b| a.integration_id.cmp(&b.integration_id));
        Ok(snapshots)
    }

    async fn save_external_ids(&self, media_id: MediaId, ids: &ExternalIds) -> Result<()> {
        self.external_ids
            .entry(media_id)
            .and_modify(|stored| stored.merge(ids))
            .or_insert_with(|| ids.clone());
        Ok(())
    }

    async fn load_external_ids(&self, media_id: MediaId) -> Result<Option<ExternalIds>> {
        Ok(self.external_ids.get(&media_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::types::{MovieDetails, SnapshotDetails};
    use chrono::Utc;

    fn snapshot(integration: &str, title: &str) -> ProviderSnapshot {
        ProviderSnapshot {
            integration_id: integration.to_string(),
            provider_item_id: "1".to_string(),
            fetched_at: Utc::now(),
            details: SnapshotDetails::Movie(MovieDetails {
                title: title.to_string(),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn refresh_overwrites_same_provider() {
        let store = InMemorySnapshotStore::new();
        let media = MediaId::new();

        store.save_snapshot(media, snapshot("tmdb", "Old")).await.unwrap();
        store.save_snapshot(media, snapshot("tmdb", "New")).await.unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.load_snapshot(media, "tmdb").await.unwrap().unwrap();
        assert_eq!(loaded.details.title(), "New");
    }

    #[tokio::test]
    async fn providers_and_media_are_isolated() {
        let store = InMemorySnapshotStore::new();
        let first = MediaId::new();
        let second = MediaId::new();

        store.save_snapshot(first, snapshot("tvdb", "A")).await.unwrap();
        store.save_snapshot(first, snapshot("tmdb", "A")).await.unwrap();
        store.save_snapshot(second, snapshot("tmdb", "B")).await.unwrap();

        let ids: Vec<_> = store
            .load_snapshots(first)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.integration_id)
            .collect();
        assert_eq!(ids, ["tmdb", "tvdb"]);
        assert!(store.load_snapshot(second, "tvdb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn external_ids_merge() {
        let store = InMemorySnapshotStore::new();
        let media = MediaId::new();

        store
            .save_external_ids(media, &ExternalIds::default().with("tmdb", "603"))
            .await
            .unwrap();
        store
            .save_external_ids(media, &ExternalIds::default().with("imdb", "tt0133093").with("tmdb", "999"))
            .await
            .unwrap();

        let ids = store.load_external_ids(media).await.unwrap().unwrap();
        assert_eq!(ids.get("tmdb"), Some("603"));
        assert_eq!(ids.get("imdb"), Some("tt0133093"));
    }
}
