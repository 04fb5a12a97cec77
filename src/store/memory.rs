//! In-memory store backend for tests and local development.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{ProvisionOutcome, ScanPage, StoreError, VoteStore};
use crate::voteable::Voteable;

/// Keeps records in a `BTreeMap` so the scan order, and therefore the
/// resumption key, is stable across pages. Data lives only as long as the
/// process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<BTreeMap<String, Voteable>>>,
    provisioned: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_provisioned(&self) -> Result<(), StoreError> {
        if self.provisioned.load(Ordering::Acquire) {
            return Ok(());
        }
        Err(StoreError::Scan("table does not exist".to_string()))
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn provision(&self) -> Result<ProvisionOutcome, StoreError> {
        if self.provisioned.swap(true, Ordering::AcqRel) {
            Ok(ProvisionOutcome::AlreadyExists)
        } else {
            Ok(ProvisionOutcome::Created)
        }
    }

    async fn put(&self, voteable: &Voteable) -> Result<(), StoreError> {
        self.ensure_provisioned()
            .map_err(|_| StoreError::Put("table does not exist".to_string()))?;
        let mut items = self.items.write().await;
        if items.contains_key(&voteable.id) {
            return Err(StoreError::Put(format!(
                "item {} already exists",
                voteable.id
            )));
        }
        items.insert(voteable.id.clone(), voteable.clone());
        Ok(())
    }

    async fn scan(&self, limit: i64, start_after: Option<&str>) -> Result<ScanPage, StoreError> {
        self.ensure_provisioned()?;
        let items = self.items.read().await;

        let lower = match start_after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let mut range = items.range::<str, _>((lower, Bound::Unbounded));

        let mut page = Vec::new();
        let mut last_key = None;
        while let Some((id, voteable)) = range.next() {
            page.push(voteable.clone());
            if limit > 0 && page.len() as i64 == limit {
                // Only hand back a resumption key when items remain.
                last_key = range.next().map(|_| id.clone());
                break;
            }
        }

        Ok(ScanPage {
            items: page,
            last_key,
        })
    }

    async fn increment_vote(&self, id: &str, answer_index: i32) -> Result<(), StoreError> {
        self.ensure_provisioned()
            .map_err(|_| StoreError::Update("table does not exist".to_string()))?;
        let mut items = self.items.write().await;
        let voteable = items
            .get_mut(id)
            .ok_or_else(|| StoreError::Update(format!("no item with id {id}")))?;
        let index = usize::try_from(answer_index)
            .ok()
            .filter(|i| *i < voteable.votes.len())
            .ok_or_else(|| {
                StoreError::Update(format!(
                    "vote index {answer_index} out of range for item {id}"
                ))
            })?;
        voteable.votes[index] += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn provisioned() -> MemoryStore {
        let store = MemoryStore::new();
        store.provision().await.unwrap();
        store
    }

    #[tokio::test]
    async fn provision_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(store.provision().await.unwrap(), ProvisionOutcome::Created);
        assert_eq!(
            store.provision().await.unwrap(),
            ProvisionOutcome::AlreadyExists
        );
    }

    #[tokio::test]
    async fn operations_fail_before_provisioning() {
        let store = MemoryStore::new();
        assert!(store.scan(0, None).await.is_err());
        assert!(
            store
                .put(&Voteable::new("q".to_string(), vec!["a".to_string()]))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn put_rejects_duplicate_id() {
        let store = provisioned().await;
        let voteable = Voteable::new("q".to_string(), vec!["a".to_string()]);
        store.put(&voteable).await.unwrap();
        let err = store.put(&voteable).await.unwrap_err();
        assert!(matches!(err, StoreError::Put(_)));
    }

    #[tokio::test]
    async fn scan_pages_resume_without_repeats() {
        let store = provisioned().await;
        for i in 0..5 {
            store
                .put(&Voteable::new(format!("q-{i}"), vec!["a".to_string()]))
                .await
                .unwrap();
        }

        let first = store.scan(2, None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let resume = first.last_key.expect("resumption key for partial scan");

        let second = store.scan(2, Some(&resume)).await.unwrap();
        assert_eq!(second.items.len(), 2);
        let resume = second.last_key.expect("resumption key for partial scan");

        let third = store.scan(2, Some(&resume)).await.unwrap();
        assert_eq!(third.items.len(), 1);
        assert_eq!(third.last_key, None);

        let mut ids: Vec<String> = first
            .items
            .into_iter()
            .chain(second.items)
            .chain(third.items)
            .map(|v| v.id)
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn unlimited_scan_returns_everything_and_no_key() {
        let store = provisioned().await;
        for i in 0..3 {
            store
                .put(&Voteable::new(format!("q-{i}"), vec!["a".to_string()]))
                .await
                .unwrap();
        }
        let page = store.scan(0, None).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.last_key, None);
    }

    #[tokio::test]
    async fn increment_touches_only_the_given_index() {
        let store = provisioned().await;
        let voteable = Voteable::new(
            "q".to_string(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        store.put(&voteable).await.unwrap();

        store.increment_vote(&voteable.id, 1).await.unwrap();
        store.increment_vote(&voteable.id, 1).await.unwrap();

        let page = store.scan(0, None).await.unwrap();
        assert_eq!(page.items[0].votes, vec![0, 2, 0]);
    }

    #[tokio::test]
    async fn increment_out_of_range_fails_and_changes_nothing() {
        let store = provisioned().await;
        let voteable = Voteable::new("q".to_string(), vec!["a".to_string(), "b".to_string()]);
        store.put(&voteable).await.unwrap();

        assert!(store.increment_vote(&voteable.id, 2).await.is_err());
        assert!(store.increment_vote(&voteable.id, -1).await.is_err());

        let page = store.scan(0, None).await.unwrap();
        assert_eq!(page.items[0].votes, vec![0, 0]);
    }

    #[tokio::test]
    async fn increment_unknown_id_fails() {
        let store = provisioned().await;
        let err = store.increment_vote("missing", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Update(_)));
    }
}
