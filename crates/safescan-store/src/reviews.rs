//! In-memory review item repository.

use std::collections::HashMap;

use async_trait::async_trait;
use safescan_core::defaults::REVIEW_LIST_LIMIT;
use safescan_core::{Error, Result, ReviewFilter, ReviewItem, ReviewRepository};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Review items held in process memory.
#[derive(Default)]
pub struct MemoryReviewRepository {
    items: RwLock<HashMap<Uuid, ReviewItem>>,
}

impl MemoryReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(item: &ReviewItem, filter: &ReviewFilter) -> bool {
    filter.status.map_or(true, |s| item.status == s)
        && filter
            .confidence_level
            .map_or(true, |l| item.confidence_level == l)
        && filter
            .claimed_by
            .as_deref()
            .map_or(true, |r| item.claimed_by.as_deref() == Some(r))
}

#[async_trait]
impl ReviewRepository for MemoryReviewRepository {
    async fn insert(&self, item: &ReviewItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(Error::InvalidInput(format!(
                "review item {} already exists",
                item.id
            )));
        }
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get(&self, item_id: Uuid) -> Result<Option<ReviewItem>> {
        Ok(self.items.read().await.get(&item_id).cloned())
    }

    async fn find_open_for_job(&self, job_id: Uuid) -> Result<Option<ReviewItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| item.job_id == job_id && !item.status.is_terminal())
            .min_by_key(|item| item.created_at)
            .cloned())
    }

    async fn list(&self, filter: &ReviewFilter) -> Result<Vec<ReviewItem>> {
        let items = self.items.read().await;
        let mut out: Vec<ReviewItem> = items
            .values()
            .filter(|item| matches(item, filter))
            .cloned()
            .collect();
        out.sort_by_key(|item| (item.priority, item.created_at, item.id));
        out.truncate(filter.limit.unwrap_or(REVIEW_LIST_LIMIT));
        Ok(out)
    }

    async fn compare_and_swap(&self, item: &ReviewItem, expected_version: u64) -> Result<bool> {
        let mut items = self.items.write().await;
        let stored = items
            .get_mut(&item.id)
            .ok_or_else(|| Error::NotFound(format!("review item {}", item.id)))?;
        if stored.version != expected_version {
            return Ok(false);
        }
        let mut next = item.clone();
        next.version = expected_version + 1;
        *stored = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safescan_core::{ConfidenceLevel, ReviewStatus};

    fn item(priority: i32, level: ConfidenceLevel) -> ReviewItem {
        ReviewItem::new(Uuid::now_v7(), level, 0.5, priority, "test")
    }

    #[tokio::test]
    async fn test_list_orders_by_priority_then_age() {
        let repo = MemoryReviewRepository::new();
        let medium_old = item(2, ConfidenceLevel::Medium);
        let mut low_new = item(1, ConfidenceLevel::Low);
        low_new.created_at = medium_old.created_at + chrono::Duration::seconds(5);
        let mut medium_new = item(2, ConfidenceLevel::Medium);
        medium_new.created_at = medium_old.created_at + chrono::Duration::seconds(1);

        for i in [&medium_new, &low_new, &medium_old] {
            repo.insert(i).await.unwrap();
        }

        let listed = repo.list(&ReviewFilter::default()).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![low_new.id, medium_old.id, medium_new.id]);
    }

    #[tokio::test]
    async fn test_list_filters_and_limits() {
        let repo = MemoryReviewRepository::new();
        for _ in 0..3 {
            repo.insert(&item(2, ConfidenceLevel::Medium)).await.unwrap();
        }
        repo.insert(&item(1, ConfidenceLevel::Low)).await.unwrap();

        let filter = ReviewFilter {
            confidence_level: Some(ConfidenceLevel::Medium),
            limit: Some(2),
            ..Default::default()
        };
        let listed = repo.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed
            .iter()
            .all(|i| i.confidence_level == ConfidenceLevel::Medium));
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_version() {
        let repo = MemoryReviewRepository::new();
        let original = item(1, ConfidenceLevel::Low);
        repo.insert(&original).await.unwrap();

        let mut first = original.clone();
        first.status = ReviewStatus::Claimed;
        first.claimed_by = Some("a".into());
        assert!(repo.compare_and_swap(&first, 0).await.unwrap());

        let mut second = original.clone();
        second.status = ReviewStatus::Claimed;
        second.claimed_by = Some("b".into());
        assert!(!repo.compare_and_swap(&second, 0).await.unwrap());

        let stored = repo.get(original.id).await.unwrap().unwrap();
        assert_eq!(stored.claimed_by.as_deref(), Some("a"));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_find_open_for_job_skips_terminal() {
        let repo = MemoryReviewRepository::new();
        let mut done = item(1, ConfidenceLevel::Low);
        done.status = ReviewStatus::Approved;
        repo.insert(&done).await.unwrap();
        assert!(repo.find_open_for_job(done.job_id).await.unwrap().is_none());
    }
}
