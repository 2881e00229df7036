//! In-memory extraction result repository.

use std::collections::HashMap;

use async_trait::async_trait;
use safescan_core::{ExtractionResult, Result, ResultRepository};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Extraction results keyed by job.
#[derive(Default)]
pub struct MemoryResultRepository {
    results: RwLock<HashMap<Uuid, ExtractionResult>>,
}

impl MemoryResultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultRepository for MemoryResultRepository {
    async fn upsert(&self, result: &ExtractionResult) -> Result<()> {
        self.results
            .write()
            .await
            .insert(result.job_id, result.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ExtractionResult>> {
        Ok(self.results.read().await.get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safescan_core::{CanonicalIdentifier, Symbology};

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = MemoryResultRepository::new();
        let job_id = Uuid::now_v7();
        let mut result =
            ExtractionResult::new(job_id, CanonicalIdentifier::new("raw", Symbology::Text));
        repo.upsert(&result).await.unwrap();

        result.brand = Some("Acme".into());
        repo.upsert(&result).await.unwrap();

        let stored = repo.get(job_id).await.unwrap().unwrap();
        assert_eq!(stored.brand.as_deref(), Some("Acme"));
        assert!(repo.get(Uuid::now_v7()).await.unwrap().is_none());
    }
}
