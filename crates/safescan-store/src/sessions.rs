//! In-memory verification session repository.

use std::collections::HashMap;

use async_trait::async_trait;
use safescan_core::{Error, Result, SessionRepository, VerificationSession};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<Uuid, VerificationSession>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, session: &VerificationSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(Error::InvalidInput(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<VerificationSession>> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        session: &VerificationSession,
        expected_version: u64,
    ) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(&session.id)
            .ok_or_else(|| Error::NotFound(format!("session {}", session.id)))?;
        if stored.version != expected_version {
            return Ok(false);
        }
        let mut next = session.clone();
        next.version = expected_version + 1;
        *stored = next;
        Ok(true)
    }
}
