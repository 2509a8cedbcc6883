//! A store that fails every read.

use async_trait::async_trait;
use foliobot_core::error::StoreError;
use foliobot_core::store::{
    AssistantConfigRecord, ConfigStore, ContentQuery, ContentStore, ContextBlock, Row, SkillEntry,
};

/// Fails every read with the reason the real store could not be opened.
///
/// The config loader then serves its fallback and the retrieval tool reports
/// the error as tool output.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl ContentStore for UnavailableStore {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn select(&self, _query: &ContentQuery) -> Result<Vec<Row>, StoreError> {
        Err(self.error())
    }
}

#[async_trait]
impl ConfigStore for UnavailableStore {
    async fn active_config(&self) -> Result<Option<AssistantConfigRecord>, StoreError> {
        Err(self.error())
    }

    async fn context_blocks(&self, _config_id: &str) -> Result<Vec<ContextBlock>, StoreError> {
        Err(self.error())
    }

    async fn skills(&self, _config_id: &str) -> Result<Vec<SkillEntry>, StoreError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliobot_core::store::Collection;

    #[tokio::test]
    async fn every_read_fails_with_reason() {
        let store = UnavailableStore::new("disk on fire");
        let err = store
            .select(&ContentQuery::new(Collection::About, None, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
        assert!(store.active_config().await.is_err());
        assert!(store.skills("x").await.is_err());
    }
}
