use super::ListingStore;
use crate::error::StoreError;
use crate::models::ListingRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store; contents vanish on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, ListingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    #[cfg(test)]
    pub async fn remove(&self, external_id: &str) -> Option<ListingRecord> {
        self.docs.write().await.remove(external_id)
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn get(&self, external_id: &str) -> Result<Option<ListingRecord>, StoreError> {
        Ok(self.docs.read().await.get(external_id).cloned())
    }

    async fn put(&self, record: &ListingRecord) -> Result<(), StoreError> {
        self.docs
            .write()
            .await
            .insert(record.external_id.clone(), record.clone());
        Ok(())
    }

    async fn touch(&self, external_id: &str, seen_at: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.docs.write().await.get_mut(external_id) {
            Some(doc) => {
                doc.last_seen_at = Some(seen_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
