pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::ListingRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Key-addressed document store for listings.
///
/// Every operation touches exactly one key and is atomic for that key;
/// reads see earlier writes from the same process.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get(&self, external_id: &str) -> Result<Option<ListingRecord>, StoreError>;

    /// Insert or fully replace the document for `record.external_id`
    async fn put(&self, record: &ListingRecord) -> Result<(), StoreError>;

    /// Set only `last_seen_at`; returns false when the key is absent
    async fn touch(&self, external_id: &str, seen_at: DateTime<Utc>) -> Result<bool, StoreError>;

    fn name(&self) -> &'static str;
}
