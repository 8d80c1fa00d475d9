use crate::models::{ListingRecord, ReconcileOutcome};
use crate::store::ListingStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Insert / update / touch decision for scraped listings.
/// The only component that writes to the store.
pub struct Reconciler {
    store: Arc<dyn ListingStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn reconcile(&self, candidate: ListingRecord) -> ReconcileOutcome {
        self.reconcile_at(candidate, Utc::now()).await
    }

    /// Reconcile with an explicit observation time.
    ///
    /// Each branch issues a single store write, so a failure leaves the stored
    /// document exactly as it was.
    pub async fn reconcile_at(&self, mut candidate: ListingRecord, now: DateTime<Utc>) -> ReconcileOutcome {
        if candidate.raw_hash.is_empty() {
            candidate.raw_hash = candidate.compute_hash();
        }
        let key = candidate.external_id.clone();

        let existing = match self.store.get(&key).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!("Lookup of {} failed: {}", key, err);
                return ReconcileOutcome::Failed(err);
            }
        };

        match existing {
            None => {
                candidate.first_seen_at = Some(now);
                candidate.last_seen_at = Some(now);
                self.write(candidate, ReconcileOutcome::Inserted).await
            }
            Some(stored) if stored.raw_hash != candidate.raw_hash => {
                candidate.first_seen_at = stored.first_seen_at.or(Some(now));
                candidate.last_seen_at = Some(advance(stored.last_seen_at, now));
                self.write(candidate, ReconcileOutcome::Updated).await
            }
            Some(stored) => {
                let seen = advance(stored.last_seen_at, now);
                match self.store.touch(&key, seen).await {
                    Ok(true) => {
                        debug!("Unchanged {}", key);
                        ReconcileOutcome::Unchanged
                    }
                    Ok(false) => {
                        // Gone between lookup and touch; write it back whole
                        warn!("{} vanished before touch, re-inserting", key);
                        candidate.first_seen_at = stored.first_seen_at.or(Some(now));
                        candidate.last_seen_at = Some(seen);
                        self.write(candidate, ReconcileOutcome::Inserted).await
                    }
                    Err(err) => {
                        warn!("Touch of {} failed: {}", key, err);
                        ReconcileOutcome::Failed(err)
                    }
                }
            }
        }
    }

    /// Single full-document write reported as `success` when it lands
    async fn write(&self, candidate: ListingRecord, success: ReconcileOutcome) -> ReconcileOutcome {
        match self.store.put(&candidate).await {
            Ok(()) => {
                debug!("{:?} {}", success, candidate.external_id);
                success
            }
            Err(err) => {
                warn!("Write of {} failed: {}", candidate.external_id, err);
                ReconcileOutcome::Failed(err)
            }
        }
    }
}

/// `last_seen_at` never moves backwards, even with clock skew between runs
fn advance(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}
