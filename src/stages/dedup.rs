//! Notification deduplication.
//!
//! Redelivered read requests (and reruns of a whole upload) would otherwise
//! send the same SMS and call again. Retrieval claims a key derived from the
//! artifact name and its content before notifying; a second claim within the
//! TTL is refused. The claim is only kept once notifying has finished: an
//! invocation cancelled mid-notification releases it, so the redelivery can
//! notify.

use crate::artifact::ArtifactName;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Claims processed between sweeps of expired entries
const PURGE_EVERY: u64 = 256;

pub trait NotificationLedger: Send + Sync {
    /// Returns `true` if the caller is the first to claim `key` within the TTL
    fn try_claim(&self, key: &str) -> bool;

    /// Forget a claim so the next `try_claim` for `key` succeeds
    fn release(&self, key: &str);
}

/// A claimed notification key, released on drop unless committed
pub struct NotificationClaim<'a> {
    ledger: &'a dyn NotificationLedger,
    key: String,
    committed: bool,
}

impl<'a> NotificationClaim<'a> {
    /// `None` when another invocation already holds or delivered `key`
    pub fn acquire(ledger: &'a dyn NotificationLedger, key: String) -> Option<Self> {
        // Only a successful claim may build the guard, its drop releases
        ledger.try_claim(&key).then(|| Self {
            ledger,
            key,
            committed: false,
        })
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for NotificationClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.ledger.release(&self.key);
        }
    }
}

/// Stable key for "this content was delivered for this artifact"
pub fn notification_key(artifact: &ArtifactName, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artifact.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct InMemoryNotificationLedger {
    claims: DashMap<String, Instant>,
    ttl: Duration,
    claims_seen: AtomicU64,
}

impl InMemoryNotificationLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            ttl,
            claims_seen: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Drop claims older than the TTL
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.claims
            .retain(|_, claimed_at| now.duration_since(*claimed_at) < self.ttl);
    }
}

impl NotificationLedger for InMemoryNotificationLedger {
    fn try_claim(&self, key: &str) -> bool {
        if self.claims_seen.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_expired();
        }

        let now = Instant::now();
        match self.claims.entry(key.to_string()) {
            Entry::Occupied(mut claim) => {
                if now.duration_since(*claim.get()) >= self.ttl {
                    claim.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    fn release(&self, key: &str) {
        self.claims.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_artifact_and_content() {
        let en = ArtifactName::derive("a.jpg", "en");
        let fr = ArtifactName::derive("a.jpg", "fr");
        assert_eq!(notification_key(&en, "hello"), notification_key(&en, "hello"));
        assert_ne!(notification_key(&en, "hello"), notification_key(&fr, "hello"));
        assert_ne!(notification_key(&en, "hello"), notification_key(&en, "hello!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_claim_within_ttl_is_refused() {
        let ledger = InMemoryNotificationLedger::new(Duration::from_secs(60));
        assert!(ledger.try_claim("k"));
        assert!(!ledger.try_claim("k"));
        assert!(ledger.try_claim("other"));
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_is_available_again_after_ttl() {
        let ledger = InMemoryNotificationLedger::new(Duration::from_secs(60));
        assert!(ledger.try_claim("k"));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(ledger.try_claim("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_claim_is_released() {
        let ledger = InMemoryNotificationLedger::new(Duration::from_secs(60));
        let claim = NotificationClaim::acquire(&ledger, "k".to_string()).unwrap();
        assert!(NotificationClaim::acquire(&ledger, "k".to_string()).is_none());
        // the refused attempt left the held claim in place
        assert!(!ledger.try_claim("k"));
        drop(claim);
        assert!(ledger.is_empty());

        NotificationClaim::acquire(&ledger, "k".to_string())
            .unwrap()
            .commit();
        assert!(!ledger.try_claim("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_removes_expired_claims() {
        let ledger = InMemoryNotificationLedger::new(Duration::from_secs(10));
        ledger.try_claim("old");
        tokio::time::advance(Duration::from_secs(11)).await;
        ledger.try_claim("fresh");
        ledger.purge_expired();
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_empty());
    }
}
