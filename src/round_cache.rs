//! Open-round state per group, kept outside the ledger so it survives restarts
//! independently and can be cleared without touching balances.

use crate::{
    errors::{QuickThreeResult, StorageError},
    models::{GroupId, IssueNumber},
    storage::KvBackend,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const ROUND_KEY_PREFIX: &str = "CURRENT_ISSUE:";

pub fn round_key(group_id: &GroupId) -> String {
    format!("{}{}", ROUND_KEY_PREFIX, group_id)
}

/// Current open issue per group
pub trait RoundStore: Send + Sync {
    fn current_issue(&self, group_id: &GroupId) -> QuickThreeResult<Option<IssueNumber>>;

    /// Record `issue` as open. Round state never expires on its own.
    fn open_issue(&self, group_id: &GroupId, issue: &IssueNumber) -> QuickThreeResult<()>;

    /// Remove the open issue; a no-op when none is set
    fn close_issue(&self, group_id: &GroupId) -> QuickThreeResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    value: String,
    /// Unix milliseconds; `None` means no expiry
    expires_at_ms: Option<i64>,
}

/// String cache with optional per-entry TTL over any `KvBackend`
#[derive(Clone)]
pub struct KvRoundCache {
    backend: Arc<dyn KvBackend>,
}

impl KvRoundCache {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub fn get(&self, key: &str) -> QuickThreeResult<Option<String>> {
        let Some(bytes) = self.backend.get(key.as_bytes())? else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::CorruptedData(format!("Failed to decode cache entry {}: {}", key, e))
        })?;

        match entry.expires_at_ms {
            Some(deadline) if deadline <= Utc::now().timestamp_millis() => {
                self.backend.delete(key.as_bytes())?;
                Ok(None)
            }
            _ => Ok(Some(entry.value)),
        }
    }

    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> QuickThreeResult<()> {
        let expires_at_ms = ttl.map(|ttl| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            Utc::now().timestamp_millis().saturating_add(ttl_ms)
        });
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at_ms,
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to encode cache entry {}: {}", key, e))
        })?;
        self.backend.put(key.as_bytes(), &bytes)
    }

    pub fn delete(&self, key: &str) -> QuickThreeResult<()> {
        self.backend.delete(key.as_bytes())
    }
}

impl RoundStore for KvRoundCache {
    fn current_issue(&self, group_id: &GroupId) -> QuickThreeResult<Option<IssueNumber>> {
        Ok(self.get(&round_key(group_id))?.map(IssueNumber::new))
    }

    fn open_issue(&self, group_id: &GroupId, issue: &IssueNumber) -> QuickThreeResult<()> {
        self.set(&round_key(group_id), issue.as_str(), None)
    }

    fn close_issue(&self, group_id: &GroupId) -> QuickThreeResult<()> {
        self.delete(&round_key(group_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn cache() -> KvRoundCache {
        KvRoundCache::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_round_key_format() {
        assert_eq!(round_key(&GroupId::new("abc")), "CURRENT_ISSUE:abc");
    }

    #[test]
    fn test_open_close_cycle() {
        let cache = cache();
        let group = GroupId::new("g1");
        assert!(cache.current_issue(&group).unwrap().is_none());

        cache.open_issue(&group, &IssueNumber::new("20240101120000")).unwrap();
        assert_eq!(
            cache.current_issue(&group).unwrap(),
            Some(IssueNumber::new("20240101120000"))
        );

        cache.close_issue(&group).unwrap();
        assert!(cache.current_issue(&group).unwrap().is_none());

        // closing twice is harmless
        cache.close_issue(&group).unwrap();
    }

    #[test]
    fn test_expired_entries_disappear() {
        let cache = cache();
        cache.set("k", "v", Some(Duration::ZERO)).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);

        cache.set("k", "v", Some(Duration::from_secs(3600))).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_groups_are_independent() {
        let cache = cache();
        let a = GroupId::new("a");
        let b = GroupId::new("b");
        cache.open_issue(&a, &IssueNumber::new("1")).unwrap();
        assert!(cache.current_issue(&b).unwrap().is_none());
    }
}
