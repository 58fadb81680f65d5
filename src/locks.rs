//! Named mutual-exclusion handles keyed by group or (group, account).
//!
//! Handles are created on first use and shared by every later caller with
//! the same key. Guards are owned so they can be held across `.await`.

use crate::models::{AccountId, GroupId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Group(GroupId),
    Account { group_id: GroupId, account_id: AccountId },
}

impl LockKey {
    pub fn account(group_id: &GroupId, account_id: &AccountId) -> Self {
        LockKey::Account {
            group_id: group_id.clone(),
            account_id: account_id.clone(),
        }
    }
}

pub type LockGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared handle for `key`, created if absent
    pub fn handle(&self, key: LockKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    pub async fn lock(&self, key: LockKey) -> LockGuard {
        self.handle(key).lock_owned().await
    }

    /// Serializes start/stop of a group's round task
    pub async fn lock_group(&self, group_id: &GroupId) -> LockGuard {
        self.lock(LockKey::Group(group_id.clone())).await
    }

    /// Serializes balance-affecting work on one account
    pub async fn lock_account(&self, group_id: &GroupId, account_id: &AccountId) -> LockGuard {
        self.lock(LockKey::account(group_id, account_id)).await
    }

    /// Lock two distinct accounts in key order so opposite transfers cannot
    /// deadlock. Passing the same account twice never resolves.
    pub async fn lock_account_pair(
        &self,
        group_id: &GroupId,
        first: &AccountId,
        second: &AccountId,
    ) -> (LockGuard, LockGuard) {
        let a = LockKey::account(group_id, first);
        let b = LockKey::account(group_id, second);
        if a <= b {
            let ga = self.lock(a).await;
            let gb = self.lock(b).await;
            (ga, gb)
        } else {
            let gb = self.lock(b).await;
            let ga = self.lock(a).await;
            (ga, gb)
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop handles nobody else holds. Returns how many were removed.
    pub fn reap_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, handle| Arc::strong_count(handle) > 1);
        before.saturating_sub(self.locks.len())
    }
}
