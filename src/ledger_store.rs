//! Transactional ledger of groups, accounts, odds, draws and wagers.
//!
//! Entities are JSON-encoded under prefixed keys. A `LedgerTransaction`
//! stages writes in memory (reads see staged values) and commits them as one
//! atomic batch; dropping it without `commit` discards everything.
//!
//! The store does not isolate concurrent transactions on its own. Callers
//! serialize conflicting work through `LockRegistry` before opening one.

use crate::{
    errors::{QuickThreeResult, StorageError},
    games::{DrawOutcome, GameplayType},
    models::{
        Account, AccountId, Draw, DrawId, Group, GroupId, IssueNumber, OddsConfig, SettleStatus, Wager,
        WagerId,
    },
    storage::{BatchOp, KvBackend},
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const GROUP_PREFIX: &str = "group:";
const ACCOUNT_PREFIX: &str = "account:";
const ODDS_PREFIX: &str = "odds:";
const DRAW_HEADER_PREFIX: &str = "draw:header:";
const DRAW_DETAIL_PREFIX: &str = "draw:detail:";
const WAGER_PREFIX: &str = "wager:";
const ACCOUNT_USER_INDEX_PREFIX: &str = "index:account_user:";
const WAGER_ISSUE_INDEX_PREFIX: &str = "index:wager_issue:";
const WAGER_ACCOUNT_INDEX_PREFIX: &str = "index:wager_account:";

fn group_key(id: &GroupId) -> Vec<u8> {
    format!("{}{}", GROUP_PREFIX, id).into_bytes()
}

fn account_key(id: &AccountId) -> Vec<u8> {
    format!("{}{}", ACCOUNT_PREFIX, id).into_bytes()
}

fn account_user_index_key(group_id: &GroupId, user_id: i64) -> Vec<u8> {
    format!("{}{}:{}", ACCOUNT_USER_INDEX_PREFIX, group_id, user_id).into_bytes()
}

fn odds_key(group_id: &GroupId) -> Vec<u8> {
    format!("{}{}", ODDS_PREFIX, group_id).into_bytes()
}

fn draw_header_prefix(group_id: &GroupId) -> String {
    format!("{}{}:", DRAW_HEADER_PREFIX, group_id)
}

fn draw_header_key(group_id: &GroupId, issue: &IssueNumber) -> Vec<u8> {
    format!("{}{}", draw_header_prefix(group_id), issue).into_bytes()
}

fn draw_detail_key(group_id: &GroupId, issue: &IssueNumber) -> Vec<u8> {
    format!("{}{}:{}", DRAW_DETAIL_PREFIX, group_id, issue).into_bytes()
}

fn wager_key(id: &WagerId) -> Vec<u8> {
    format!("{}{}", WAGER_PREFIX, id).into_bytes()
}

fn wager_issue_prefix(group_id: &GroupId, issue: Option<&IssueNumber>) -> String {
    match issue {
        Some(issue) => format!("{}{}:{}:", WAGER_ISSUE_INDEX_PREFIX, group_id, issue),
        None => format!("{}{}:", WAGER_ISSUE_INDEX_PREFIX, group_id),
    }
}

fn wager_account_prefix(account_id: &AccountId) -> String {
    format!("{}{}:", WAGER_ACCOUNT_INDEX_PREFIX, account_id)
}

/// Index keys end in `:<id>`; recover the id from the last segment
fn trailing_id(key: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(key).ok()?;
    text.rsplit(':').next().map(str::to_string)
}

fn encode<T: Serialize>(what: &str, value: &T) -> QuickThreeResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        StorageError::WriteFailed(format!("Failed to encode {}: {}", what, e)).into()
    })
}

fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> QuickThreeResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptedData(format!("Failed to decode {}: {}", what, e)).into()
    })
}

/// Draw header as persisted; the outcome detail is stored under its own key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DrawHeader {
    id: DrawId,
    group_id: GroupId,
    issue: IssueNumber,
    gameplay: GameplayType,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LedgerStore {
    backend: Arc<dyn KvBackend>,
}

impl LedgerStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub fn begin(&self) -> LedgerTransaction<'_> {
        LedgerTransaction {
            store: self,
            staged: BTreeMap::new(),
        }
    }

    fn load<T: DeserializeOwned>(&self, what: &str, key: &[u8]) -> QuickThreeResult<Option<T>> {
        match self.backend.get(key)? {
            Some(bytes) => decode(what, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn load_all<T: DeserializeOwned>(&self, what: &str, prefix: &str) -> QuickThreeResult<Vec<T>> {
        self.backend
            .scan_prefix(prefix.as_bytes())?
            .iter()
            .map(|(_, bytes)| decode(what, bytes))
            .collect()
    }

    pub fn group(&self, id: &GroupId) -> QuickThreeResult<Option<Group>> {
        self.load("group", &group_key(id))
    }

    pub fn groups(&self) -> QuickThreeResult<Vec<Group>> {
        self.load_all("group", GROUP_PREFIX)
    }

    /// Groups with gameplay enabled whose chat is still reachable
    pub fn playable_groups(&self) -> QuickThreeResult<Vec<Group>> {
        Ok(self.groups()?.into_iter().filter(Group::is_playable).collect())
    }

    pub fn account(&self, id: &AccountId) -> QuickThreeResult<Option<Account>> {
        self.load("account", &account_key(id))
    }

    pub fn account_by_user(&self, group_id: &GroupId, user_id: i64) -> QuickThreeResult<Option<Account>> {
        match self.backend.get(&account_user_index_key(group_id, user_id))? {
            Some(raw) => {
                let id: AccountId = decode("account index", &raw)?;
                self.account(&id)
            }
            None => Ok(None),
        }
    }

    pub fn accounts_in_group(&self, group_id: &GroupId) -> QuickThreeResult<Vec<Account>> {
        let prefix = format!("{}{}:", ACCOUNT_USER_INDEX_PREFIX, group_id);
        let mut accounts = Vec::new();
        for (_, raw) in self.backend.scan_prefix(prefix.as_bytes())? {
            let id: AccountId = decode("account index", &raw)?;
            if let Some(account) = self.account(&id)? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    pub fn odds(&self, group_id: &GroupId) -> QuickThreeResult<Option<OddsConfig>> {
        self.load("odds", &odds_key(group_id))
    }

    pub fn draw(&self, group_id: &GroupId, issue: &IssueNumber) -> QuickThreeResult<Option<Draw>> {
        let header: Option<DrawHeader> = self.load("draw header", &draw_header_key(group_id, issue))?;
        match header {
            Some(header) => self.attach_outcome(header).map(Some),
            None => Ok(None),
        }
    }

    fn attach_outcome(&self, header: DrawHeader) -> QuickThreeResult<Draw> {
        let outcome: DrawOutcome = self
            .load("draw detail", &draw_detail_key(&header.group_id, &header.issue))?
            .ok_or_else(|| {
                StorageError::CorruptedData(format!(
                    "Draw {} for group {} has no outcome detail",
                    header.issue, header.group_id
                ))
            })?;

        Ok(Draw {
            id: header.id,
            group_id: header.group_id,
            issue: header.issue,
            gameplay: header.gameplay,
            outcome,
            created_at: header.created_at,
        })
    }

    /// Newest draws first; issue numbers sort chronologically
    pub fn recent_draws(&self, group_id: &GroupId, limit: usize) -> QuickThreeResult<Vec<Draw>> {
        let rows = self.backend.scan_prefix(draw_header_prefix(group_id).as_bytes())?;
        rows.iter()
            .rev()
            .take(limit)
            .map(|(_, bytes)| {
                let header: DrawHeader = decode("draw header", bytes)?;
                self.attach_outcome(header)
            })
            .collect()
    }

    pub fn wager(&self, id: &WagerId) -> QuickThreeResult<Option<Wager>> {
        self.load("wager", &wager_key(id))
    }

    fn wagers_by_index(&self, prefix: &str) -> QuickThreeResult<Vec<Wager>> {
        let mut wagers = Vec::new();
        for (key, _) in self.backend.scan_prefix(prefix.as_bytes())? {
            let Some(id) = trailing_id(&key) else {
                continue;
            };
            if let Some(wager) = self.wager(&WagerId::new(id))? {
                wagers.push(wager);
            }
        }
        Ok(wagers)
    }

    pub fn wagers_for_issue(&self, group_id: &GroupId, issue: &IssueNumber) -> QuickThreeResult<Vec<Wager>> {
        self.wagers_by_index(&wager_issue_prefix(group_id, Some(issue)))
    }

    pub fn unsettled_wagers(&self, group_id: &GroupId, issue: &IssueNumber) -> QuickThreeResult<Vec<Wager>> {
        Ok(self
            .wagers_for_issue(group_id, issue)?
            .into_iter()
            .filter(|w| w.status == SettleStatus::Unsettled)
            .collect())
    }

    /// Every unsettled wager in the group, across all issues
    pub fn all_unsettled_wagers(&self, group_id: &GroupId) -> QuickThreeResult<Vec<Wager>> {
        Ok(self
            .wagers_by_index(&wager_issue_prefix(group_id, None))?
            .into_iter()
            .filter(|w| w.status == SettleStatus::Unsettled)
            .collect())
    }

    /// Newest wagers first
    pub fn recent_wagers(&self, account_id: &AccountId, limit: usize) -> QuickThreeResult<Vec<Wager>> {
        let mut wagers = self.wagers_by_index(&wager_account_prefix(account_id))?;
        wagers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        wagers.truncate(limit);
        Ok(wagers)
    }

    pub fn save_group(&self, group: &Group) -> QuickThreeResult<()> {
        let mut tx = self.begin();
        tx.put_group(group)?;
        tx.commit()
    }

    pub fn save_account(&self, account: &Account) -> QuickThreeResult<()> {
        let mut tx = self.begin();
        tx.put_account(account)?;
        tx.commit()
    }

    pub fn save_odds(&self, odds: &OddsConfig) -> QuickThreeResult<()> {
        let mut tx = self.begin();
        tx.put_odds(odds)?;
        tx.commit()
    }
}

/// Staged writes over a `LedgerStore`, applied atomically on `commit`
pub struct LedgerTransaction<'a> {
    store: &'a LedgerStore,
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> LedgerTransaction<'a> {
    fn read<T: DeserializeOwned>(&self, what: &str, key: &[u8]) -> QuickThreeResult<Option<T>> {
        match self.staged.get(key) {
            Some(Some(bytes)) => decode(what, bytes).map(Some),
            Some(None) => Ok(None),
            None => self.store.load(what, key),
        }
    }

    fn stage<T: Serialize>(&mut self, what: &str, key: Vec<u8>, value: &T) -> QuickThreeResult<()> {
        let bytes = encode(what, value)?;
        self.staged.insert(key, Some(bytes));
        Ok(())
    }

    pub fn group(&self, id: &GroupId) -> QuickThreeResult<Option<Group>> {
        self.read("group", &group_key(id))
    }

    pub fn account(&self, id: &AccountId) -> QuickThreeResult<Option<Account>> {
        self.read("account", &account_key(id))
    }

    pub fn wager(&self, id: &WagerId) -> QuickThreeResult<Option<Wager>> {
        self.read("wager", &wager_key(id))
    }

    pub fn put_group(&mut self, group: &Group) -> QuickThreeResult<()> {
        self.stage("group", group_key(&group.id), group)
    }

    pub fn put_account(&mut self, account: &Account) -> QuickThreeResult<()> {
        self.stage("account", account_key(&account.id), account)?;
        self.stage(
            "account index",
            account_user_index_key(&account.group_id, account.user_id),
            &account.id,
        )
    }

    pub fn put_odds(&mut self, odds: &OddsConfig) -> QuickThreeResult<()> {
        self.stage("odds", odds_key(&odds.group_id), odds)
    }

    /// Stage the draw header and its outcome detail together
    pub fn put_draw(&mut self, draw: &Draw) -> QuickThreeResult<()> {
        let header = DrawHeader {
            id: draw.id.clone(),
            group_id: draw.group_id.clone(),
            issue: draw.issue.clone(),
            gameplay: draw.gameplay,
            created_at: draw.created_at,
        };
        self.stage("draw header", draw_header_key(&draw.group_id, &draw.issue), &header)?;
        self.stage(
            "draw detail",
            draw_detail_key(&draw.group_id, &draw.issue),
            &draw.outcome,
        )
    }

    /// Stage a wager together with its issue and account index entries
    pub fn put_wager(&mut self, wager: &Wager) -> QuickThreeResult<()> {
        self.stage("wager", wager_key(&wager.id), wager)?;

        let issue_index = format!(
            "{}{}",
            wager_issue_prefix(&wager.group_id, Some(&wager.issue)),
            wager.id
        );
        let account_index = format!(
            "{}{}:{}",
            wager_account_prefix(&wager.account_id),
            wager.issue,
            wager.id
        );
        self.staged.insert(issue_index.into_bytes(), Some(Vec::new()));
        self.staged.insert(account_index.into_bytes(), Some(Vec::new()));
        Ok(())
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn commit(self) -> QuickThreeResult<()> {
        let ops: Vec<BatchOp> = self
            .staged
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOp::Put(key, value),
                None => BatchOp::Delete(key),
            })
            .collect();

        let count = ops.len();
        self.store.backend.write_batch(ops)?;
        debug!(writes = count, "Ledger transaction committed");
        Ok(())
    }

    /// Discard staged writes
    pub fn rollback(self) {
        debug!(discarded = self.staged.len(), "Ledger transaction rolled back");
    }
}
