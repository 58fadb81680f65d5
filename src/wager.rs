//! Wager placement against a group's open round

use crate::{
    errors::QuickThreeResult,
    games::BetCategory,
    models::{is_money_amount, new_id, AccountId, Group, GroupId, IssueNumber, SettleStatus, Wager, WagerId},
    services::GameContext,
};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a wager was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    UnknownCategory(String),
    InvalidStake,
    GroupNotFound,
    GameplayDisabled,
    NoOpenRound,
    NotRegistered,
    InsufficientBalance { balance: Decimal, stake: Decimal },
    /// Storage or cache failure; details are logged, not returned
    Internal,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownCategory(raw) => write!(f, "unknown bet category '{}'", raw),
            RejectReason::InvalidStake => write!(f, "stake must be a positive amount in cents"),
            RejectReason::GroupNotFound => write!(f, "group not found"),
            RejectReason::GameplayDisabled => write!(f, "gameplay is not enabled"),
            RejectReason::NoOpenRound => write!(f, "no round is open"),
            RejectReason::NotRegistered => write!(f, "account not registered"),
            RejectReason::InsufficientBalance { balance, stake } => {
                write!(f, "insufficient balance {} for stake {}", balance, stake)
            }
            RejectReason::Internal => write!(f, "internal error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WagerDecision {
    Accepted(Wager),
    Rejected(RejectReason),
}

impl WagerDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, WagerDecision::Accepted(_))
    }

    pub fn wager(&self) -> Option<&Wager> {
        match self {
            WagerDecision::Accepted(wager) => Some(wager),
            WagerDecision::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            WagerDecision::Accepted(_) => None,
            WagerDecision::Rejected(reason) => Some(reason),
        }
    }
}

pub struct WagerLedger {
    ctx: Arc<GameContext>,
}

impl WagerLedger {
    pub fn new(ctx: Arc<GameContext>) -> Self {
        Self { ctx }
    }

    /// Place a wager from raw member input (category code or chat label)
    pub async fn place_wager(
        &self,
        group_id: &GroupId,
        account_id: &AccountId,
        category: &str,
        stake: Decimal,
    ) -> WagerDecision {
        match category.parse::<BetCategory>() {
            Ok(category) => self.place(group_id, account_id, category, stake).await,
            Err(_) => WagerDecision::Rejected(RejectReason::UnknownCategory(category.to_string())),
        }
    }

    pub async fn place(
        &self,
        group_id: &GroupId,
        account_id: &AccountId,
        category: BetCategory,
        stake: Decimal,
    ) -> WagerDecision {
        if stake <= Decimal::ZERO || !is_money_amount(stake) {
            return WagerDecision::Rejected(RejectReason::InvalidStake);
        }

        let group = match self.ctx.store.group(group_id) {
            Ok(Some(group)) => group,
            Ok(None) => return WagerDecision::Rejected(RejectReason::GroupNotFound),
            Err(e) => {
                error!(group_id = %group_id, "Failed to load group: {}", e);
                return WagerDecision::Rejected(RejectReason::Internal);
            }
        };
        if !group.gameplay_enabled {
            return WagerDecision::Rejected(RejectReason::GameplayDisabled);
        }

        let issue = match self.ctx.rounds.current_issue(group_id) {
            Ok(Some(issue)) => issue,
            Ok(None) => return WagerDecision::Rejected(RejectReason::NoOpenRound),
            Err(e) => {
                error!(group_id = %group_id, "Failed to read open round: {}", e);
                return WagerDecision::Rejected(RejectReason::Internal);
            }
        };

        let _guard = self.ctx.locks.lock_account(group_id, account_id).await;
        match self.debit_and_record(&group, account_id, &issue, category, stake) {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    group_id = %group_id,
                    account_id = %account_id,
                    issue = %issue,
                    "Wager not recorded: {}",
                    e
                );
                WagerDecision::Rejected(RejectReason::Internal)
            }
        }
    }

    fn debit_and_record(
        &self,
        group: &Group,
        account_id: &AccountId,
        issue: &IssueNumber,
        category: BetCategory,
        stake: Decimal,
    ) -> QuickThreeResult<WagerDecision> {
        let group_id = &group.id;

        // The draw may have closed this issue while we waited for the lock.
        if self.ctx.rounds.current_issue(group_id)?.as_ref() != Some(issue) {
            debug!(group_id = %group_id, issue = %issue, "Round closed before the stake was taken");
            return Ok(WagerDecision::Rejected(RejectReason::NoOpenRound));
        }

        let mut tx = self.ctx.store.begin();

        let mut account = match tx.account(account_id)? {
            Some(account) if account.registered && account.group_id == *group_id => account,
            _ => {
                tx.rollback();
                return Ok(WagerDecision::Rejected(RejectReason::NotRegistered));
            }
        };
        if account.balance < stake {
            debug!(account_id = %account_id, balance = %account.balance, stake = %stake, "Stake exceeds balance");
            tx.rollback();
            return Ok(WagerDecision::Rejected(RejectReason::InsufficientBalance {
                balance: account.balance,
                stake,
            }));
        }

        account.balance -= stake;
        let now = self.ctx.clock.now();
        let wager = Wager {
            id: WagerId::new(new_id()),
            group_id: group_id.clone(),
            account_id: account_id.clone(),
            issue: issue.clone(),
            gameplay: group.gameplay,
            category,
            stake,
            status: SettleStatus::Unsettled,
            result: None,
            created_at: now,
            updated_at: now,
        };

        tx.put_account(&account)?;
        tx.put_wager(&wager)?;
        tx.commit()?;

        info!(
            group_id = %group_id,
            account_id = %account_id,
            issue = %issue,
            category = %category,
            stake = %stake,
            "Wager accepted"
        );
        Ok(WagerDecision::Accepted(wager))
    }
}
