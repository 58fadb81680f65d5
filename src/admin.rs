//! Administrative balance edits, peer transfers and group settings

use crate::{
    config::MAX_DRAW_CYCLE_MINUTES,
    errors::{GameError, QuickThreeResult, ValidationError},
    ledger_store::LedgerTransaction,
    models::{is_money_amount, Account, AccountId, Draw, Group, GroupId, OddsConfig, Wager},
    services::GameContext,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Upper bound for a single balance edit or transfer
pub const MAX_ADJUSTMENT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 0); // 9_999_999_999

/// Upper bound for either odds multiplier
pub const MAX_ODDS: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2); // 999.99

/// Default page size for history queries
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAdjustment {
    Credit(Decimal),
    Debit(Decimal),
    Set(Decimal),
}

impl BalanceAdjustment {
    fn amount(&self) -> Decimal {
        match self {
            BalanceAdjustment::Credit(a) | BalanceAdjustment::Debit(a) | BalanceAdjustment::Set(a) => *a,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub from: Account,
    pub to: Account,
    pub amount: Decimal,
}

fn check_amount(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO || amount > MAX_ADJUSTMENT || !is_money_amount(amount) {
        return Err(ValidationError::AmountOutOfRange(amount.to_string()));
    }
    Ok(())
}

fn check_odds(odds: Decimal) -> Result<(), ValidationError> {
    if odds <= Decimal::ZERO || odds > MAX_ODDS {
        return Err(ValidationError::OddsOutOfRange(odds.to_string()));
    }
    Ok(())
}

pub struct AccountAdmin {
    ctx: Arc<GameContext>,
}

impl AccountAdmin {
    pub fn new(ctx: Arc<GameContext>) -> Self {
        Self { ctx }
    }

    /// Credit, debit or overwrite a member's balance
    pub async fn adjust_balance(
        &self,
        group_id: &GroupId,
        account_id: &AccountId,
        adjustment: BalanceAdjustment,
    ) -> QuickThreeResult<Account> {
        check_amount(adjustment.amount())?;

        let _guard = self.ctx.locks.lock_account(group_id, account_id).await;
        let mut tx = self.ctx.store.begin();
        let mut account = self.registered_account(&tx, group_id, account_id)?;

        let before = account.balance;
        account.balance = match adjustment {
            BalanceAdjustment::Credit(amount) => account.balance + amount,
            BalanceAdjustment::Debit(amount) => {
                if account.balance < amount {
                    return Err(ValidationError::InsufficientBalance {
                        balance: account.balance.to_string(),
                        required: amount.to_string(),
                    }
                    .into());
                }
                account.balance - amount
            }
            BalanceAdjustment::Set(amount) => amount,
        };

        tx.put_account(&account)?;
        tx.commit()?;
        info!(
            group_id = %group_id,
            account_id = %account_id,
            before = %before,
            after = %account.balance,
            "Balance adjusted"
        );
        Ok(account)
    }

    /// Move `amount` between two members of the same group in one transaction
    pub async fn transfer(
        &self,
        group_id: &GroupId,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> QuickThreeResult<TransferReceipt> {
        if from == to {
            return Err(ValidationError::SelfTransfer.into());
        }
        check_amount(amount)?;

        let (_from_guard, _to_guard) = self.ctx.locks.lock_account_pair(group_id, from, to).await;
        let mut tx = self.ctx.store.begin();
        let mut sender = self.registered_account(&tx, group_id, from)?;
        let mut receiver = self.registered_account(&tx, group_id, to)?;

        if sender.balance < amount {
            return Err(ValidationError::InsufficientBalance {
                balance: sender.balance.to_string(),
                required: amount.to_string(),
            }
            .into());
        }

        sender.balance -= amount;
        receiver.balance += amount;
        tx.put_account(&sender)?;
        tx.put_account(&receiver)?;
        tx.commit()?;

        info!(group_id = %group_id, from = %from, to = %to, amount = %amount, "Transfer committed");
        Ok(TransferReceipt {
            from: sender,
            to: receiver,
            amount,
        })
    }

    fn registered_account(
        &self,
        tx: &LedgerTransaction<'_>,
        group_id: &GroupId,
        account_id: &AccountId,
    ) -> QuickThreeResult<Account> {
        let account = tx
            .account(account_id)?
            .filter(|a| a.group_id == *group_id)
            .ok_or_else(|| GameError::AccountNotFound(account_id.to_string()))?;
        if !account.registered {
            return Err(ValidationError::AccountNotRegistered(account_id.to_string()).into());
        }
        Ok(account)
    }

    /// Change the draw cycle; a running task picks it up on its next start
    pub fn set_draw_cycle(&self, group_id: &GroupId, minutes: u32) -> QuickThreeResult<Group> {
        if minutes == 0 || minutes > MAX_DRAW_CYCLE_MINUTES {
            return Err(ValidationError::DrawCycleOutOfRange(minutes).into());
        }
        let mut group = self.group(group_id)?;
        group.draw_cycle_minutes = minutes;
        self.ctx.store.save_group(&group)?;
        info!(group_id = %group_id, minutes, "Draw cycle updated");
        Ok(group)
    }

    pub fn set_simple_odds(&self, group_id: &GroupId, odds: Decimal) -> QuickThreeResult<OddsConfig> {
        check_odds(odds)?;
        self.update_odds(group_id, |config| config.simple_odds = odds)
    }

    pub fn set_triplet_odds(&self, group_id: &GroupId, odds: Decimal) -> QuickThreeResult<OddsConfig> {
        check_odds(odds)?;
        self.update_odds(group_id, |config| config.triplet_odds = odds)
    }

    fn update_odds(
        &self,
        group_id: &GroupId,
        apply: impl FnOnce(&mut OddsConfig),
    ) -> QuickThreeResult<OddsConfig> {
        self.group(group_id)?;
        let mut config = self.ctx.store.odds(group_id)?.unwrap_or_else(|| OddsConfig {
            group_id: group_id.clone(),
            simple_odds: self.ctx.config.game.default_simple_odds,
            triplet_odds: self.ctx.config.game.default_triplet_odds,
        });
        apply(&mut config);
        self.ctx.store.save_odds(&config)?;
        info!(
            group_id = %group_id,
            simple = %config.simple_odds,
            triplet = %config.triplet_odds,
            "Odds updated"
        );
        Ok(config)
    }

    pub fn recent_draws(&self, group_id: &GroupId, limit: usize) -> QuickThreeResult<Vec<Draw>> {
        self.ctx.store.recent_draws(group_id, limit)
    }

    pub fn recent_wagers(&self, account_id: &AccountId, limit: usize) -> QuickThreeResult<Vec<Wager>> {
        self.ctx.store.recent_wagers(account_id, limit)
    }

    fn group(&self, group_id: &GroupId) -> QuickThreeResult<Group> {
        self.ctx
            .store
            .group(group_id)?
            .ok_or_else(|| GameError::GroupNotFound(group_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_limits_match_their_decimal_values() {
        assert_eq!(MAX_ADJUSTMENT, Decimal::from(9_999_999_999u64));
        assert_eq!(MAX_ODDS, Decimal::from_str("999.99").unwrap());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(check_amount(Decimal::ZERO).is_err());
        assert!(check_amount(Decimal::from(-5)).is_err());
        assert!(check_amount(Decimal::ONE).is_ok());
        assert!(check_amount(MAX_ADJUSTMENT).is_ok());
        assert!(check_amount(MAX_ADJUSTMENT + Decimal::ONE).is_err());
        assert!(check_amount(Decimal::from_str("0.01").unwrap()).is_ok());
        assert!(check_amount(Decimal::from_str("12.500").unwrap()).is_ok());
        assert!(check_amount(Decimal::from_str("0.005").unwrap()).is_err());
    }

    #[test]
    fn test_odds_bounds() {
        assert!(check_odds(Decimal::ZERO).is_err());
        assert!(check_odds(Decimal::from_str("1.95").unwrap()).is_ok());
        assert!(check_odds(Decimal::from(1000)).is_err());
    }
}
