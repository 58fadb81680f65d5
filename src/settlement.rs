//! Settlement of a drawn issue's wagers
//!
//! Each wager settles under its own account lock and ledger transaction, so
//! one failure never blocks the rest. Settled wagers are skipped, which keeps
//! repeated or overlapping runs from paying twice.

use crate::{
    errors::{GameError, QuickThreeResult},
    games::{quick_three, BetOutcome, DrawOutcome},
    models::{Account, Draw, Group, GroupId, IssueNumber, OddsConfig, SettleStatus, Wager, WagerId, WagerResult},
    services::GameContext,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Totals for one settlement run
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReport {
    pub group_id: GroupId,
    pub issue: IssueNumber,
    pub wins: usize,
    pub losses: usize,
    /// Wagers already settled by another run
    pub skipped: usize,
    pub failed: usize,
    pub total_payout: Decimal,
}

impl SettlementReport {
    fn new(group_id: GroupId, issue: IssueNumber) -> Self {
        Self {
            group_id,
            issue,
            wins: 0,
            losses: 0,
            skipped: 0,
            failed: 0,
            total_payout: Decimal::ZERO,
        }
    }

    pub fn settled(&self) -> usize {
        self.wins + self.losses
    }
}

/// Handle to a settlement running in the background
pub struct SettlementJob {
    group_id: GroupId,
    issue: IssueNumber,
    handle: JoinHandle<QuickThreeResult<SettlementReport>>,
}

impl SettlementJob {
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn issue(&self) -> &IssueNumber {
        &self.issue
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to complete
    pub async fn wait(self) -> QuickThreeResult<SettlementReport> {
        self.handle
            .await
            .map_err(|e| GameError::SettlementJobFailed(e.to_string()))?
    }
}

struct SettledWager {
    wager: Wager,
    account: Account,
}

pub struct SettlementEngine {
    ctx: Arc<GameContext>,
}

impl SettlementEngine {
    pub fn new(ctx: Arc<GameContext>) -> Self {
        Self { ctx }
    }

    /// Settle `issue` on a background task
    pub fn spawn(self: &Arc<Self>, group_id: GroupId, issue: IssueNumber) -> SettlementJob {
        let engine = Arc::clone(self);
        let (job_group, job_issue) = (group_id.clone(), issue.clone());
        let handle = tokio::spawn(async move {
            let result = engine.settle_round(&job_group, &job_issue).await;
            if let Err(e) = &result {
                error!(group_id = %job_group, issue = %job_issue, "Settlement failed: {}", e);
            }
            result
        });

        SettlementJob {
            group_id,
            issue,
            handle,
        }
    }

    pub async fn settle_round(&self, group_id: &GroupId, issue: &IssueNumber) -> QuickThreeResult<SettlementReport> {
        let store = &self.ctx.store;
        let draw = store.draw(group_id, issue)?.ok_or_else(|| GameError::DrawNotFound {
            group_id: group_id.to_string(),
            issue: issue.to_string(),
        })?;
        let odds = store
            .odds(group_id)?
            .ok_or_else(|| GameError::OddsNotConfigured(group_id.to_string()))?;
        let group = store
            .group(group_id)?
            .ok_or_else(|| GameError::GroupNotFound(group_id.to_string()))?;

        let wagers = store.unsettled_wagers(group_id, issue)?;
        let mut report = SettlementReport::new(group_id.clone(), issue.clone());
        debug!(group_id = %group_id, issue = %issue, pending = wagers.len(), "Settling issue");

        for wager in wagers {
            match self.settle_wager(&group, &odds, &draw, &wager.id).await {
                Ok(Some(settled)) => {
                    if let Some(result) = settled.wager.result {
                        match result.outcome {
                            BetOutcome::Win => {
                                report.wins += 1;
                                report.total_payout += result.amount;
                            }
                            BetOutcome::Loss => report.losses += 1,
                        }
                    }
                    self.notify(&group, &settled).await;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(wager_id = %wager.id, issue = %issue, "Wager settlement failed: {}", e);
                }
            }
        }

        info!(
            group_id = %group_id,
            issue = %issue,
            wins = report.wins,
            losses = report.losses,
            skipped = report.skipped,
            failed = report.failed,
            payout = %report.total_payout,
            "Issue settled"
        );
        Ok(report)
    }

    /// Settle every unsettled wager whose issue already has a draw
    pub async fn settle_outstanding(&self, group_id: &GroupId) -> QuickThreeResult<Vec<SettlementReport>> {
        let issues: BTreeSet<IssueNumber> = self
            .ctx
            .store
            .all_unsettled_wagers(group_id)?
            .into_iter()
            .map(|w| w.issue)
            .collect();

        let mut reports = Vec::new();
        for issue in issues {
            if self.ctx.store.draw(group_id, &issue)?.is_none() {
                debug!(group_id = %group_id, issue = %issue, "No draw yet, leaving wagers open");
                continue;
            }
            reports.push(self.settle_round(group_id, &issue).await?);
        }
        Ok(reports)
    }

    async fn settle_wager(
        &self,
        group: &Group,
        odds: &OddsConfig,
        draw: &Draw,
        wager_id: &WagerId,
    ) -> QuickThreeResult<Option<SettledWager>> {
        let Some(snapshot) = self.ctx.store.wager(wager_id)? else {
            return Ok(None);
        };
        let _guard = self.ctx.locks.lock_account(&group.id, &snapshot.account_id).await;

        let mut tx = self.ctx.store.begin();
        let Some(mut wager) = tx.wager(wager_id)? else {
            return Ok(None);
        };
        if wager.is_settled() {
            return Ok(None);
        }
        let mut account = tx
            .account(&wager.account_id)?
            .ok_or_else(|| GameError::AccountNotFound(wager.account_id.to_string()))?;

        let resolution = match &draw.outcome {
            DrawOutcome::QuickThree(dice) => quick_three::resolve(dice, wager.category, wager.stake, odds),
        };

        account.balance += resolution.payout;
        wager.status = SettleStatus::Settled;
        wager.result = Some(WagerResult {
            outcome: resolution.outcome,
            amount: resolution.result_amount,
        });
        wager.updated_at = self.ctx.clock.now();

        tx.put_account(&account)?;
        tx.put_wager(&wager)?;
        tx.commit()?;

        Ok(Some(SettledWager { wager, account }))
    }

    async fn notify(&self, group: &Group, settled: &SettledWager) {
        let content = settlement_message(group, settled);
        if let Err(e) = self
            .ctx
            .messenger
            .send_message(settled.account.private_chat(), &content)
            .await
        {
            self.ctx
                .lifecycle
                .report_account_delivery_failure(&settled.account.id, &e);
        }
    }
}

fn settlement_message(group: &Group, settled: &SettledWager) -> String {
    let wager = &settled.wager;
    let result = match wager.result {
        Some(WagerResult {
            outcome: BetOutcome::Win,
            amount,
        }) => format!("won +{}", amount),
        Some(WagerResult { amount, .. }) => format!("lost {}", amount),
        None => {
            warn!(wager_id = %wager.id, "Notifying an unresolved wager");
            "pending".to_string()
        }
    };
    format!(
        "[{}] Issue {}: {}({}) {} {}. Balance: {}",
        group.title,
        wager.issue,
        wager.category,
        wager.category.label(),
        wager.stake,
        result,
        settled.account.balance
    )
}
