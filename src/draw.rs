//! One draw for one group: close the round, roll, persist, announce, roll over.

use crate::{
    errors::{DeliveryError, QuickThreeResult},
    games::{quick_three::DICE_PER_DRAW, DiceOutcome, DrawOutcome, GameplayType},
    models::{new_id, Draw, DrawId, Group, IssueNumber},
    services::GameContext,
    settlement::{SettlementEngine, SettlementJob},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a completed draw
pub struct DrawReport {
    pub draw: Draw,
    pub next_issue: IssueNumber,
    /// Settlement of the closed issue, already running in the background
    pub settlement: SettlementJob,
}

pub struct DrawEngine {
    ctx: Arc<GameContext>,
    settlement: Arc<SettlementEngine>,
}

impl DrawEngine {
    pub fn new(ctx: Arc<GameContext>, settlement: Arc<SettlementEngine>) -> Self {
        Self { ctx, settlement }
    }

    /// Execute the draw for `issue`.
    ///
    /// Any error ends the draw where it happened: before the Draw commit
    /// nothing is persisted; after it, the round stays closed.
    pub async fn execute_draw(&self, group: &Group, issue: &IssueNumber) -> QuickThreeResult<DrawReport> {
        // Wagers arriving from here on are rejected until the next issue opens.
        self.ctx.rounds.close_issue(&group.id)?;
        debug!(group_id = %group.id, issue = %issue, "Round closed for draw");

        let outcome = match group.gameplay {
            GameplayType::QuickThree => DrawOutcome::QuickThree(self.roll_quick_three(group).await?),
        };

        let delay = self.ctx.config.result_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let draw = Draw {
            id: DrawId::new(new_id()),
            group_id: group.id.clone(),
            issue: issue.clone(),
            gameplay: group.gameplay,
            outcome,
            created_at: self.ctx.clock.now(),
        };
        let mut tx = self.ctx.store.begin();
        tx.put_draw(&draw)?;
        tx.commit()?;
        info!(group_id = %group.id, issue = %issue, "Draw recorded");

        let next_issue = self.ctx.clock.mint_issue();
        self.announce(group, &result_message(&draw)).await?;
        self.announce(group, &countdown_message(&next_issue, group.draw_cycle_minutes))
            .await?;

        if let Err(e) = self.ctx.rounds.open_issue(&group.id, &next_issue) {
            warn!(group_id = %group.id, issue = %next_issue, "Failed to open next round: {}", e);
        }

        let settlement = self.settlement.spawn(group.id.clone(), issue.clone());

        Ok(DrawReport {
            draw,
            next_issue,
            settlement,
        })
    }

    async fn roll_quick_three(&self, group: &Group) -> QuickThreeResult<DiceOutcome> {
        let mut dice = [0u8; DICE_PER_DRAW];
        for die in dice.iter_mut() {
            *die = match self.ctx.messenger.roll_die(group.chat_id).await {
                Ok(value) => value,
                Err(e) => {
                    self.report(group, &e);
                    return Err(e.into());
                }
            };
        }
        Ok(DiceOutcome::from_dice(dice)?)
    }

    async fn announce(&self, group: &Group, content: &str) -> QuickThreeResult<()> {
        if let Err(e) = self.ctx.messenger.send_message(group.chat_id, content).await {
            self.report(group, &e);
            return Err(e.into());
        }
        Ok(())
    }

    fn report(&self, group: &Group, error: &DeliveryError) {
        if let Err(e) = self.ctx.lifecycle.report_delivery_failure(&group.id, error) {
            warn!(group_id = %group.id, "Failed to record delivery failure: {}", e);
        }
    }
}

pub fn result_message(draw: &Draw) -> String {
    match &draw.outcome {
        DrawOutcome::QuickThree(dice) => {
            format!("Issue {} result: {}", draw.issue, dice.summary())
        }
    }
}

pub fn countdown_message(issue: &IssueNumber, cycle_minutes: u32) -> String {
    format!("Issue {} is open, draw in {} minute(s)", issue, cycle_minutes)
}
